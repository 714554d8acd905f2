use crate::config::Settings;
use crate::ignore::IgnorePatterns;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: PathBuf,
    /// `/`-separated path relative to the catalog root.
    pub relative: String,
    pub size: u64,
}

impl CatalogEntry {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
    }
}

lazy_static! {
    static ref DENIED_DIRS: HashSet<&'static str> = [
        // version control internals
        ".git",
        ".svn",
        ".hg",
        ".bzr",
        // build output
        "bin",
        "obj",
        "build",
        "dist",
        "out",
        "target",
        "debug",
        "release",
        ".next",
        ".nuxt",
        ".output",
        "coverage",
        // dependency caches
        "node_modules",
        "bower_components",
        "packages",
        "vendor",
        ".venv",
        "venv",
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".gradle",
        ".m2",
        ".cargo",
        ".cache",
        ".tox",
        // editors
        ".idea",
        ".vscode",
        ".vs",
    ]
    .into_iter()
    .collect();
    static ref DENIED_EXTENSIONS: HashSet<&'static str> = [
        // binaries and objects
        "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "class", "jar", "war", "pyc",
        "pyo", "wasm", "bin", "dat",
        // debug symbols
        "pdb", "ilk", "idb", "dsym", "map",
        // temp and editor files
        "tmp", "temp", "swp", "swo", "bak", "cache", "suo", "user",
        // archives
        "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "nupkg",
        // media and fonts
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "mp3", "mp4", "wav",
        "avi", "mov", "woff", "woff2", "ttf", "otf", "eot",
        // documents and databases
        "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "db", "sqlite", "sqlite3",
    ]
    .into_iter()
    .collect();
    static ref DENIED_FILE_NAMES: HashSet<&'static str> = [
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "Cargo.lock",
        "poetry.lock",
        "composer.lock",
        "Gemfile.lock",
        ".DS_Store",
        "Thumbs.db",
    ]
    .into_iter()
    .collect();
}

pub fn is_denied_dir(name: &str) -> bool {
    DENIED_DIRS.contains(name.to_lowercase().as_str())
}

/// Enumerates the analysable files under a root.
///
/// Every call to [`FileCatalog::entries`] starts a fresh walk; nothing is
/// cached between calls. Entries come out in file-name order within each
/// directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
    max_file_size: u64,
    ignore: IgnorePatterns,
}

impl FileCatalog {
    pub fn new(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        let root = root.into();
        let ignore = IgnorePatterns::load(&root, &settings.ignore);
        FileCatalog {
            root,
            max_file_size: settings.max_file_size,
            ignore,
        }
    }

    pub fn with_limits(
        root: impl Into<PathBuf>,
        max_file_size: u64,
        ignore: IgnorePatterns,
    ) -> Self {
        FileCatalog {
            root: root.into(),
            max_file_size,
            ignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walks the tree. `extensions`, when non-empty, keeps only files
    /// with one of those extensions (case-insensitive, leading dot optional).
    pub fn entries<'a>(
        &'a self,
        extensions: &[String],
    ) -> impl Iterator<Item = CatalogEntry> + 'a {
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_pruned_dir(entry))
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Failed to read entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| self.admit(entry, &wanted))
    }

    fn admit(&self, entry: DirEntry, wanted: &[String]) -> Option<CatalogEntry> {
        let path = entry.path();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        if DENIED_FILE_NAMES.contains(name) {
            log::debug!("Skipping noise file {}", path.display());
            return None;
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if let Some(ext) = &extension {
            if DENIED_EXTENSIONS.contains(ext.as_str()) {
                return None;
            }
        }

        if !wanted.is_empty() {
            match &extension {
                Some(ext) if wanted.iter().any(|w| w == ext) => {}
                _ => return None,
            }
        }

        if is_binary_media(path) {
            return None;
        }

        let relative = relative_path(&self.root, path)?;
        if self.ignore.is_ignored(&relative) {
            log::debug!("Skipping ignored file {}", relative);
            return None;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                return None;
            }
        };
        if size > self.max_file_size {
            log::debug!(
                "Skipping large file {} ({} bytes > {})",
                path.display(),
                size,
                self.max_file_size
            );
            return None;
        }

        Some(CatalogEntry {
            path: path.to_path_buf(),
            relative,
            size,
        })
    }
}

fn is_pruned_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(is_denied_dir)
            .unwrap_or(false)
}

fn is_binary_media(path: &Path) -> bool {
    use mime_guess::mime;

    let Some(mime) = mime_guess::from_path(path).first() else {
        return false;
    };
    matches!(mime.type_(), mime::IMAGE | mime::VIDEO | mime::AUDIO) && mime.subtype() != mime::SVG
}

/// `/`-joined path of `path` below `root`, independent of the platform
/// separator.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
