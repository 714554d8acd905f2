//! Deletion of checkout trees that may carry read-only entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Clears restrictive permissions under `path` and removes it.
///
/// A missing path counts as deleted. This is a single best-effort pass:
/// a file still held open elsewhere surfaces as an `Err` and the caller
/// decides whether to try again.
pub fn delete(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if !meta.is_dir() {
        make_writable(path, false);
        return fs::remove_file(path);
    }

    let entries = collect_tree(path);
    log::debug!(
        "Clearing attributes on {} entries under {}",
        entries.len(),
        path.display()
    );
    for (entry, is_dir) in entries.iter().rev() {
        make_writable(entry, *is_dir);
    }

    fs::remove_dir_all(path)
}

/// Pre-order listing of `root`, directories before their contents. Each
/// directory is opened up before it is read so locked subtrees are still
/// reachable. Symlinks are recorded neither as files nor followed.
fn collect_tree(root: &Path) -> Vec<(PathBuf, bool)> {
    let mut visited = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        make_writable(&dir, true);
        visited.push((dir.clone(), true));

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Cannot list {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => stack.push(path),
                Ok(ft) if ft.is_symlink() => {}
                _ => visited.push((path, false)),
            }
        }
    }

    visited
}

#[cfg(unix)]
fn make_writable(path: &Path, is_dir: bool) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }

    let mut perms = meta.permissions();
    let wanted = if is_dir { 0o700 } else { 0o600 };
    if perms.mode() & wanted != wanted {
        perms.set_mode(perms.mode() | wanted);
        if let Err(e) = fs::set_permissions(path, perms) {
            log::debug!("Cannot clear attributes on {}: {}", path.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn make_writable(path: &Path, _is_dir: bool) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }

    let mut perms = meta.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        if let Err(e) = fs::set_permissions(path, perms) {
            log::debug!("Cannot clear attributes on {}: {}", path.display(), e);
        }
    }
}
