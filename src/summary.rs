use crate::catalog::CatalogEntry;
use colored::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

pub const NO_EXTENSION: &str = "(none)";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtensionGroup {
    pub extension: String,
    pub count: usize,
    pub bytes: u64,
    /// First files of this extension in catalog order.
    pub files: Vec<String>,
    pub omitted: usize,
}

/// Counts and truncated per-extension file lists for a cataloged tree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StructureSummary {
    pub total_files: usize,
    pub total_bytes: u64,
    pub directories: usize,
    pub extensions: Vec<ExtensionGroup>,
}

impl StructureSummary {
    pub fn build(
        entries: impl IntoIterator<Item = CatalogEntry>,
        files_per_extension: usize,
    ) -> Self {
        let mut groups: HashMap<String, ExtensionGroup> = HashMap::new();
        let mut directories = BTreeSet::new();
        let mut total_files = 0;
        let mut total_bytes = 0;

        for entry in entries {
            total_files += 1;
            total_bytes += entry.size;

            if let Some((dir, _)) = entry.relative.rsplit_once('/') {
                directories.insert(dir.to_string());
            }

            let extension = entry
                .extension()
                .map(|e| format!(".{}", e))
                .unwrap_or_else(|| NO_EXTENSION.to_string());
            let group = groups
                .entry(extension.clone())
                .or_insert_with(|| ExtensionGroup {
                    extension,
                    count: 0,
                    bytes: 0,
                    files: Vec::new(),
                    omitted: 0,
                });

            group.count += 1;
            group.bytes += entry.size;
            if group.files.len() < files_per_extension {
                group.files.push(entry.relative);
            } else {
                group.omitted += 1;
            }
        }

        let mut extensions: Vec<ExtensionGroup> = groups.into_values().collect();
        extensions.sort_by(|a, b| b.count.cmp(&a.count).then(a.extension.cmp(&b.extension)));

        StructureSummary {
            total_files,
            total_bytes,
            directories: directories.len(),
            extensions,
        }
    }

    /// Plain-text form for embedding in an analysis context.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Files: {} in {} directories ({})",
            self.total_files,
            self.directories,
            human_bytes(self.total_bytes)
        );

        for group in &self.extensions {
            let _ = write!(
                out,
                "{} ({}): {}",
                group.extension,
                group.count,
                group.files.join(", ")
            );
            if group.omitted > 0 {
                let _ = write!(out, ", ... (+{} more)", group.omitted);
            }
            out.push('\n');
        }

        out
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[derive(Default)]
struct TreeNode {
    annotation: Option<String>,
    children: BTreeMap<String, TreeNode>,
}

/// Renders `/`-separated paths as an indented tree. Each leaf can carry an
/// annotation (a score or a size) printed in front of its name.
pub fn render_tree<'a>(
    paths: impl IntoIterator<Item = (&'a str, Option<String>)>,
    no_color: bool,
) -> String {
    let mut root = TreeNode::default();

    for (path, annotation) in paths {
        let mut current = &mut root;
        for part in path.split('/') {
            current = current.children.entry(part.to_string()).or_default();
        }
        current.annotation = annotation;
    }

    let mut out = String::new();
    let count = root.children.len();
    for (i, (name, child)) in root.children.iter().enumerate() {
        render_node(&mut out, name, child, "", i + 1 == count, no_color);
    }
    out
}

fn render_node(
    out: &mut String,
    name: &str,
    node: &TreeNode,
    prefix: &str,
    is_last: bool,
    no_color: bool,
) {
    let connector = if is_last { "└── " } else { "├── " };

    let display_name = if node.children.is_empty() {
        match &node.annotation {
            Some(note) if no_color => format!("{} {}", note, name),
            Some(note) => format!("{} {}", note.dimmed(), name),
            None => name.to_string(),
        }
    } else if no_color {
        format!("{}/", name)
    } else {
        format!("{}", name.blue().bold())
    };

    let _ = writeln!(out, "{}{}{}", prefix, connector, display_name);

    let child_prefix = format!("{}{}   ", prefix, if is_last { " " } else { "│" });
    let count = node.children.len();
    for (i, (child_name, child)) in node.children.iter().enumerate() {
        render_node(out, child_name, child, &child_prefix, i + 1 == count, no_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(relative: &str, size: u64) -> CatalogEntry {
        CatalogEntry {
            path: PathBuf::from("/m").join(relative),
            relative: relative.to_string(),
            size,
        }
    }

    #[test]
    fn test_counts_and_truncation() {
        let entries = vec![
            entry("src/a.rs", 10),
            entry("src/b.rs", 20),
            entry("src/c.rs", 30),
            entry("Cargo.toml", 5),
            entry("Makefile", 1),
        ];

        let summary = StructureSummary::build(entries, 2);
        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.total_bytes, 66);
        assert_eq!(summary.directories, 1);

        let rs = &summary.extensions[0];
        assert_eq!(rs.extension, ".rs");
        assert_eq!(rs.count, 3);
        assert_eq!(rs.bytes, 60);
        assert_eq!(rs.files, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(rs.omitted, 1);

        let names: Vec<&str> = summary
            .extensions
            .iter()
            .map(|g| g.extension.as_str())
            .collect();
        assert_eq!(names, vec![".rs", "(none)", ".toml"]);
    }

    #[test]
    fn test_render_mentions_omitted() {
        let summary = StructureSummary::build(
            vec![entry("a.py", 1), entry("b.py", 1), entry("c.py", 1)],
            1,
        );
        let text = summary.render();
        assert!(text.starts_with("Files: 3 in 0 directories (3 B)"));
        assert!(text.contains(".py (3): a.py, ... (+2 more)"));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_render_tree_plain() {
        let tree = render_tree(
            vec![
                ("src/main.rs", Some("12".to_string())),
                ("src/util/mod.rs", None),
                ("README.md", Some(" 3".to_string())),
            ],
            true,
        );
        let expected = "\
├──  3 README.md
└── src/
    ├── 12 main.rs
    └── util/
        └── mod.rs
";
        assert_eq!(tree, expected);
    }
}
