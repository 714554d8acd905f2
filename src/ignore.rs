use glob::Pattern;
use std::fs;
use std::path::Path;

pub const IGNORE_FILE: &str = ".rctxignore";

/// Gitignore-flavoured glob patterns matched against `/`-separated paths
/// relative to the mirror root.
#[derive(Debug, Default, Clone)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    /// Global `~/.rctxignore`, then `<root>/.rctxignore`, then `extra`.
    pub fn load(root: &Path, extra: &[String]) -> Self {
        let mut patterns = Vec::new();

        if let Some(home) = dirs::home_dir() {
            if let Ok(content) = fs::read_to_string(home.join(IGNORE_FILE)) {
                patterns.extend(Self::parse_lines(content.lines()));
            }
        }

        if let Ok(content) = fs::read_to_string(root.join(IGNORE_FILE)) {
            patterns.extend(Self::parse_lines(content.lines()));
        }

        patterns.extend(Self::parse_lines(extra.iter().map(String::as_str)));

        IgnorePatterns { patterns }
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        IgnorePatterns {
            patterns: Self::parse_lines(lines),
        }
    }

    fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pattern = if line.starts_with("**/") {
                line.to_string()
            } else if line.ends_with('/') {
                format!("**/{}**", line)
            } else if line.contains('*') || line.contains('?') {
                format!("**/{}", line)
            } else {
                line.to_string()
            };

            match Pattern::new(&pattern) {
                Ok(p) => patterns.push(p),
                Err(e) => log::warn!("Ignoring invalid pattern '{}': {}", line, e),
            }
        }

        patterns
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}
