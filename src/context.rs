//! Assembly of the text context handed to a downstream analysis backend.

use crate::catalog::FileCatalog;
use crate::ranker::{extract_keywords, find_relevant, RankOptions};
use crate::summary::StructureSummary;
use crate::sync::SyncAction;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct ContextFile {
    pub path: String,
    pub score: u64,
    pub lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
    pub hash: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub project: String,
    pub query: String,
    pub mirror: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SyncAction>,
    pub keywords: Vec<String>,
    pub summary: StructureSummary,
    pub files: Vec<ContextFile>,
    /// Ranked files left out because they could not be read or did not fit.
    pub skipped: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub rank: RankOptions,
    pub max_bytes: usize,
    pub files_per_extension: usize,
    pub count_tokens: bool,
}

pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Ranks the catalog against `query` and loads the winners' contents until
/// `max_bytes` is spent.
pub fn assemble(
    catalog: &FileCatalog,
    project: &str,
    query: &str,
    options: &ContextOptions,
) -> ContextBundle {
    let summary = StructureSummary::build(catalog.entries(&[]), options.files_per_extension);
    let ranked = find_relevant(catalog, query, &options.rank);

    let mut files = Vec::new();
    let mut used = 0;
    let mut skipped = 0;
    let mut truncated = false;

    for scored in ranked {
        let full_path = catalog.root().join(&scored.path);
        let bytes = match fs::read(&full_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Skipping unreadable {}: {}", scored.path, e);
                skipped += 1;
                continue;
            }
        };

        if used + bytes.len() > options.max_bytes {
            log::debug!(
                "{} ({} bytes) does not fit the remaining context budget",
                scored.path,
                bytes.len()
            );
            skipped += 1;
            truncated = true;
            continue;
        }
        used += bytes.len();

        let hash = compute_hash(&bytes);
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let tokens = options
            .count_tokens
            .then(|| crate::tokens::count_tokens(&content));

        files.push(ContextFile {
            path: scored.path,
            score: scored.score,
            lines: content.lines().count(),
            tokens,
            hash,
            content,
        });
    }

    ContextBundle {
        project: project.to_string(),
        query: query.to_string(),
        mirror: catalog.root().to_path_buf(),
        action: None,
        keywords: extract_keywords(query),
        summary,
        files,
        skipped,
        truncated,
    }
}

impl ContextBundle {
    pub fn total_lines(&self) -> usize {
        self.files.iter().map(|f| f.lines).sum()
    }

    pub fn total_tokens(&self) -> Option<usize> {
        self.files.iter().map(|f| f.tokens).sum()
    }

    /// Plain-text context: headers, structure summary, then each file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Project: {}", self.project);
        let _ = writeln!(out, "# Query: {}", self.query);
        if let Some(action) = self.action {
            let _ = writeln!(out, "# Mirror: {}", action);
        }
        let _ = writeln!(out, "# Files: {} shown", self.files.len());
        if self.skipped > 0 {
            let _ = writeln!(out, "# Skipped: {} unreadable or over budget", self.skipped);
        }

        out.push_str("\n## Structure\n");
        out.push_str(&self.summary.render());

        for file in &self.files {
            let _ = write!(
                out,
                "\n{}\nFILE: {}\nSCORE: {}\nLINES: {}",
                "=".repeat(80),
                file.path,
                file.score,
                file.lines
            );
            if let Some(tokens) = file.tokens {
                let _ = write!(out, "\nTOKENS: {}", tokens);
            }
            let _ = writeln!(out, "\nHASH: {}\n{}", &file.hash[..12], "=".repeat(80));
            out.push_str(&file.content);
            if !file.content.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}
