use crate::catalog::{CatalogEntry, FileCatalog};
use lazy_static::lazy_static;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::time::Instant;

pub const FILENAME_MATCH_SCORE: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredFile {
    /// `/`-separated path relative to the mirror root.
    pub path: String,
    pub score: u64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RankOptions {
    pub max_candidates: usize,
    pub top_k: usize,
    pub extensions: Vec<String>,
    /// Candidates not yet scored when this passes are dropped.
    pub deadline: Option<Instant>,
}

impl RankOptions {
    pub fn new(max_candidates: usize, top_k: usize) -> Self {
        RankOptions {
            max_candidates,
            top_k,
            extensions: Vec::new(),
            deadline: None,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

lazy_static! {
    static ref STOP_WORDS: HashSet<&'static str> = [
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "has",
        "her", "his", "was", "one", "our", "out", "its", "how", "why", "who", "what", "when",
        "where", "which", "this", "that", "these", "those", "with", "from", "into", "about",
        "does", "did", "have", "there", "their", "they", "them", "then", "than", "will",
        "would", "should", "could", "been", "being", "were", "also", "some", "such", "only",
        "other", "more", "most", "very", "just", "like", "please", "show", "tell", "explain",
    ]
    .into_iter()
    .collect();
}

/// Lowercased query keywords, in first-seen order without duplicates.
///
/// Length and stop-word checks apply to the raw token; trailing punctuation
/// is stripped afterwards, so `"db?"` yields `db`.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for token in query.split_whitespace() {
        let token = token.to_lowercase();
        if token.chars().count() <= 2 || STOP_WORDS.contains(token.as_str()) {
            continue;
        }
        let word = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
        if word.is_empty() {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }

    keywords
}

/// Lexical score of one file: +10 for each keyword in the file name and +1
/// for every occurrence of a keyword in the content. Case-insensitive.
pub fn score_text(keywords: &[String], file_name: &str, content: &str) -> (u64, String) {
    let name = file_name.to_lowercase();
    let text = content.to_lowercase();
    let mut score = 0;
    let mut reasons = Vec::new();

    for keyword in keywords {
        if name.contains(keyword.as_str()) {
            score += FILENAME_MATCH_SCORE;
            reasons.push(format!("name:{}", keyword));
        }
        let hits = text.matches(keyword.as_str()).count() as u64;
        if hits > 0 {
            score += hits;
            reasons.push(format!("{}x{}", keyword, hits));
        }
    }

    (score, reasons.join(", "))
}

fn score_entry(
    keywords: &[String],
    entry: &CatalogEntry,
    options: &RankOptions,
) -> Option<ScoredFile> {
    if options.expired() {
        return None;
    }

    let bytes = match fs::read(&entry.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Skipping unreadable {}: {}", entry.relative, e);
            return None;
        }
    };
    let content = String::from_utf8_lossy(&bytes);

    let (score, reason) = score_text(keywords, entry.file_name(), &content);
    if score == 0 {
        return None;
    }

    Some(ScoredFile {
        path: entry.relative.clone(),
        score,
        reason,
    })
}

/// Top files for `query`, best first. Equal scores keep catalog order.
pub fn find_relevant(
    catalog: &FileCatalog,
    query: &str,
    options: &RankOptions,
) -> Vec<ScoredFile> {
    let keywords = extract_keywords(query);
    if keywords.is_empty() || options.top_k == 0 {
        log::debug!("No usable keywords in query {:?}", query);
        return Vec::new();
    }

    let candidates: Vec<CatalogEntry> = catalog
        .entries(&options.extensions)
        .take(options.max_candidates)
        .take_while(|_| !options.expired())
        .collect();

    log::debug!(
        "Scoring {} candidates under {} for {:?}",
        candidates.len(),
        catalog.root().display(),
        keywords
    );

    let mut scored: Vec<ScoredFile> = candidates
        .par_iter()
        .map(|entry| score_entry(&keywords, entry, options))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(options.top_k);
    scored
}
