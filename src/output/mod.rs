pub mod json;
pub mod xml;

use crate::error::ErrorReport;
use crate::summary::StructureSummary;
use crate::sync::{MirrorInfo, SyncAction};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Xml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            _ => Err(format!("Invalid format: {}. Use text, json, or xml", s)),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct FileOutput {
    pub path: String,
    pub size: u64,
}

#[derive(Serialize, Debug)]
pub struct FilesOutput {
    pub project: String,
    pub files: Vec<FileOutput>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RankedOutput {
    pub path: String,
    pub score: u64,
    pub reason: String,
}

#[derive(Serialize, Debug)]
pub struct RankOutput {
    pub project: String,
    pub query: String,
    pub keywords: Vec<String>,
    pub files: Vec<RankedOutput>,
}

#[derive(Serialize, Debug)]
pub struct SummaryOutput {
    pub project: String,
    #[serde(flatten)]
    pub summary: StructureSummary,
}

/// Outcome for one repository of a `sync` or `sync-all` run.
#[derive(Serialize, Debug)]
pub struct SyncEntry {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Serialize, Debug)]
pub struct SyncOutput {
    pub repositories: Vec<SyncEntry>,
}

#[derive(Serialize, Debug)]
pub struct StatusOutput {
    pub base_path: PathBuf,
    pub mirrors: Vec<MirrorInfo>,
}

#[derive(Serialize, Debug)]
pub struct ErrorOutput<'a> {
    pub error: &'a ErrorReport,
}
