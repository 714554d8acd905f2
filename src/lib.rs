pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod ignore;
pub mod locks;
pub mod output;
pub mod paths;
pub mod ranker;
pub mod reclaim;
pub mod retry;
pub mod runner;
pub mod summary;
pub mod sync;
pub mod tokens;
pub mod vcs;

pub use catalog::{CatalogEntry, FileCatalog};
pub use config::{Config, Settings};
pub use context::{ContextBundle, ContextFile, ContextOptions};
pub use error::{ErrorKind, ErrorReport, MirrorError, Result};
pub use ignore::IgnorePatterns;
pub use ranker::{extract_keywords, find_relevant, RankOptions, ScoredFile};
pub use retry::RetryPolicy;
pub use runner::{CommandRequest, CommandResult, CommandRunner, ProcessRunner};
pub use summary::StructureSummary;
pub use sync::{MirrorInfo, MirrorState, SyncAction, SyncOptions, SyncReport, Synchronizer};
pub use vcs::{RepositoryDescriptor, VcsKind};
