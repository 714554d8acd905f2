use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailure,
    ProcessTimeout,
    ProcessFailure,
    ProcessSpawn,
    FilesystemFailure,
    NotFound,
    SynchronizationFailed,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::ProcessTimeout => "process_timeout",
            ErrorKind::ProcessFailure => "process_failure",
            ErrorKind::ProcessSpawn => "process_spawn",
            ErrorKind::FilesystemFailure => "filesystem_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SynchronizationFailed => "synchronization_failed",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("`{command}` timed out after {seconds}s")]
    ProcessTimeout { command: String, seconds: f32 },

    #[error("`{command}` failed: {detail}")]
    ProcessFailure { command: String, detail: String },

    #[error("deadline passed before {0}")]
    DeadlineExceeded(String),

    #[error("could not start `{program}`: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("repository unavailable for project '{project}': {detail}")]
    SynchronizationFailed { project: String, detail: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MirrorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::Validation(_) => ErrorKind::ValidationFailure,
            MirrorError::ProcessTimeout { .. } | MirrorError::DeadlineExceeded(_) => {
                ErrorKind::ProcessTimeout
            }
            MirrorError::ProcessFailure { .. } => ErrorKind::ProcessFailure,
            MirrorError::ProcessSpawn { .. } => ErrorKind::ProcessSpawn,
            MirrorError::Filesystem { .. } => ErrorKind::FilesystemFailure,
            MirrorError::NotFound(_) => ErrorKind::NotFound,
            MirrorError::SynchronizationFailed { .. } => ErrorKind::SynchronizationFailed,
            MirrorError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn detail(&self) -> String {
        self.to_string()
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            detail: self.detail(),
        }
    }

    pub fn fs(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        MirrorError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Serializable form of an error, safe to hand to callers outside the process.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        let err = MirrorError::SynchronizationFailed {
            project: "demo".to_string(),
            detail: "clone failed".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::SynchronizationFailed);
        assert_eq!(err.kind().as_str(), "synchronization_failed");

        let timeout = MirrorError::ProcessTimeout {
            command: "git pull".to_string(),
            seconds: 5.0,
        };
        let failure = MirrorError::ProcessFailure {
            command: "git pull".to_string(),
            detail: "exit code 1".to_string(),
        };
        assert_ne!(timeout.kind(), failure.kind());
    }

    #[test]
    fn test_report_serializes_kind_in_snake_case() {
        let err = MirrorError::Validation("empty url".to_string());
        let json = serde_json::to_string(&err.report()).unwrap();
        assert!(json.contains(r#""kind":"validation_failure""#));
        assert!(json.contains("empty url"));
    }
}
