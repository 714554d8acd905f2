use crate::error::{MirrorError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_SUMMARY_FILES_PER_EXTENSION: usize = 10;
pub const DEFAULT_MAX_CONTEXT_BYTES: usize = 512 * 1024;
pub const DEFAULT_UPDATE_ATTEMPTS: u32 = 2;
pub const DEFAULT_CLEANUP_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_PAUSE_MS: u64 = 500;

/// Partial configuration as read from a file, the environment or the CLI.
/// Every layer only overrides the keys it sets.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub base_path: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub max_candidates: Option<usize>,
    pub top_k: Option<usize>,
    pub summary_files_per_extension: Option<usize>,
    pub max_context_bytes: Option<usize>,
    pub update_attempts: Option<u32>,
    pub cleanup_attempts: Option<u32>,
    pub retry_pause_ms: Option<u64>,
    pub clone_depth: Option<u32>,
    pub ignore: Option<Vec<String>>,
}

impl Config {
    pub fn merge(&mut self, other: Config) {
        if other.base_path.is_some() {
            self.base_path = other.base_path;
        }
        if other.max_file_size.is_some() {
            self.max_file_size = other.max_file_size;
        }
        if other.command_timeout_secs.is_some() {
            self.command_timeout_secs = other.command_timeout_secs;
        }
        if other.max_candidates.is_some() {
            self.max_candidates = other.max_candidates;
        }
        if other.top_k.is_some() {
            self.top_k = other.top_k;
        }
        if other.summary_files_per_extension.is_some() {
            self.summary_files_per_extension = other.summary_files_per_extension;
        }
        if other.max_context_bytes.is_some() {
            self.max_context_bytes = other.max_context_bytes;
        }
        if other.update_attempts.is_some() {
            self.update_attempts = other.update_attempts;
        }
        if other.cleanup_attempts.is_some() {
            self.cleanup_attempts = other.cleanup_attempts;
        }
        if other.retry_pause_ms.is_some() {
            self.retry_pause_ms = other.retry_pause_ms;
        }
        if other.clone_depth.is_some() {
            self.clone_depth = other.clone_depth;
        }
        if other.ignore.is_some() {
            self.ignore = other.ignore;
        }
    }

    pub fn from_env() -> Config {
        Config {
            base_path: std::env::var_os("RCTX_BASE_PATH").map(PathBuf::from),
            max_file_size: env_value("RCTX_MAX_FILE_SIZE"),
            command_timeout_secs: env_value("RCTX_COMMAND_TIMEOUT_SECS"),
            max_candidates: env_value("RCTX_MAX_CANDIDATES"),
            top_k: env_value("RCTX_TOP_K"),
            ..Config::default()
        }
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

fn read_layer(path: &Path) -> Option<Config> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str::<Config>(&content) {
        Ok(config) => {
            log::debug!("Loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), e);
            None
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rctx"))
}

pub fn load_config() -> Config {
    let mut config = Config::default();

    // 1. Global config: ~/.rctx/config.toml
    if let Some(dir) = config_dir() {
        if let Some(global) = read_layer(&dir.join("config.toml")) {
            config.merge(global);
        }
    }

    // 2. Local config: ./.rctx.toml
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(local) = read_layer(&cwd.join(".rctx.toml")) {
            config.merge(local);
        }
    }

    // 3. Environment
    config.merge(Config::from_env());

    config
}

/// Resolved, immutable configuration injected into the synchronizer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_path: PathBuf,
    pub max_file_size: u64,
    pub command_timeout: Duration,
    pub max_candidates: usize,
    pub top_k: usize,
    pub summary_files_per_extension: usize,
    pub max_context_bytes: usize,
    pub update_retry: RetryPolicy,
    pub cleanup_retry: RetryPolicy,
    pub clone_depth: Option<u32>,
    pub ignore: Vec<String>,
}

impl Settings {
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        let pause = Duration::from_millis(DEFAULT_RETRY_PAUSE_MS);
        Settings {
            base_path: base_path.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            top_k: DEFAULT_TOP_K,
            summary_files_per_extension: DEFAULT_SUMMARY_FILES_PER_EXTENSION,
            max_context_bytes: DEFAULT_MAX_CONTEXT_BYTES,
            update_retry: RetryPolicy::new(DEFAULT_UPDATE_ATTEMPTS, pause),
            cleanup_retry: RetryPolicy::new(DEFAULT_CLEANUP_ATTEMPTS, pause),
            clone_depth: None,
            ignore: Vec::new(),
        }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let base_path = match config.base_path {
            Some(path) => path,
            None => config_dir()
                .map(|dir| dir.join("repos"))
                .ok_or_else(|| {
                    MirrorError::Configuration(
                        "could not determine home directory; set base_path".to_string(),
                    )
                })?,
        };
        if base_path.as_os_str().is_empty() {
            return Err(MirrorError::Configuration(
                "base_path must not be empty".to_string(),
            ));
        }
        // Clones run with the base path as their working directory, so a
        // relative target would resolve twice.
        let base_path = if base_path.is_absolute() {
            base_path
        } else {
            std::env::current_dir()
                .map_err(|e| MirrorError::fs("resolve", &base_path, e))?
                .join(base_path)
        };

        let mut settings = Settings::with_base_path(base_path);
        let pause_ms = config.retry_pause_ms.unwrap_or(DEFAULT_RETRY_PAUSE_MS);
        let pause = Duration::from_millis(pause_ms);

        if let Some(size) = config.max_file_size {
            settings.max_file_size = size;
        }
        if let Some(secs) = config.command_timeout_secs {
            if secs == 0 {
                return Err(MirrorError::Configuration(
                    "command_timeout_secs must be greater than zero".to_string(),
                ));
            }
            settings.command_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = config.max_candidates {
            settings.max_candidates = n;
        }
        if let Some(k) = config.top_k {
            settings.top_k = k;
        }
        if let Some(n) = config.summary_files_per_extension {
            settings.summary_files_per_extension = n;
        }
        if let Some(n) = config.max_context_bytes {
            settings.max_context_bytes = n;
        }
        settings.update_retry = RetryPolicy::new(
            config.update_attempts.unwrap_or(DEFAULT_UPDATE_ATTEMPTS),
            pause,
        );
        settings.cleanup_retry = RetryPolicy::new(
            config.cleanup_attempts.unwrap_or(DEFAULT_CLEANUP_ATTEMPTS),
            pause,
        );
        settings.clone_depth = config.clone_depth;
        settings.ignore = config.ignore.unwrap_or_default();

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
            base_path = "/srv/mirrors"
            max_file_size = 2048
            top_k = 5
            ignore = ["*.snap", "fixtures/"]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_path, Some(PathBuf::from("/srv/mirrors")));
        assert_eq!(config.max_file_size, Some(2048));
        assert_eq!(config.top_k, Some(5));
        assert_eq!(config.ignore.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_config_merge() {
        let mut c1 = Config {
            top_k: Some(5),
            max_candidates: Some(100),
            ..Config::default()
        };
        let c2 = Config {
            top_k: Some(8),
            ..Config::default()
        };
        c1.merge(c2);
        assert_eq!(c1.top_k, Some(8));
        assert_eq!(c1.max_candidates, Some(100));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            base_path: Some(PathBuf::from("/tmp/rctx-test")),
            command_timeout_secs: Some(30),
            cleanup_attempts: Some(5),
            retry_pause_ms: Some(10),
            ..Config::default()
        };
        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings.base_path, PathBuf::from("/tmp/rctx-test"));
        assert_eq!(settings.command_timeout, Duration::from_secs(30));
        assert_eq!(settings.cleanup_retry.max_attempts(), 5);
        assert_eq!(settings.update_retry.max_attempts(), DEFAULT_UPDATE_ATTEMPTS);
        assert_eq!(settings.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_relative_base_path_is_made_absolute() {
        let config = Config {
            base_path: Some(PathBuf::from("mirrors")),
            ..Config::default()
        };
        let settings = Settings::from_config(config).unwrap();
        assert!(settings.base_path.is_absolute());
        assert_eq!(
            settings.base_path,
            std::env::current_dir().unwrap().join("mirrors")
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            base_path: Some(PathBuf::from("/tmp/rctx-test")),
            command_timeout_secs: Some(0),
            ..Config::default()
        };
        let err = Settings::from_config(config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
