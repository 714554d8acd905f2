//! Clone, update and reclone decisions for local repository mirrors.

use crate::catalog::FileCatalog;
use crate::config::Settings;
use crate::context::{self, ContextBundle, ContextOptions};
use crate::error::{MirrorError, Result};
use crate::locks::KeyedLocks;
use crate::paths::{mirror_path, sanitize_project_name};
use crate::ranker::{self, RankOptions, ScoredFile};
use crate::reclaim;
use crate::retry::RetryPolicy;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::summary::StructureSummary;
use crate::vcs::{validate_url, RepositoryDescriptor, VcsKind};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// A failed clone is retried exactly once.
const CLONE_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Cloned,
    Updated,
    Recloned,
    /// A refresh failed and the previous tree is being served.
    Stale,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncAction::Cloned => "cloned",
            SyncAction::Updated => "updated",
            SyncAction::Recloned => "recloned",
            SyncAction::Stale => "stale",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub project: String,
    pub path: PathBuf,
    pub action: SyncAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SyncReport {
    pub fn is_stale(&self) -> bool {
        self.action == SyncAction::Stale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorState {
    Absent,
    /// The directory exists but lacks the marker for the requested kind.
    Invalid,
    Valid,
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorInfo {
    pub name: String,
    pub path: PathBuf,
    pub kind: Option<VcsKind>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Every command's timeout is capped at the time left until this instant.
    pub deadline: Option<Instant>,
}

/// Keeps mirrors under [`Settings::base_path`] in step with their remotes.
///
/// Operations on the same project are serialized; different projects proceed
/// in parallel.
pub struct Synchronizer<R: CommandRunner = ProcessRunner> {
    settings: Settings,
    runner: R,
    locks: KeyedLocks,
}

impl Synchronizer<ProcessRunner> {
    pub fn new(settings: Settings) -> Self {
        Synchronizer::with_runner(settings, ProcessRunner)
    }
}

impl<R: CommandRunner> Synchronizer<R> {
    pub fn with_runner(settings: Settings, runner: R) -> Self {
        Synchronizer {
            settings,
            runner,
            locks: KeyedLocks::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn local_path(&self, project: &str) -> Result<PathBuf> {
        mirror_path(&self.settings.base_path, project)
    }

    pub fn mirror_state(&self, project: &str, kind: VcsKind) -> Result<MirrorState> {
        let (key, path) = self.resolve(project)?;
        Ok(self.locks.with_key(&key, || state_of(&path, kind)))
    }

    /// Returns a usable mirror for `descriptor`, cloning, updating or
    /// recloning as needed.
    pub fn synchronize_or_get(&self, descriptor: &RepositoryDescriptor) -> Result<SyncReport> {
        self.synchronize_with(descriptor, &SyncOptions::default())
    }

    pub fn synchronize_with(
        &self,
        descriptor: &RepositoryDescriptor,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        descriptor.validate()?;
        let (key, path) = self.resolve(&descriptor.project)?;
        self.locks.with_key(&key, || {
            self.synchronize_locked(descriptor, &key, &path, options)
        })
    }

    /// Synchronizes every descriptor on the current rayon pool. Results come
    /// back in input order.
    pub fn synchronize_many(
        &self,
        descriptors: &[RepositoryDescriptor],
        options: &SyncOptions,
    ) -> Vec<Result<SyncReport>> {
        descriptors
            .par_iter()
            .map(|descriptor| self.synchronize_with(descriptor, options))
            .collect()
    }

    /// Deletes any existing mirror and clones from scratch.
    pub fn force_resynchronize(&self, descriptor: &RepositoryDescriptor) -> Result<SyncReport> {
        self.force_resynchronize_with(descriptor, &SyncOptions::default())
    }

    pub fn force_resynchronize_with(
        &self,
        descriptor: &RepositoryDescriptor,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        descriptor.validate()?;
        let (key, path) = self.resolve(&descriptor.project)?;
        self.locks.with_key(&key, || {
            check_deadline(options, "resynchronizing")?;
            let existed = exists(&path);
            if existed {
                log::info!("Removing {} before a fresh clone", path.display());
                self.reclaim(&path)
                    .map_err(|e| MirrorError::fs("remove", &path, e))?;
            }
            self.clone_fresh(descriptor, &key, &path, options)?;
            let action = if existed {
                SyncAction::Recloned
            } else {
                SyncAction::Cloned
            };
            Ok(report(&key, &path, action, None))
        })
    }

    /// Removes the mirror for `project`. Returns whether the directory is
    /// confirmed absent afterwards.
    pub fn cleanup(&self, project: &str) -> Result<bool> {
        let (key, path) = self.resolve(project)?;
        Ok(self.locks.with_key(&key, || {
            if !exists(&path) {
                return true;
            }
            match self.reclaim(&path) {
                Ok(()) => {
                    log::info!("Removed mirror {}", path.display());
                    true
                }
                Err(e) => {
                    log::error!("Could not remove {}: {}", path.display(), e);
                    false
                }
            }
        }))
    }

    /// Checks that `url` answers as a repository of `kind` without cloning it.
    pub fn validate_remote(&self, url: &str, kind: VcsKind) -> Result<()> {
        validate_url(url, kind)?;
        let cwd = std::env::temp_dir();
        let request = kind.validate_request(url, &cwd, self.settings.command_timeout);
        let result = self.runner.execute(&request)?;
        if result.success {
            return Ok(());
        }
        Err(MirrorError::Validation(format!(
            "{} is not a reachable {} repository: {}",
            url,
            kind,
            result.error.unwrap_or_default()
        )))
    }

    /// Direct children of the base path, sorted by name.
    pub fn list_mirrors(&self) -> Result<Vec<MirrorInfo>> {
        let base = &self.settings.base_path;
        let read = match fs::read_dir(base) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MirrorError::fs("read", base, e)),
        };

        let mut mirrors = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| MirrorError::fs("read", base, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            mirrors.push(MirrorInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: VcsKind::detect(&path),
                path,
            });
        }
        mirrors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(mirrors)
    }

    pub fn catalog(&self, project: &str) -> Result<FileCatalog> {
        let (_, path) = self.resolve(project)?;
        if !path.is_dir() {
            return Err(MirrorError::NotFound(path));
        }
        Ok(FileCatalog::new(path, &self.settings))
    }

    /// Ranks the files of an existing mirror. `options` defaults to the
    /// configured candidate cap and top-K.
    pub fn find_relevant(
        &self,
        project: &str,
        query: &str,
        options: Option<RankOptions>,
    ) -> Result<Vec<ScoredFile>> {
        let (key, _) = self.resolve(project)?;
        let options = options.unwrap_or_else(|| self.rank_options());
        self.locks.with_key(&key, || {
            let catalog = self.catalog(project)?;
            Ok(ranker::find_relevant(&catalog, query, &options))
        })
    }

    pub fn summarize(&self, project: &str) -> Result<StructureSummary> {
        let (key, _) = self.resolve(project)?;
        self.locks.with_key(&key, || {
            let catalog = self.catalog(project)?;
            Ok(StructureSummary::build(
                catalog.entries(&[]),
                self.settings.summary_files_per_extension,
            ))
        })
    }

    /// Synchronizes `descriptor` and assembles the context for `query` from
    /// the result, all under one hold of the project lock.
    pub fn prepare_context(
        &self,
        descriptor: &RepositoryDescriptor,
        query: &str,
        options: Option<ContextOptions>,
    ) -> Result<ContextBundle> {
        descriptor.validate()?;
        let (key, path) = self.resolve(&descriptor.project)?;
        let options = options.unwrap_or_else(|| self.context_options());
        self.locks.with_key(&key, || {
            let sync = SyncOptions {
                deadline: options.rank.deadline,
            };
            let report = self.synchronize_locked(descriptor, &key, &path, &sync)?;
            let catalog = FileCatalog::new(&report.path, &self.settings);
            let mut bundle = context::assemble(&catalog, &key, query, &options);
            bundle.action = Some(report.action);
            Ok(bundle)
        })
    }

    pub fn rank_options(&self) -> RankOptions {
        RankOptions::new(self.settings.max_candidates, self.settings.top_k)
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            rank: self.rank_options(),
            max_bytes: self.settings.max_context_bytes,
            files_per_extension: self.settings.summary_files_per_extension,
            count_tokens: false,
        }
    }

    fn resolve(&self, project: &str) -> Result<(String, PathBuf)> {
        let key = sanitize_project_name(project)?;
        let path = mirror_path(&self.settings.base_path, &key)?;
        Ok((key, path))
    }

    fn synchronize_locked(
        &self,
        descriptor: &RepositoryDescriptor,
        key: &str,
        path: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        check_deadline(options, "synchronizing")?;

        match state_of(path, descriptor.kind) {
            MirrorState::Absent => {
                log::info!("Cloning {} into {}", descriptor.url, path.display());
                self.clone_fresh(descriptor, key, path, options)?;
                Ok(report(key, path, SyncAction::Cloned, None))
            }
            MirrorState::Valid => self.update(descriptor, key, path, options),
            MirrorState::Invalid => {
                log::warn!(
                    "{} has no {} marker; recloning",
                    path.display(),
                    descriptor.kind.marker()
                );
                self.reclaim(path)
                    .map_err(|e| MirrorError::fs("remove", path, e))?;
                self.clone_fresh(descriptor, key, path, options)?;
                Ok(report(key, path, SyncAction::Recloned, None))
            }
        }
    }

    fn update(
        &self,
        descriptor: &RepositoryDescriptor,
        key: &str,
        path: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        log::info!("Updating {}", path.display());
        let outcome = self.settings.update_retry.run_if(
            |attempt| {
                if attempt > 1 {
                    log::debug!("Update attempt {} for {}", attempt, key);
                }
                let timeout = self.command_timeout(options, "updating")?;
                let request = descriptor.kind.update_request(path, timeout);
                self.runner.execute(&request)?.into_checked().map(|_| ())
            },
            is_retryable,
        );

        let err = match outcome {
            Ok(()) => return Ok(report(key, path, SyncAction::Updated, None)),
            Err(e @ MirrorError::ProcessSpawn { .. }) => return Err(e),
            Err(e) => e,
        };

        if has_any_file(path, descriptor.kind.marker()) {
            log::warn!(
                "Update of {} failed, serving the existing tree: {}",
                key,
                err
            );
            return Ok(report(key, path, SyncAction::Stale, Some(err.to_string())));
        }

        log::error!("Update of {} failed with nothing to fall back on: {}", key, err);
        Err(MirrorError::SynchronizationFailed {
            project: key.to_string(),
            detail: err.to_string(),
        })
    }

    fn clone_fresh(
        &self,
        descriptor: &RepositoryDescriptor,
        key: &str,
        path: &Path,
        options: &SyncOptions,
    ) -> Result<()> {
        let base = &self.settings.base_path;
        fs::create_dir_all(base).map_err(|e| MirrorError::fs("create", base, e))?;

        let policy = RetryPolicy::new(CLONE_ATTEMPTS, self.settings.update_retry.pause());
        let outcome = policy.run_if(
            |attempt| {
                if attempt > 1 {
                    log::warn!("Retrying clone of {}", descriptor.url);
                }
                let result = self.clone_once(descriptor, path, options);
                if result.is_err() {
                    self.discard_partial(path);
                }
                result
            },
            is_retryable,
        );

        outcome.map_err(|e| match e {
            MirrorError::ProcessSpawn { .. } | MirrorError::DeadlineExceeded(_) => e,
            other => {
                log::error!("Clone of {} failed: {}", descriptor.url, other);
                MirrorError::SynchronizationFailed {
                    project: key.to_string(),
                    detail: other.to_string(),
                }
            }
        })
    }

    fn clone_once(
        &self,
        descriptor: &RepositoryDescriptor,
        path: &Path,
        options: &SyncOptions,
    ) -> Result<()> {
        let timeout = self.command_timeout(options, "cloning")?;
        let request = descriptor.kind.clone_request(
            &descriptor.url,
            &self.settings.base_path,
            path,
            timeout,
            self.settings.clone_depth,
        );
        let result = self.runner.execute(&request)?.into_checked()?;

        if !descriptor.kind.has_marker(path) {
            return Err(MirrorError::ProcessFailure {
                command: result.command,
                detail: format!("finished without creating {}", descriptor.kind.marker()),
            });
        }
        Ok(())
    }

    fn discard_partial(&self, path: &Path) {
        if !exists(path) {
            return;
        }
        if let Err(e) = self.reclaim(path) {
            log::warn!("Could not remove partial clone {}: {}", path.display(), e);
        }
    }

    /// Deletes `path` and confirms it is gone, repeating the whole cycle under
    /// the cleanup retry policy.
    fn reclaim(&self, path: &Path) -> io::Result<()> {
        self.settings.cleanup_retry.run(|attempt| {
            let result = reclaim::delete(path).and_then(|()| {
                if exists(path) {
                    Err(io::Error::other(format!("{} still present", path.display())))
                } else {
                    Ok(())
                }
            });
            if let Err(e) = &result {
                log::debug!("Delete attempt {} on {} failed: {}", attempt, path.display(), e);
            }
            result
        })
    }

    fn command_timeout(&self, options: &SyncOptions, what: &str) -> Result<Duration> {
        let timeout = self.settings.command_timeout;
        match options.deadline {
            None => Ok(timeout),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(MirrorError::DeadlineExceeded(what.to_string()));
                }
                Ok(remaining.min(timeout))
            }
        }
    }
}

fn check_deadline(options: &SyncOptions, what: &str) -> Result<()> {
    match options.deadline {
        Some(deadline) if Instant::now() >= deadline => {
            Err(MirrorError::DeadlineExceeded(what.to_string()))
        }
        _ => Ok(()),
    }
}

fn is_retryable(err: &MirrorError) -> bool {
    !matches!(
        err,
        MirrorError::ProcessSpawn { .. }
            | MirrorError::DeadlineExceeded(_)
            | MirrorError::NotFound(_)
    )
}

fn report(key: &str, path: &Path, action: SyncAction, warning: Option<String>) -> SyncReport {
    SyncReport {
        project: key.to_string(),
        path: path.to_path_buf(),
        action,
        warning,
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn state_of(path: &Path, kind: VcsKind) -> MirrorState {
    if !exists(path) {
        MirrorState::Absent
    } else if path.is_dir() && kind.has_marker(path) {
        MirrorState::Valid
    } else {
        MirrorState::Invalid
    }
}

/// Whether anything besides the VCS control directory is checked out.
fn has_any_file(root: &Path, marker: &str) -> bool {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == marker))
        .filter_map(|e| e.ok())
        .any(|e| !e.file_type().is_dir())
}
