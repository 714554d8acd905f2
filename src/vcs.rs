use crate::error::{MirrorError, Result};
use crate::runner::CommandRequest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Svn,
}

impl FromStr for VcsKind {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(VcsKind::Git),
            "svn" | "subversion" => Ok(VcsKind::Svn),
            _ => Err(MirrorError::Validation(format!(
                "unsupported version control kind '{}'. Use git or svn",
                s
            ))),
        }
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VcsKind::Git => f.write_str("git"),
            VcsKind::Svn => f.write_str("svn"),
        }
    }
}

impl VcsKind {
    pub const ALL: [VcsKind; 2] = [VcsKind::Git, VcsKind::Svn];

    pub fn program(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Svn => "svn",
        }
    }

    /// Control directory that marks a checkout of this kind.
    pub fn marker(&self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Svn => ".svn",
        }
    }

    pub fn has_marker(&self, root: &Path) -> bool {
        root.join(self.marker()).exists()
    }

    /// Detects the kind of an existing checkout from its marker.
    pub fn detect(root: &Path) -> Option<VcsKind> {
        VcsKind::ALL.into_iter().find(|kind| kind.has_marker(root))
    }

    /// `target` is created by the command; `parent` is where it runs.
    pub fn clone_request(
        &self,
        url: &str,
        parent: &Path,
        target: &Path,
        timeout: Duration,
        depth: Option<u32>,
    ) -> CommandRequest {
        let target = target.to_string_lossy().into_owned();
        match self {
            VcsKind::Git => {
                let mut req = self.base(parent, timeout).args(["clone", "--quiet"]);
                if let Some(depth) = depth {
                    req = req.arg("--depth").arg(depth.to_string());
                }
                req.arg(url).arg(target)
            }
            VcsKind::Svn => self
                .base(parent, timeout)
                .args(["checkout", "--non-interactive", "--quiet"])
                .arg(url)
                .arg(target),
        }
    }

    pub fn update_request(&self, mirror: &Path, timeout: Duration) -> CommandRequest {
        match self {
            VcsKind::Git => self
                .base(mirror, timeout)
                .args(["pull", "--ff-only", "--quiet"]),
            VcsKind::Svn => self
                .base(mirror, timeout)
                .args(["update", "--non-interactive", "--quiet"]),
        }
    }

    pub fn validate_request(&self, url: &str, cwd: &Path, timeout: Duration) -> CommandRequest {
        match self {
            VcsKind::Git => self
                .base(cwd, timeout)
                .args(["ls-remote", "--quiet"])
                .arg(url),
            VcsKind::Svn => self
                .base(cwd, timeout)
                .args(["info", "--non-interactive"])
                .arg(url),
        }
    }

    fn base(&self, cwd: &Path, timeout: Duration) -> CommandRequest {
        let req = CommandRequest::new(self.program(), cwd, timeout);
        match self {
            VcsKind::Git => req.env("GIT_TERMINAL_PROMPT", "0"),
            VcsKind::Svn => req,
        }
    }
}

const URL_SCHEMES: &[&str] = &[
    "http://", "https://", "ssh://", "git://", "file://", "svn://", "svn+ssh://",
];

/// One remote source to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub url: String,
    pub kind: VcsKind,
    pub project: String,
}

impl RepositoryDescriptor {
    pub fn new(url: impl Into<String>, kind: VcsKind, project: impl Into<String>) -> Self {
        RepositoryDescriptor {
            url: url.into(),
            kind,
            project: project.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_url(&self.url, self.kind)
    }
}

/// Rejects URLs that are obviously unusable before anything touches disk.
/// Accepts scheme URLs, scp-style `user@host:path` (git only) and absolute
/// local paths.
pub fn validate_url(url: &str, kind: VcsKind) -> Result<()> {
    let invalid = |why: &str| Err(MirrorError::Validation(format!("url '{}' {}", url, why)));

    if url.trim().is_empty() {
        return invalid("is empty");
    }
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return invalid("contains whitespace or control characters");
    }
    if url.starts_with('-') {
        return invalid("must not start with '-'");
    }

    let lowered = url.to_lowercase();
    if let Some(scheme) = URL_SCHEMES.iter().find(|s| lowered.starts_with(*s)) {
        if url.len() == scheme.len() {
            return invalid("has no host or path");
        }
        if scheme.starts_with("svn") && kind == VcsKind::Git {
            return invalid("uses an svn scheme for a git repository");
        }
        return Ok(());
    }

    if kind == VcsKind::Git && is_scp_like(url) {
        return Ok(());
    }

    if Path::new(url).is_absolute() {
        return Ok(());
    }

    invalid("is not a supported repository address")
}

/// Project name implied by a URL: its last path segment without a `.git`
/// suffix. For svn layouts ending in `trunk` the segment before it is used.
pub fn project_from_url(url: &str) -> Option<String> {
    let path = url.split_once("://").map_or(url, |(_, rest)| rest);
    let mut segments = path
        .trim_end_matches('/')
        .rsplit(|c: char| c == '/' || c == ':')
        .filter(|s| !s.is_empty());

    let mut name = segments.next()?;
    if name == "trunk" {
        name = segments.next()?;
    }
    let name = name.strip_suffix(".git").unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

fn is_scp_like(url: &str) -> bool {
    match url.split_once(':') {
        Some((host, path)) => {
            !host.is_empty() && !host.contains('/') && !path.is_empty() && !path.starts_with("//")
        }
        None => false,
    }
}
