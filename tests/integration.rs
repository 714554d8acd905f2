use repo_context::{
    ErrorKind, FileCatalog, MirrorState, RepositoryDescriptor, Settings, SyncAction,
    Synchronizer, VcsKind,
};
use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;
use std::time::Duration;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args([
            "-c",
            "user.name=Test User",
            "-c",
            "user.email=test@example.com",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn setup_origin() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    git(root, &["init", "-q"]);

    fs::write(root.join("README.md"), "# Test Project\nUses a database.\n").unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn handle() {}\n").unwrap();
    fs::create_dir_all(root.join("db")).unwrap();
    fs::write(
        root.join("db/Migration001.sql"),
        "-- migration 001\nCREATE TABLE users (id INT); -- first migration\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(root.join("node_modules/dep/index.js"), "// migration helper\n").unwrap();

    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "initial"]);
    tmp
}

fn url_for(origin: &Path) -> String {
    format!("file://{}", origin.display())
}

fn synchronizer(base: &Path) -> Synchronizer {
    let mut settings = Settings::with_base_path(base.join("repos"));
    settings.command_timeout = Duration::from_secs(60);
    settings.update_retry = repo_context::RetryPolicy::new(2, Duration::from_millis(10));
    settings.cleanup_retry = repo_context::RetryPolicy::new(3, Duration::from_millis(10));
    Synchronizer::new(settings)
}

#[test]
fn test_clone_then_update_picks_up_new_commits() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");

    let first = sync.synchronize_or_get(&descriptor).unwrap();
    assert_eq!(first.action, SyncAction::Cloned);
    assert!(first.path.join(".git").is_dir());
    assert!(first.path.join("src/lib.rs").is_file());
    assert_eq!(first.path, work.path().join("repos").join("demo"));

    fs::write(origin.path().join("CHANGES.md"), "new file\n").unwrap();
    git(origin.path(), &["add", "-A"]);
    git(origin.path(), &["commit", "-q", "-m", "second"]);

    let second = sync.synchronize_or_get(&descriptor).unwrap();
    assert_eq!(second.action, SyncAction::Updated);
    assert_eq!(second.path, first.path);
    assert!(second.path.join("CHANGES.md").is_file());
}

#[test]
fn test_corrupted_mirror_is_recloned() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");

    let path = sync.local_path("demo").unwrap();
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("stray.txt"), "left behind").unwrap();

    let report = sync.synchronize_or_get(&descriptor).unwrap();
    assert_eq!(report.action, SyncAction::Recloned);
    assert!(path.join(".git").is_dir());
    assert!(!path.join("stray.txt").exists());
    assert_eq!(
        sync.mirror_state("demo", VcsKind::Git).unwrap(),
        MirrorState::Valid
    );
}

#[test]
fn test_unreachable_remote_falls_back_to_stale_tree() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");

    let first = sync.synchronize_or_get(&descriptor).unwrap();
    let origin_path = origin.path().to_path_buf();
    drop(origin);
    assert!(!origin_path.exists());

    let report = sync.synchronize_or_get(&descriptor).unwrap();
    assert_eq!(report.action, SyncAction::Stale);
    assert_eq!(report.path, first.path);
    assert!(report.warning.is_some());
    assert!(report.path.join("README.md").is_file());
}

#[test]
fn test_missing_remote_fails_without_leftovers() {
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let missing = work.path().join("no-such-origin");
    let descriptor = RepositoryDescriptor::new(url_for(&missing), VcsKind::Git, "ghost");

    let err = sync.synchronize_or_get(&descriptor).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SynchronizationFailed);
    assert!(!sync.local_path("ghost").unwrap().exists());
}

#[test]
fn test_ranking_prefers_filename_and_content_matches() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");
    sync.synchronize_or_get(&descriptor).unwrap();

    let ranked = sync
        .find_relevant("demo", "database migration", None)
        .unwrap();
    assert_eq!(ranked[0].path, "db/Migration001.sql");
    assert!(ranked[0].score >= 12, "score was {}", ranked[0].score);
    assert_eq!(ranked[1].path, "README.md");
    assert!(ranked.iter().all(|f| !f.path.starts_with("node_modules/")));
}

#[test]
fn test_catalog_skips_vcs_and_dependency_dirs() {
    let origin = setup_origin();
    let catalog = FileCatalog::new(origin.path(), &Settings::with_base_path("/unused"));

    let paths: Vec<String> = catalog.entries(&[]).map(|e| e.relative).collect();
    assert!(paths.contains(&"src/lib.rs".to_string()));
    assert!(paths.iter().all(|p| !p.starts_with(".git/")));
    assert!(paths.iter().all(|p| !p.starts_with("node_modules/")));

    let sql: Vec<String> = catalog
        .entries(&[".SQL".to_string()])
        .map(|e| e.relative)
        .collect();
    assert_eq!(sql, vec!["db/Migration001.sql"]);
}

#[test]
fn test_context_for_a_fresh_project() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");

    let bundle = sync
        .prepare_context(&descriptor, "Where is the database migration?", None)
        .unwrap();
    assert_eq!(bundle.action, Some(SyncAction::Cloned));
    assert_eq!(bundle.keywords, vec!["database", "migration"]);
    assert_eq!(bundle.files[0].path, "db/Migration001.sql");
    assert!(bundle.summary.total_files >= 3);
    assert!(bundle.render().contains("FILE: db/Migration001.sql"));
}

#[cfg(unix)]
#[test]
fn test_cleanup_removes_read_only_git_objects() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let sync = synchronizer(work.path());
    let descriptor = RepositoryDescriptor::new(url_for(origin.path()), VcsKind::Git, "demo");
    let report = sync.synchronize_or_get(&descriptor).unwrap();

    // git writes loose objects read-only
    assert!(sync.cleanup("demo").unwrap());
    assert!(!report.path.exists());
    assert!(sync.list_mirrors().unwrap().is_empty());
}
