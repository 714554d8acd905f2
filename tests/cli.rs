use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args([
            "-c",
            "user.name=Test User",
            "-c",
            "user.email=test@example.com",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
        .status;
    assert!(status.success(), "git {:?} failed", args);
}

fn setup_origin() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    git(root, &["init", "-q"]);
    fs::write(root.join("README.md"), "# Demo\nRouter overview.\n").unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/router.rs"), "pub fn router() {}\n").unwrap();
    fs::write(root.join("src/main.rs"), "mod router;\nfn main() {}\n").unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(root.join("node_modules/dep/router.js"), "router\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "initial"]);
    tmp
}

/// `rctx` with an isolated home and working directory so no user config or
/// ignore file leaks in.
fn rctx(work: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rctx").unwrap();
    cmd.current_dir(work)
        .env("HOME", work)
        .env_remove("RUST_LOG")
        .env_remove("RCTX_BASE_PATH")
        .env_remove("RCTX_TOP_K")
        .args(["--base-path", work.join("repos").to_str().unwrap()]);
    cmd
}

fn url_for(origin: &Path) -> String {
    format!("file://{}", origin.display())
}

#[test]
fn test_sync_then_query_the_mirror() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let url = url_for(origin.path());

    rctx(work.path())
        .args(["sync", &url, "--project", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cloned"));
    assert!(work.path().join("repos/demo/.git").is_dir());

    rctx(work.path())
        .args(["sync", &url, "--project", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updated"));

    let output = rctx(work.path())
        .args(["files", "demo", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let paths: Vec<&str> = value["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"src/router.rs"));
    assert!(paths.iter().all(|p| !p.starts_with("node_modules")));

    rctx(work.path())
        .args(["rank", "demo", "where is the router", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/router.rs"))
        .stdout(predicate::str::contains("node_modules").not());

    rctx(work.path())
        .args(["summary", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".rs (2)"));
}

#[test]
fn test_relative_base_path_resolves_against_cwd() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();

    Command::cargo_bin("rctx")
        .unwrap()
        .current_dir(work.path())
        .env("HOME", work.path())
        .env_remove("RUST_LOG")
        .env_remove("RCTX_BASE_PATH")
        .args(["--base-path", "repos"])
        .args(["sync", &url_for(origin.path()), "--project", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cloned"));

    assert!(work.path().join("repos/demo/.git").is_dir());
    assert!(!work.path().join("repos/repos").exists());
}

#[test]
fn test_xml_output() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let url = url_for(origin.path());

    rctx(work.path())
        .args(["context", &url, "--project", "demo", "--query", "router"])
        .args(["--format", "xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<?xml"))
        .stdout(predicate::str::contains("<context>"))
        .stdout(predicate::str::contains("<action>cloned</action>"))
        .stdout(predicate::str::contains(r#"path="src/router.rs""#));
}

#[test]
fn test_context_text_output() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();

    rctx(work.path())
        .args(["context", &url_for(origin.path()), "--query", "router", "--tokens"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Query: router"))
        .stdout(predicate::str::contains("FILE: src/router.rs"))
        .stdout(predicate::str::contains("TOKENS:"));
}

#[test]
fn test_errors_are_reported_with_their_kind() {
    let work = TempDir::new().unwrap();

    rctx(work.path())
        .args(["sync", "", "--project", "demo"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[validation_failure]"));

    rctx(work.path())
        .args(["files", "missing", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""kind": "not_found""#));

    rctx(work.path())
        .args(["sync", "https://example.com/x.git", "--kind", "hg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported"));
}

#[test]
fn test_sync_all_status_and_cleanup() {
    let first = setup_origin();
    let second = setup_origin();
    let work = TempDir::new().unwrap();

    let manifest = work.path().join("repos.toml");
    fs::write(
        &manifest,
        format!(
            "[[repository]]\nurl = \"{}\"\nproject = \"one\"\n\n[[repository]]\nurl = \"{}\"\nproject = \"two\"\n",
            url_for(first.path()),
            url_for(second.path())
        ),
    )
    .unwrap();

    rctx(work.path())
        .args(["sync-all", manifest.to_str().unwrap(), "--jobs", "2"])
        .assert()
        .success();

    let output = rctx(work.path())
        .args(["status", "--format", "json"])
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = value["mirrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["one", "two"]);

    rctx(work.path())
        .args(["cleanup", "one"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    assert!(!work.path().join("repos/one").exists());

    rctx(work.path())
        .args(["status", "two"])
        .assert()
        .success()
        .stdout(predicate::str::contains("two: Valid"));
}

#[test]
fn test_sync_all_reports_partial_failure() {
    let origin = setup_origin();
    let work = TempDir::new().unwrap();
    let manifest = work.path().join("repos.toml");
    fs::write(
        &manifest,
        format!(
            "[[repository]]\nurl = \"{}\"\nproject = \"ok\"\n\n[[repository]]\nurl = \"{}\"\nproject = \"gone\"\n",
            url_for(origin.path()),
            url_for(&work.path().join("missing"))
        ),
    )
    .unwrap();

    rctx(work.path())
        .args(["sync-all", manifest.to_str().unwrap(), "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("synchronization_failed"))
        .stderr(predicate::str::contains("1 of 2 repositories failed"));
    assert!(work.path().join("repos/ok/.git").is_dir());
}

#[test]
fn test_init_writes_ignore_file_once() {
    let work = TempDir::new().unwrap();

    rctx(work.path()).arg("init").assert().success();
    assert!(work.path().join(".rctxignore").is_file());

    rctx(work.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    rctx(work.path()).args(["init", "--force"]).assert().success();
}
