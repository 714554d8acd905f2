use assert_cmd::Command;
use std::fs;
use std::time::Instant;
use tempfile::tempdir;

#[test]
fn perf_rank_10k_files_under_5s() {
    let dir = tempdir().unwrap();
    let mirror = dir.path().join("repos/perf");
    fs::create_dir_all(&mirror).unwrap();
    for i in 0..10_000u32 {
        let body = if i % 100 == 0 { "fn router() {}" } else { "fn other() {}" };
        fs::write(mirror.join(format!("file{}.rs", i)), body).unwrap();
    }

    let start = Instant::now();
    Command::cargo_bin("rctx")
        .unwrap()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["--base-path", dir.path().join("repos").to_str().unwrap()])
        .args(["rank", "perf", "router", "--max-candidates", "10000", "--no-color"])
        .assert()
        .success();
    let elapsed = start.elapsed();
    assert!(elapsed.as_secs_f32() < 5.0, "ranking took {:?}", elapsed);
}
