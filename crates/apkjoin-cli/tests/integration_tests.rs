//! Smoke tests that run the built `apkjoin` binary against an isolated home
//! directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Test context with an isolated apkjoin home and no inherited settings
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".apkjoin");
        fs::create_dir_all(&home).expect("failed to create apkjoin home");
        Self { temp_dir, home }
    }

    fn cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_apkjoin");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("APKJOIN_HOME", &self.home);
        for var in [
            "APKJOIN_CONFIG",
            "APKJOIN_KEYSTORE",
            "APKJOIN_KS_PASS",
            "APKJOIN_BUILD_TOOLS",
            "APKJOIN_JOBS",
            "APKJOIN_TMPDIR",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn write_apk(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.cmd().arg("--help").output().expect("failed to run apkjoin");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("merge"));
    assert!(stdout.contains("inspect"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .cmd()
        .arg("--version")
        .output()
        .expect("failed to run apkjoin");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("apkjoin "));
}

#[test]
fn test_completions_command() {
    let ctx = TestContext::new();
    let output = ctx
        .cmd()
        .args(["completions", "bash"])
        .output()
        .expect("failed to run apkjoin");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("apkjoin"));
}

#[test]
fn test_inspect_rejects_non_container() {
    let ctx = TestContext::new();
    let bogus = ctx.path().join("notes.txt");
    fs::write(&bogus, "not a container").unwrap();

    let output = ctx
        .cmd()
        .arg("inspect")
        .arg(&bogus)
        .output()
        .expect("failed to run apkjoin");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("not a recognized split container"));
}

#[test]
fn test_merge_directory_without_keystore() {
    let ctx = TestContext::new();
    let input = ctx.path().join("game");
    fs::create_dir_all(&input).unwrap();
    write_apk(
        &input.join("base.apk"),
        &[("AndroidManifest.xml", b"manifest"), ("classes.dex", b"dex")],
    );
    write_apk(
        &input.join("split.config.x86_64.apk"),
        &[
            ("AndroidManifest.xml", b"split"),
            ("lib/x86_64/libgame.so", b"\x7fELF"),
        ],
    );

    let output = ctx
        .cmd()
        .args(["--quiet", "merge", "--json"])
        .arg(&input)
        .output()
        .expect("failed to run apkjoin");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let merged = ctx.path().join("game.merged.apk");
    assert!(merged.is_file());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["signing"]["status"], "unsigned_fallback");
    assert_eq!(summary["members"].as_array().map(Vec::len), Some(2));
}
