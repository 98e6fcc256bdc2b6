use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use faultline::range::Observation;
use faultline::store::ExceptionStore;
use serde_json::Value;

fn run_cli(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_faultline"))
        .current_dir(workspace)
        .args(args)
        .output()
        .expect("command runs")
}

fn assert_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "command failed: args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn obs(filename: &str, message: &str, revision: &str, revision_index: i64) -> Observation {
    Observation {
        filename: filename.to_string(),
        message: message.to_string(),
        revision: revision.to_string(),
        revision_index,
    }
}

/// Seeds the workspace store with three identities:
/// 1 = (src/A.java, "key may not be empty") over v1,
/// 2 = (src/A.java, "key must not be empty") over v2,
/// 3 = (src/B.java, "other") over v2.
fn seed_store(workspace: &Path) {
    let db = workspace
        .join("exceptions.db")
        .to_string_lossy()
        .into_owned();
    let store = ExceptionStore::open(&db).expect("open store");
    store
        .load_raw(&[
            obs("src/A.java", "\"key may not be empty\"", "v1", 0),
            obs("src/A.java", "\"key must not be empty\"", "v2", 1),
            obs("src/B.java", "\"other\"", "v2", 1),
        ])
        .expect("load");
    store.reconcile().expect("reconcile");
}

#[test]
fn init_writes_config_and_opens_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_cli(dir.path(), &["init"]);
    assert_success(&output, &["init"]);

    assert!(dir.path().join("faultline.yml").exists());
    assert!(dir.path().join("exceptions.db").exists());

    let status: Value = serde_json::from_str(stdout_str(&output).trim()).expect("status json");
    assert_eq!(status["status"], "ok");
    assert_eq!(status["exception"], "InvalidRequestException");
}

#[test]
fn init_leaves_an_existing_config_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("faultline.yml");
    fs::write(&config_path, "exception: TimeoutException\n").expect("write config");

    let output = run_cli(dir.path(), &["init"]);
    assert_success(&output, &["init"]);

    let content = fs::read_to_string(&config_path).expect("read config");
    assert_eq!(content, "exception: TimeoutException\n");
}

#[test]
fn merge_reports_missing_identities_and_prints_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());
    let directives = dir.path().join("merges.txt");
    fs::write(&directives, "1 2\n99 3\n").expect("write directives");

    let args = ["merge", "--directives", "merges.txt"];
    let output = run_cli(dir.path(), &args);
    assert_success(&output, &args);

    assert_eq!(stdout_str(&output), "done\n");
    assert!(stderr_str(&output).contains("identity 99 doesn't exist"));

    let ranges = run_cli(dir.path(), &["ranges"]);
    assert_success(&ranges, &["ranges"]);
    let text = stdout_str(&ranges);
    assert!(text.contains("[1] v1 => v1: \"key may not be empty\" (merged into 2)"));
    assert!(text.contains("[2] v2 => v2: \"key must not be empty\""));
}

#[test]
fn ranges_json_lists_every_identity() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    let output = run_cli(dir.path(), &["ranges", "--json"]);
    assert_success(&output, &["ranges", "--json"]);

    let rows: Value = serde_json::from_str(stdout_str(&output).trim()).expect("json rows");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["identity"], 1);
    assert_eq!(rows[0]["filename"], "src/A.java");
    assert_eq!(rows[0]["start_revision"], "v1");
    assert_eq!(rows[0]["end_revision"], "v1");
    assert_eq!(rows[0]["merged_into"], Value::Null);
    assert_eq!(rows[2]["filename"], "src/B.java");
}

#[test]
fn evolution_replays_the_stored_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_store(dir.path());

    let output = run_cli(dir.path(), &["evolution"]);
    assert_success(&output, &["evolution"]);

    let text = stdout_str(&output);
    assert!(text.contains("=== v1 -> v2 ==="));
    assert!(text.contains("src/B.java (file added)"));
    assert!(text.contains("- \"key may not be empty\""));
    assert!(text.contains("+ \"key must not be empty\""));
}

#[test]
fn the_db_flag_overrides_the_configured_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir
        .path()
        .join("elsewhere.db")
        .to_string_lossy()
        .into_owned();
    let store = ExceptionStore::open(&db).expect("open store");
    store
        .load_raw(&[obs("src/A.java", "\"m\"", "v1", 0)])
        .expect("load");
    store.reconcile().expect("reconcile");
    drop(store);

    let args = ["ranges", "--db", "elsewhere.db"];
    let output = run_cli(dir.path(), &args);
    assert_success(&output, &args);

    assert!(stdout_str(&output).contains("[1] v1 => v1: \"m\""));
    assert!(!dir.path().join("exceptions.db").exists());
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo)
        .args(["-c", "user.email=dev@example.com", "-c", "user.name=dev"])
        .args(args)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_fixture_file(repo: &Path, relative: &str, content: &str) {
    let path = repo.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, content).expect("write fixture");
}

const PARSER_V1: &str = r#"public class Parser {
    void validate(String key) {
        if (key.isEmpty()) {
            throw new InvalidRequestException("key may not be empty");
        }
    }
}
"#;

const PARSER_V2: &str = r#"public class Parser {
    void validate(String key) {
        if (key.isEmpty()) {
            throw new InvalidRequestException("key must not be empty");
        }
    }
}
"#;

const TABLE_V2: &str = r#"public class Table {
    void check(int level) {
        throw new InvalidRequestException("consistency level "
                + level
                + " not supported");
    }
}
"#;

#[test]
fn collect_scans_a_tagged_git_fixture() {
    if !git_available() {
        return;
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path().join("fixture");
    let workspace = dir.path().join("work");
    fs::create_dir_all(&repo).expect("repo dir");
    fs::create_dir_all(&workspace).expect("workspace dir");

    git(&repo, &["init", "--quiet"]);
    write_fixture_file(&repo, "src/query/Parser.java", PARSER_V1);
    git(&repo, &["add", "-A"]);
    git(&repo, &["commit", "--quiet", "-m", "first"]);
    git(&repo, &["tag", "v1"]);

    write_fixture_file(&repo, "src/query/Parser.java", PARSER_V2);
    write_fixture_file(&repo, "src/storage/Table.java", TABLE_V2);
    git(&repo, &["add", "-A"]);
    git(&repo, &["commit", "--quiet", "-m", "second"]);
    git(&repo, &["tag", "v2"]);

    fs::write(workspace.join("revisions.txt"), "v1\nv2\n").expect("write revisions");

    let repo_arg = repo.to_string_lossy().into_owned();
    let args = [
        "collect",
        "--repo",
        repo_arg.as_str(),
        "--revisions",
        "revisions.txt",
    ];
    let output = run_cli(&workspace, &args);
    assert_success(&output, &args);

    let text = stdout_str(&output);
    assert!(text.contains("=== v1 -> v2 ==="));
    assert!(text.contains("src/storage/Table.java (file added)"));
    assert!(text.contains("+ \"consistency level \" + level + \" not supported\""));
    assert!(text.contains("- \"key may not be empty\""));
    assert!(text.contains("+ \"key must not be empty\""));
    assert!(text.contains("src/query/Parser.java\n  v1 => v1: \"key may not be empty\""));

    assert!(workspace.join("exceptions.db").exists());

    let ranges = run_cli(&workspace, &["ranges"]);
    assert_success(&ranges, &["ranges"]);
    let ranges_text = stdout_str(&ranges);
    assert!(ranges_text.contains("[1] v1 => v1: \"key may not be empty\""));
    assert!(ranges_text.contains("v2 => v2: \"key must not be empty\""));
}
