#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cirun(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cirun").unwrap();
    cmd.current_dir(dir.path())
        .env("CIRUN_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write_manifest(dir: &TempDir, body: &str) {
    std::fs::write(dir.path().join(".travis.yml"), body).unwrap();
}

fn write_config(dir: &TempDir, body: &str) {
    std::fs::create_dir_all(dir.path().join(".cirun")).unwrap();
    std::fs::write(dir.path().join(".cirun/config.yaml"), body).unwrap();
}

fn read_latest(dir: &TempDir) -> serde_json::Value {
    let data = std::fs::read_to_string(dir.path().join(".cirun/reports/latest.json")).unwrap();
    serde_json::from_str(&data).unwrap()
}

const PASSING: &str = r#"
language: python
python:
  - "3.6"
  - "3.7"
install:
  - echo "install $TRAVIS_PYTHON_VERSION"
script:
  - echo "test $CIRUN_RUNTIME_VERSION"
"#;

const TEMPLATED: &str = r#"
language: python
python:
  - "3.6"
script:
  - echo "part=$PART"
  - test "$PART" != lint
after_failure:
  - echo diagnostics > after_failure.log
jobs:
  include:
    - &unit
      stage: test
      python: "3.6"
      env: PART=unit
    - <<: *unit
      python: "3.7"
    - <<: *unit
      stage: lint
      env: PART=lint
"#;

// ---------------------------------------------------------------------------
// cirun run
// ---------------------------------------------------------------------------

#[test]
fn run_passing_pipeline_exits_zero() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, PASSING);

    cirun(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline passed: 2 passed, 0 failed"));

    let report = read_latest(&dir);
    assert_eq!(report["status"], "passed");
    assert_eq!(report["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(report["jobs"][1]["runtime"], "3.7");
}

#[test]
fn run_failing_instance_fails_pipeline_but_runs_siblings() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, TEMPLATED);

    cirun(&dir)
        .args(["run", "--jobs", "2"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Pipeline failed: 2 passed, 1 failed"))
        .stdout(predicate::str::contains("failed in script"))
        .stderr(predicate::str::contains("1 of 3 job(s) failed"));

    let report = read_latest(&dir);
    let statuses: Vec<&str> = report["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["passed", "passed", "failed"]);
    assert!(dir.path().join("after_failure.log").exists());
}

#[test]
fn run_json_outputs_report() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, PASSING);

    let output = cirun(&dir).args(["run", "--json"]).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "passed");
    let install = &report["jobs"][0]["phases"][0];
    assert_eq!(install["phase"], "install");
    assert_eq!(install["commands"][0]["output"], "install 3.6");
}

#[test]
fn run_setup_failure_skips_script() {
    let dir = TempDir::new().unwrap();
    write_manifest(
        &dir,
        "python: '3.6'\nbefore_install: ['exit 7']\nscript: ['touch ran-script']\nafter_failure: ['touch ran-hook']\n",
    );

    cirun(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed in before_install (failed (7))"));
    assert!(!dir.path().join("ran-script").exists());
    assert!(dir.path().join("ran-hook").exists());
}

#[test]
fn run_selection_by_stage_and_job() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, TEMPLATED);

    cirun(&dir)
        .args(["run", "--stage", "test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running 2 job(s)"));

    cirun(&dir)
        .args(["run", "--job", "3"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Running 1 job(s)"));

    cirun(&dir)
        .args(["run", "--runtime", "9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no jobs match"));
}

#[test]
fn run_help_says_parallel_jobs_share_the_directory() {
    let dir = TempDir::new().unwrap();
    let output = cirun(&dir).args(["run", "--help"]).output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    let help = help.split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(help.contains("Parallel jobs share the project directory"));
}

#[test]
fn run_dry_run_executes_nothing() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "python: '3.6'\nscript: ['touch should-not-exist', 'false']\n");

    cirun(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry run]"));
    assert!(!dir.path().join("should-not-exist").exists());
    assert!(!dir.path().join(".cirun/reports/latest.json").exists());
}

#[test]
fn run_uses_config_env_and_timeout() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "command_timeout_seconds: 1\nenv:\n  GREETING: hello\n");
    write_manifest(&dir, "python: '3.6'\nscript: ['test \"$GREETING\" = hello', 'sleep 30']\n");

    cirun(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("timed out"));
}

#[test]
fn run_restores_cache_between_runs() {
    let dir = TempDir::new().unwrap();
    write_manifest(
        &dir,
        "python: '3.6'\ncache:\n  directories: [deps]\nscript:\n  - test -f deps/marker || (mkdir -p deps && touch deps/marker && touch first-run)\n",
    );

    cirun(&dir).arg("run").assert().success();
    assert!(dir.path().join("first-run").exists());

    std::fs::remove_dir_all(dir.path().join("deps")).unwrap();
    std::fs::remove_file(dir.path().join("first-run")).unwrap();

    cirun(&dir).arg("run").assert().success();
    assert!(dir.path().join("deps/marker").exists());
    assert!(!dir.path().join("first-run").exists());

    cirun(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3.6"));

    cirun(&dir).args(["cache", "clear"]).assert().success();
    cirun(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache is empty"));
}

#[test]
fn run_parse_error_exits_two() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "python: '3.6'\ninstall: ['true']\n");

    cirun(&dir)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing required phase 'script'"));
}

#[test]
fn run_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    cirun(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("manifest not found"));
}

#[test]
fn run_explicit_manifest_path() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("ci")).unwrap();
    std::fs::write(dir.path().join("ci/pipeline.yml"), PASSING).unwrap();

    cirun(&dir)
        .args(["run", "--manifest", "ci/pipeline.yml"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// cirun matrix / validate / report
// ---------------------------------------------------------------------------

#[test]
fn matrix_lists_resolved_jobs() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, TEMPLATED);

    cirun(&dir)
        .arg("matrix")
        .assert()
        .success()
        .stdout(predicate::str::contains("PART=unit"))
        .stdout(predicate::str::contains("lint"))
        .stdout(predicate::str::contains("#3"));

    let output = cirun(&dir).args(["matrix", "--json"]).output().unwrap();
    let jobs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 3);
    assert_eq!(jobs[1]["runtime"], "3.7");
    assert_eq!(jobs[1]["stage"], "test");
    assert_eq!(jobs[2]["runtime"], "3.6");
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "python: [3.6]\nscript: ['true']\nbefore_script: [echo]\n");

    cirun(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 job(s)"))
        .stdout(predicate::str::contains("written as a number"))
        .stdout(predicate::str::contains("before_script"));
}

#[test]
fn validate_duplicate_job_fails() {
    let dir = TempDir::new().unwrap();
    write_manifest(
        &dir,
        "python: '3.6'\nscript: ['true']\njobs:\n  - &a\n    stage: test\n  - <<: *a\n",
    );

    cirun(&dir)
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("job 2 duplicates job 1"));
}

#[test]
fn validate_config_error_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "jobs: 0\n");
    write_manifest(&dir, PASSING);

    cirun(&dir)
        .arg("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("jobs must be at least 1"));
}

#[test]
fn report_shows_latest_run() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, PASSING);
    cirun(&dir).arg("run").assert().success();

    cirun(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline passed"));

    let run_id = read_latest(&dir)["run_id"].as_str().unwrap().to_string();
    cirun(&dir)
        .args(["report", "--run", &run_id, "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&run_id));
}

#[test]
fn report_without_runs_fails() {
    let dir = TempDir::new().unwrap();
    cirun(&dir)
        .arg("report")
        .assert()
        .failure()
        .stderr(predicate::str::contains("report not found"));
}
