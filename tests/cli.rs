use assert_cmd::Command;
use indoc::indoc;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = indoc! {r#"
    [collectors.tools.bandit]
    enabled = false

    [collectors.tools.pip-audit]
    enabled = false

    [collectors.tools.pylint]
    enabled = false

    [collectors.tools.flake8]
    enabled = false

    [collectors.tools.git-churn]
    enabled = false

    [[journeys.journey]]
    id = "checkout"
    patterns = ["src/checkout/*"]
    target = 80
"#};

const LCOV: &str = indoc! {"
    SF:src/checkout/cart.py
    DA:1,1
    DA:2,0
    DA:3,0
    DA:4,0
    end_of_record
"};

fn riskmap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_riskmap"));
    cmd.env_remove("RUST_LOG").env_remove("RISKMAP_RUNS_DIR");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn runs_on_empty_directory_reports_nothing() {
    let runs = TempDir::new().unwrap();
    let output = riskmap()
        .args(["runs", "--runs-dir"])
        .arg(runs.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No runs found."));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();

    riskmap().current_dir(dir.path()).arg("init").assert().success();
    assert!(dir.path().join(".riskmap.toml").exists());

    riskmap().current_dir(dir.path()).arg("init").assert().failure();
    riskmap()
        .current_dir(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn show_unknown_run_fails() {
    let runs = TempDir::new().unwrap();
    riskmap()
        .args(["show", "19990101_000000Z", "--runs-dir"])
        .arg(runs.path())
        .assert()
        .failure();
}

#[test]
fn invalid_configuration_fails_before_creating_a_run() {
    let runs = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    fs::write(
        target.path().join(".riskmap.toml"),
        "[risk.bands]\np0 = 50\np1 = 65\np2 = 80\n",
    )
    .unwrap();

    riskmap()
        .arg("analyze")
        .arg(target.path())
        .arg("--runs-dir")
        .arg(runs.path())
        .assert()
        .failure();
    assert_eq!(fs::read_dir(runs.path()).unwrap().count(), 0);
}

#[test]
fn analyze_then_inspect_run() {
    let runs = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    fs::write(target.path().join(".riskmap.toml"), CONFIG).unwrap();
    fs::write(target.path().join("lcov.info"), LCOV).unwrap();

    let output = riskmap()
        .arg("analyze")
        .arg(target.path())
        .arg("--runs-dir")
        .arg(runs.path())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let outcome = stdout_json(&output);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["collectors"]["coverage"]["status"], "ok");
    assert_eq!(outcome["gaps"][0]["journey_id"], "checkout");
    assert_eq!(outcome["gaps"][0]["current_pct"], 25.0);
    let run_id = outcome["run_id"].as_str().unwrap().to_string();

    let listed = riskmap()
        .args(["runs", "--format", "json", "--runs-dir"])
        .arg(runs.path())
        .output()
        .unwrap();
    let listed = stdout_json(&listed);
    assert_eq!(listed[0]["run_id"], run_id.as_str());

    let shown = riskmap()
        .args(["show", &run_id, "--kind", "coverage", "--format", "json", "--runs-dir"])
        .arg(runs.path())
        .output()
        .unwrap();
    let shown = stdout_json(&shown);
    assert_eq!(shown["kind"], "coverage");
    assert_eq!(shown["count"], 1);
    assert!(shown["records"][0]["id"]
        .as_str()
        .unwrap()
        .starts_with("COV-"));
}
