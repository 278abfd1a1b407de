//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const APC_OUTPUT: &str = "Draft complete.\n\n[A] Advanced Elicitation [P] Party Mode [C] Continue\n";

/// Get the binary to test.
fn bmad_auto() -> Command {
    let mut cmd = Command::cargo_bin("bmad-auto").unwrap();
    cmd.env_remove("BMAD_AUTOMATION_CONFIG");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    bmad_auto()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Menu detection and selection"));
}

#[test]
fn test_version_flag() {
    bmad_auto()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Detect Command Tests
// ============================================================================

#[test]
fn test_detect_from_stdin() {
    bmad_auto()
        .arg("detect")
        .write_stdin(APC_OUTPUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("[ACCEPT] A/P/C 100"))
        .stdout(predicate::str::contains("1 accepted, 0 rejected"));
}

#[test]
fn test_detect_vetoes_code_block() {
    bmad_auto()
        .arg("detect")
        .write_stdin("```\n[Y] Yes [V] View [N] No\n```\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[VETO]"))
        .stdout(predicate::str::contains("code block"));
}

#[test]
fn test_detect_json_from_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let output = temp.child("output.md");
    output.write_str(APC_OUTPUT).unwrap();

    bmad_auto()
        .args(["detect", "--format", "json"])
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stdout(predicate::str::contains("\"accepted\""));
}

#[test]
fn test_detect_missing_file_fails() {
    bmad_auto()
        .args(["detect", "/nonexistent/output.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

// ============================================================================
// Select & Evaluate Tests
// ============================================================================

#[test]
fn test_select_auto_selects_canonical_menu() {
    bmad_auto()
        .arg("select")
        .write_stdin(APC_OUTPUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Route:      auto_selected"))
        .stdout(predicate::str::contains("Selected:   [C] Continue"));
}

#[test]
fn test_select_escalates_on_metrics() {
    bmad_auto()
        .args(["select", "--metrics", "blocking_errors=5, major_issues=2, compliance_score=80"])
        .write_stdin(APC_OUTPUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Route:      escalated"))
        .stdout(predicate::str::contains("collaborative resolution"));
}

#[test]
fn test_select_session_history_persists_between_runs() {
    let temp = assert_fs::TempDir::new().unwrap();
    let sessions = temp.path().join("sessions").display().to_string().replace('\\', "/");
    let config = temp.child("config.toml");
    config.write_str(&format!("[cache]\ndir = \"{sessions}\"\n")).unwrap();

    for expected in ["History:    1 selection(s)", "History:    2 selection(s)"] {
        bmad_auto()
            .env("BMAD_AUTOMATION_CONFIG", config.path())
            .args(["select", "--session", "run-42"])
            .write_stdin(APC_OUTPUT)
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }

    temp.child("sessions").assert(predicate::path::is_dir());
}

#[test]
fn test_select_change_summary_is_not_auto_selected() {
    bmad_auto()
        .arg("select")
        .write_stdin("I made these changes:\n1. Added the login endpoint\n2. Fixed the session bug\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Route:      auto_selected").not());
}

#[test]
fn test_select_rejects_bad_tier() {
    bmad_auto()
        .args(["select", "--tier", "7"])
        .write_stdin(APC_OUTPUT)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Tier must be between 0 and 4"));
}

#[test]
fn test_evaluate_metrics() {
    bmad_auto()
        .args(["evaluate", "compliance_score=40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Action: deep investigation"));
}

#[test]
fn test_evaluate_malformed_metrics() {
    bmad_auto()
        .args(["evaluate", "blocking_errors=lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocking_errors"));
}

// ============================================================================
// Checkpoint, Verdict & Tier Tests
// ============================================================================

#[test]
fn test_checkpoint_formats() {
    let log = "write: docs/prd.md\nselected: [C] Continue\n";

    bmad_auto()
        .args(["checkpoint", "--confidence", "85"])
        .write_stdin(log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: minimal"))
        .stdout(predicate::str::contains("[E] Expand"));

    bmad_auto()
        .args(["checkpoint", "--confidence", "30"])
        .write_stdin(log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: full audit trail"))
        .stdout(predicate::str::contains("docs/prd.md"));
}

#[test]
fn test_verdict_and_checklist() {
    bmad_auto()
        .arg("verdict")
        .write_stdin("Status: CONCERNS\n- [x] Tests pass\n- [ ] Docs updated\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict: CONCERNS (explicit"))
        .stdout(predicate::str::contains("Checklist: 1/2 complete"))
        .stdout(predicate::str::contains("[ ] Docs updated"));
}

#[test]
fn test_tier_from_story_count() {
    bmad_auto()
        .args(["tier", "a new platform", "--stories", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tier: tier 4 (enterprise)"))
        .stdout(predicate::str::contains("Batch size: 1"));
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_validate_reports_all_violations() {
    let temp = assert_fs::TempDir::new().unwrap();
    let workflow = temp.child("workflow.md");
    workflow
        .write_str("---\nrequired_config: [output_folder]\nrequired_inputs: [brief.md]\n---\n")
        .unwrap();

    bmad_auto()
        .arg("validate")
        .arg(workflow.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 validation error(s)"))
        .stderr(predicate::str::contains("name"))
        .stderr(predicate::str::contains("output_folder"));
}

#[test]
fn test_validate_success() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("docs/brief.md").write_str("brief").unwrap();
    let workflow = temp.child("workflow.md");
    workflow
        .write_str(
            "---\nname: create-prd\nrequired_config: [output_folder]\nrequired_inputs: [\"{output_folder}/brief.md\"]\noutput_folder: docs\n---\n# Steps\n",
        )
        .unwrap();

    bmad_auto()
        .arg("validate")
        .arg(workflow.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow 'create-prd' is valid"));
}

// ============================================================================
// Config & Completions Tests
// ============================================================================

#[test]
fn test_config_prints_defaults() {
    bmad_auto()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[selection]"))
        .stdout(predicate::str::contains("high_threshold = 80.0"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_init_writes_global_file() {
    let temp = assert_fs::TempDir::new().unwrap();

    bmad_auto()
        .env("XDG_CONFIG_HOME", temp.path())
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    temp.child("bmad-automation/config.toml")
        .assert(predicate::str::contains("[selection]"));
}

#[test]
fn test_completions_bash() {
    bmad_auto()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bmad-auto"));
}
