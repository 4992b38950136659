// Tests for the auto-run summary report

use pillage_core::dispatch::RunSummary;
use pillage_core::report::generate_run_report;
use pillage_scanner::{ArtifactKind, BuildLink, BuildReport, Outcome};
use std::path::PathBuf;

fn summary() -> RunSummary {
    let mut looted = BuildReport::new("http://h/job/B/9/".to_string());
    looted.console_text = Outcome::Found("log".to_string());
    looted.workspace_zip_url = Outcome::Found("http://h/job/B/9/ws/*zip*/ws.zip".to_string());

    let empty = BuildReport::new("http://h/job/A/1/".to_string());

    RunSummary {
        root: "http://h/".to_string(),
        builds: vec![
            BuildLink::from("http://h/job/A/1/"),
            BuildLink::from("http://h/job/B/9/"),
        ],
        reports: vec![looted, empty],
        credentials: Some(Outcome::Denied),
        output_dir: PathBuf::from("loot"),
    }
}

#[test]
fn test_found_count_per_kind() {
    let summary = summary();
    assert_eq!(summary.found_count(ArtifactKind::ConsoleText), 1);
    assert_eq!(summary.found_count(ArtifactKind::EnvVars), 0);
    assert_eq!(summary.found_count(ArtifactKind::WorkspaceZipUrl), 1);
    assert_eq!(summary.found_count(ArtifactKind::Credentials), 0);
}

#[test]
fn test_report_contains_counts() {
    let report = generate_run_report(&summary());

    assert!(report.contains("Builds discovered: 2"));
    assert!(report.contains("Console output: 1"));
    assert!(report.contains("Environment variables: 0"));
    assert!(report.contains("Workspace zip URL: 1"));
    assert!(report.contains("Credential store: denied"));
    assert!(report.contains("Output directory: loot"));
}

#[test]
fn test_report_lists_only_builds_with_artifacts() {
    let report = generate_run_report(&summary());

    assert!(report.contains("## Builds with artifacts (1)"));
    assert!(report.contains("http://h/job/B/9/  [console output, workspace zip URL]"));
    assert!(!report.contains("http://h/job/A/1/  ["));
}

#[test]
fn test_report_without_script() {
    let mut summary = summary();
    summary.credentials = None;

    let report = generate_run_report(&summary);
    assert!(report.contains("Credential store: skipped (no script)"));
}
