// Closing summary for an auto run

use crate::dispatch::RunSummary;
use pillage_scanner::{ArtifactKind, Outcome};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Plain-text report of what an auto run discovered and persisted.
pub fn generate_run_report(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Root: {}\n", summary.root));
    report.push_str(&format!("  Builds discovered: {}\n", summary.builds.len()));
    report.push_str(&format!("  Builds extracted: {}\n", summary.reports.len()));

    for kind in ArtifactKind::ALL {
        if kind == ArtifactKind::Credentials {
            continue;
        }
        report.push_str(&format!(
            "  {}: {}\n",
            capitalize(kind.label()),
            summary.found_count(kind)
        ));
    }

    let credentials = match summary.credentials {
        None => "skipped (no script)",
        Some(Outcome::Found(_)) => "dumped",
        Some(Outcome::Denied) => "denied",
        Some(Outcome::NotFound) => "not available",
    };
    report.push_str(&format!("  Credential store: {}\n", credentials));
    report.push_str(&format!("  Output directory: {}\n", summary.output_dir.display()));

    report.push('\n');
    report.push_str(RULE);
    report.push('\n');

    // Builds with nothing to show are left out.
    let mut looted: Vec<_> = summary
        .reports
        .iter()
        .filter(|r| !r.found_kinds().is_empty())
        .collect();
    looted.sort_by(|a, b| a.url.cmp(&b.url));

    report.push_str(&format!("## Builds with artifacts ({})\n", looted.len()));
    for build in looted {
        let kinds: Vec<&str> = build.found_kinds().iter().map(|k| k.label()).collect();
        report.push_str(&format!("  {}  [{}]\n", build.url, kinds.join(", ")));
    }
    report.push('\n');

    report
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
