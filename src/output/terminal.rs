use crate::analysis::JourneyCoverageReport;
use crate::collectors::CollectorStatus;
use crate::evidence::{Band, Record, Recommendation, Risk};
use crate::formatting::paint_band;
use crate::pipeline::RunOutcome;
use crate::run::{CollectorEntry, Manifest, RunStatus, RunSummary};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::collections::BTreeMap;
use std::fmt::Write;

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn paint_status(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => status.as_str().green(),
        RunStatus::Incomplete => status.as_str().yellow(),
        RunStatus::Failed => status.as_str().red(),
        RunStatus::Running => status.as_str().cyan(),
    }
}

fn status_cell(status: RunStatus) -> Cell {
    let color = match status {
        RunStatus::Completed => Color::Green,
        RunStatus::Incomplete => Color::Yellow,
        RunStatus::Failed => Color::Red,
        RunStatus::Running => Color::Cyan,
    };
    Cell::new(status.as_str()).fg(color)
}

fn collector_cell(status: CollectorStatus) -> Cell {
    let color = match status {
        CollectorStatus::Ok => Color::Green,
        CollectorStatus::NotFound => Color::DarkGrey,
        _ => Color::Red,
    };
    Cell::new(status.as_str()).fg(color)
}

fn band_cell(band: Band) -> Cell {
    let cell = Cell::new(band.as_str());
    match band {
        Band::P0 => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        Band::P1 => cell.fg(Color::Yellow).add_attribute(Attribute::Bold),
        Band::P2 => cell.fg(Color::Cyan),
        Band::P3 => cell.fg(Color::DarkGrey),
    }
}

fn collectors_table(collectors: &BTreeMap<String, CollectorEntry>) -> Table {
    let mut t = table();
    t.set_header(vec!["Collector", "Status", "Records", "Time", "Note"]);
    for (name, entry) in collectors {
        t.add_row(vec![
            Cell::new(name),
            collector_cell(entry.status),
            Cell::new(entry.records).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}s", entry.duration_ms as f64 / 1000.0))
                .set_alignment(CellAlignment::Right),
            Cell::new(entry.reason.as_deref().unwrap_or("")),
        ]);
    }
    t
}

fn risks_table(risks: &[Record<Risk>], top: usize) -> Table {
    let mut ranked: Vec<&Record<Risk>> = risks.iter().collect();
    ranked.sort_by(|a, b| {
        b.body
            .score
            .total_cmp(&a.body.score)
            .then_with(|| a.body.component.cmp(&b.body.component))
    });

    let mut t = table();
    t.set_header(vec!["Component", "Score", "Band", "Confidence", "Driver", "Id"]);
    for record in ranked.into_iter().take(top) {
        let risk = &record.body;
        t.add_row(vec![
            Cell::new(&risk.component),
            Cell::new(format!("{:.2}", risk.score)).set_alignment(CellAlignment::Right),
            band_cell(risk.band),
            Cell::new(format!("{:.2}", risk.confidence)).set_alignment(CellAlignment::Right),
            Cell::new(risk.dominant_factor),
            Cell::new(&record.id),
        ]);
    }
    t
}

fn journeys_table(report: &JourneyCoverageReport) -> Table {
    let mut t = table();
    t.set_header(vec!["Journey", "Coverage", "Target", "Gap", "Files"]);
    for journey in &report.journeys {
        let current = journey
            .current_pct
            .map(|pct| format!("{:.1}%", pct))
            .unwrap_or_else(|| "n/a".to_string());
        let gap = if journey.meets_target() {
            Cell::new("-").fg(Color::Green)
        } else {
            Cell::new(format!("{:.1}", journey.delta_pct())).fg(Color::Red)
        };
        t.add_row(vec![
            Cell::new(&journey.name),
            Cell::new(current).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", journey.target_pct)).set_alignment(CellAlignment::Right),
            gap.set_alignment(CellAlignment::Right),
            Cell::new(journey.components.len()).set_alignment(CellAlignment::Right),
        ]);
    }
    t
}

fn write_recommendations(out: &mut String, recommendations: &[Record<Recommendation>]) {
    for record in recommendations {
        let rec = &record.body;
        let _ = writeln!(
            out,
            "{:>3}. [{}] {}",
            rec.rank,
            paint_band(rec.band),
            rec.summary.bold()
        );
        let _ = writeln!(out, "     {}", rec.details);
        let cited: Vec<&str> = rec.justified_by.iter().map(|id| id.as_str()).collect();
        let _ = writeln!(out, "     {} {}", "evidence:".dimmed(), cited.join(", ").dimmed());
    }
}

/// Terminal summary of a run that just finished.
pub fn render_outcome(outcome: &RunOutcome, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({})",
        "Run".bold(),
        outcome.run_id.bold(),
        paint_status(outcome.status())
    );
    let _ = writeln!(out, "{}", outcome.run_dir.display().to_string().dimmed());
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", collectors_table(&outcome.manifest.collectors));

    for diagnostic in &outcome.manifest.diagnostics {
        let _ = writeln!(out, "{} {}", "warning:".yellow(), diagnostic);
    }

    if outcome.risks.is_empty() {
        let _ = writeln!(out, "\nNo components had evidence to score.");
    } else {
        let _ = writeln!(
            out,
            "\n{} ({} components)",
            "Risks".bold(),
            outcome.risks.len()
        );
        let _ = writeln!(out, "{}", risks_table(&outcome.risks, top));
    }

    if !outcome.journeys.journeys.is_empty() {
        let _ = writeln!(out, "\n{}", "Journeys".bold());
        let _ = writeln!(out, "{}", journeys_table(&outcome.journeys));
        if !outcome.journeys.unmapped.is_empty() {
            let _ = writeln!(
                out,
                "{} covered files belong to no journey",
                outcome.journeys.unmapped.len()
            );
        }
    }

    if !outcome.recommendations.is_empty() {
        let _ = writeln!(out, "\n{}", "Recommendations".bold());
        write_recommendations(&mut out, &outcome.recommendations);
    }
    out
}

/// Table of stored runs, newest first.
pub fn render_runs(runs: &[RunSummary]) -> String {
    if runs.is_empty() {
        return "No runs found.".to_string();
    }
    let mut t = table();
    t.set_header(vec!["Run", "Created", "Status", "Target", "Collectors", "Records"]);
    for run in runs {
        t.add_row(vec![
            Cell::new(&run.run_id),
            Cell::new(run.created_at.format("%Y-%m-%d %H:%M:%S")),
            status_cell(run.status),
            Cell::new(&run.target),
            Cell::new(format!("{}/{}", run.collectors_ok, run.collectors_total)),
            Cell::new(run.counts.values().sum::<usize>()).set_alignment(CellAlignment::Right),
        ]);
    }
    t.to_string()
}

/// Manifest details for `riskmap show`.
pub fn render_manifest(manifest: &Manifest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({})",
        "Run".bold(),
        manifest.run_id.bold(),
        paint_status(manifest.status)
    );
    let _ = writeln!(out, "target:   {} ({})", manifest.target.name, manifest.target.path);
    if let Some(head) = &manifest.target.git_head {
        let branch = manifest.target.git_branch.as_deref().unwrap_or("detached");
        let _ = writeln!(out, "git:      {} @ {}", branch, head);
    }
    let _ = writeln!(out, "created:  {}", manifest.created_at.to_rfc3339());
    if let Some(finished) = manifest.finished_at {
        let _ = writeln!(out, "finished: {}", finished.to_rfc3339());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", collectors_table(&manifest.collectors));

    let mut counts = table();
    counts.set_header(vec!["Stream", "Records"]);
    for (kind, count) in &manifest.counts {
        counts.add_row(vec![
            Cell::new(kind),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    let _ = writeln!(out, "{}", counts);
    for diagnostic in &manifest.diagnostics {
        let _ = writeln!(out, "{} {}", "warning:".yellow(), diagnostic);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::TargetInfo;
    use chrono::Utc;

    #[test]
    fn empty_run_listing_says_so() {
        assert_eq!(render_runs(&[]), "No runs found.");
    }

    #[test]
    fn manifest_rendering_lists_collectors() {
        colored::control::set_override(false);
        let mut manifest = Manifest::new(
            "20251024_120000Z",
            Utc::now(),
            TargetInfo {
                name: "shop".into(),
                path: "/tmp/shop".into(),
                git_head: None,
                git_branch: None,
            },
        );
        manifest
            .collectors
            .insert("bandit".into(), CollectorEntry::cancelled());

        let text = render_manifest(&manifest);
        assert!(text.contains("20251024_120000Z"));
        assert!(text.contains("bandit"));
        assert!(text.contains("cancelled"));
        colored::control::unset_override();
    }
}
