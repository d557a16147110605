use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{Table, format, row};

use peak_forge::{DiagnosticKind, ParseOutcome, PeakListReport};

use crate::commands::{IoParameters, Job, load_config, run_job, run_with_spinner};

/// Report-only command that reconciles a job and summarizes every list.
#[derive(Debug, Default, Args)]
pub struct InfoArgs {}

/// Reconciles the job and prints per-list and per-diagnostic summaries to stderr.
pub fn run(job: &Job, params: &IoParameters, _args: &InfoArgs) -> Result<()> {
    let config = load_config(params)?;
    let outcome = run_with_spinner("Analyzing peak lists", || run_job(job, params, &config))?;
    print_tables(&outcome)
}

fn regions(report: &PeakListReport) -> String {
    report
        .dimensions
        .iter()
        .map(|d| {
            d.spectral_region
                .map(|r| r.label().to_string())
                .unwrap_or_else(|| "?".to_string())
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn transfers(report: &PeakListReport) -> String {
    if report.transfers.is_empty() {
        return "-".to_string();
    }
    report
        .transfers
        .iter()
        .map(|t| format!("{}-{} {}", t.dim_id_1, t.dim_id_2, t.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

const KINDS: [DiagnosticKind; 11] = [
    DiagnosticKind::RangeValueError,
    DiagnosticKind::RangeValueWarning,
    DiagnosticKind::MissingData,
    DiagnosticKind::SequenceMismatch,
    DiagnosticKind::SequenceMismatchWarning,
    DiagnosticKind::AtomNotFound,
    DiagnosticKind::InvalidAtomNomenclature,
    DiagnosticKind::InvalidAtomSelection,
    DiagnosticKind::InconsistentPeakAssignment,
    DiagnosticKind::HydrogenNotInstantiated,
    DiagnosticKind::CoordinateIssue,
];

fn print_tables(outcome: &ParseOutcome) -> Result<()> {
    let mut stderr = io::stderr().lock();

    print_boxed_label(&mut stderr, "PeakForge Reconcile Report")?;
    writeln!(&mut stderr)?;

    let mut list_table = Table::new();
    print_boxed_label(&mut stderr, "Peak Lists")?;
    list_table.set_format(*format::consts::FORMAT_BOX_CHARS);
    list_table.set_titles(row![
        "List",
        "Subtype",
        "Regions",
        "Transfers",
        "Experiment",
        "Kept Peaks"
    ]);
    for report in &outcome.lists {
        list_table.add_row(row![
            report.list,
            report.subtype,
            regions(report),
            transfers(report),
            report.experiment_class.as_deref().unwrap_or("-"),
            report.peak_count()
        ]);
    }
    list_table
        .print(&mut stderr)
        .context("Failed to render peak list summary")?;
    writeln!(&mut stderr)?;

    let mut diagnostic_table = Table::new();
    print_boxed_label(&mut stderr, "Diagnostics")?;
    diagnostic_table.set_format(*format::consts::FORMAT_BOX_CHARS);
    diagnostic_table.set_titles(row!["Kind", "Severity", "Count"]);
    for kind in KINDS {
        let count = outcome.diagnostics.count(kind);
        if count == 0 {
            continue;
        }
        let severity = if kind.is_error() { "error" } else { "warning" };
        diagnostic_table.add_row(row![kind, severity, count]);
    }
    if outcome.diagnostics.is_empty() {
        diagnostic_table.add_row(row!["None", "-", 0]);
    }
    diagnostic_table
        .print(&mut stderr)
        .context("Failed to render diagnostic summary")?;

    let keys: Vec<&str> = outcome
        .reasons
        .present_keys()
        .iter()
        .map(|k| k.label())
        .collect();
    writeln!(
        &mut stderr,
        "\nPasses: {}  Reparse reasons: {}",
        outcome.passes,
        if keys.is_empty() {
            "none".to_string()
        } else {
            keys.join(", ")
        }
    )?;

    Ok(())
}

fn print_boxed_label<W: Write>(writer: &mut W, title: &str) -> io::Result<()> {
    let inner = format!(" {title} ");
    let width = inner.chars().count();
    writeln!(writer, "╭{}╮", "─".repeat(width))?;
    writeln!(writer, "│{}│", inner)?;
    writeln!(writer, "╰{}╯", "─".repeat(width))?;
    Ok(())
}
