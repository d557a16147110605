use anyhow::Result;
use clap::Args;

use peak_forge::ParseOutcome;

use crate::commands::{IoParameters, Job, load_config, run_job, run_with_spinner};

/// Options for the reconcile command.
#[derive(Debug, Default, Args)]
pub struct ReconcileArgs {
    /// Stop after the first pass even when it emits reparse reasons.
    #[arg(long)]
    pub single_pass: bool,
    /// Write the report as a single JSON line.
    #[arg(long)]
    pub compact: bool,
}

/// Reconciles every peak list of the job and returns the report.
pub fn run(job: &Job, params: &IoParameters, args: &ReconcileArgs) -> Result<ParseOutcome> {
    let mut config = load_config(params)?;
    if args.single_pass {
        config.second_pass = false;
    }

    let outcome = run_with_spinner("Reconciling peak lists", || run_job(job, params, &config))?;

    let errors = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind.is_error())
        .count();
    log::info!(
        "{} list(s) reconciled in {} pass(es); {} error(s), {} warning(s)",
        outcome.lists.len(),
        outcome.passes,
        errors,
        outcome.diagnostics.len() - errors
    );
    Ok(outcome)
}
