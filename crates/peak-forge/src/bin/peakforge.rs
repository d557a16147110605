use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

mod commands;

use commands::IoParameters;
use commands::{info, reconcile};

#[derive(Parser, Debug)]
#[command(
    name = "peakforge",
    about = "A command-line tool for reconciling NMR peak lists with deposited coordinates and chemical shifts.",
    version,
    author,
    arg_required_else_help = true
)]
struct Cli {
    /// Input job file path (JSON). When omitted, stdin is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,
    /// Output file path. When omitted, stdout is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
    /// Engine settings (TOML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Read coordinates from an mmCIF model instead of the job.
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,
    /// Read chemical shifts from an NMR-STAR file instead of the job.
    #[arg(long, value_name = "FILE", global = true)]
    shifts: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the peak lists and write the JSON report.
    Reconcile(reconcile::ReconcileArgs),
    /// Summarize the reconciled lists without writing a report.
    Info(info::InfoArgs),
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let io_params = IoParameters {
        input: cli.input.clone(),
        output: cli.output.clone(),
        config: cli.config.clone(),
        model: cli.model.clone(),
        shifts: cli.shifts.clone(),
    };

    match cli.command {
        Command::Reconcile(args) => {
            commands::ensure_noninteractive_stdout("reconcile", &io_params)?;
            let job = commands::load_job(&io_params)?;
            let outcome = reconcile::run(&job, &io_params, &args)?;
            commands::save_report(&outcome, &io_params, args.compact)?;
        }
        Command::Info(args) => {
            let job = commands::load_job(&io_params)?;
            info::run(&job, &io_params, &args)?;
        }
    }

    Ok(())
}
