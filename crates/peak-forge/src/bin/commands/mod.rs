use std::fs::{self, File};
use std::io::{self as stdio, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use serde::Deserialize;

use peak_forge::io::{read_coordinate_context, read_shift_loops};
use peak_forge::{
    ChemCompDictionary, ChemicalShiftIndex, CoordinateContext, ParseInputs, ParseOutcome,
    ParserConfig, PeakListInput, ReparseReasons, ShiftLoop, reconcile as reconcile_lists,
};

pub mod info;
pub mod reconcile;

/// Aggregated IO parameters shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct IoParameters {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub shifts: Option<PathBuf>,
}

/// A reconcile job as read from JSON.
///
/// Coordinates and shifts may be given inline or as paths to mmCIF and NMR-STAR files;
/// paths passed on the command line take precedence over both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub coordinates: Option<CoordinateContext>,
    #[serde(default)]
    pub model_file: Option<PathBuf>,
    #[serde(default)]
    pub shifts: Vec<ShiftLoop>,
    #[serde(default)]
    pub shifts_file: Option<PathBuf>,
    /// Reparse reasons emitted by an earlier run.
    #[serde(default)]
    pub reasons: Option<ReparseReasons>,
    pub lists: Vec<PeakListInput>,
}

/// Loads the job from the configured input source.
pub fn load_job(params: &IoParameters) -> Result<Job> {
    if let Some(path) = &params.input {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse job from {}", path.display()))
    } else {
        let stdin = stdio::stdin();
        if stdin.is_terminal() {
            bail!(
                "No --input provided and stdin is a TTY. Provide -i/--input or pipe a job into peakforge."
            );
        }
        let mut text = String::new();
        stdin
            .lock()
            .read_to_string(&mut text)
            .context("Failed to read job from stdin")?;
        serde_json::from_str(&text).context("Failed to parse job from stdin")
    }
}

/// Loads engine settings, falling back to defaults when no file is given.
pub fn load_config(params: &IoParameters) -> Result<ParserConfig> {
    let Some(path) = &params.config else {
        return Ok(ParserConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ParserConfig::from_toml_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn open_reader(path: &Path, what: &str) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} file {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn load_coordinates(job: &Job, params: &IoParameters) -> Result<CoordinateContext> {
    if let Some(path) = params.model.as_ref().or(job.model_file.as_ref()) {
        return read_coordinate_context(open_reader(path, "model")?)
            .with_context(|| format!("Failed to parse mmCIF model {}", path.display()));
    }
    match &job.coordinates {
        Some(coords) => Ok(coords.clone()),
        None => bail!("The job names no coordinates. Provide --model or a \"coordinates\" entry."),
    }
}

fn load_shifts(job: &Job, params: &IoParameters) -> Result<Vec<ShiftLoop>> {
    if let Some(path) = params.shifts.as_ref().or(job.shifts_file.as_ref()) {
        return read_shift_loops(open_reader(path, "chemical shift")?)
            .with_context(|| format!("Failed to parse NMR-STAR shifts {}", path.display()));
    }
    Ok(job.shifts.clone())
}

/// Resolves the collaborator inputs of a job and runs the reconcile loop.
pub fn run_job(job: &Job, params: &IoParameters, config: &ParserConfig) -> Result<ParseOutcome> {
    let coords = load_coordinates(job, params)?;
    let loops = load_shifts(job, params)?;
    let shifts = ChemicalShiftIndex::new(&loops);
    let dictionary = ChemCompDictionary::new(config.cache_capacity());
    let inputs = ParseInputs {
        coords: &coords,
        shifts: &shifts,
        original_filename: job.original_filename.as_deref(),
        lists: &job.lists,
    };
    reconcile_lists(&inputs, config, &dictionary, job.reasons.as_ref())
        .context("Failed to reconcile peak lists")
}

/// Writes the JSON report to the configured output destination.
pub fn save_report(outcome: &ParseOutcome, params: &IoParameters, compact: bool) -> Result<()> {
    match params.output.as_deref() {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(&mut writer, outcome, compact)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            writer.flush().context("Failed to flush output writer")?
        }
        None => {
            let stdout = stdio::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            write_report(&mut writer, outcome, compact)
                .context("Failed to write report to stdout")?;
            writer.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, outcome: &ParseOutcome, compact: bool) -> Result<()> {
    if compact {
        serde_json::to_writer(&mut *writer, outcome)?;
    } else {
        serde_json::to_writer_pretty(&mut *writer, outcome)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Wraps long-running operations with a spinner rendered to stderr.
pub fn run_with_spinner<T, F>(message: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());

    let result = work();

    match &result {
        Ok(_) => spinner.finish_with_message(format!("{} ✓", message)),
        Err(_) => spinner.abandon_with_message(format!("{} ✗", message)),
    }

    result
}

/// Returns true when stdout is a TTY and no explicit output file was supplied.
pub fn interactive_stdout_requested(params: &IoParameters) -> bool {
    params.output.is_none() && stdio::stdout().is_terminal()
}

/// Ensures commands do not dump structured output directly into an interactive terminal.
pub fn ensure_noninteractive_stdout(command: &str, params: &IoParameters) -> Result<()> {
    if interactive_stdout_requested(params) {
        bail!(
            "Refusing to stream {command} results to an interactive terminal. Use -o/--output or pipe the command into a file."
        );
    }
    Ok(())
}
