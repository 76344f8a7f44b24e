// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end: normalizes one WAV file into another.
//!
//! ```text
//! dynaudnorm [OPTIONS] [[filterSize] frameLen] <input.wav> <output.wav>
//! ```
//!
//! Exit status is [`EXIT_SUCCESS`] on success, [`EXIT_USAGE`] for usage and
//! configuration errors (including a missing input file) and [`EXIT_RUNTIME`]
//! when reading, processing or writing fails.

use std::{
    ffi::OsString,
    fs::File,
    io::{LineWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use dynaudnorm::{
    LogCallback, LogLevel, NormalizerApiHandle, NormalizerInstance, NormalizerOptions, PipelineState,
    StreamingPipeline, WaveReader, WaveWriter, config, load_api, pipeline::DEFAULT_CHUNK_CAPACITY,
    set_log_function,
};
use tracing::{debug, info, warn};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_USAGE: u8 = 1;
pub const EXIT_RUNTIME: u8 = 2;

/// Iterations between two progress dots.
pub const PROGRESS_INTERVAL: u64 = 7;

#[derive(Debug, Parser)]
#[command(name = "dynaudnorm", version)]
#[command(about = "Dynamic Audio Normalizer for uncompressed WAV files", long_about = None)]
pub struct Cli {
    /// [[filterSize] frameLen] <input.wav> <output.wav>
    #[arg(value_name = "ARGS", num_args = 2..=4, required = true)]
    pub positionals: Vec<String>,

    /// Target peak magnitude (0.01 to 1.00)
    #[arg(short = 'p', long = "peak")]
    pub peak: Option<f64>,

    /// Maximum gain factor (1.0 to 100.0)
    #[arg(short = 'm', long = "max-gain")]
    pub max_gain: Option<f64>,

    /// Target RMS value (0.0 to 1.0, 0 disables)
    #[arg(short = 'r', long = "target-rms")]
    pub target_rms: Option<f64>,

    /// Compression threshold (1.0 to 30.0, 0 disables)
    #[arg(short = 's', long = "compress")]
    pub compress: Option<f64>,

    /// Normalize every channel independently
    #[arg(short = 'n', long = "no-coupling")]
    pub no_coupling: bool,

    /// Enable DC bias correction
    #[arg(short = 'c', long = "correct-dc")]
    pub correct_dc: bool,

    /// Use the alternative boundary mode
    #[arg(short = 'b', long = "alt-boundary")]
    pub alt_boundary: bool,

    /// JSON file with normalizer options; flags and positionals take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path of the engine shared library
    #[arg(long, env = config::LIBRARY_ENV)]
    pub library: Option<PathBuf>,

    /// Write engine log messages to this file
    #[arg(long = "log-file", env = "LOGFILE")]
    pub log_file: Option<PathBuf>,
}

/// Positional arguments after interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub filter_size: Option<u32>,
    pub frame_len: Option<u32>,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Why a run failed. Decides the exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("Input file \"{}\" not found!", .0.display())]
    MissingInput(PathBuf),

    #[error(transparent)]
    Normalizer(#[from] dynaudnorm::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) | CliError::MissingInput(_) => EXIT_USAGE,
            CliError::Normalizer(err) if err.is_usage_error() => EXIT_USAGE,
            CliError::Normalizer(_) => EXIT_RUNTIME,
        }
    }
}

impl Cli {
    /// Splits the positionals into the optional tuning values and the two paths.
    ///
    /// With four positionals the first two are filter size and frame length; with
    /// three, the first is the filter size.
    pub fn invocation(&self) -> Result<Invocation, CliError> {
        let (filter_size, frame_len, input, output) = match self.positionals.as_slice() {
            [filter_size, frame_len, input, output] => (
                Some(parse_number("filter size", filter_size)?),
                Some(parse_number("frame length", frame_len)?),
                input,
                output,
            ),
            [filter_size, input, output] => (
                Some(parse_number("filter size", filter_size)?),
                None,
                input,
                output,
            ),
            [input, output] => (None, None, input, output),
            _ => {
                return Err(CliError::Usage(
                    "Usage: dynaudnorm [[<filterSize>] frameLen] <input.wav> <output.wav>".to_string(),
                ));
            }
        };
        Ok(Invocation {
            filter_size,
            frame_len,
            input: PathBuf::from(input),
            output: PathBuf::from(output),
        })
    }

    /// Builds the engine options: config file (or defaults), then positionals,
    /// then flags. The result is validated.
    pub fn options(&self, invocation: &Invocation) -> Result<NormalizerOptions, CliError> {
        let mut options = match &self.config {
            Some(path) => NormalizerOptions::from_json_file(path).map_err(|err| match err {
                dynaudnorm::Error::Io(io) => CliError::Usage(format!(
                    "Cannot read configuration file \"{}\": {io}",
                    path.display()
                )),
                other => CliError::Normalizer(other),
            })?,
            None => NormalizerOptions::default(),
        };
        if let Some(filter_size) = invocation.filter_size {
            options.filter_size = filter_size;
        }
        if let Some(frame_len) = invocation.frame_len {
            options.frame_len_msec = frame_len;
        }
        if let Some(peak) = self.peak {
            options.peak_value = peak;
        }
        if let Some(max_gain) = self.max_gain {
            options.max_amplification = max_gain;
        }
        if let Some(target_rms) = self.target_rms {
            options.target_rms = target_rms;
        }
        if let Some(compress) = self.compress {
            options.compress_factor = compress;
        }
        if self.no_coupling {
            options.channels_coupled = false;
        }
        if self.correct_dc {
            options.enable_dc_correction = true;
        }
        if self.alt_boundary {
            options.alt_boundary_mode = true;
        }
        options.validate()?;
        Ok(options)
    }
}

fn parse_number(what: &str, value: &str) -> Result<u32, CliError> {
    value
        .parse()
        .map_err(|_| CliError::Usage(format!("Invalid {what} \"{value}\", expected a positive integer")))
}

/// Formats one line of the engine log file.
pub fn format_log_line(timestamp: DateTime<Utc>, level: LogLevel, message: &str) -> String {
    format!(
        "[{}][{}] {}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        level,
        message
    )
}

/// Parses `args`, runs, reports errors on stderr and returns the exit status.
pub fn run_from_args<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                EXIT_USAGE
            } else {
                EXIT_SUCCESS
            };
        }
    };
    match run(&cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("\nError: {err}");
            err.exit_code()
        }
    }
}

/// Normalizes the input file into the output file.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let invocation = cli.invocation()?;
    let options = cli.options(&invocation)?;
    if !invocation.input.is_file() {
        return Err(CliError::MissingInput(invocation.input));
    }

    let library = cli.library.clone().unwrap_or_else(config::get_library_path);
    let api = load_api(&library)?;
    print_banner(&api);

    println!("Source file: \"{}\"", invocation.input.display());
    println!("Output file: \"{}\"", invocation.output.display());
    if let Some(path) = &cli.log_file {
        println!("Report file: \"{}\"", path.display());
        install_log_file(&api, path)?;
    }
    debug!(?options, library = %library.display(), "resolved options");

    let mut progress = ProgressReporter::new(std::io::stdout());
    progress.begin("Opening input and output files");
    let pipeline = StreamingPipeline::open(
        WaveReader::new(&invocation.input),
        WaveWriter::new(&invocation.output),
        DEFAULT_CHUNK_CAPACITY,
        |channels, sample_rate| {
            progress.next_phase("Initializing");
            NormalizerInstance::new(api.clone(), channels, sample_rate, &options)
        },
    )?;
    progress.next_phase("Processing audio samples");
    let stats = pipeline
        .on_progress(move |state, _| progress.update(state))
        .run()?;
    println!(" Done!\n");

    info!(
        samples_read = stats.samples_read,
        samples_written = stats.samples_written,
        "normalization finished"
    );
    println!("All is done. Goodbye.");
    Ok(())
}

/// Console progress in the form
/// `Processing audio samples........ Done!` / `Flushing buffers... Done!`.
///
/// One dot is printed every [`PROGRESS_INTERVAL`] iterations that moved
/// samples. The iteration that hits the end of the input only switches to the
/// flushing phase, and the final empty flush is not counted.
pub struct ProgressReporter<W: Write> {
    out: W,
    indicator: u64,
    flushing: bool,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indicator: 0,
            flushing: false,
        }
    }

    /// Announces the first phase.
    pub fn begin(&mut self, phase: &str) {
        self.emit(&format!("\n{phase}..."));
    }

    /// Completes the current phase and announces the next one.
    pub fn next_phase(&mut self, phase: &str) {
        self.emit(&format!(" Done!\n{phase}..."));
    }

    /// Accounts for one pipeline iteration that ended in `state`.
    pub fn update(&mut self, state: PipelineState) {
        match state {
            PipelineState::Flushing if !self.flushing => {
                self.flushing = true;
                self.next_phase("Flushing buffers");
            }
            PipelineState::Streaming | PipelineState::Flushing => {
                self.indicator += 1;
                if self.indicator >= PROGRESS_INTERVAL {
                    self.indicator = 0;
                    self.emit(".");
                }
            }
            PipelineState::Opening | PipelineState::Closed => {}
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        // Console output only; a closed stdout must not abort processing.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

fn print_banner(api: &NormalizerApiHandle) {
    let build = api.build_info();
    println!(
        "Dynamic Audio Normalizer, Version {} [{}]",
        api.version_info(),
        if build.debug { "DEBUG" } else { "Release" }
    );
    println!(
        "Built on {} at {} with {} for {}.\n",
        build.date, build.time, build.compiler, build.arch
    );
}

/// Builds a log callback that appends [`format_log_line`] lines to `path`.
///
/// The file is created (or truncated) right away. A failed write is reported
/// through `tracing` once; later failures are dropped.
pub fn log_file_callback(path: &Path) -> std::io::Result<LogCallback> {
    let file = Mutex::new(LineWriter::new(File::create(path)?));
    let failed = AtomicBool::new(false);
    let path = path.to_path_buf();
    Ok(Box::new(move |level: LogLevel, message: &str| {
        let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(file, "{}", format_log_line(Utc::now(), level, message))
            && !failed.swap(true, Ordering::Relaxed)
        {
            warn!("Failed to write to log file \"{}\": {}", path.display(), err);
        }
    }))
}

fn install_log_file(api: &NormalizerApiHandle, path: &Path) -> Result<(), CliError> {
    let callback = log_file_callback(path).map_err(dynaudnorm::Error::from)?;
    set_log_function(api, Some(callback));
    Ok(())
}
