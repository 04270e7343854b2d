//! Command-line interface for streaming G-code to a GRBL controller.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use grblstream_core::config::env_vars;
use grblstream_core::{
    CommandSource, ResponsePolicy, SerialTransport, Session, SessionConfig, SessionOutcome,
    SessionReport, StreamerConfig, TracingSink,
};

/// Stream a G-code file to a GRBL controller with character-counting flow control.
#[derive(Parser, Debug)]
#[command(name = "grblstream")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
#[command(after_help = "Example: grblstream -S /dev/ttyUSB0 -f example.gcode -b 115200 -v")]
struct Args {
    /// Serial device (e.g., /dev/ttyUSB0).
    #[arg(short = 'S', long)]
    serial: Option<String>,

    /// G-code file to stream.
    #[arg(short, long)]
    file: PathBuf,

    /// Baud rate [default: 115200].
    #[arg(short, long)]
    baud: Option<u32>,

    /// Verbose output: trace every line sent and acknowledged.
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only abort on `error`/`alarm` replies; skip other non-ok chatter.
    #[arg(long)]
    lenient: bool,

    /// Skip the wake-up handshake.
    #[arg(long)]
    no_wake: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // JSON output for log collectors
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::default().add_directive(level.into()));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_level(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Merge the optional config file with command-line overrides.
fn resolve_config(args: &Args) -> Result<StreamerConfig> {
    let mut config = match &args.config {
        Some(path) => StreamerConfig::load(path)?,
        None => StreamerConfig::default(),
    };

    if let Some(serial) = &args.serial {
        config.serial.device = Some(serial.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    if args.lenient {
        config.flow.policy = ResponsePolicy::Lenient;
    }
    if args.no_wake {
        config.wake.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = resolve_config(args)?;
    let device = config
        .serial
        .device
        .clone()
        .context("Serial device is required (--serial or [serial].device in config)")?;

    tracing::debug!(path = %args.file.display(), "Opening G-code file");
    let mut source = CommandSource::open(&args.file)
        .with_context(|| format!("Error opening G-code file: {}", args.file.display()))?;

    tracing::debug!(device = %device, baud = config.serial.baud, "Opening serial port");
    let mut transport = SerialTransport::open(&device, config.serial.baud)
        .with_context(|| format!("Error opening serial port: {}", device))?;
    tracing::debug!("Serial port opened successfully");

    let session = Session::new(SessionConfig::from(&config));
    let report = session.run(&mut source, &mut transport, &mut TracingSink);
    print_summary(&report);

    Ok(ExitCode::from(report.exit_code()))
}

fn print_summary(report: &SessionReport) {
    match &report.outcome {
        SessionOutcome::Completed => {
            println!(
                "Streamed {} lines ({} acknowledged) in {:.1?}",
                report.sent, report.acknowledged, report.elapsed
            );
        }
        SessionOutcome::Aborted(err) => {
            match err.device_response() {
                Some(response) => {
                    eprintln!("GRBL error detected: {} Halting execution.", response)
                }
                None => eprintln!("Streaming halted: {}", err),
            }
            eprintln!(
                "Sent {} lines, {} acknowledged, {} abandoned",
                report.sent, report.acknowledged, report.outstanding
            );
        }
    }
}
