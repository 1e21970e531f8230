/// PSI command-line tool: inspect and decode `.psi` point-cloud files.
///
/// # Command overview
///
/// ```text
/// psi <COMMAND> [OPTIONS]
///
/// Commands:
///   inspect    Print the header and region layout of a PSI file
///   decode     Stream-decode a PSI file into ASCII point lines
///   help       Print help information
///
/// Global options:
///   -v, --verbose    Log decoder state transitions (repeat for trace)
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                      |
/// |------|----------------------------------------------|
/// | 0    | Success                                      |
/// | 1    | Error (I/O failure, malformed or short file) |
///
/// All error details are written to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use psi_decoder::DecoderConfig;
use psi_decoder::loader::DEFAULT_CHUNK_SIZE;

mod cmd_decode;
mod cmd_inspect;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// Streaming decoder for PSI hybrid text/binary point clouds.
#[derive(Parser)]
#[command(name = "psi", version, about = "PSI point-cloud decoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decoder activity to stderr (`-v` debug, `-vv` trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Print the header and region layout of a PSI file.
    Inspect(InspectArgs),
    /// Stream-decode a PSI file into `x y z r g b [nx ny nz]` lines.
    Decode(DecodeArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `psi inspect`.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the `.psi` file to inspect.
    pub file: PathBuf,

    /// Emit the report as JSON instead of aligned text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `psi decode`.
///
/// ```text
/// ┌──────────────────┬───────────────────────────────────────────────┐
/// │ Flag             │ Values / default                              │
/// ├──────────────────┼───────────────────────────────────────────────┤
/// │ --chunk-size     │ bytes per read (default 65536)                │
/// │ --batch-capacity │ floats per batch, multiple of 3 (def. 30000)  │
/// │ -o / --output    │ write to file instead of stdout               │
/// │ --summary        │ print counts only, no point lines             │
/// └──────────────────┴───────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct DecodeArgs {
    /// Path to the `.psi` file to decode.
    pub file: PathBuf,

    /// Bytes handed to the decoder per read.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Floats per emitted batch; must be a non-zero multiple of 3.
    #[arg(long, default_value_t = DecoderConfig::default().batch_capacity)]
    pub batch_capacity: usize,

    /// Write decoded points to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print point and batch counts instead of the points.
    #[arg(long)]
    pub summary: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Inspect(args) => cmd_inspect::run(&args),
        Commands::Decode(args) => cmd_decode::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
