//! serterm - A streaming serial console colorizer
//!
//! serterm reads a byte stream (a serial device node, a capture file or
//! stdin) in whatever chunks it arrives, renders its ANSI colors, and
//! annotates firmware addresses with source locations from `addr2line`.
//!
//! # Features
//!
//! - **Chunk-safe colors**: escape sequences split across reads are carried over
//! - **Persistent color state**: colors survive chunk boundaries until reset
//! - **Symbol annotation**: `0x4xxxxxxx` addresses resolved through the toolchain
//! - **Reconnect**: reopen a device node after it disappears
//!
//! # Quick Start
//!
//! ```text
//! serterm /dev/ttyUSB0                     # Colorize a serial port
//! idf.py monitor | serterm                 # Colorize a pipe
//! serterm -e build/app.elf /dev/ttyUSB0    # With symbol annotation
//! ```

mod config;
mod core;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{data_dir, Config as SertermConfig, ConfigError};
use crate::core::session::{open_source, Session};
use crate::core::symbols::{Addr2Line, SymbolAnnotator};
use crate::ui::{Console, Flow, Renderer};

/// Delay before reopening a source that went away
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Source path, stdin when absent
    path: Option<PathBuf>,
    elf_file: Option<String>,
    toolchain: Option<String>,
    re_filter: Option<String>,
    cmd_arg: Option<String>,
    chunk_size: Option<usize>,
    max_sequence_len: Option<usize>,
    no_annotate: bool,
    reconnect: bool,
}

impl Args {
    /// Override config values for this run only
    fn apply(&self, config: &mut SertermConfig) {
        if let Some(elf) = &self.elf_file {
            config.elf_file = elf.clone();
        }
        if let Some(toolchain) = &self.toolchain {
            config.toolchain = toolchain.clone();
        }
        if let Some(filter) = &self.re_filter {
            config.re_filter = filter.clone();
        }
        if let Some(cmd_arg) = &self.cmd_arg {
            config.cmd_arg = cmd_arg.clone();
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if self.max_sequence_len.is_some() {
            config.max_sequence_len = self.max_sequence_len;
        }
    }

    fn is_stdin(&self) -> bool {
        self.path.as_deref().map_or(true, |p| p.as_os_str() == "-")
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("serterm {}", VERSION);
}

fn print_help() {
    eprintln!("serterm {} - A streaming serial console colorizer", VERSION);
    eprintln!();
    eprintln!("Usage: serterm [OPTIONS] [PATH]");
    eprintln!();
    eprintln!("  PATH                      Device node or file to read (default: stdin)");
    eprintln!();
    eprintln!("Symbol options:");
    eprintln!("  -e, --elf <FILE>          Binary with debug symbols");
    eprintln!("  -t, --toolchain <PATH>    addr2line executable");
    eprintln!("  -f, --filter <REGEX>      Address token pattern");
    eprintln!("  -a, --cmd-arg <FLAGS>     Flags passed before the ELF path");
    eprintln!("  -N, --no-annotate         Do not resolve addresses");
    eprintln!();
    eprintln!("Stream options:");
    eprintln!("  -c, --chunk-size <BYTES>  Read size");
    eprintln!("  --max-sequence-len <N>    Treat longer pending escape sequences as text");
    eprintln!("  -r, --reconnect           Reopen PATH when it closes");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version             Show version");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.serterm/config.toml");
    eprintln!("Log file:      ~/.serterm/serterm.log (level via RUST_LOG)");
}

fn parse_args() -> Result<Args, String> {
    parse_args_from(env::args().skip(1))
}

fn parse_args_from<I>(iter: I) -> Result<Args, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = Args::default();
    let mut iter = iter.into_iter();

    fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
        iter.next().ok_or_else(|| format!("Missing value for {}", flag))
    }

    fn number(text: String, flag: &str) -> Result<usize, String> {
        match text.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(format!("Invalid value for {}: {}", flag, text)),
        }
    }

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-e" | "--elf" => args.elf_file = Some(value(&mut iter, &arg)?),
            "-t" | "--toolchain" => args.toolchain = Some(value(&mut iter, &arg)?),
            "-f" | "--filter" => args.re_filter = Some(value(&mut iter, &arg)?),
            "-a" | "--cmd-arg" => args.cmd_arg = Some(value(&mut iter, &arg)?),
            "-N" | "--no-annotate" => args.no_annotate = true,
            "-c" | "--chunk-size" => {
                args.chunk_size = Some(number(value(&mut iter, &arg)?, &arg)?);
            }
            "--max-sequence-len" => {
                args.max_sequence_len = Some(number(value(&mut iter, &arg)?, &arg)?);
            }
            "-r" | "--reconnect" => args.reconnect = true,
            "-" => args.path = Some(PathBuf::from("-")),
            other if other.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", other));
            }
            other => {
                if args.path.is_some() {
                    return Err(format!("Unexpected extra path: {}", other));
                }
                args.path = Some(PathBuf::from(other));
            }
        }
    }

    Ok(args)
}

/// Log to `~/.serterm/serterm.log`; stdout belongs to the rendered stream
fn init_logging() {
    let log_path = data_dir()
        .map(|dir| dir.join("serterm.log"))
        .unwrap_or_else(|| PathBuf::from("serterm.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn load_config() -> Result<SertermConfig, ConfigError> {
    match SertermConfig::load_or_init() {
        Err(ConfigError::NoHome) => {
            warn!("No home directory, using default configuration");
            Ok(SertermConfig::default())
        }
        other => other,
    }
}

/// Build the annotator, validating the address pattern up front
fn build_annotator(config: &SertermConfig) -> Result<SymbolAnnotator, ConfigError> {
    let pattern = config.address_pattern()?;
    let resolver = Addr2Line::new(&config.toolchain, &config.cmd_arg, &config.elf_file);
    info!(
        "Annotating {:?} via {} {} {}",
        config.re_filter, config.toolchain, config.cmd_arg, config.elf_file
    );
    Ok(SymbolAnnotator::new(pattern, Box::new(resolver), config.highlight))
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("serterm starting...");

    let mut config = load_config().context("Failed to load configuration")?;
    args.apply(&mut config);

    let annotator = if args.no_annotate {
        None
    } else {
        Some(build_annotator(&config).context("Invalid symbol configuration")?)
    };

    run(&args, &config, annotator)?;

    info!("serterm exiting");
    Ok(())
}

/// Run sessions until the source ends (or forever with `--reconnect`)
fn run(args: &Args, config: &SertermConfig, annotator: Option<SymbolAnnotator>) -> anyhow::Result<()> {
    let options = config.session_options();
    let mut console = Console::new(Renderer::stdout(), annotator);
    let mut next_id = 1;
    let mut first = true;

    loop {
        let source = match open_source(args.path.as_deref()) {
            Ok(source) => source,
            Err(e) if !first => {
                warn!("{}", e);
                thread::sleep(RECONNECT_DELAY);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        first = false;

        // Fresh channel and session per connection: nothing carries over
        let (tx, rx) = mpsc::channel();
        let session = Session::new(next_id, &options);
        next_id += 1;
        let reader = session.spawn_reader(source, tx)?;
        let cancel = reader.cancel_token();
        info!("Session {} started", reader.id);

        for event in rx.iter() {
            match console.handle(event, &cancel) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Closed { .. }) => break,
                Err(e) => {
                    // Output is gone (e.g. closed pipe): tear the session down
                    reader.stop();
                    return Err(e).context("Failed to write output");
                }
            }
        }
        reader.join();

        if !args.reconnect || args.is_stdin() {
            break;
        }
        thread::sleep(RECONNECT_DELAY);
    }

    Ok(())
}
