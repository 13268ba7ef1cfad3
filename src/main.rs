//! StepLens CLI Entry Point
//!
//! Processes a saved build log API response and prints the rewritten
//! response to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Show the first failed step
//! steplens response.json --failed-step 1
//!
//! # Keyword filtering only
//! steplens response.json --filter-patterns patterns.yaml --context 3
//!
//! # Read the response from stdin, never download the complete log
//! curl ... | steplens - --failed-step 2 --offline
//! ```

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use log::{debug, info};

use steplens::config::{load_filter_patterns, BuildRef, ProcessOptions, DEFAULT_CONTEXT_LINES};
use steplens::response::{process_build_log, HttpLogFetcher, LogEnvelope, NoFetch};
use steplens::{APP_NAME, VERSION};

/// Response file name that means "read stdin".
const STDIN_MARKER: &str = "-";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    response_path: String,
    failed_step: Option<usize>,
    patterns_path: Option<PathBuf>,
    context_lines: usize,
    app_slug: Option<String>,
    build_slug: Option<String>,
    timeout: Option<Duration>,
    offline: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_path: STDIN_MARKER.to_string(),
            failed_step: None,
            patterns_path: None,
            context_lines: DEFAULT_CONTEXT_LINES,
            app_slug: None,
            build_slug: None,
            timeout: None,
            offline: false,
            verbose: false,
        }
    }
}

/// Configures the logging system; everything goes to stderr so stdout
/// stays valid JSON.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("{} v{}", APP_NAME, VERSION);
    println!();
    println!("Usage: steplens [OPTIONS] [RESPONSE_FILE]");
    println!();
    println!("Arguments:");
    println!("  [RESPONSE_FILE]         Build log API response (JSON); '-' reads stdin");
    println!();
    println!("Options:");
    println!("  --failed-step N         Show only the Nth failed step (1-based)");
    println!("  --filter-patterns PATH  Filter steps by keyword rules (YAML or JSON)");
    println!(
        "  --context N             Lines kept around keyword hits (default: {})",
        DEFAULT_CONTEXT_LINES
    );
    println!("  --app-slug SLUG         App identifier for the next_command hint");
    println!("  --build-slug SLUG       Build identifier for the next_command hint");
    println!("  --timeout SECS          Complete log download timeout");
    println!("  --offline               Never download the complete log");
    println!("  --verbose               Enable debug logging");
    println!("  --help                  Show this help message");
    println!("  --version               Show version information");
    println!();
    println!("Examples:");
    println!("  steplens response.json --failed-step 1");
    println!("  steplens response.json --failed-step 2 --filter-patterns patterns.yaml");
}

/// Returns the value following an option.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--offline" => {
                config.offline = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--failed-step" => {
                let value = option_value(args, &mut i, "--failed-step")?;
                let index: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid failed step index: {}", value))?;
                if index == 0 {
                    return Err("Failed step index starts at 1".to_string());
                }
                config.failed_step = Some(index);
            }
            "--filter-patterns" => {
                let value = option_value(args, &mut i, "--filter-patterns")?;
                config.patterns_path = Some(PathBuf::from(value));
            }
            "--context" => {
                let value = option_value(args, &mut i, "--context")?;
                config.context_lines = value
                    .parse()
                    .map_err(|_| format!("Invalid context value: {}", value))?;
            }
            "--app-slug" => {
                config.app_slug = Some(option_value(args, &mut i, "--app-slug")?.to_string());
            }
            "--build-slug" => {
                config.build_slug = Some(option_value(args, &mut i, "--build-slug")?.to_string());
            }
            "--timeout" => {
                let value = option_value(args, &mut i, "--timeout")?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                config.timeout = Some(Duration::from_secs(secs));
            }
            arg if arg.starts_with('-') && arg != STDIN_MARKER => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.response_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    if config.app_slug.is_some() != config.build_slug.is_some() {
        return Err("--app-slug and --build-slug must be given together".to_string());
    }

    Ok(config)
}

/// Reads the response payload from a file or stdin.
fn read_payload(path: &str) -> io::Result<String> {
    if path == STDIN_MARKER {
        let mut payload = String::new();
        io::stdin().read_to_string(&mut payload)?;
        return Ok(payload);
    }
    fs::read_to_string(path)
}

/// Builds processing options from the command line.
fn build_options(config: &Config) -> Result<ProcessOptions, Box<dyn std::error::Error>> {
    let mut options = ProcessOptions::new().with_context_lines(config.context_lines);

    if let Some(index) = config.failed_step {
        options = options.with_failed_step(index);
    }
    if let Some(path) = &config.patterns_path {
        options = options.with_filter(load_filter_patterns(path)?);
    }
    if let (Some(app), Some(build)) = (&config.app_slug, &config.build_slug) {
        options = options.with_build(BuildRef::new(app, build));
    }
    if let Some(timeout) = config.timeout {
        options = options.with_fetch_timeout(timeout);
    }

    Ok(options)
}

/// Main application logic.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);
    debug!("{:?}", config);

    let options = build_options(&config)?;
    if !options.is_active() {
        info!("No processing requested, response is passed through");
    }

    let payload = read_payload(&config.response_path)
        .map_err(|e| format!("Could not read '{}': {}", config.response_path, e))?;
    info!("Read response ({} bytes)", payload.len());

    let output = if config.offline {
        process_build_log(&payload, &options, &NoFetch).await
    } else {
        let fetcher = HttpLogFetcher::new()?;
        process_build_log(&payload, &options, &fetcher).await
    };

    if let Some(envelope) = LogEnvelope::parse(&output) {
        if let Some(note) = envelope.note() {
            eprintln!("{}", note.cyan());
        }
        if let Some(command) = envelope.next_command() {
            eprintln!("{} {}", "next:".bold(), command.green());
        }
    }

    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
