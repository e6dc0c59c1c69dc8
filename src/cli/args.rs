use crate::constants::{exit_codes, verbosity};
use clap::{error::ErrorKind, CommandFactory, Parser};
use log::LevelFilter;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#;

/// CLI arguments for tinplate.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Render a template file against JSON data", long_about = None)]
pub struct Args {
    /// Template file to render.
    #[arg(value_name = "TEMPLATE_FILE")]
    pub template: PathBuf,

    /// Data as a JSON string, or `-` to read it from stdin.
    #[arg(short, long, conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Data file (`.json`, `.yaml` or `.yml`).
    #[arg(long = "data-file", value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Directory containing a tinplate.json / tinplate.yaml configuration.
    #[arg(short, long, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Fail on identifiers missing from the data.
    #[arg(long)]
    pub strict: bool,

    /// Write the output to a file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse command line arguments, printing the help text when the template
/// argument is missing.
pub fn get_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        if e.kind() == ErrorKind::MissingRequiredArgument {
            let mut command = Args::command().help_template(HELP_TEMPLATE);
            if let Err(print_err) = command.print_help() {
                eprintln!("Failed to display help information: {print_err}");
            } else {
                println!();
            }
            std::process::exit(exit_codes::FAILURE);
        } else {
            e.exit();
        }
    })
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::OFF => LevelFilter::Error,
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}
