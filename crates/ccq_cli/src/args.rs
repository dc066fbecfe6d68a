//! Command-line argument parsing.
//!
//! # Invariants
//! - Parsing produces an immutable `Options` value or a `clap::Error`;
//!   bad input never panics.
//! - `--update` cannot be combined with quote filters.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ccq", version)]
#[command(about = "Print a random quote from classical Chinese texts", long_about = None)]
struct Cli {
    /// Only quote from the book with exactly this title
    #[arg(short = 't', long, value_name = "BOOK_TITLE", conflicts_with = "update")]
    title: Option<String>,

    /// Maximum paragraph length, in characters
    #[arg(short = 'w', long, value_name = "MAX_LENGTH", conflicts_with = "update")]
    max_length: Option<u32>,

    /// Download every configured book and rebuild the local store
    #[arg(short = 'u', long)]
    update: bool,

    /// Use this configuration file instead of the per-user one
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quote {
        title: Option<String>,
        max_length: Option<u32>,
    },
    Update,
}

/// Parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub command: Command,
    pub config: Option<PathBuf>,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        let command = if cli.update {
            Command::Update
        } else {
            Command::Quote {
                title: cli.title,
                max_length: cli.max_length,
            }
        };
        Self {
            command,
            config: cli.config,
        }
    }
}

/// Parses `args` (program name first).
pub fn parse_args<I, T>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map(Options::from)
}
