//! `ccq` entry point.
//!
//! Loads configuration, then either prints one random quote or refreshes the
//! local store from the text API while a spinner runs on the main thread.

mod args;
mod progress;

use anyhow::{anyhow, Context, Result};
use args::{parse_args, Command, Options};
use ccq_core::config::default_log_dir;
use ccq_core::db::open_db;
use ccq_core::{
    default_log_level, flush_logs, init_logging, Configuration, HttpSectionSource, QuoteService,
    RefreshService, RefreshSummary, SqliteBookRepository,
};
use log::{error, warn};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

const NO_RESULT_MESSAGE: &str = "查無句子";

fn main() -> ExitCode {
    let options = match parse_args(std::env::args_os()) {
        Ok(options) => options,
        Err(err) => err.exit(),
    };

    let code = match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err:#}");
            eprintln!("ccq: {err:#}");
            ExitCode::FAILURE
        }
    };
    flush_logs();
    code
}

fn run(options: Options) -> Result<()> {
    let config = match &options.config {
        Some(path) => Configuration::load(path),
        None => Configuration::load_default(),
    }
    .context("failed to load configuration")?;

    start_logging(&config);

    match options.command {
        Command::Quote { title, max_length } => {
            print_quote(&config, title.as_deref(), max_length)
        }
        Command::Update => update_store(&config),
    }
}

// Logging is best effort: a broken log directory must not block quoting.
fn start_logging(config: &Configuration) {
    let level = config.log_level().unwrap_or_else(default_log_level);
    let result = default_log_dir()
        .map_err(|err| err.to_string())
        .and_then(|dir| init_logging(level, &dir));
    if let Err(err) = result {
        eprintln!("ccq: logging disabled: {err}");
    }
}

fn print_quote(
    config: &Configuration,
    title: Option<&str>,
    max_length: Option<u32>,
) -> Result<()> {
    let mut conn = open_db(config.database_path()?).context("failed to open the quote store")?;
    let repo = SqliteBookRepository::try_new(&mut conn)?;
    if !repo.has_books()? {
        warn!("event=quote_find module=cli status=empty_store");
        eprintln!("ccq: the quote store is empty; run `ccq -u` first");
    }

    let service = QuoteService::new(repo);
    match service.get_quote(title, max_length)? {
        Some(quote) => println!("{quote}"),
        None => println!("{NO_RESULT_MESSAGE}"),
    }
    Ok(())
}

fn update_store(config: &Configuration) -> Result<()> {
    let db_path = config.database_path()?;
    let source = HttpSectionSource::new(config.api_url().clone())
        .context("failed to build the HTTP client")?;
    let entries = config.books().to_vec();
    let (events_tx, events_rx) = mpsc::channel();

    let worker = thread::spawn(move || -> Result<RefreshSummary> {
        let mut conn = open_db(&db_path).context("failed to open the quote store")?;
        let mut repo = SqliteBookRepository::try_new(&mut conn)?;
        let service = RefreshService::new(source);
        let summary = service.refresh(&mut repo, &entries, |event| {
            // The receiver only disappears if the main thread is gone.
            let _ = events_tx.send(event);
        })?;
        Ok(summary)
    });

    progress::spin_until_done(&events_rx);

    let summary = worker
        .join()
        .map_err(|_| anyhow!("update worker panicked"))??;
    println!(
        "Done: {} books, {} sections, {} paragraphs",
        summary.books, summary.sections, summary.paragraphs
    );
    Ok(())
}
