//! `toksync`: type text, watch it tokenize.
//!
//! Reads commands and text from stdin, one line at a time, and prints the
//! token stream and vocabulary size whenever the sync controller publishes a
//! change.

mod cli;
mod input;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, ViewMode};
use input::{EXAMPLE_TEXT, HELP, Input};
use tokio::io::{AsyncBufReadExt, BufReader};
use toksync_client::{SyncController, SyncHandle};
use tracing::{debug, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = cli.resolve_config().context("failed to load configuration")?;
	info!(endpoint = %config.endpoint, api_base = %config.api_base, "starting toksync");
	let handle = SyncController::connect(&config).context("failed to start sync controller")?;

	let result = session(&handle, cli.view, !cli.no_color && std::io::stdout().is_terminal()).await;
	handle.stop().await;
	result
}

async fn session(handle: &SyncHandle, mut view: ViewMode, color: bool) -> anyhow::Result<()> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut tokens = handle.subscribe_tokens();
	let mut vocab = handle.subscribe_vocab();
	let mut buffer = String::new();

	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line.context("failed to read stdin")? else {
					break;
				};
				let input = match Input::parse(&line) {
					Ok(input) => input,
					Err(err) => {
						eprintln!("{err}");
						continue;
					}
				};
				match input {
					Input::Text(text) => {
						buffer = text;
						handle.set_text(buffer.as_str())?;
					}
					Input::Clear => {
						buffer.clear();
						handle.clear()?;
					}
					Input::Example => {
						println!("{EXAMPLE_TEXT}");
						buffer = EXAMPLE_TEXT.to_string();
						handle.set_text(EXAMPLE_TEXT)?;
					}
					Input::Scrape(url) => spawn_scrape(handle.clone(), url),
					Input::View(mode) => {
						view = mode;
						println!("{}", render::render_tokens(&handle.tokens(), view, color));
					}
					Input::Stats => {
						println!("{}", render::render_stats(&handle.tokens(), buffer.chars().count(), handle.vocab_size(), handle.connection_status()));
					}
					Input::Help => println!("{HELP}"),
					Input::Quit => break,
				}
			}
			Ok(()) = tokens.changed() => {
				let stream = tokens.borrow_and_update().clone();
				println!("{}", render::render_tokens(&stream, view, color));
			}
			Ok(()) = vocab.changed() => {
				let count = *vocab.borrow_and_update();
				println!("{}", render::render_vocab(count));
			}
		}
	}
	Ok(())
}

fn spawn_scrape(handle: SyncHandle, url: String) {
	tokio::spawn(async move {
		match handle.submit_scrape(&url).await {
			Ok(submission) => println!(
				"learning from {} (submitted {}), new words arrive when the job completes",
				submission.url,
				submission.submitted_at.format("%H:%M:%S")
			),
			Err(err) => eprintln!("scrape failed: {err}"),
		}
	});
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("TOKSYNC_LOG").unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("toksync=debug,warn")
			} else {
				EnvFilter::new("toksync=info,warn")
			}
		})
	};

	if let Some(log_dir) = std::env::var("TOKSYNC_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("toksync.{}.log", std::process::id()));
		match OpenOptions::new().create(true).append(true).open(&log_path) {
			Ok(file) => {
				let file_layer = tracing_subscriber::fmt::layer()
					.with_writer(file)
					.with_ansi(false)
					.with_target(true);
				tracing_subscriber::registry().with(filter()).with(file_layer).init();
				info!(path = ?log_path, "tracing initialized");
				return;
			}
			Err(err) => eprintln!("cannot open {}: {err}, logging to stderr", log_path.display()),
		}
	}

	tracing_subscriber::registry()
		.with(filter())
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
	if verbose {
		debug!("verbose logging enabled");
	}
}
