use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use toksync_client::SyncConfig;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "toksync")]
#[command(about = "Live tokenization of typed text against a remote tokenizer")]
#[command(version)]
pub struct Cli {
	/// Configuration file (defaults to the per-user config if present)
	#[arg(long, short = 'c', value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Tokenization WebSocket endpoint
	#[arg(long, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Base URL of the HTTP API
	#[arg(long, value_name = "URL")]
	pub api_base: Option<String>,

	/// Quiet period before an edit is sent (0 sends every edit)
	#[arg(long, value_name = "MS")]
	pub debounce_ms: Option<u64>,

	/// Initial token view
	#[arg(long, value_enum, default_value_t = ViewMode::Text)]
	pub view: ViewMode,

	/// Disable colored output
	#[arg(long)]
	pub no_color: bool,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

/// How tokens are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewMode {
	/// Token text, colored by class.
	Text,
	/// Numeric ids.
	Ids,
}

impl Cli {
	/// Loads the configuration file and applies flag overrides.
	pub fn resolve_config(&self) -> toksync_client::Result<SyncConfig> {
		let mut config = match &self.config {
			Some(path) => SyncConfig::load(path)?,
			None => SyncConfig::load_default()?,
		};
		if let Some(endpoint) = &self.endpoint {
			config = config.with_endpoint(endpoint.clone());
		}
		if let Some(api_base) = &self.api_base {
			config = config.with_api_base(api_base.clone());
		}
		if let Some(ms) = self.debounce_ms {
			config = config.with_debounce(Duration::from_millis(ms));
		}
		Ok(config)
	}
}
