//! Client configuration.
//!
//! Configuration is TOML. Every field is optional:
//!
//! ```toml
//! endpoint = "wss://my-tokenizer.duckdns.org/ws/tokenize"
//! api_base = "https://my-tokenizer.duckdns.org"
//! debounce_ms = 150
//! http_timeout_secs = 10
//! sequence_numbers = true
//!
//! [backoff]
//! initial_ms = 1000
//! max_ms = 30000
//! factor = 2
//! ```
//!
//! The default file lives at `$XDG_CONFIG_HOME/toksync/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::{Error, Result};

/// Default tokenization channel.
pub const DEFAULT_ENDPOINT: &str = "wss://my-tokenizer.duckdns.org/ws/tokenize";

/// Default base for the HTTP endpoints.
pub const DEFAULT_API_BASE: &str = "https://my-tokenizer.duckdns.org";

/// Default quiet period before an edit is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

const VOCAB_SIZE_PATH: &str = "api/vocab-size";
const SCRAPE_PATH: &str = "api/scrape";

/// Settings for one sync controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
	/// WebSocket URL of the tokenization channel.
	pub endpoint: String,
	/// Base URL the HTTP endpoints are resolved against.
	pub api_base: String,
	/// Quiet period before an edit is sent; zero sends every edit.
	pub debounce_ms: u64,
	/// Reconnection schedule.
	pub backoff: BackoffPolicy,
	/// Timeout for each HTTP call.
	pub http_timeout_secs: u64,
	/// Attach a correlation sequence to outbound frames.
	pub sequence_numbers: bool,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			api_base: DEFAULT_API_BASE.to_string(),
			debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
			backoff: BackoffPolicy::default(),
			http_timeout_secs: 10,
			sequence_numbers: true,
		}
	}
}

impl SyncConfig {
	/// Parses a TOML string.
	pub fn parse(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Loads a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| Error::ConfigIo {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&content)
	}

	/// Location of the per-user configuration file.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("toksync").join("config.toml"))
	}

	/// Loads the per-user file, falling back to defaults when it does not exist.
	pub fn load_default() -> Result<Self> {
		match Self::default_path() {
			Some(path) if path.exists() => Self::load(path),
			_ => Ok(Self::default()),
		}
	}

	/// Sets the tokenization endpoint.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	/// Sets the HTTP base URL.
	pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
		self.api_base = api_base.into();
		self
	}

	/// Sets the debounce window.
	pub fn with_debounce(mut self, debounce: Duration) -> Self {
		self.debounce_ms = debounce.as_millis() as u64;
		self
	}

	/// Sets the reconnection schedule.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;
		self
	}

	/// Enables or disables correlation sequences.
	pub fn with_sequence_numbers(mut self, enabled: bool) -> Self {
		self.sequence_numbers = enabled;
		self
	}

	/// Debounce window as a duration.
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	/// HTTP timeout as a duration.
	pub fn http_timeout(&self) -> Duration {
		Duration::from_secs(self.http_timeout_secs)
	}

	/// Parsed tokenization endpoint.
	pub fn endpoint_url(&self) -> Result<Url> {
		Ok(Url::parse(&self.endpoint)?)
	}

	/// URL of the vocabulary-size lookup.
	pub fn vocab_size_url(&self) -> Result<Url> {
		self.api_url(VOCAB_SIZE_PATH)
	}

	/// URL of the scrape submission endpoint.
	pub fn scrape_url(&self) -> Result<Url> {
		self.api_url(SCRAPE_PATH)
	}

	fn api_url(&self, path: &str) -> Result<Url> {
		let mut base = Url::parse(&self.api_base)?;
		if !base.path().ends_with('/') {
			let dir = format!("{}/", base.path());
			base.set_path(&dir);
		}
		Ok(base.join(path)?)
	}
}
