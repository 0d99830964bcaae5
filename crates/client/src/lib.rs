//! Client-side synchronization with a remote tokenization service.
//!
//! The client keeps a locally edited text buffer synchronized with a service
//! that tokenizes text over a persistent WebSocket and grows its vocabulary
//! from submitted URLs. The pieces, leaves first:
//!
//! - [`ConnectionManager`]: lifecycle of the tokenization channel, including
//!   reconnection with exponential backoff.
//! - [`VocabState`]: write-replace holder of the current vocabulary size.
//! - [`ScrapeRequestClient`]: one-shot "learn from URL" submission.
//! - [`EventRouter`]: classifies inbound frames and hands them to a
//!   [`FrameHandler`].
//! - [`SyncController`]: owns the authoritative snapshot, debounces edits,
//!   reacts to vocabulary changes and publishes state through a [`SyncHandle`].
//!
//! ```text
//! edit ──▶ SyncHandle ──▶ SyncController ──▶ ConnectionManager ──▶ service
//!                              ▲                                     │
//!                              └──── EventRouter ◀── inbound frame ◀─┘
//! ```
//!
//! Everything runs on one controller task; the only suspension points are the
//! channel I/O and the two HTTP calls, which complete back into the task as
//! events.

#![warn(missing_docs)]

use std::io;
use std::path::PathBuf;

pub mod api;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod controller;
pub mod handle;
pub mod router;
pub mod scrape;
pub mod transport;
pub mod vocab;

pub use api::{HttpApi, ServiceApi};
pub use backoff::BackoffPolicy;
pub use config::SyncConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, LinkEvent, LinkNotice};
pub use controller::SyncController;
pub use handle::SyncHandle;
pub use router::{EventRouter, FrameHandler, Routed, TokensUpdate};
pub use scrape::{ScrapeRequestClient, ScrapeSubmission};
pub use toksync_proto as proto;
pub use toksync_proto::{DisplayClass, TextSnapshot, Token, TokenStream, VocabCount};
pub use transport::{Channel, Connector, WsConnector};
pub use vocab::VocabState;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The controller task stopped.
	#[error("sync controller stopped")]
	ServiceStopped,
	/// The tokenization channel could not be established.
	#[error("connect failed: {0}")]
	Connect(String),
	/// A frame or response body could not be encoded or decoded.
	#[error("serialization failed: {0}")]
	Serde(#[from] serde_json::Error),
	/// The HTTP request itself failed (DNS, TLS, timeout, body).
	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),
	/// The service answered with a non-2xx status.
	#[error("service returned status {0}")]
	Status(u16),
	/// A configured or submitted URL does not parse.
	#[error("invalid url: {0}")]
	Url(#[from] url::ParseError),
	/// A scrape target was rejected before any request was made.
	#[error("invalid scrape target: {0}")]
	InvalidTarget(String),
	/// The configuration file is not valid TOML for [`SyncConfig`].
	#[error("invalid config: {0}")]
	Config(#[from] toml::de::Error),
	/// The configuration file could not be read.
	#[error("failed to read {}: {error}", .path.display())]
	ConfigIo {
		/// Path that failed.
		path: PathBuf,
		/// Underlying error.
		#[source]
		error: io::Error,
	},
}
