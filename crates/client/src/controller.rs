//! The sync controller task.
//!
//! [`SyncController`] owns the authoritative text snapshot and is the only
//! writer of the published [`TokenStream`]. It runs as a single task that
//! multiplexes four sources:
//!
//! - commands from [`SyncHandle`]s (edits),
//! - link events from the [`ConnectionManager`] (open, frames, loss),
//! - completed vocabulary-size lookups,
//! - the debounce deadline of the pending edit.
//!
//! # Freshness
//!
//! Inbound tokens are tagged with the most recently *sent* snapshot. When
//! correlation sequences are enabled and the service echoes them, a result
//! whose sequence is not the latest sent is discarded. Without an echo the
//! controller relies on the service answering in send order.
//!
//! # Reconnects
//!
//! Each time a connection instance reaches `Open` the current buffer is sent.
//! This covers the first open as well as every reconnect, since the service
//! keeps no state across connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toksync_proto::{TextSnapshot, TokenStream, TokenizeRequest, VocabCount};
use tracing::{debug, trace, warn};

use crate::api::{HttpApi, ServiceApi};
use crate::config::SyncConfig;
use crate::connection::{ConnectionManager, LinkEvent, LinkNotice};
use crate::handle::SyncHandle;
use crate::router::{EventRouter, FrameHandler, TokensUpdate};
use crate::scrape::ScrapeRequestClient;
use crate::transport::{Connector, WsConnector};
use crate::vocab::VocabState;
use crate::{Error, Result};

mod pending;

use pending::PendingEdit;

/// Requests from a [`SyncHandle`] to the controller task.
#[derive(Debug)]
pub(crate) enum Command {
	/// Replace the text buffer.
	SetText(TextSnapshot),
}

/// Last request that made it onto the wire.
#[derive(Debug, Clone)]
struct Sent {
	snapshot: TextSnapshot,
	seq: Option<u64>,
}

/// Orchestrates one tokenization session.
///
/// Construct and spawn it with [`SyncController::start`]; interact with it
/// through the returned [`SyncHandle`].
pub struct SyncController {
	connection: ConnectionManager,
	vocab: VocabState,
	tokens_tx: watch::Sender<TokenStream>,
	api: Arc<dyn ServiceApi>,
	pending: PendingEdit,
	debounce: Duration,
	sequence_numbers: bool,
	text: TextSnapshot,
	last_sent: Option<Sent>,
	next_seq: u64,
	lookups: JoinSet<(u64, Result<VocabCount>)>,
	lookups_issued: u64,
	lookup_applied: u64,
}

impl std::fmt::Debug for SyncController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncController")
			.field("connection", &self.connection)
			.field("text", &self.text)
			.field("last_sent", &self.last_sent)
			.field("pending", &self.pending.is_pending())
			.finish_non_exhaustive()
	}
}

impl SyncController {
	/// Spawns a controller on the current tokio runtime.
	///
	/// The connection is opened and the initial vocabulary size is looked up
	/// right away. The session ends when [`SyncHandle::stop`] is called or
	/// every handle is dropped.
	pub fn start(config: &SyncConfig, connector: Arc<dyn Connector>, api: Arc<dyn ServiceApi>) -> Result<SyncHandle> {
		let endpoint = config.endpoint_url()?;
		let mut connection = ConnectionManager::new(connector, endpoint, config.backoff);
		let link_events = connection.take_events().ok_or(Error::ServiceStopped)?;

		let vocab = VocabState::new();
		let (tokens_tx, tokens_rx) = watch::channel(TokenStream::empty());
		let (commands_tx, commands_rx) = mpsc::unbounded_channel();
		let cancel = CancellationToken::new();

		let handle = SyncHandle::new(
			commands_tx,
			tokens_rx,
			vocab.subscribe(),
			connection.subscribe(),
			ScrapeRequestClient::new(Arc::clone(&api)),
			cancel.clone(),
		);

		let controller = Self {
			connection,
			vocab,
			tokens_tx,
			api,
			pending: PendingEdit::default(),
			debounce: config.debounce(),
			sequence_numbers: config.sequence_numbers,
			text: TextSnapshot::default(),
			last_sent: None,
			next_seq: 1,
			lookups: JoinSet::new(),
			lookups_issued: 0,
			lookup_applied: 0,
		};
		let task = tokio::spawn(controller.run(commands_rx, link_events, cancel));
		handle.attach(task);
		Ok(handle)
	}

	/// Starts a controller against the real WebSocket and HTTP endpoints.
	pub fn connect(config: &SyncConfig) -> Result<SyncHandle> {
		let api = HttpApi::new(config)?;
		Self::start(config, Arc::new(WsConnector), Arc::new(api))
	}

	async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut link_events: mpsc::UnboundedReceiver<LinkEvent>, cancel: CancellationToken) {
		debug!(debounce_ms = self.debounce.as_millis() as u64, "sync controller started");
		self.connection.open();
		self.fetch_vocab();

		loop {
			let deadline = self.pending.deadline(self.debounce);
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				Some(event) = link_events.recv() => self.on_link_event(event),
				Some(joined) = self.lookups.join_next() => self.on_lookup(joined),
				command = commands.recv() => match command {
					Some(command) => self.on_command(command),
					None => break,
				},
				_ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
					if self.pending.is_due(Instant::now(), self.debounce) {
						self.send_current();
					}
				}
			}
		}

		self.lookups.abort_all();
		self.connection.close();
		debug!("sync controller stopped");
	}

	fn on_command(&mut self, command: Command) {
		match command {
			Command::SetText(snapshot) => self.set_text(snapshot),
		}
	}

	fn set_text(&mut self, snapshot: TextSnapshot) {
		if snapshot == self.text {
			return;
		}
		self.text = snapshot;

		if self.text.is_empty() {
			self.pending.clear();
			self.tokens_tx.send_replace(TokenStream::empty());
			trace!("buffer cleared");
			return;
		}

		if self.debounce.is_zero() {
			self.send_current();
		} else {
			self.pending.touch(Instant::now());
		}
	}

	/// Sends the current buffer if it is non-empty and the connection is open.
	fn send_current(&mut self) {
		self.pending.clear();
		if self.text.is_empty() {
			return;
		}

		let seq = self.sequence_numbers.then_some(self.next_seq);
		let request = TokenizeRequest {
			text: self.text.as_str(),
			seq,
		};
		if !self.connection.send(&request) {
			return;
		}

		if seq.is_some() {
			self.next_seq += 1;
		}
		debug!(?seq, chars = self.text.char_count(), "tokenize request sent");
		self.last_sent = Some(Sent {
			snapshot: self.text.clone(),
			seq,
		});
	}

	fn on_link_event(&mut self, event: LinkEvent) {
		match self.connection.on_link_event(event) {
			Some(LinkNotice::Opened { generation }) => {
				debug!(generation, resend = !self.text.is_empty(), "connection ready");
				self.send_current();
			}
			Some(LinkNotice::Frame(raw)) => {
				EventRouter::dispatch(&raw, self);
			}
			Some(LinkNotice::Lost { generation }) => {
				debug!(generation, "keeping last tokens until reconnect");
			}
			None => {}
		}
	}

	fn fetch_vocab(&mut self) {
		self.lookups_issued += 1;
		let id = self.lookups_issued;
		let api = Arc::clone(&self.api);
		self.lookups.spawn(async move { (id, api.vocab_size().await) });
	}

	fn on_lookup(&mut self, joined: std::result::Result<(u64, Result<VocabCount>), JoinError>) {
		let (id, result) = match joined {
			Ok(done) => done,
			Err(err) => {
				warn!(error = %err, "vocab size lookup task failed");
				return;
			}
		};
		match result {
			Ok(count) if id > self.lookup_applied => {
				self.lookup_applied = id;
				self.vocab.set(count);
			}
			Ok(count) => trace!(id, vocab_size = count.get(), "ignoring superseded vocab size lookup"),
			Err(err) => warn!(error = %err, "vocab size lookup failed, keeping last value"),
		}
	}
}

impl FrameHandler for SyncController {
	fn on_tokens(&mut self, update: TokensUpdate) {
		if let Some(count) = update.vocab_size {
			self.vocab.set(count);
		}

		if self.text.is_empty() {
			trace!("discarding tokens, buffer is empty");
			return;
		}
		let Some(sent) = &self.last_sent else {
			debug!("discarding tokens, nothing sent yet");
			return;
		};
		if let Some(seq) = update.seq
			&& sent.seq != Some(seq)
		{
			debug!(seq, latest = ?sent.seq, "discarding stale tokens");
			return;
		}

		trace!(count = update.tokens.len(), "tokens published");
		self.tokens_tx.send_replace(TokenStream::new(sent.snapshot.clone(), update.tokens));
	}

	fn on_vocabulary_changed(&mut self) {
		debug!("vocabulary changed, refreshing");
		self.fetch_vocab();
		self.send_current();
	}
}
