//! Public handle to a running sync controller.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toksync_proto::{TextSnapshot, TokenStream, VocabCount};
use tracing::warn;

use crate::connection::ConnectionStatus;
use crate::controller::Command;
use crate::scrape::{ScrapeRequestClient, ScrapeSubmission};
use crate::{Error, Result};

/// Handle to a [`SyncController`](crate::SyncController).
///
/// Edits are queued to the controller task; state is observed through watch
/// channels. Cloning is cheap and every clone talks to the same controller.
#[derive(Clone)]
pub struct SyncHandle {
	/// Edit queue into the controller task.
	commands: mpsc::UnboundedSender<Command>,
	/// Latest published token stream.
	tokens: watch::Receiver<TokenStream>,
	/// Latest known vocabulary size.
	vocab: watch::Receiver<VocabCount>,
	/// Current connection instance.
	connection: watch::Receiver<ConnectionStatus>,
	scrape: ScrapeRequestClient,
	cancel: CancellationToken,
	task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SyncHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncHandle")
			.field("connection", &*self.connection.borrow())
			.field("vocab", &*self.vocab.borrow())
			.field("running", &self.is_running())
			.finish_non_exhaustive()
	}
}

impl SyncHandle {
	pub(crate) fn new(
		commands: mpsc::UnboundedSender<Command>,
		tokens: watch::Receiver<TokenStream>,
		vocab: watch::Receiver<VocabCount>,
		connection: watch::Receiver<ConnectionStatus>,
		scrape: ScrapeRequestClient,
		cancel: CancellationToken,
	) -> Self {
		Self {
			commands,
			tokens,
			vocab,
			connection,
			scrape,
			cancel,
			task: Arc::new(Mutex::new(None)),
		}
	}

	pub(crate) fn attach(&self, task: JoinHandle<()>) {
		*self.task.lock() = Some(task);
	}

	/// Replaces the text buffer.
	///
	/// Returns [`Error::ServiceStopped`] once the controller has stopped.
	pub fn set_text(&self, text: impl Into<TextSnapshot>) -> Result<()> {
		self.commands
			.send(Command::SetText(text.into()))
			.map_err(|_| Error::ServiceStopped)
	}

	/// Empties the text buffer. Tokens are cleared without contacting the service.
	pub fn clear(&self) -> Result<()> {
		self.set_text(TextSnapshot::default())
	}

	/// Submits a learn-from-URL job. See [`ScrapeRequestClient::submit`].
	pub async fn submit_scrape(&self, url: &str) -> Result<ScrapeSubmission> {
		self.scrape.submit(url).await
	}

	/// Currently displayed tokens.
	pub fn tokens(&self) -> TokenStream {
		self.tokens.borrow().clone()
	}

	/// Subscribes to token stream changes.
	pub fn subscribe_tokens(&self) -> watch::Receiver<TokenStream> {
		self.tokens.clone()
	}

	/// Last known vocabulary size; zero until the first lookup completes.
	pub fn vocab_size(&self) -> VocabCount {
		*self.vocab.borrow()
	}

	/// Subscribes to vocabulary size changes.
	pub fn subscribe_vocab(&self) -> watch::Receiver<VocabCount> {
		self.vocab.clone()
	}

	/// Current connection instance and its state.
	pub fn connection_status(&self) -> ConnectionStatus {
		*self.connection.borrow()
	}

	/// Subscribes to connection status changes.
	pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
		self.connection.clone()
	}

	/// Returns true until the controller task has exited.
	pub fn is_running(&self) -> bool {
		self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
	}

	/// Stops the controller and waits for it to release the connection.
	///
	/// Idempotent; any clone may call it.
	pub async fn stop(&self) {
		self.cancel.cancel();
		let task = self.task.lock().take();
		if let Some(task) = task
			&& let Err(err) = task.await
		{
			warn!(error = %err, "sync controller task failed");
		}
	}
}
