//! Transport seam for the tokenization channel.
//!
//! A [`Connector`] turns an endpoint into a [`Channel`]: a pair of text-frame
//! queues. The channel is closed from the service side when its inbound queue
//! ends, and from the client side by dropping it.

use std::fmt;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// One established bidirectional text channel.
pub struct Channel {
	outbound: mpsc::UnboundedSender<String>,
	inbound: mpsc::UnboundedReceiver<String>,
	guard: Option<DropGuard>,
}

impl fmt::Debug for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Channel")
			.field("outbound_closed", &self.outbound.is_closed())
			.field("has_guard", &self.guard.is_some())
			.finish_non_exhaustive()
	}
}

impl Channel {
	/// Wraps a pair of frame queues.
	pub fn new(outbound: mpsc::UnboundedSender<String>, inbound: mpsc::UnboundedReceiver<String>) -> Self {
		Self {
			outbound,
			inbound,
			guard: None,
		}
	}

	/// Attaches a guard that tears down the underlying I/O when the channel is dropped.
	pub fn with_guard(mut self, guard: DropGuard) -> Self {
		self.guard = Some(guard);
		self
	}

	pub(crate) fn into_parts(self) -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>, Option<DropGuard>) {
		(self.outbound, self.inbound, self.guard)
	}
}

/// Opens tokenization channels.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
	/// Establishes a fresh channel to `endpoint`.
	async fn connect(&self, endpoint: &Url) -> Result<Channel>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
	async fn connect(&self, endpoint: &Url) -> Result<Channel> {
		let (stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
			.await
			.map_err(|e| Error::Connect(e.to_string()))?;
		let (mut sink, mut source) = stream.split();

		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
		let cancel = CancellationToken::new();

		let writer_cancel = cancel.clone();
		tokio::spawn(async move {
			loop {
				let frame = tokio::select! {
					biased;
					_ = writer_cancel.cancelled() => break,
					frame = outbound_rx.recv() => frame,
				};
				let Some(frame) = frame else {
					break;
				};
				if let Err(err) = sink.send(Message::Text(frame)).await {
					warn!(error = %err, "websocket write failed");
					writer_cancel.cancel();
					break;
				}
			}
			let _ = sink.close().await;
		});

		let reader_cancel = cancel.clone();
		tokio::spawn(async move {
			loop {
				let next = tokio::select! {
					biased;
					_ = reader_cancel.cancelled() => break,
					next = source.next() => next,
				};
				match next {
					Some(Ok(Message::Text(text))) => {
						if inbound_tx.send(text).is_err() {
							break;
						}
					}
					Some(Ok(Message::Close(frame))) => {
						debug!(frame = ?frame, "websocket closed by peer");
						break;
					}
					Some(Ok(Message::Binary(bytes))) => {
						debug!(len = bytes.len(), "ignoring binary frame");
					}
					Some(Ok(_)) => {}
					Some(Err(err)) => {
						warn!(error = %err, "websocket read failed");
						break;
					}
					None => break,
				}
			}
			reader_cancel.cancel();
		});

		debug!(endpoint = endpoint.as_str(), "websocket connected");
		Ok(Channel::new(outbound_tx, inbound_rx).with_guard(cancel.drop_guard()))
	}
}
