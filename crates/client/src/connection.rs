//! Lifecycle of the tokenization channel.
//!
//! [`ConnectionManager`] owns at most one live [`Channel`]. Every connection
//! attempt is a new instance identified by a generation number; its
//! [`ConnectionState`] moves `Connecting -> Open -> Closed` and never goes
//! back. An unexpected close schedules a new instance after a backoff delay.
//!
//! Dial attempts (with their backoff sleep) and the inbound pump run in
//! spawned tasks that report back through [`LinkEvent`]s. The manager itself is only touched from
//! the controller task, which feeds those events into
//! [`ConnectionManager::on_link_event`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use toksync_proto::TokenizeRequest;
use tracing::{debug, warn};
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::transport::{Channel, Connector};

/// Lifecycle state of one connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// Dial in progress (including the backoff wait before it).
	Connecting,
	/// Frames can be sent.
	Open,
	/// Instance is gone; a new generation may follow.
	Closed,
}

/// State of the current connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
	/// Instance number, starting at 1 for the first attempt. Zero means never opened.
	pub generation: u64,
	/// State of that instance.
	pub state: ConnectionState,
}

impl ConnectionStatus {
	/// Returns true if frames can be sent.
	pub fn is_open(&self) -> bool {
		self.state == ConnectionState::Open
	}
}

/// Report from a dial or pump task.
#[derive(Debug)]
pub enum LinkEvent {
	/// Dial for `generation` succeeded.
	Opened {
		/// Instance the channel belongs to.
		generation: u64,
		/// The established channel.
		channel: Channel,
	},
	/// Dial for `generation` failed.
	Failed {
		/// Instance that failed.
		generation: u64,
		/// Failure description.
		reason: String,
	},
	/// Inbound text frame.
	Frame {
		/// Instance the frame arrived on.
		generation: u64,
		/// Raw frame text.
		text: String,
	},
	/// The service side closed the channel.
	Closed {
		/// Instance that closed.
		generation: u64,
	},
}

/// What the controller needs to know after a [`LinkEvent`] has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotice {
	/// A new instance reached `Open`.
	Opened {
		/// Instance number.
		generation: u64,
	},
	/// Inbound frame on the live instance.
	Frame(String),
	/// The live instance was lost; a reconnect is scheduled.
	Lost {
		/// Instance number.
		generation: u64,
	},
}

struct Link {
	generation: u64,
	outbound: mpsc::UnboundedSender<String>,
	pump_cancel: CancellationToken,
	_guard: Option<DropGuard>,
}

/// Owner of the single tokenization channel.
pub struct ConnectionManager {
	connector: Arc<dyn Connector>,
	endpoint: Url,
	backoff: BackoffPolicy,
	events_tx: mpsc::UnboundedSender<LinkEvent>,
	events_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
	status_tx: watch::Sender<ConnectionStatus>,
	generation: u64,
	failures: u32,
	link: Option<Link>,
	dial_cancel: Option<CancellationToken>,
	closed: bool,
}

impl std::fmt::Debug for ConnectionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionManager")
			.field("endpoint", &self.endpoint.as_str())
			.field("status", &self.status())
			.field("failures", &self.failures)
			.field("closed", &self.closed)
			.finish_non_exhaustive()
	}
}

impl ConnectionManager {
	/// Creates a manager for `endpoint`. Nothing is dialed until [`Self::open`].
	pub fn new(connector: Arc<dyn Connector>, endpoint: Url, backoff: BackoffPolicy) -> Self {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let (status_tx, _) = watch::channel(ConnectionStatus {
			generation: 0,
			state: ConnectionState::Closed,
		});
		Self {
			connector,
			endpoint,
			backoff,
			events_tx,
			events_rx: Some(events_rx),
			status_tx,
			generation: 0,
			failures: 0,
			link: None,
			dial_cancel: None,
			closed: true,
		}
	}

	/// Takes the event stream. The first caller becomes the single consumer
	/// of inbound frames; later calls return `None`.
	pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
		self.events_rx.take()
	}

	/// Current instance and state.
	pub fn status(&self) -> ConnectionStatus {
		*self.status_tx.borrow()
	}

	/// Shorthand for the state of the current instance.
	pub fn state(&self) -> ConnectionState {
		self.status().state
	}

	/// Subscribes to status changes.
	pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
		self.status_tx.subscribe()
	}

	/// Starts connecting. No-op while an instance is connecting or open.
	///
	/// Failures never surface here; they feed the retry path.
	pub fn open(&mut self) {
		self.closed = false;
		if self.link.is_some() || self.dial_cancel.is_some() {
			return;
		}
		self.dial(Duration::ZERO);
	}

	/// Sends a request on the open instance.
	///
	/// Returns false, dropping the request, when no instance is open.
	pub fn send(&mut self, request: &TokenizeRequest<'_>) -> bool {
		let Some(link) = &self.link else {
			debug!("tokenize request dropped, connection not open");
			return false;
		};
		let frame = match request.to_json() {
			Ok(frame) => frame,
			Err(err) => {
				warn!(error = %err, "failed to encode tokenize request");
				return false;
			}
		};
		if link.outbound.send(frame).is_err() {
			debug!(generation = link.generation, "tokenize request dropped, writer gone");
			return false;
		}
		true
	}

	/// Releases the connection and stops reconnecting. Idempotent.
	pub fn close(&mut self) {
		self.closed = true;
		if let Some(cancel) = self.dial_cancel.take() {
			cancel.cancel();
		}
		if let Some(link) = self.link.take() {
			link.pump_cancel.cancel();
			debug!(generation = link.generation, "connection closed");
		}
		self.set_state(ConnectionState::Closed);
	}

	/// Applies a report from a dial or pump task.
	pub fn on_link_event(&mut self, event: LinkEvent) -> Option<LinkNotice> {
		match event {
			LinkEvent::Opened { generation, channel } => self.on_opened(generation, channel),
			LinkEvent::Failed { generation, reason } => {
				if self.closed || generation != self.generation {
					return None;
				}
				warn!(generation, reason = %reason, failures = self.failures + 1, "tokenization channel connect failed");
				self.dial_cancel = None;
				self.set_state(ConnectionState::Closed);
				self.schedule_reconnect();
				None
			}
			LinkEvent::Frame { generation, text } => {
				let live = self.link.as_ref().is_some_and(|link| link.generation == generation);
				if !live {
					debug!(generation, "dropping frame from stale connection");
					return None;
				}
				Some(LinkNotice::Frame(text))
			}
			LinkEvent::Closed { generation } => {
				if !self.link.as_ref().is_some_and(|link| link.generation == generation) {
					return None;
				}
				self.link = None;
				warn!(generation, "tokenization channel closed unexpectedly");
				self.set_state(ConnectionState::Closed);
				if !self.closed {
					self.schedule_reconnect();
				}
				Some(LinkNotice::Lost { generation })
			}
		}
	}

	fn on_opened(&mut self, generation: u64, channel: Channel) -> Option<LinkNotice> {
		if self.closed || generation != self.generation {
			debug!(generation, current = self.generation, "discarding stale channel");
			return None;
		}
		self.dial_cancel = None;
		self.failures = 0;

		let (outbound, inbound, guard) = channel.into_parts();
		let pump_cancel = CancellationToken::new();
		tokio::spawn(pump(generation, inbound, self.events_tx.clone(), pump_cancel.clone()));

		self.link = Some(Link {
			generation,
			outbound,
			pump_cancel,
			_guard: guard,
		});
		self.set_state(ConnectionState::Open);
		debug!(generation, endpoint = self.endpoint.as_str(), "connection open");
		Some(LinkNotice::Opened { generation })
	}

	fn schedule_reconnect(&mut self) {
		let delay = self.backoff.delay(self.failures);
		self.failures = self.failures.saturating_add(1);
		debug!(delay_ms = delay.as_millis() as u64, attempt = self.failures, "reconnect scheduled");
		self.dial(delay);
	}

	fn dial(&mut self, delay: Duration) {
		self.generation += 1;
		let generation = self.generation;
		self.set_state(ConnectionState::Connecting);

		let cancel = CancellationToken::new();
		self.dial_cancel = Some(cancel.clone());

		let connector = Arc::clone(&self.connector);
		let endpoint = self.endpoint.clone();
		let events = self.events_tx.clone();
		tokio::spawn(async move {
			if !delay.is_zero() {
				tokio::select! {
					biased;
					_ = cancel.cancelled() => return,
					_ = tokio::time::sleep(delay) => {}
				}
			}
			let result = tokio::select! {
				biased;
				_ = cancel.cancelled() => return,
				result = connector.connect(&endpoint) => result,
			};
			let event = match result {
				Ok(channel) => LinkEvent::Opened { generation, channel },
				Err(err) => LinkEvent::Failed {
					generation,
					reason: err.to_string(),
				},
			};
			let _ = events.send(event);
		});
	}

	fn set_state(&self, state: ConnectionState) {
		let generation = self.generation;
		self.status_tx.send_if_modified(|status| {
			let next = ConnectionStatus { generation, state };
			if *status == next {
				return false;
			}
			*status = next;
			true
		});
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		self.close();
	}
}

async fn pump(generation: u64, mut inbound: mpsc::UnboundedReceiver<String>, events: mpsc::UnboundedSender<LinkEvent>, cancel: CancellationToken) {
	loop {
		let frame = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			frame = inbound.recv() => frame,
		};
		let Some(text) = frame else {
			break;
		};
		if events.send(LinkEvent::Frame { generation, text }).is_err() {
			return;
		}
	}
	let _ = events.send(LinkEvent::Closed { generation });
}
