//! In-memory service for driving a controller from tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use toksync_client::proto::VocabCount;
use toksync_client::{Channel, Connector, Error, Result, ServiceApi, SyncConfig};
use url::Url;

/// Config with fast, deterministic timings.
pub fn config(debounce_ms: u64) -> SyncConfig {
	SyncConfig::default()
		.with_endpoint("ws://service.test/ws/tokenize")
		.with_api_base("http://service.test")
		.with_debounce(Duration::from_millis(debounce_ms))
}

/// Service end of one accepted connection.
pub struct ServerSide {
	requests: mpsc::UnboundedReceiver<String>,
	replies: mpsc::UnboundedSender<String>,
}

impl ServerSide {
	/// Waits for the next tokenize request and decodes it.
	pub async fn next_request(&mut self) -> Value {
		let raw = within(self.requests.recv()).await.expect("connection closed by client");
		serde_json::from_str(&raw).expect("request is json")
	}

	/// Text of the next tokenize request.
	pub async fn next_text(&mut self) -> String {
		self.next_request().await["text"].as_str().expect("text field").to_string()
	}

	/// Returns a request if one is already queued.
	pub fn try_request(&mut self) -> Option<Value> {
		self.requests
			.try_recv()
			.ok()
			.map(|raw| serde_json::from_str(&raw).expect("request is json"))
	}

	/// Waits for the client to drop its end.
	pub async fn wait_closed(&mut self) {
		while within(self.requests.recv()).await.is_some() {}
	}

	/// Sends a `TOKENS` frame.
	pub fn reply_tokens(&self, tokens: &[(&str, u64)], vocab_size: u64) {
		self.raw(tokens_frame(tokens, vocab_size, None));
	}

	/// Sends a `TOKENS` frame echoing `seq`.
	pub fn reply_tokens_seq(&self, tokens: &[(&str, u64)], vocab_size: u64, seq: u64) {
		self.raw(tokens_frame(tokens, vocab_size, Some(seq)));
	}

	/// Sends a `SCRAPE_COMPLETE` frame.
	pub fn scrape_complete(&self) {
		self.raw(json!({"type": "SCRAPE_COMPLETE", "message": "New words learned!"}).to_string());
	}

	/// Sends an arbitrary frame.
	pub fn raw(&self, frame: impl Into<String>) {
		self.replies.send(frame.into()).expect("client side gone");
	}
}

fn tokens_frame(tokens: &[(&str, u64)], vocab_size: u64, seq: Option<u64>) -> String {
	let payload: Vec<Value> = tokens
		.iter()
		.map(|(text, id)| json!({"text": text, "id": id, "colorClass": "text-blue-300 bg-blue-500/10"}))
		.collect();
	let mut frame = json!({"type": "TOKENS", "payload": payload, "vocab_size": vocab_size});
	if let Some(seq) = seq {
		frame["seq"] = json!(seq);
	}
	frame.to_string()
}

/// Connector that hands the service end of every accepted connection to the test.
pub struct MockConnector {
	accepted: mpsc::UnboundedSender<ServerSide>,
	refuse: AtomicUsize,
	attempts: AtomicUsize,
}

impl MockConnector {
	pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
		let (accepted, rx) = mpsc::unbounded_channel();
		let connector = Arc::new(Self {
			accepted,
			refuse: AtomicUsize::new(0),
			attempts: AtomicUsize::new(0),
		});
		(connector, rx)
	}

	/// Makes the next `n` connection attempts fail.
	pub fn refuse_next(&self, n: usize) {
		self.refuse.store(n, Ordering::SeqCst);
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Connector for MockConnector {
	async fn connect(&self, _endpoint: &Url) -> Result<Channel> {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		if self
			.refuse
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			return Err(Error::Connect("connection refused".into()));
		}
		let (out_tx, out_rx) = mpsc::unbounded_channel();
		let (in_tx, in_rx) = mpsc::unbounded_channel();
		let _ = self.accepted.send(ServerSide {
			requests: out_rx,
			replies: in_tx,
		});
		Ok(Channel::new(out_tx, in_rx))
	}
}

/// Counting stand-in for the HTTP endpoints.
pub struct MockApi {
	vocab: Mutex<Option<u64>>,
	scripted: Mutex<VecDeque<(Duration, Option<u64>)>>,
	vocab_calls: AtomicUsize,
	scrapes: Mutex<Vec<String>>,
	scrape_status: Mutex<Option<u16>>,
}

impl MockApi {
	pub fn new(vocab: u64) -> Arc<Self> {
		Arc::new(Self {
			vocab: Mutex::new(Some(vocab)),
			scripted: Mutex::new(VecDeque::new()),
			vocab_calls: AtomicUsize::new(0),
			scrapes: Mutex::new(Vec::new()),
			scrape_status: Mutex::new(None),
		})
	}

	/// Sets the next lookup answers; `None` makes lookups fail.
	pub fn set_vocab(&self, vocab: Option<u64>) {
		*self.vocab.lock() = vocab;
	}

	/// Queues the answer for the next lookup, delivered after `delay`.
	/// Queued answers take precedence over [`Self::set_vocab`].
	pub fn queue_lookup(&self, delay: Duration, vocab: Option<u64>) {
		self.scripted.lock().push_back((delay, vocab));
	}

	/// Makes scrape submissions fail with `status`.
	pub fn fail_scrapes(&self, status: u16) {
		*self.scrape_status.lock() = Some(status);
	}

	pub fn vocab_calls(&self) -> usize {
		self.vocab_calls.load(Ordering::SeqCst)
	}

	pub fn scrapes(&self) -> Vec<String> {
		self.scrapes.lock().clone()
	}
}

#[async_trait]
impl ServiceApi for MockApi {
	async fn vocab_size(&self) -> Result<VocabCount> {
		self.vocab_calls.fetch_add(1, Ordering::SeqCst);
		let scripted = self.scripted.lock().pop_front();
		let vocab = match scripted {
			Some((delay, vocab)) => {
				tokio::time::sleep(delay).await;
				vocab
			}
			None => *self.vocab.lock(),
		};
		vocab.map(VocabCount).ok_or(Error::Status(503))
	}

	async fn submit_scrape(&self, url: &Url) -> Result<()> {
		self.scrapes.lock().push(url.to_string());
		let status = *self.scrape_status.lock();
		match status {
			Some(status) => Err(Error::Status(status)),
			None => Ok(()),
		}
	}
}

/// Bounds a wait so a broken controller fails the test instead of hanging it.
pub async fn within<F: Future>(fut: F) -> F::Output {
	tokio::time::timeout(Duration::from_secs(120), fut)
		.await
		.expect("timed out waiting")
}

/// Waits until `rx` holds a value satisfying `pred`.
pub async fn wait_for<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T
where
	T: Clone,
{
	within(rx.wait_for(pred)).await.expect("controller stopped").clone()
}

/// Lets every ready task run without advancing the paused clock much.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(1)).await;
}
