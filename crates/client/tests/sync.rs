mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockApi, MockConnector, ServerSide, config, settle, wait_for, within};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;
use toksync_client::proto::{DisplayClass, VocabCount};
use toksync_client::{ConnectionState, Error, SyncConfig, SyncController, SyncHandle};

struct Session {
	handle: SyncHandle,
	server: ServerSide,
	connector: Arc<MockConnector>,
	api: Arc<MockApi>,
	accepted: mpsc::UnboundedReceiver<ServerSide>,
}

async fn open_session(config: SyncConfig) -> Session {
	let (connector, mut accepted) = MockConnector::new();
	let api = MockApi::new(50_000);
	let handle = SyncController::start(&config, connector.clone(), api.clone()).unwrap();
	let server = within(accepted.recv()).await.unwrap();
	wait_for(&mut handle.subscribe_connection(), |s| s.is_open()).await;
	Session {
		handle,
		server,
		connector,
		api,
		accepted,
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn tokens_are_tagged_with_latest_snapshot() {
	let Session { handle, mut server, .. } = open_session(config(0).with_sequence_numbers(false)).await;

	handle.set_text("a").unwrap();
	assert_eq!(server.next_request().await, json!({"text": "a"}));
	handle.set_text("ab").unwrap();
	assert_eq!(server.next_request().await, json!({"text": "ab"}));

	server.reply_tokens(&[("a", 1005)], 50_000);
	server.reply_tokens(&[("ab", 1006)], 50_000);

	let stream = wait_for(&mut handle.subscribe_tokens(), |s| s.ids().eq([1006])).await;
	assert_eq!(stream.snapshot().as_str(), "ab");
	assert_eq!(stream.char_count(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stale_sequence_is_discarded() {
	let Session { handle, mut server, .. } = open_session(config(0)).await;

	handle.set_text("a").unwrap();
	assert_eq!(server.next_request().await, json!({"text": "a", "seq": 1}));
	handle.set_text("ab").unwrap();
	assert_eq!(server.next_request().await, json!({"text": "ab", "seq": 2}));

	server.reply_tokens_seq(&[("ab", 1006)], 50_000, 2);
	wait_for(&mut handle.subscribe_tokens(), |s| s.len() == 1).await;

	// Late answer to the first request still carries a usable vocab size.
	server.reply_tokens_seq(&[("a", 1005)], 50_007, 1);
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_007)).await;

	let stream = handle.tokens();
	assert_eq!(stream.ids().collect::<Vec<_>>(), vec![1006]);
	assert_eq!(stream.snapshot().as_str(), "ab");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn empty_buffer_clears_without_request() {
	let Session { handle, mut server, .. } = open_session(config(0)).await;

	handle.set_text("").unwrap();
	settle().await;
	assert!(server.try_request().is_none());

	handle.set_text("hi there").unwrap();
	server.next_request().await;
	server.reply_tokens(&[("hi", 1010), ("there", 1), ("2", 1011)], 50_000);
	let stream = wait_for(&mut handle.subscribe_tokens(), |s| !s.is_empty()).await;
	let classes: Vec<_> = stream.tokens().iter().map(|t| t.display_class()).collect();
	assert_eq!(classes, vec![DisplayClass::Word, DisplayClass::Unknown, DisplayClass::Number]);
	assert_eq!(stream.unknown_count(), 1);

	handle.clear().unwrap();
	wait_for(&mut handle.subscribe_tokens(), |s| s.is_empty()).await;
	settle().await;
	assert!(server.try_request().is_none());
	assert_eq!(handle.tokens().snapshot().as_str(), "");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn tokens_arriving_after_clear_are_ignored() {
	let Session { handle, mut server, .. } = open_session(config(0).with_sequence_numbers(false)).await;

	handle.set_text("hello").unwrap();
	server.next_request().await;
	handle.clear().unwrap();
	settle().await;

	server.reply_tokens(&[("hello", 1010)], 50_001);
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_001)).await;
	assert!(handle.tokens().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rapid_edits_are_coalesced() {
	let Session { handle, mut server, .. } = open_session(config(150)).await;

	handle.set_text("h").unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	handle.set_text("he").unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(server.try_request().is_none());
	handle.set_text("hel").unwrap();
	let last_edit = tokio::time::Instant::now();

	assert_eq!(server.next_text().await, "hel");
	assert!(last_edit.elapsed() >= Duration::from_millis(150));

	tokio::time::sleep(Duration::from_secs(1)).await;
	assert!(server.try_request().is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn reconnect_resends_latest_snapshot_once() {
	let Session {
		handle,
		mut server,
		mut accepted,
		connector,
		..
	} = open_session(config(0)).await;

	handle.set_text("hello").unwrap();
	assert_eq!(server.next_text().await, "hello");
	server.reply_tokens(&[("hello", 1010)], 50_000);
	wait_for(&mut handle.subscribe_tokens(), |s| !s.is_empty()).await;

	drop(server);
	let mut status = handle.subscribe_connection();
	wait_for(&mut status, |s| s.generation == 2).await;
	// Last tokens stay visible while disconnected.
	assert_eq!(handle.tokens().len(), 1);

	let mut server = within(accepted.recv()).await.unwrap();
	wait_for(&mut status, |s| s.generation == 2 && s.is_open()).await;
	assert_eq!(server.next_text().await, "hello");
	settle().await;
	assert!(server.try_request().is_none());
	assert_eq!(connector.attempts(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn edits_while_connecting_are_sent_on_open() {
	let (connector, mut accepted) = MockConnector::new();
	connector.refuse_next(2);
	let api = MockApi::new(50_000);
	let handle = SyncController::start(&config(0), connector.clone(), api).unwrap();

	handle.set_text("early").unwrap();
	let started = tokio::time::Instant::now();
	let mut server = within(accepted.recv()).await.unwrap();
	assert_eq!(server.next_text().await, "early");

	// 1s then 2s of backoff before the third attempt.
	assert!(started.elapsed() >= Duration::from_secs(3));
	assert_eq!(connector.attempts(), 3);
	let status = handle.connection_status();
	assert_eq!((status.generation, status.state), (3, ConnectionState::Open));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn scrape_complete_refreshes_vocab_and_resends() {
	let Session {
		handle, mut server, api, ..
	} = open_session(config(0)).await;
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_000)).await;
	assert_eq!(api.vocab_calls(), 1);

	handle.set_text("hello").unwrap();
	assert_eq!(server.next_text().await, "hello");
	server.reply_tokens(&[("hello", 1)], 50_000);
	wait_for(&mut handle.subscribe_tokens(), |s| s.unknown_count() == 1).await;

	api.set_vocab(Some(50_120));
	server.scrape_complete();
	assert_eq!(server.next_text().await, "hello");
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_120)).await;

	server.reply_tokens(&[("hello", 1042)], 50_120);
	wait_for(&mut handle.subscribe_tokens(), |s| s.unknown_count() == 0).await;

	settle().await;
	assert!(server.try_request().is_none());
	assert_eq!(api.vocab_calls(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_lookup_keeps_last_vocab() {
	let Session {
		handle, mut server, api, ..
	} = open_session(config(0)).await;
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_000)).await;

	handle.set_text("hello").unwrap();
	server.next_request().await;

	api.set_vocab(None);
	server.scrape_complete();
	assert_eq!(server.next_text().await, "hello");
	settle().await;

	assert_eq!(api.vocab_calls(), 2);
	assert_eq!(handle.vocab_size(), VocabCount(50_000));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn overlapping_lookups_keep_newest_answer() {
	let Session {
		handle, mut server, api, ..
	} = open_session(config(0)).await;
	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(50_000)).await;

	handle.set_text("hello").unwrap();
	server.next_request().await;

	// The first lookup answers last.
	api.queue_lookup(Duration::from_millis(500), Some(60_000));
	api.queue_lookup(Duration::from_millis(10), Some(61_000));
	server.scrape_complete();
	assert_eq!(server.next_text().await, "hello");
	server.scrape_complete();
	assert_eq!(server.next_text().await, "hello");

	wait_for(&mut handle.subscribe_vocab(), |v| *v == VocabCount(61_000)).await;
	tokio::time::sleep(Duration::from_secs(1)).await;

	assert_eq!(api.vocab_calls(), 3);
	assert_eq!(handle.vocab_size(), VocabCount(61_000));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn bad_frames_leave_state_untouched() {
	let Session { handle, mut server, .. } = open_session(config(0)).await;

	handle.set_text("hello").unwrap();
	server.next_request().await;
	server.reply_tokens_seq(&[("hello", 1010)], 50_000, 1);
	let before = wait_for(&mut handle.subscribe_tokens(), |s| !s.is_empty()).await;

	server.raw("not json at all");
	server.raw(r#"{"type":"PROGRESS","percent":40}"#);
	server.raw(r#"{"type":"TOKENS"}"#);
	server.raw(r#"{"payload":[]}"#);
	settle().await;

	assert_eq!(handle.tokens(), before);
	assert_eq!(handle.vocab_size(), VocabCount(50_000));
	let status = handle.connection_status();
	assert_eq!((status.generation, status.state), (1, ConnectionState::Open));

	handle.set_text("hello world").unwrap();
	assert_eq!(server.next_text().await, "hello world");
	server.reply_tokens_seq(&[("hello", 1010), ("world", 1011)], 50_000, 2);
	wait_for(&mut handle.subscribe_tokens(), |s| s.len() == 2).await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn scrape_submissions_are_one_shot() {
	let Session { handle, api, .. } = open_session(config(0)).await;

	assert!(matches!(handle.submit_scrape("").await, Err(Error::InvalidTarget(_))));
	assert!(matches!(handle.submit_scrape("ftp://example.com").await, Err(Error::InvalidTarget(_))));
	assert!(api.scrapes().is_empty());

	let submission = handle.submit_scrape("https://example.com/article").await.unwrap();
	assert_eq!(submission.url.as_str(), "https://example.com/article");

	api.fail_scrapes(500);
	assert!(matches!(
		handle.submit_scrape("https://example.com/other").await,
		Err(Error::Status(500))
	));
	settle().await;
	assert_eq!(api.scrapes(), vec!["https://example.com/article", "https://example.com/other"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stop_releases_connection() {
	let Session {
		handle,
		mut server,
		connector,
		..
	} = open_session(config(0)).await;
	assert!(handle.is_running());

	handle.stop().await;
	handle.stop().await;
	server.wait_closed().await;

	assert!(!handle.is_running());
	assert_eq!(handle.connection_status().state, ConnectionState::Closed);
	assert!(matches!(handle.set_text("late"), Err(Error::ServiceStopped)));

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(connector.attempts(), 1);
}
