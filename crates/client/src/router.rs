//! Classification of inbound frames.

use toksync_proto::{InboundFrame, Token, VocabCount};
use tracing::{trace, warn};

const PREVIEW_CHARS: usize = 80;

/// Tokenization result carried by a `TOKENS` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokensUpdate {
	/// Tokens in order.
	pub tokens: Vec<Token>,
	/// Vocabulary size reported alongside, if any.
	pub vocab_size: Option<VocabCount>,
	/// Echoed request sequence, if any.
	pub seq: Option<u64>,
}

/// Receiver of routed frames.
pub trait FrameHandler {
	/// A tokenization result arrived.
	fn on_tokens(&mut self, update: TokensUpdate);
	/// The service reported that its vocabulary may have changed.
	fn on_vocabulary_changed(&mut self);
}

/// Outcome of routing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
	/// Delivered to [`FrameHandler::on_tokens`].
	Tokens,
	/// Delivered to [`FrameHandler::on_vocabulary_changed`].
	VocabularyChanged,
	/// Malformed or of an unknown kind; nothing was delivered.
	Dropped,
}

/// Stateless dispatcher from raw frames to a [`FrameHandler`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EventRouter;

impl EventRouter {
	/// Decodes `raw` and invokes exactly one handler method, or none if the
	/// frame is dropped. Never fails.
	pub fn dispatch(raw: &str, handler: &mut impl FrameHandler) -> Routed {
		let frame = match InboundFrame::from_json(raw) {
			Ok(frame) => frame,
			Err(err) => {
				warn!(error = %err, frame = preview(raw), "dropping malformed frame");
				return Routed::Dropped;
			}
		};

		match frame {
			InboundFrame::Tokens { payload, vocab_size, seq } => {
				trace!(count = payload.len(), ?seq, "tokens frame");
				handler.on_tokens(TokensUpdate {
					tokens: payload,
					vocab_size,
					seq,
				});
				Routed::Tokens
			}
			InboundFrame::ScrapeComplete { message } => {
				trace!(message = message.as_deref().unwrap_or_default(), "scrape complete frame");
				handler.on_vocabulary_changed();
				Routed::VocabularyChanged
			}
			InboundFrame::Unknown => {
				warn!(frame = preview(raw), "dropping frame of unknown kind");
				Routed::Dropped
			}
		}
	}
}

fn preview(raw: &str) -> &str {
	match raw.char_indices().nth(PREVIEW_CHARS) {
		Some((idx, _)) => &raw[..idx],
		None => raw,
	}
}
