//! JSON frames for the tokenization channel and HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::types::{Token, VocabCount};

/// Outbound frame on the tokenization channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenizeRequest<'a> {
	/// Full buffer content to tokenize.
	pub text: &'a str,
	/// Correlation sequence. Services that do not echo it simply ignore it.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub seq: Option<u64>,
}

impl TokenizeRequest<'_> {
	/// Encodes the frame as JSON text.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

/// Inbound frame on the tokenization channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
	/// Tokenization result for the most recent request.
	#[serde(rename = "TOKENS")]
	Tokens {
		/// Tokens in order.
		payload: Vec<Token>,
		/// Vocabulary size at the time of tokenization.
		#[serde(default)]
		vocab_size: Option<VocabCount>,
		/// Echo of the request sequence, when the service supports it.
		#[serde(default)]
		seq: Option<u64>,
	},
	/// A learn-from-URL job finished and the vocabulary may have grown.
	#[serde(rename = "SCRAPE_COMPLETE")]
	ScrapeComplete {
		/// Human-readable note from the service.
		#[serde(default)]
		message: Option<String>,
	},
	/// Any kind this client does not know about.
	#[serde(other)]
	Unknown,
}

impl InboundFrame {
	/// Decodes a frame from JSON text.
	pub fn from_json(raw: &str) -> serde_json::Result<Self> {
		serde_json::from_str(raw)
	}
}

/// Body of `GET /api/vocab-size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabSizeResponse {
	/// Current vocabulary size.
	pub vocab_size: VocabCount,
}

/// Body of `POST /api/scrape`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScrapeRequest<'a> {
	/// Page to learn from.
	pub url: &'a str,
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::DisplayClass;

	#[test]
	fn request_omits_absent_seq() {
		let plain = TokenizeRequest { text: "hello", seq: None };
		assert_eq!(plain.to_json().unwrap(), r#"{"text":"hello"}"#);

		let tagged = TokenizeRequest { text: "hello", seq: Some(3) };
		assert_eq!(tagged.to_json().unwrap(), r#"{"text":"hello","seq":3}"#);
	}

	#[test]
	fn decodes_tokens_frame() {
		let raw = r#"{
			"type": "TOKENS",
			"payload": [
				{"text": "The", "id": 1010, "colorClass": "text-blue-300 bg-blue-500/10"},
				{"text": "2", "id": 1, "colorClass": "text-yellow-300 bg-yellow-500/10"}
			],
			"vocab_size": 52011
		}"#;

		let InboundFrame::Tokens { payload, vocab_size, seq } = InboundFrame::from_json(raw).unwrap() else {
			panic!("expected tokens frame");
		};
		assert_eq!(payload.len(), 2);
		assert_eq!(payload[1].display_class(), DisplayClass::Unknown);
		assert_eq!(vocab_size, Some(VocabCount(52011)));
		assert_eq!(seq, None);
	}

	#[test]
	fn decodes_scrape_complete_with_message() {
		let raw = r#"{"type":"SCRAPE_COMPLETE","message":"New words learned!"}"#;
		assert_eq!(
			InboundFrame::from_json(raw).unwrap(),
			InboundFrame::ScrapeComplete {
				message: Some("New words learned!".into())
			}
		);
		assert_eq!(
			InboundFrame::from_json(r#"{"type":"SCRAPE_COMPLETE"}"#).unwrap(),
			InboundFrame::ScrapeComplete { message: None }
		);
	}

	#[test]
	fn unknown_kind_is_ignorable() {
		let raw = r#"{"type":"PROGRESS","percent":40}"#;
		assert_eq!(InboundFrame::from_json(raw).unwrap(), InboundFrame::Unknown);
	}

	#[test]
	fn missing_kind_is_an_error() {
		assert!(InboundFrame::from_json(r#"{"payload":[]}"#).is_err());
		assert!(InboundFrame::from_json("not json").is_err());
	}

	#[test]
	fn vocab_size_body_roundtrip() {
		let body: VocabSizeResponse = serde_json::from_str(r#"{"vocab_size":1234}"#).unwrap();
		assert_eq!(body.vocab_size, VocabCount(1234));
	}
}
