//! Data model for text snapshots and their tokenization.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Token id the service assigns to words missing from its vocabulary.
pub const UNKNOWN_TOKEN_ID: u64 = 1;

const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '(', ')', '[', ']'];

/// Immutable capture of the text buffer at one instant.
///
/// Cloning is cheap; the content is shared.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct TextSnapshot(Arc<str>);

impl TextSnapshot {
	/// Captures `text` as a snapshot.
	pub fn new(text: impl Into<Arc<str>>) -> Self {
		Self(text.into())
	}

	/// Returns the captured text.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true for the empty buffer.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of Unicode scalar values in the snapshot.
	pub fn char_count(&self) -> usize {
		self.0.chars().count()
	}
}

impl fmt::Debug for TextSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("TextSnapshot").field(&&*self.0).finish()
	}
}

impl fmt::Display for TextSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TextSnapshot {
	fn from(text: &str) -> Self {
		Self::new(text)
	}
}

impl From<String> for TextSnapshot {
	fn from(text: String) -> Self {
		Self::new(text)
	}
}

/// Presentation category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayClass {
	/// Plain word known to the vocabulary.
	Word,
	/// Token containing a digit.
	Number,
	/// Token containing punctuation.
	Punctuation,
	/// Token mapped to the `<UNK>` id.
	Unknown,
}

impl DisplayClass {
	/// Derives the class of a token from its id and text.
	///
	/// The `<UNK>` id wins over the text-based rules.
	pub fn classify(id: u64, text: &str) -> Self {
		if id == UNKNOWN_TOKEN_ID {
			Self::Unknown
		} else if text.chars().any(|c| c.is_ascii_digit()) {
			Self::Number
		} else if text.contains(PUNCTUATION) {
			Self::Punctuation
		} else {
			Self::Word
		}
	}

	/// Stable lowercase name, used in logs and styling tables.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Word => "word",
			Self::Number => "number",
			Self::Punctuation => "punctuation",
			Self::Unknown => "unknown",
		}
	}
}

/// One token produced by the tokenization service.
///
/// Tokens only come off the wire; there is no public constructor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireToken")]
pub struct Token {
	text: String,
	id: u64,
	display_class: DisplayClass,
}

/// Token as the service encodes it. Presentation hints such as `colorClass`
/// are ignored.
#[derive(Deserialize)]
struct WireToken {
	text: String,
	id: u64,
}

impl From<WireToken> for Token {
	fn from(wire: WireToken) -> Self {
		let display_class = DisplayClass::classify(wire.id, &wire.text);
		Self {
			text: wire.text,
			id: wire.id,
			display_class,
		}
	}
}

impl Token {
	/// Source text covered by this token.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Vocabulary id.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Presentation category.
	pub fn display_class(&self) -> DisplayClass {
		self.display_class
	}

	/// Returns true when the service did not recognise this token.
	pub fn is_unknown(&self) -> bool {
		self.id == UNKNOWN_TOKEN_ID
	}
}

/// Ordered tokens tagged with the snapshot they were computed for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenStream {
	snapshot: TextSnapshot,
	tokens: Arc<[Token]>,
}

impl TokenStream {
	/// Tags `tokens` with the snapshot they belong to.
	pub fn new(snapshot: TextSnapshot, tokens: Vec<Token>) -> Self {
		Self {
			snapshot,
			tokens: tokens.into(),
		}
	}

	/// The stream shown for an empty buffer.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Snapshot this stream was computed for.
	pub fn snapshot(&self) -> &TextSnapshot {
		&self.snapshot
	}

	/// Tokens in order.
	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Number of tokens.
	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	/// Returns true if there are no tokens.
	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Token ids in order.
	pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
		self.tokens.iter().map(Token::id)
	}

	/// Number of tokens mapped to `<UNK>`.
	pub fn unknown_count(&self) -> usize {
		self.tokens.iter().filter(|t| t.is_unknown()).count()
	}

	/// Character count of the tagged snapshot.
	pub fn char_count(&self) -> usize {
		self.snapshot.char_count()
	}
}

/// Size of the service vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabCount(pub u64);

impl VocabCount {
	/// Raw count.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for VocabCount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
