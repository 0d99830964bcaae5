//! Plain-text rendering of controller state.

use std::fmt::Write;

use crossterm::style::{Color, Stylize};
use num_format::{Locale, ToFormattedString};
use toksync_client::{ConnectionState, ConnectionStatus, DisplayClass, TokenStream, VocabCount};

use crate::cli::ViewMode;

fn class_color(class: DisplayClass) -> Color {
	match class {
		DisplayClass::Word => Color::Blue,
		DisplayClass::Number => Color::Yellow,
		DisplayClass::Punctuation => Color::Green,
		DisplayClass::Unknown => Color::Red,
	}
}

/// Renders one token stream as a single line.
pub fn render_tokens(stream: &TokenStream, mode: ViewMode, color: bool) -> String {
	if stream.is_empty() {
		return "(no tokens)".to_string();
	}
	match mode {
		ViewMode::Ids => {
			let ids: Vec<String> = stream.ids().map(|id| id.to_string()).collect();
			format!("[{}]", ids.join(", "))
		}
		ViewMode::Text => {
			let mut out = String::new();
			for (i, token) in stream.tokens().iter().enumerate() {
				if i > 0 {
					out.push(' ');
				}
				if color {
					let _ = write!(out, "{}", token.text().with(class_color(token.display_class())));
				} else if token.is_unknown() {
					let _ = write!(out, "<unk:{}>", token.text());
				} else {
					out.push_str(token.text());
				}
			}
			out
		}
	}
}

pub fn render_vocab(vocab: VocabCount) -> String {
	format!("vocabulary: {} words", vocab.get().to_formatted_string(&Locale::en))
}

fn connection_label(status: ConnectionStatus) -> &'static str {
	match status.state {
		ConnectionState::Connecting => "connecting",
		ConnectionState::Open => "open",
		ConnectionState::Closed => "closed",
	}
}

/// Renders the stats line. `chars` is the length of the current input, which
/// can run ahead of the snapshot `stream` was tokenized from.
pub fn render_stats(stream: &TokenStream, chars: usize, vocab: VocabCount, status: ConnectionStatus) -> String {
	format!(
		"tokens: {}  characters: {}  unknown: {}  {}  connection: {} (#{})",
		stream.len().to_formatted_string(&Locale::en),
		chars.to_formatted_string(&Locale::en),
		stream.unknown_count(),
		render_vocab(vocab),
		connection_label(status),
		status.generation,
	)
}
