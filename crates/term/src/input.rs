//! Line commands read from stdin.

use crate::cli::ViewMode;

/// Text loaded by `:example`.
pub const EXAMPLE_TEXT: &str = "The quick brown fox jumps over the lazy dog.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
	/// Replace the buffer with this text.
	Text(String),
	/// Empty the buffer.
	Clear,
	/// Load [`EXAMPLE_TEXT`].
	Example,
	/// Ask the service to learn from a page.
	Scrape(String),
	/// Switch the token view.
	View(ViewMode),
	/// Print counts and connection state.
	Stats,
	/// Print command help.
	Help,
	/// Stop and exit.
	Quit,
}

/// Rejected command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
	#[error("unknown command :{0} (try :help)")]
	UnknownCommand(String),
	#[error(":scrape needs a url")]
	MissingUrl,
}

impl Input {
	/// Parses a line. Lines starting with `:` are commands, anything else is text.
	///
	/// A leading `::` escapes a literal colon.
	pub fn parse(line: &str) -> Result<Self, InputError> {
		let line = line.trim_end_matches(['\r', '\n']);
		if let Some(rest) = line.strip_prefix("::") {
			return Ok(Self::Text(format!(":{rest}")));
		}
		let Some(command) = line.strip_prefix(':') else {
			return Ok(Self::Text(line.to_string()));
		};

		let (name, arg) = match command.split_once(char::is_whitespace) {
			Some((name, arg)) => (name, arg.trim()),
			None => (command, ""),
		};
		match name {
			"clear" | "c" => Ok(Self::Clear),
			"example" => Ok(Self::Example),
			"scrape" | "learn" => {
				if arg.is_empty() {
					return Err(InputError::MissingUrl);
				}
				Ok(Self::Scrape(arg.to_string()))
			}
			"ids" => Ok(Self::View(ViewMode::Ids)),
			"text" => Ok(Self::View(ViewMode::Text)),
			"stats" => Ok(Self::Stats),
			"help" | "h" => Ok(Self::Help),
			"quit" | "q" => Ok(Self::Quit),
			other => Err(InputError::UnknownCommand(other.to_string())),
		}
	}
}

/// Shown for `:help`.
pub const HELP: &str = "\
any text      tokenize it
:clear        empty the buffer
:example      load an example sentence
:scrape URL   learn new words from a page
:ids / :text  switch token view
:stats        token, character and vocabulary counts
::text        text starting with a colon
:quit         exit";
