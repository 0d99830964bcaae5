//! Shared wire types for the tokenizer sync protocol.
//!
//! This crate defines the data model exchanged between the sync client and the
//! tokenization service: text snapshots, tokens, token streams and vocabulary
//! counts, plus the JSON frames carried on the tokenization channel and the
//! bodies of the two HTTP endpoints.

#![warn(missing_docs)]

pub mod frame;
pub mod types;

pub use frame::{InboundFrame, ScrapeRequest, TokenizeRequest, VocabSizeResponse};
pub use types::{DisplayClass, TextSnapshot, Token, TokenStream, UNKNOWN_TOKEN_ID, VocabCount};
