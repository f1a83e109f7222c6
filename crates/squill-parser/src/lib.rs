//! Byte-stream SQL tokenizer for squill.
//!
//! Splits statement text into typed, non-owning tokens: a 256-entry
//! character-class table drives a per-class scanner, a static table
//! resolves keywords, and a bounded lookahead/lookbehind pass settles the
//! WINDOW/OVER/FILTER keyword-vs-identifier ambiguity. The parser-action
//! layer consumes the token stream and builds `squill-ast` nodes.

pub mod charclass;
pub mod token;
pub mod tokenizer;

pub use charclass::{CharClass, TextEncoding};
pub use token::{keyword_code, LexError, Token, TokenKind};
pub use tokenizer::{get_token, Tokenizer};
