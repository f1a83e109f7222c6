//! Error types for the squill SQL front end.
//!
//! Two of the three failure families from the front-end contract are error
//! values: lexical errors (carrying the exact byte offset so callers can
//! render a caret) and construction failures (resource limits hit while
//! building the AST). The third family, contract violations such as
//! reading a field that a node's completeness level does not carry, or
//! attaching both ON and USING to one join term, is a programming error
//! in the consumer and fails fast with a panic instead of surfacing here.

use thiserror::Error;

/// Primary error type for tokenizing and AST construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SquillError {
    /// The tokenizer hit an illegal byte or an unterminated literal.
    ///
    /// `offset` is the exact byte position a caller should point at; for
    /// unterminated literals that is end-of-input.
    #[error("lexical error at offset {offset}: {detail}")]
    Lexical { offset: usize, detail: String },

    /// An expression tree grew past the configured depth limit.
    #[error("expression tree too deep (max {max})")]
    ExpressionTooDeep { max: usize },

    /// A list outgrew its configured limit.
    #[error("too many {what}: {count} (max {max})")]
    TooManyTerms {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// A constructor could not complete for lack of resources.
    ///
    /// No partial state survives: anything allocated by the failed call is
    /// released before this is returned.
    #[error("out of resources: {what}")]
    OutOfResources { what: &'static str },
}

/// Result alias used across the front-end crates.
pub type Result<T> = std::result::Result<T, SquillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = SquillError::Lexical {
            offset: 12,
            detail: "unterminated string literal".to_owned(),
        };
        assert_eq!(
            e.to_string(),
            "lexical error at offset 12: unterminated string literal"
        );

        let e = SquillError::ExpressionTooDeep { max: 1000 };
        assert_eq!(e.to_string(), "expression tree too deep (max 1000)");
    }
}
