//! The byte-stream tokenizer.
//!
//! [`get_token`] scans exactly one lexeme: it classifies the byte at the
//! cursor through the encoding's class table and dispatches on the class,
//! never on the raw byte, so the hot switch stays a small fixed jump
//! table. It allocates nothing and reads nothing outside the given
//! buffer. [`Tokenizer`] drives it across a statement, skipping
//! whitespace and comments and applying the WINDOW/OVER/FILTER
//! keyword-vs-identifier analysis that needs neighboring tokens.

use memchr::memchr2;
use squill_error::SquillError;

use crate::charclass::{CharClass as C, TextEncoding};
use crate::token::{keyword_code, LexError, Token, TokenKind};

/// Scan the single lexeme starting at `offset`.
///
/// Returns the token kind and lexeme length. Whitespace and comments come
/// back as [`TokenKind::Space`]; an embedded NUL and the end of the buffer
/// both come back as ([`TokenKind::Eof`], 0). Lexical errors are
/// [`TokenKind::Illegal`] tokens; scanning of the current lexeme stops,
/// and the caller decides whether to abort or resynchronize.
#[must_use]
pub fn get_token(enc: TextEncoding, src: &[u8], offset: usize) -> (TokenKind, usize) {
    let n = src.len();
    if offset >= n {
        return (TokenKind::Eof, 0);
    }
    let class_at = |i: usize| -> Option<C> { src.get(i).map(|&b| enc.class(b)) };

    match enc.class(src[offset]) {
        C::Space => {
            let mut i = offset + 1;
            while class_at(i) == Some(C::Space) {
                i += 1;
            }
            (TokenKind::Space, i - offset)
        }
        C::Minus => match class_at(offset + 1) {
            Some(C::Minus) => {
                // `--` comment, to end of line or statement.
                let mut i = offset + 2;
                while i < n && src[i] != enc.newline() && src[i] != 0 {
                    i += 1;
                }
                (TokenKind::Space, i - offset)
            }
            Some(C::Gt) => {
                if class_at(offset + 2) == Some(C::Gt) {
                    (TokenKind::DoubleArrow, 3)
                } else {
                    (TokenKind::Arrow, 2)
                }
            }
            _ => (TokenKind::Minus, 1),
        },
        C::Lp => (TokenKind::LeftParen, 1),
        C::Rp => (TokenKind::RightParen, 1),
        C::Semi => (TokenKind::Semicolon, 1),
        C::Plus => (TokenKind::Plus, 1),
        C::Star => (TokenKind::Star, 1),
        C::Percent => (TokenKind::Percent, 1),
        C::Comma => (TokenKind::Comma, 1),
        C::Amp => (TokenKind::BitAnd, 1),
        C::Tilde => (TokenKind::BitNot, 1),
        C::Slash => {
            if class_at(offset + 1) != Some(C::Star) {
                return (TokenKind::Slash, 1);
            }
            // `/* ... */` comment; an unterminated one is space to the end
            // of the input, not an error.
            let mut i = offset + 2;
            loop {
                if i >= n || src[i] == 0 {
                    return (TokenKind::Space, i - offset);
                }
                if enc.class(src[i]) == C::Star && class_at(i + 1) == Some(C::Slash) {
                    return (TokenKind::Space, i + 2 - offset);
                }
                i += 1;
            }
        }
        C::Eq => {
            if class_at(offset + 1) == Some(C::Eq) {
                (TokenKind::Eq, 2)
            } else {
                (TokenKind::Eq, 1)
            }
        }
        C::Lt => match class_at(offset + 1) {
            Some(C::Eq) => (TokenKind::Le, 2),
            Some(C::Gt) => (TokenKind::Ne, 2),
            Some(C::Lt) => (TokenKind::ShiftLeft, 2),
            _ => (TokenKind::Lt, 1),
        },
        C::Gt => match class_at(offset + 1) {
            Some(C::Eq) => (TokenKind::Ge, 2),
            Some(C::Gt) => (TokenKind::ShiftRight, 2),
            _ => (TokenKind::Gt, 1),
        },
        C::Bang => {
            if class_at(offset + 1) == Some(C::Eq) {
                (TokenKind::Ne, 2)
            } else {
                (TokenKind::Illegal(LexError::UnexpectedChar), 1)
            }
        }
        C::Pipe => {
            if class_at(offset + 1) == Some(C::Pipe) {
                (TokenKind::Concat, 2)
            } else {
                (TokenKind::BitOr, 1)
            }
        }
        C::Quote => scan_quoted(enc, src, offset),
        C::Quote2 => {
            // `[name]`: balanced terminator, no escape doubling.
            match memchr2(enc.bracket_close(), 0, &src[offset + 1..]) {
                Some(p) if src[offset + 1 + p] == enc.bracket_close() => {
                    (TokenKind::QuotedId, p + 2)
                }
                Some(p) => (TokenKind::Illegal(LexError::UnterminatedBracket), p + 1),
                None => (TokenKind::Illegal(LexError::UnterminatedBracket), n - offset),
            }
        }
        C::VarNum => {
            // `?` with optional trailing digits.
            let mut i = offset + 1;
            while class_at(i) == Some(C::Digit) {
                i += 1;
            }
            (TokenKind::Variable, i - offset)
        }
        C::Dollar | C::VarAlpha => {
            let mut i = offset + 1;
            while let Some(c) = class_at(i) {
                if !enc.is_id_class(c) {
                    break;
                }
                i += 1;
            }
            if i == offset + 1 {
                (TokenKind::Illegal(LexError::MalformedVariable), 1)
            } else {
                (TokenKind::Variable, i - offset)
            }
        }
        C::Digit => scan_number(enc, src, offset),
        C::Dot => {
            if class_at(offset + 1) == Some(C::Digit) {
                scan_number(enc, src, offset)
            } else {
                (TokenKind::Dot, 1)
            }
        }
        C::X => {
            if src.get(offset + 1) == Some(&enc.single_quote()) {
                scan_blob(enc, src, offset)
            } else {
                // No keyword starts with x; plain identifier.
                scan_identifier(enc, src, offset)
            }
        }
        C::Kywd0 => {
            let mut i = offset + 1;
            while matches!(class_at(i), Some(C::X | C::Kywd0 | C::Kywd)) {
                i += 1;
            }
            if class_at(i).is_some_and(|c| enc.is_id_class(c)) {
                // A character usable in identifiers but not in keywords;
                // the whole run is an identifier.
                return scan_identifier(enc, src, offset);
            }
            match keyword_code(&src[offset..i], enc) {
                Some(kw) => (kw, i - offset),
                None => (TokenKind::Id, i - offset),
            }
        }
        C::Kywd | C::Id => scan_identifier(enc, src, offset),
        C::Bom => {
            if src.get(offset + 1) == Some(&0xBB) && src.get(offset + 2) == Some(&0xBF) {
                (TokenKind::Space, 3)
            } else {
                scan_identifier(enc, src, offset)
            }
        }
        C::Illegal => (TokenKind::Illegal(LexError::UnexpectedChar), 1),
        C::Nul => (TokenKind::Eof, 0),
    }
}

fn scan_identifier(enc: TextEncoding, src: &[u8], offset: usize) -> (TokenKind, usize) {
    let mut i = offset + 1;
    while let Some(&b) = src.get(i) {
        if !enc.is_id_class(enc.class(b)) {
            break;
        }
        i += 1;
    }
    (TokenKind::Id, i - offset)
}

/// Quoted run with doubled-quote escapes: `'it''s'`, `"na""me"`,
/// `` `q` ``. Single quotes make strings, the others quoted identifiers.
fn scan_quoted(enc: TextEncoding, src: &[u8], offset: usize) -> (TokenKind, usize) {
    let n = src.len();
    let delim = src[offset];
    let mut i = offset + 1;
    loop {
        match memchr2(delim, 0, &src[i..]) {
            Some(p) if src[i + p] == delim => {
                let at = i + p;
                if src.get(at + 1) == Some(&delim) {
                    // Doubled quote: a literal quote, not a terminator.
                    i = at + 2;
                    continue;
                }
                let kind = if delim == enc.single_quote() {
                    TokenKind::String
                } else {
                    TokenKind::QuotedId
                };
                return (kind, at + 1 - offset);
            }
            // An embedded NUL ends the statement text; the run never
            // closed either way.
            Some(p) => return (TokenKind::Illegal(LexError::UnterminatedString), i + p - offset),
            None => return (TokenKind::Illegal(LexError::UnterminatedString), n - offset),
        }
    }
}

/// Numeric literal. The scanner decides integer-vs-float purely from the
/// shape (a dot or an exponent makes it a float) and leaves value
/// parsing to later phases. A trailing identifier character poisons the
/// whole lexeme.
fn scan_number(enc: TextEncoding, src: &[u8], offset: usize) -> (TokenKind, usize) {
    let n = src.len();
    let class_at = |i: usize| -> Option<C> { src.get(i).map(|&b| enc.class(b)) };
    let mut i = offset;
    let mut kind = TokenKind::Integer;

    if src[i] == b'0'
        && src.get(i + 1).is_some_and(|&b| enc.fold(b) == b'x')
        && src.get(i + 2).is_some_and(|&b| enc.is_hex_digit(b))
    {
        i += 3;
        while i < n && enc.is_hex_digit(src[i]) {
            i += 1;
        }
    } else {
        while class_at(i) == Some(C::Digit) {
            i += 1;
        }
        if class_at(i) == Some(C::Dot) {
            kind = TokenKind::Float;
            i += 1;
            while class_at(i) == Some(C::Digit) {
                i += 1;
            }
        }
        if src.get(i).is_some_and(|&b| enc.fold(b) == b'e') {
            if class_at(i + 1) == Some(C::Digit) {
                kind = TokenKind::Float;
                i += 2;
            } else if matches!(class_at(i + 1), Some(C::Plus | C::Minus))
                && class_at(i + 2) == Some(C::Digit)
            {
                kind = TokenKind::Float;
                i += 3;
            }
            if kind == TokenKind::Float {
                while class_at(i) == Some(C::Digit) {
                    i += 1;
                }
            }
        }
    }

    let mut trailing = false;
    while let Some(c) = class_at(i) {
        if !enc.is_id_class(c) {
            break;
        }
        trailing = true;
        i += 1;
    }
    if trailing {
        kind = TokenKind::Illegal(LexError::MalformedNumber);
    }
    (kind, i - offset)
}

/// `X'...'` blob literal: an even run of hex digits between the quotes.
fn scan_blob(enc: TextEncoding, src: &[u8], offset: usize) -> (TokenKind, usize) {
    let n = src.len();
    let quote = enc.single_quote();
    let mut i = offset + 2;
    let mut bad = false;
    while i < n && src[i] != 0 {
        if src[i] == quote {
            let digits = i - (offset + 2);
            if bad || digits % 2 != 0 {
                return (TokenKind::Illegal(LexError::MalformedBlob), i + 1 - offset);
            }
            return (TokenKind::Blob, i + 1 - offset);
        }
        if !enc.is_hex_digit(src[i]) {
            bad = true;
        }
        i += 1;
    }
    (TokenKind::Illegal(LexError::MalformedBlob), i - offset)
}

// ---------------------------------------------------------------------------
// Contextual keyword analysis
// ---------------------------------------------------------------------------

/// Advance to the next non-space lexeme and fold every identifier-like
/// kind (plain and quoted identifiers, strings, join keywords, and the
/// non-reserved fallback keywords) to [`TokenKind::Id`].
fn next_significant(enc: TextEncoding, src: &[u8], mut pos: usize) -> (TokenKind, usize) {
    loop {
        let (kind, len) = get_token(enc, src, pos);
        pos += len;
        if kind == TokenKind::Space {
            continue;
        }
        let folded = match kind {
            TokenKind::QuotedId | TokenKind::String => TokenKind::Id,
            TokenKind::KwWindow | TokenKind::KwOver => TokenKind::Id,
            k if k.is_join_keyword() || k.falls_back_to_id() => TokenKind::Id,
            k => k,
        };
        return (folded, pos);
    }
}

/// `WINDOW` names a window only when the next token can be an identifier
/// and the one after that is `AS`; otherwise it is an identifier itself.
#[must_use]
pub fn analyze_window_keyword(enc: TextEncoding, src: &[u8], after: usize) -> TokenKind {
    let (t1, p1) = next_significant(enc, src, after);
    if t1 != TokenKind::Id {
        return TokenKind::Id;
    }
    let (t2, _) = next_significant(enc, src, p1);
    if t2 == TokenKind::KwAs {
        TokenKind::KwWindow
    } else {
        TokenKind::Id
    }
}

/// `OVER` marks an OVER clause only when the previous token was `)` and
/// the next is `(` or an identifier.
#[must_use]
pub fn analyze_over_keyword(
    enc: TextEncoding,
    src: &[u8],
    after: usize,
    last: TokenKind,
) -> TokenKind {
    if last == TokenKind::RightParen {
        let (t, _) = next_significant(enc, src, after);
        if t == TokenKind::LeftParen || t == TokenKind::Id {
            return TokenKind::KwOver;
        }
    }
    TokenKind::Id
}

/// `FILTER` starts a filter clause only when the previous token was `)`
/// and the next is `(`.
#[must_use]
pub fn analyze_filter_keyword(
    enc: TextEncoding,
    src: &[u8],
    after: usize,
    last: TokenKind,
) -> TokenKind {
    if last == TokenKind::RightParen {
        let (t, _) = next_significant(enc, src, after);
        if t == TokenKind::LeftParen {
            return TokenKind::KwFilter;
        }
    }
    TokenKind::Id
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Drives [`get_token`] over one statement.
///
/// Skips whitespace and comments transparently, applies the contextual
/// WINDOW/OVER/FILTER reclassification, and hands out non-owning
/// [`Token`]s. The caller's buffer outlives every token.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    src: &'a [u8],
    pos: usize,
    enc: TextEncoding,
    last: TokenKind,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer over UTF-8/ASCII text.
    #[must_use]
    pub fn new(src: &'a [u8]) -> Self {
        Self::with_encoding(src, TextEncoding::Ascii)
    }

    /// Tokenizer with an explicit class table. The table is fixed for the
    /// life of the instance.
    #[must_use]
    pub fn with_encoding(src: &'a [u8], enc: TextEncoding) -> Self {
        Self {
            src,
            pos: 0,
            enc,
            last: TokenKind::Eof,
        }
    }

    /// The encoding this instance scans with.
    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.enc
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Produce the next token, skipping whitespace and comments. At the
    /// end of input (or an embedded NUL) every further call returns an
    /// [`TokenKind::Eof`] token.
    pub fn next_token(&mut self) -> Token {
        loop {
            let start = self.pos;
            let (kind, len) = get_token(self.enc, self.src, start);
            self.pos += len;
            if kind == TokenKind::Space {
                continue;
            }
            let kind = match kind {
                TokenKind::KwWindow => analyze_window_keyword(self.enc, self.src, self.pos),
                TokenKind::KwOver => {
                    analyze_over_keyword(self.enc, self.src, self.pos, self.last)
                }
                TokenKind::KwFilter => {
                    analyze_filter_keyword(self.enc, self.src, self.pos, self.last)
                }
                k => k,
            };
            if let TokenKind::Illegal(reason) = kind {
                tracing::debug!(offset = start, %reason, "lexical error");
            }
            self.last = kind;
            return Token {
                kind,
                offset: start as u32,
                len: len as u32,
            };
        }
    }

    /// The lexical error behind an [`TokenKind::Illegal`] token, with the
    /// offset a caller should point a caret at: the offending byte, or
    /// end-of-input for unterminated literals.
    #[must_use]
    pub fn error_for(&self, token: &Token) -> Option<SquillError> {
        match token.kind {
            TokenKind::Illegal(reason) => Some(SquillError::Lexical {
                offset: match reason {
                    LexError::UnterminatedString | LexError::UnterminatedBracket => {
                        token.span().end as usize
                    }
                    _ => token.offset as usize,
                },
                detail: reason.to_string(),
            }),
            _ => None,
        }
    }

    /// Tokenize a whole buffer, Eof token included.
    #[must_use]
    pub fn tokenize(src: &'a [u8]) -> Vec<Token> {
        let mut tokenizer = Self::new(src);
        let mut tokens = Vec::new();
        loop {
            let tok = tokenizer.next_token();
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }
}
