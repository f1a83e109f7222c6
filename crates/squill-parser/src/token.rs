//! Token types and the static keyword table.
//!
//! A token is a non-owning view into the caller's source buffer: kind plus
//! byte offset and length. The text of a lexeme is re-borrowed from the
//! buffer on demand and never copied. Keywords are their own variants for
//! O(1) matching in the parser-action layer.

use squill_ast::Span;

use crate::charclass::TextEncoding;

/// Why a lexeme was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// A byte classified as illegal.
    UnexpectedChar,
    /// A quoted run that never found its closing quote.
    UnterminatedString,
    /// A `[...]` identifier that never found its `]`.
    UnterminatedBracket,
    /// Digits followed by identifier characters, an empty hex literal,
    /// or a broken exponent.
    MalformedNumber,
    /// A blob literal with non-hex content or an odd digit count.
    MalformedBlob,
    /// A variable prefix with no name after it.
    MalformedVariable,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnexpectedChar => "unrecognized character",
            Self::UnterminatedString => "unterminated string literal",
            Self::UnterminatedBracket => "unterminated bracket identifier",
            Self::MalformedNumber => "malformed numeric literal",
            Self::MalformedBlob => "malformed blob literal",
            Self::MalformedVariable => "malformed parameter name",
        })
    }
}

/// A single token: a typed, non-owning view into the source text.
///
/// The token's lifetime contract is the source buffer's: it stores offsets
/// only, so it is `Copy` and never outlives anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the lexeme's first byte.
    pub offset: u32,
    /// Length of the lexeme in bytes.
    pub len: u32,
}

impl Token {
    /// The lexeme's bytes, re-borrowed from the source buffer.
    #[must_use]
    pub fn text<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        &src[self.offset as usize..(self.offset + self.len) as usize]
    }

    /// The lexeme's span.
    #[must_use]
    pub const fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.len)
    }
}

/// Token discriminant.
///
/// Organized by category: literals, identifiers, variables, operators,
/// punctuation, keywords, and specials. Carries no text; the lexeme
/// lives in the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // === Literals ===
    /// Integer literal: `42`, `0xFF`.
    Integer,
    /// Float literal: `3.14`, `1e10`, `.5`.
    Float,
    /// String literal: `'hello'`.
    String,
    /// Blob literal: `X'CAFE'`.
    Blob,

    // === Identifiers ===
    /// Unquoted identifier.
    Id,
    /// Quoted identifier: `"name"`, `` `name` ``, `[name]`. The quote
    /// style is recoverable from the lexeme's first byte.
    QuotedId,

    // === Variables ===
    /// Bind parameter: `?`, `?NNN`, `:name`, `@name`, `$name`, `#name`.
    Variable,

    // === Operators ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    BitAnd,
    BitOr,
    BitNot,
    ShiftLeft,
    ShiftRight,
    /// `=` or `==`.
    Eq,
    /// `!=` or `<>`.
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `||`.
    Concat,
    /// `->`.
    Arrow,
    /// `->>`.
    DoubleArrow,

    // === Punctuation ===
    Dot,
    Comma,
    Semicolon,
    LeftParen,
    RightParen,

    // === Keywords ===
    KwAbort,
    KwAction,
    KwAdd,
    KwAfter,
    KwAll,
    KwAlter,
    KwAlways,
    KwAnalyze,
    KwAnd,
    KwAs,
    KwAsc,
    KwAttach,
    KwAutoincrement,
    KwBefore,
    KwBegin,
    KwBetween,
    KwBy,
    KwCascade,
    KwCase,
    KwCast,
    KwCheck,
    KwCollate,
    KwColumn,
    KwCommit,
    KwConflict,
    KwConstraint,
    KwCreate,
    KwCross,
    KwCurrentDate,
    KwCurrentTime,
    KwCurrentTimestamp,
    KwDatabase,
    KwDefault,
    KwDeferrable,
    KwDeferred,
    KwDelete,
    KwDesc,
    KwDetach,
    KwDistinct,
    KwDo,
    KwDrop,
    KwEach,
    KwElse,
    KwEnd,
    KwEscape,
    KwExcept,
    KwExclude,
    KwExclusive,
    KwExists,
    KwExplain,
    KwFail,
    KwFalse,
    KwFilter,
    KwFirst,
    KwFollowing,
    KwFor,
    KwForeign,
    KwFrom,
    KwFull,
    KwGenerated,
    KwGlob,
    KwGroup,
    KwGroups,
    KwHaving,
    KwIf,
    KwIgnore,
    KwImmediate,
    KwIn,
    KwIndex,
    KwIndexed,
    KwInitially,
    KwInner,
    KwInsert,
    KwInstead,
    KwIntersect,
    KwInto,
    KwIs,
    KwIsnull,
    KwJoin,
    KwKey,
    KwLast,
    KwLeft,
    KwLike,
    KwLimit,
    KwMatch,
    KwMaterialized,
    KwNatural,
    KwNo,
    KwNot,
    KwNothing,
    KwNotnull,
    KwNull,
    KwNulls,
    KwOf,
    KwOffset,
    KwOn,
    KwOr,
    KwOrder,
    KwOthers,
    KwOuter,
    KwOver,
    KwPartition,
    KwPlan,
    KwPragma,
    KwPreceding,
    KwPrimary,
    KwQuery,
    KwRaise,
    KwRange,
    KwRecursive,
    KwReferences,
    KwRegexp,
    KwReindex,
    KwRelease,
    KwRename,
    KwReplace,
    KwRestrict,
    KwReturning,
    KwRight,
    KwRollback,
    KwRow,
    KwRows,
    KwSavepoint,
    KwSelect,
    KwSet,
    KwStored,
    KwStrict,
    KwTable,
    KwTemp,
    KwTemporary,
    KwThen,
    KwTies,
    KwTo,
    KwTransaction,
    KwTrigger,
    KwTrue,
    KwUnbounded,
    KwUnion,
    KwUnique,
    KwUpdate,
    KwUsing,
    KwVacuum,
    KwValues,
    KwView,
    KwVirtual,
    KwWhen,
    KwWhere,
    KwWindow,
    KwWith,
    KwWithout,

    // === Special ===
    /// A run of whitespace or a comment. Produced by the raw scanner,
    /// skipped by the tokenizer.
    Space,
    /// End of input (or an embedded NUL, which ends the statement text).
    Eof,
    /// Lexical error; the token's offset locates the problem.
    Illegal(LexError),
}

impl TokenKind {
    /// True for lexical-error tokens.
    #[must_use]
    pub const fn is_illegal(self) -> bool {
        matches!(self, Self::Illegal(_))
    }

    /// True for the join-operator keywords that the grammar also accepts
    /// as identifiers.
    #[must_use]
    pub const fn is_join_keyword(self) -> bool {
        matches!(
            self,
            Self::KwCross
                | Self::KwFull
                | Self::KwInner
                | Self::KwLeft
                | Self::KwNatural
                | Self::KwOuter
                | Self::KwRight
        )
    }

    /// True for non-reserved keywords: anywhere the grammar wants an
    /// identifier, these act as one.
    #[must_use]
    pub const fn falls_back_to_id(self) -> bool {
        matches!(
            self,
            Self::KwAbort
                | Self::KwAction
                | Self::KwAfter
                | Self::KwAlways
                | Self::KwAnalyze
                | Self::KwAsc
                | Self::KwAttach
                | Self::KwBefore
                | Self::KwBegin
                | Self::KwBy
                | Self::KwCascade
                | Self::KwCast
                | Self::KwColumn
                | Self::KwConflict
                | Self::KwDatabase
                | Self::KwDeferred
                | Self::KwDesc
                | Self::KwDetach
                | Self::KwDo
                | Self::KwEach
                | Self::KwEnd
                | Self::KwExclude
                | Self::KwExclusive
                | Self::KwExplain
                | Self::KwFail
                | Self::KwFirst
                | Self::KwFollowing
                | Self::KwFor
                | Self::KwGenerated
                | Self::KwGlob
                | Self::KwGroups
                | Self::KwIf
                | Self::KwIgnore
                | Self::KwImmediate
                | Self::KwInitially
                | Self::KwInstead
                | Self::KwKey
                | Self::KwLast
                | Self::KwLike
                | Self::KwMatch
                | Self::KwMaterialized
                | Self::KwNo
                | Self::KwNulls
                | Self::KwOf
                | Self::KwOffset
                | Self::KwOthers
                | Self::KwPartition
                | Self::KwPlan
                | Self::KwPragma
                | Self::KwPreceding
                | Self::KwQuery
                | Self::KwRaise
                | Self::KwRange
                | Self::KwRecursive
                | Self::KwRegexp
                | Self::KwReindex
                | Self::KwRelease
                | Self::KwRename
                | Self::KwReplace
                | Self::KwRestrict
                | Self::KwRow
                | Self::KwRows
                | Self::KwTies
                | Self::KwTrigger
                | Self::KwUnbounded
                | Self::KwVacuum
                | Self::KwView
                | Self::KwVirtual
                | Self::KwWith
                | Self::KwWithout
        )
    }

    /// True if this keyword can start a statement. Used as a resync point
    /// by error-recovering consumers.
    #[must_use]
    pub const fn is_statement_start(self) -> bool {
        matches!(
            self,
            Self::KwSelect
                | Self::KwInsert
                | Self::KwUpdate
                | Self::KwDelete
                | Self::KwCreate
                | Self::KwDrop
                | Self::KwAlter
                | Self::KwBegin
                | Self::KwCommit
                | Self::KwRollback
                | Self::KwSavepoint
                | Self::KwRelease
                | Self::KwAttach
                | Self::KwDetach
                | Self::KwPragma
                | Self::KwVacuum
                | Self::KwReindex
                | Self::KwAnalyze
                | Self::KwExplain
                | Self::KwWith
                | Self::KwReplace
                | Self::KwValues
        )
    }
}

/// Longest keyword, `current_timestamp`.
const MAX_KEYWORD_LEN: usize = 17;

/// The static keyword table, sorted by name for binary search. Built once,
/// read-only for the process lifetime.
static KEYWORDS: [(&str, TokenKind); 150] = [
    ("abort", TokenKind::KwAbort),
    ("action", TokenKind::KwAction),
    ("add", TokenKind::KwAdd),
    ("after", TokenKind::KwAfter),
    ("all", TokenKind::KwAll),
    ("alter", TokenKind::KwAlter),
    ("always", TokenKind::KwAlways),
    ("analyze", TokenKind::KwAnalyze),
    ("and", TokenKind::KwAnd),
    ("as", TokenKind::KwAs),
    ("asc", TokenKind::KwAsc),
    ("attach", TokenKind::KwAttach),
    ("autoincrement", TokenKind::KwAutoincrement),
    ("before", TokenKind::KwBefore),
    ("begin", TokenKind::KwBegin),
    ("between", TokenKind::KwBetween),
    ("by", TokenKind::KwBy),
    ("cascade", TokenKind::KwCascade),
    ("case", TokenKind::KwCase),
    ("cast", TokenKind::KwCast),
    ("check", TokenKind::KwCheck),
    ("collate", TokenKind::KwCollate),
    ("column", TokenKind::KwColumn),
    ("commit", TokenKind::KwCommit),
    ("conflict", TokenKind::KwConflict),
    ("constraint", TokenKind::KwConstraint),
    ("create", TokenKind::KwCreate),
    ("cross", TokenKind::KwCross),
    ("current_date", TokenKind::KwCurrentDate),
    ("current_time", TokenKind::KwCurrentTime),
    ("current_timestamp", TokenKind::KwCurrentTimestamp),
    ("database", TokenKind::KwDatabase),
    ("default", TokenKind::KwDefault),
    ("deferrable", TokenKind::KwDeferrable),
    ("deferred", TokenKind::KwDeferred),
    ("delete", TokenKind::KwDelete),
    ("desc", TokenKind::KwDesc),
    ("detach", TokenKind::KwDetach),
    ("distinct", TokenKind::KwDistinct),
    ("do", TokenKind::KwDo),
    ("drop", TokenKind::KwDrop),
    ("each", TokenKind::KwEach),
    ("else", TokenKind::KwElse),
    ("end", TokenKind::KwEnd),
    ("escape", TokenKind::KwEscape),
    ("except", TokenKind::KwExcept),
    ("exclude", TokenKind::KwExclude),
    ("exclusive", TokenKind::KwExclusive),
    ("exists", TokenKind::KwExists),
    ("explain", TokenKind::KwExplain),
    ("fail", TokenKind::KwFail),
    ("false", TokenKind::KwFalse),
    ("filter", TokenKind::KwFilter),
    ("first", TokenKind::KwFirst),
    ("following", TokenKind::KwFollowing),
    ("for", TokenKind::KwFor),
    ("foreign", TokenKind::KwForeign),
    ("from", TokenKind::KwFrom),
    ("full", TokenKind::KwFull),
    ("generated", TokenKind::KwGenerated),
    ("glob", TokenKind::KwGlob),
    ("group", TokenKind::KwGroup),
    ("groups", TokenKind::KwGroups),
    ("having", TokenKind::KwHaving),
    ("if", TokenKind::KwIf),
    ("ignore", TokenKind::KwIgnore),
    ("immediate", TokenKind::KwImmediate),
    ("in", TokenKind::KwIn),
    ("index", TokenKind::KwIndex),
    ("indexed", TokenKind::KwIndexed),
    ("initially", TokenKind::KwInitially),
    ("inner", TokenKind::KwInner),
    ("insert", TokenKind::KwInsert),
    ("instead", TokenKind::KwInstead),
    ("intersect", TokenKind::KwIntersect),
    ("into", TokenKind::KwInto),
    ("is", TokenKind::KwIs),
    ("isnull", TokenKind::KwIsnull),
    ("join", TokenKind::KwJoin),
    ("key", TokenKind::KwKey),
    ("last", TokenKind::KwLast),
    ("left", TokenKind::KwLeft),
    ("like", TokenKind::KwLike),
    ("limit", TokenKind::KwLimit),
    ("match", TokenKind::KwMatch),
    ("materialized", TokenKind::KwMaterialized),
    ("natural", TokenKind::KwNatural),
    ("no", TokenKind::KwNo),
    ("not", TokenKind::KwNot),
    ("nothing", TokenKind::KwNothing),
    ("notnull", TokenKind::KwNotnull),
    ("null", TokenKind::KwNull),
    ("nulls", TokenKind::KwNulls),
    ("of", TokenKind::KwOf),
    ("offset", TokenKind::KwOffset),
    ("on", TokenKind::KwOn),
    ("or", TokenKind::KwOr),
    ("order", TokenKind::KwOrder),
    ("others", TokenKind::KwOthers),
    ("outer", TokenKind::KwOuter),
    ("over", TokenKind::KwOver),
    ("partition", TokenKind::KwPartition),
    ("plan", TokenKind::KwPlan),
    ("pragma", TokenKind::KwPragma),
    ("preceding", TokenKind::KwPreceding),
    ("primary", TokenKind::KwPrimary),
    ("query", TokenKind::KwQuery),
    ("raise", TokenKind::KwRaise),
    ("range", TokenKind::KwRange),
    ("recursive", TokenKind::KwRecursive),
    ("references", TokenKind::KwReferences),
    ("regexp", TokenKind::KwRegexp),
    ("reindex", TokenKind::KwReindex),
    ("release", TokenKind::KwRelease),
    ("rename", TokenKind::KwRename),
    ("replace", TokenKind::KwReplace),
    ("restrict", TokenKind::KwRestrict),
    ("returning", TokenKind::KwReturning),
    ("right", TokenKind::KwRight),
    ("rollback", TokenKind::KwRollback),
    ("row", TokenKind::KwRow),
    ("rows", TokenKind::KwRows),
    ("savepoint", TokenKind::KwSavepoint),
    ("select", TokenKind::KwSelect),
    ("set", TokenKind::KwSet),
    ("stored", TokenKind::KwStored),
    ("strict", TokenKind::KwStrict),
    ("table", TokenKind::KwTable),
    ("temp", TokenKind::KwTemp),
    ("temporary", TokenKind::KwTemporary),
    ("then", TokenKind::KwThen),
    ("ties", TokenKind::KwTies),
    ("to", TokenKind::KwTo),
    ("transaction", TokenKind::KwTransaction),
    ("trigger", TokenKind::KwTrigger),
    ("true", TokenKind::KwTrue),
    ("unbounded", TokenKind::KwUnbounded),
    ("union", TokenKind::KwUnion),
    ("unique", TokenKind::KwUnique),
    ("update", TokenKind::KwUpdate),
    ("using", TokenKind::KwUsing),
    ("vacuum", TokenKind::KwVacuum),
    ("values", TokenKind::KwValues),
    ("view", TokenKind::KwView),
    ("virtual", TokenKind::KwVirtual),
    ("when", TokenKind::KwWhen),
    ("where", TokenKind::KwWhere),
    ("window", TokenKind::KwWindow),
    ("with", TokenKind::KwWith),
    ("without", TokenKind::KwWithout),
];

/// Look up an identifier lexeme in the keyword table.
///
/// Exact case-insensitive match over ASCII letters only; `selectx` never
/// matches `SELECT`. Folds into a stack buffer, so no allocation.
#[must_use]
pub fn keyword_code(lexeme: &[u8], enc: TextEncoding) -> Option<TokenKind> {
    if lexeme.len() < 2 || lexeme.len() > MAX_KEYWORD_LEN {
        return None;
    }
    let mut buf = [0u8; MAX_KEYWORD_LEN];
    for (dst, &b) in buf.iter_mut().zip(lexeme) {
        *dst = enc.fold(b);
    }
    let folded = &buf[..lexeme.len()];
    KEYWORDS
        .binary_search_by(|(name, _)| name.as_bytes().cmp(folded))
        .ok()
        .map(|i| KEYWORDS[i].1)
}
