//! Small value types shared by every phase of the squill SQL front end.
//!
//! The tokenizer and AST crates both depend on these: the logarithmic
//! row/cost estimate codec ([`LogEst`]), the bounded column-usage set
//! ([`Bitmask`]), and the id newtypes that AST nodes use to refer to
//! cursors, columns, catalog tables, and SELECT blocks without holding
//! references into anything.

pub mod bitmask;
pub mod logest;

pub use bitmask::Bitmask;
pub use logest::LogEst;

use std::fmt;

/// A VDBE-style cursor number identifying one open table or index scan
/// within a single compilation.
///
/// Cursor numbers are allocated monotonically by the parse context and are
/// meaningless outside the compilation that issued them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct CursorId(pub i32);

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// A 0-based column position within a table or index.
///
/// `-1` denotes the implicit rowid, matching the convention used by the
/// column-reference expression node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ColumnIdx(pub i16);

impl ColumnIdx {
    /// The implicit rowid pseudo-column.
    pub const ROWID: Self = Self(-1);

    /// True if this index names the rowid rather than a declared column.
    #[inline]
    #[must_use]
    pub const fn is_rowid(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ColumnIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rowid() {
            f.write_str("rowid")
        } else {
            write!(f, "col#{}", self.0)
        }
    }
}

/// Unique identifier of one SELECT block within a compilation.
///
/// Assigned monotonically at construction time and never reused; exists for
/// diagnostics and for back-references from side tables (aggregate info).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct SelectId(pub u32);

impl fmt::Display for SelectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select#{}", self.0)
    }
}

/// Stable key of a table description in the externally owned catalog.
///
/// AST nodes store this key instead of a reference so that the lifetime of
/// a parsed statement is decoupled from the lifetime of schema objects.
/// Resolution happens through the AST crate's catalog map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// 1-based number of a bind parameter (`?`, `?NNN`, `:name`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct VariableId(pub u16);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}
