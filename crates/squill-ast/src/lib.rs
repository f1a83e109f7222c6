//! SQL abstract syntax tree node types for squill.
//!
//! This crate defines the in-memory representation a parsed SQL statement
//! takes between parsing and code generation: expression nodes with their
//! three completeness levels, ordered expression lists, FROM-clause terms,
//! and the SELECT block with its compound-chain, CTE, and window-function
//! attachment points.
//!
//! Every entity built here is owned by the tree rooted at the statement
//! being compiled and is dropped with it. References into the schema
//! catalog are stable [`TableId`] keys resolved through an externally
//! owned [`catalog::Catalog`], never direct references, so statement
//! lifetime and schema lifetime stay decoupled.

pub mod catalog;
mod display;

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use squill_error::{Result, SquillError};
use squill_types::{Bitmask, ColumnIdx, CursorId, LogEst, SelectId, TableId, VariableId};

// ---------------------------------------------------------------------------
// Span: source location tracking
// ---------------------------------------------------------------------------

/// A byte-offset range into the original SQL source text.
///
/// Carried by tokens and attachable to expression nodes so error messages
/// and EXPLAIN-style output can point back at the exact source location.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first character (inclusive).
    pub start: u32,
    /// Byte offset one past the last character (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span from start (inclusive) to end (exclusive).
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-length span at position 0, used as a placeholder.
    pub const ZERO: Self = Self { start: 0, end: 0 };

    /// Merge two spans into one that covers both.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // String
    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,

    // JSON access
    Arrow,
    DoubleArrow,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "||",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Arrow => "->",
            Self::DoubleArrow => "->>",
        })
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Unary minus (`-expr`).
    Negate,
    /// Unary plus (`+expr`).
    Plus,
    /// Bitwise NOT (`~expr`).
    BitNot,
    /// Logical NOT (`NOT expr`).
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Negate => "-",
            Self::Plus => "+",
            Self::BitNot => "~",
            Self::Not => "NOT",
        })
    }
}

/// Sort direction for an ORDER BY or index term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// NULLS FIRST / NULLS LAST ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

// ---------------------------------------------------------------------------
// Expression nodes
// ---------------------------------------------------------------------------

/// The operator code tagging an expression node.
///
/// Together with [`ExprValue`] this is the part of a node that every
/// completeness level carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    /// The literal NULL.
    Null,
    /// Integer literal; small values live in [`ExprValue::Int`], oversized
    /// ones keep their text.
    Integer,
    /// Float literal; the text is kept verbatim, value parsing is a later
    /// concern.
    Float,
    /// String literal.
    String,
    /// Blob literal (hex text as written).
    Blob,
    /// `*` in a result list.
    Asterisk,
    /// A bind parameter.
    Variable,
    /// An unresolved identifier.
    Id,
    /// A resolved column reference.
    Column,
    /// A column reference routed through an aggregate accumulator.
    AggColumn,
    /// A unary operator application.
    Unary(UnaryOp),
    /// A binary operator application.
    Binary(BinaryOp),
    /// `expr IS [NOT] NULL`.
    IsNull { negated: bool },
    /// `expr [NOT] BETWEEN low AND high`; bounds live in the argument list.
    Between { negated: bool },
    /// `expr [NOT] IN (...)`; the right side is the list-XOR-select union.
    In { negated: bool },
    /// `[NOT] EXISTS (SELECT ...)`.
    Exists { negated: bool },
    /// A scalar subquery.
    ScalarSubquery,
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`; branches live in the
    /// argument list as alternating when/then entries, odd tail = ELSE.
    Case,
    /// A function invocation; the name is the node's text value.
    Function,
    /// An aggregate function invocation.
    AggFunction,
    /// `CAST(expr AS type)`; the type name is the node's text value.
    Cast,
    /// `expr COLLATE name`; the collation name is the node's text value.
    Collate,
}

/// The leaf payload of an expression node, valid at every completeness
/// level.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExprValue {
    /// No payload (operators, subqueries).
    #[default]
    None,
    /// A de-duplicated integer value, stored instead of the literal text.
    Int(i64),
    /// Literal or identifier text as written (dequoted by the parser).
    Text(String),
}

impl ExprValue {
    /// The integer payload, if this node carries one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The text payload, if this node carries one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// How much of an expression node is stored.
///
/// A node's level is fixed when the node is built and never raised
/// afterwards; [`Expr::dup_reduced`] is the only way to obtain the lower
/// levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Completeness {
    /// Operator and payload only: no children, no collection.
    LeafOnly,
    /// Children and the list-XOR-select union, but no metadata tail.
    Reduced,
    /// Everything, as produced by the constructors.
    Full,
}

/// The child pair plus the mutually exclusive collection union.
///
/// Present at [`Completeness::Reduced`] and above. The union member is
/// always stored out-of-line from the node regardless of level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Children {
    pub left: Option<Expr>,
    pub right: Option<Expr>,
    pub sub: Option<SubExpr>,
}

/// The collection union: an argument list or a subquery, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum SubExpr {
    /// Function arguments, IN-list members, CASE branches, BETWEEN bounds.
    List(ExprList),
    /// A sub-select (IN (SELECT ..), EXISTS, scalar subquery).
    Select(Box<Select>),
}

/// The metadata tail, present only at [`Completeness::Full`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprMeta {
    /// Height of the tree headed by this node.
    pub height: u32,
    /// Source location, if recorded.
    pub span: Span,
    /// Cursor of the table holding a referenced column.
    pub cursor: Option<CursorId>,
    /// Column index of a column reference (`-1` = rowid).
    pub column: Option<ColumnIdx>,
    /// Catalog key of the referenced table, for metadata lookup only.
    pub table: Option<TableId>,
    /// Bind parameter number.
    pub variable: Option<VariableId>,
    /// Index into the aggregate-info side table.
    pub agg: Option<AggRef>,
    /// Window definition for a window-function invocation.
    pub window: Option<Box<Window>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
enum Shape {
    #[default]
    LeafOnly,
    Reduced(Box<Children>),
    Full(Box<FullTail>),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FullTail {
    children: Children,
    meta: ExprMeta,
}

/// One node of a scalar expression tree.
///
/// Constructors always produce [`Completeness::Full`] nodes and are pure
/// builders: given valid operands they return a new owned node or fail,
/// releasing everything the failed call had consumed. Accessing a field a
/// node's level does not carry is a contract violation and panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Operator code.
    pub op: ExprOp,
    /// Leaf payload.
    pub value: ExprValue,
    shape: Shape,
}

impl Expr {
    fn full(op: ExprOp, value: ExprValue, children: Children, meta: ExprMeta) -> Self {
        Self {
            op,
            value,
            shape: Shape::Full(Box::new(FullTail { children, meta })),
        }
    }

    fn leaf(op: ExprOp, value: ExprValue) -> Self {
        Self::full(
            op,
            value,
            Children::default(),
            ExprMeta {
                height: 1,
                ..ExprMeta::default()
            },
        )
    }

    // -- leaf constructors --------------------------------------------------

    /// The literal NULL.
    #[must_use]
    pub fn null() -> Self {
        Self::leaf(ExprOp::Null, ExprValue::None)
    }

    /// An integer literal stored as a de-duplicated value.
    #[must_use]
    pub fn integer(v: i64) -> Self {
        Self::leaf(ExprOp::Integer, ExprValue::Int(v))
    }

    /// A literal that keeps its source text (oversized integers, floats,
    /// strings, blob hex).
    ///
    /// # Panics
    /// If `op` is not one of the literal operator codes.
    #[must_use]
    pub fn literal(op: ExprOp, text: impl Into<String>) -> Self {
        assert!(
            matches!(
                op,
                ExprOp::Integer | ExprOp::Float | ExprOp::String | ExprOp::Blob
            ),
            "literal() requires a literal operator code, got {op:?}"
        );
        Self::leaf(op, ExprValue::Text(text.into()))
    }

    /// An unresolved identifier.
    #[must_use]
    pub fn id(name: impl Into<String>) -> Self {
        Self::leaf(ExprOp::Id, ExprValue::Text(name.into()))
    }

    /// The `*` of `SELECT *`.
    #[must_use]
    pub fn asterisk() -> Self {
        Self::leaf(ExprOp::Asterisk, ExprValue::None)
    }

    /// A resolved column reference.
    ///
    /// Records the owning cursor and column index as given; the column
    /// index is never validated against the catalog here; that is the
    /// resolver's job.
    #[must_use]
    pub fn column(cursor: CursorId, column: ColumnIdx, table: Option<TableId>) -> Self {
        Self::full(
            ExprOp::Column,
            ExprValue::None,
            Children::default(),
            ExprMeta {
                height: 1,
                cursor: Some(cursor),
                column: Some(column),
                table,
                ..ExprMeta::default()
            },
        )
    }

    /// A bind parameter. `text` is the token as written, prefix included
    /// (`?`, `?7`, `:name`, `@name`, `$name`, `#name`); the parse context
    /// assigns or reuses its number.
    pub fn variable(pc: &mut ParseContext, text: &str) -> Result<Self> {
        let number = pc.variable_number(text)?;
        Ok(Self::full(
            ExprOp::Variable,
            ExprValue::Text(text.to_owned()),
            Children::default(),
            ExprMeta {
                height: 1,
                variable: Some(number),
                ..ExprMeta::default()
            },
        ))
    }

    // -- interior constructors ----------------------------------------------

    fn interior(
        pc: &ParseContext,
        op: ExprOp,
        value: ExprValue,
        children: Children,
    ) -> Result<Self> {
        let mut height: u32 = 0;
        if let Some(l) = &children.left {
            height = height.max(l.height());
        }
        if let Some(r) = &children.right {
            height = height.max(r.height());
        }
        if let Some(sub) = &children.sub {
            height = height.max(match sub {
                SubExpr::List(list) => list.height(),
                // A subquery's own expressions are depth-limited when they
                // are built; the wrapping node counts as one level here.
                SubExpr::Select(_) => 0,
            });
        }
        height += 1;
        if height as usize > pc.limits.max_expr_depth {
            tracing::error!(
                height,
                max = pc.limits.max_expr_depth,
                ?op,
                "expression tree exceeds depth limit"
            );
            return Err(SquillError::ExpressionTooDeep {
                max: pc.limits.max_expr_depth,
            });
        }
        Ok(Self::full(
            op,
            value,
            children,
            ExprMeta {
                height,
                ..ExprMeta::default()
            },
        ))
    }

    /// A unary operator application.
    pub fn unary(pc: &ParseContext, op: UnaryOp, operand: Self) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Unary(op),
            ExprValue::None,
            Children {
                left: Some(operand),
                ..Children::default()
            },
        )
    }

    /// A binary operator application.
    pub fn binary(pc: &ParseContext, op: BinaryOp, left: Self, right: Self) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Binary(op),
            ExprValue::None,
            Children {
                left: Some(left),
                right: Some(right),
                sub: None,
            },
        )
    }

    /// `operand IS [NOT] NULL`.
    pub fn is_null(pc: &ParseContext, operand: Self, negated: bool) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::IsNull { negated },
            ExprValue::None,
            Children {
                left: Some(operand),
                ..Children::default()
            },
        )
    }

    /// `operand [NOT] BETWEEN low AND high`. The bounds are stored as a
    /// two-entry argument list.
    pub fn between(
        pc: &ParseContext,
        operand: Self,
        low: Self,
        high: Self,
        negated: bool,
    ) -> Result<Self> {
        let bounds = ExprList::new().append(low).append(high);
        Self::interior(
            pc,
            ExprOp::Between { negated },
            ExprValue::None,
            Children {
                left: Some(operand),
                right: None,
                sub: Some(SubExpr::List(bounds)),
            },
        )
    }

    /// `lhs [NOT] IN (expr, ...)`.
    pub fn in_list(pc: &ParseContext, lhs: Self, list: ExprList, negated: bool) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::In { negated },
            ExprValue::None,
            Children {
                left: Some(lhs),
                right: None,
                sub: Some(SubExpr::List(list)),
            },
        )
    }

    /// `lhs [NOT] IN (SELECT ...)`.
    pub fn in_select(
        pc: &ParseContext,
        lhs: Self,
        select: Box<Select>,
        negated: bool,
    ) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::In { negated },
            ExprValue::None,
            Children {
                left: Some(lhs),
                right: None,
                sub: Some(SubExpr::Select(select)),
            },
        )
    }

    /// `[NOT] EXISTS (SELECT ...)`.
    pub fn exists(pc: &ParseContext, select: Box<Select>, negated: bool) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Exists { negated },
            ExprValue::None,
            Children {
                sub: Some(SubExpr::Select(select)),
                ..Children::default()
            },
        )
    }

    /// A scalar subquery `(SELECT ...)`.
    pub fn scalar_subquery(pc: &ParseContext, select: Box<Select>) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::ScalarSubquery,
            ExprValue::None,
            Children {
                sub: Some(SubExpr::Select(select)),
                ..Children::default()
            },
        )
    }

    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`.
    ///
    /// `branches` alternates when/then entries; an odd trailing entry is
    /// the ELSE expression.
    pub fn case(pc: &ParseContext, operand: Option<Self>, branches: ExprList) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Case,
            ExprValue::None,
            Children {
                left: operand,
                right: None,
                sub: Some(SubExpr::List(branches)),
            },
        )
    }

    /// A function invocation. `args` of `None` means an empty argument
    /// list was written (`f()`).
    pub fn function(pc: &ParseContext, name: impl Into<String>, args: Option<ExprList>) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Function,
            ExprValue::Text(name.into()),
            Children {
                sub: args.map(SubExpr::List),
                ..Children::default()
            },
        )
    }

    /// An aggregate function invocation; its accumulator slot is attached
    /// later via [`Expr::set_agg_ref`].
    pub fn agg_function(
        pc: &ParseContext,
        name: impl Into<String>,
        args: Option<ExprList>,
    ) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::AggFunction,
            ExprValue::Text(name.into()),
            Children {
                sub: args.map(SubExpr::List),
                ..Children::default()
            },
        )
    }

    /// `CAST(operand AS type_name)`.
    pub fn cast(pc: &ParseContext, operand: Self, type_name: impl Into<String>) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Cast,
            ExprValue::Text(type_name.into()),
            Children {
                left: Some(operand),
                ..Children::default()
            },
        )
    }

    /// `operand COLLATE collation`.
    pub fn collate(pc: &ParseContext, operand: Self, collation: impl Into<String>) -> Result<Self> {
        Self::interior(
            pc,
            ExprOp::Collate,
            ExprValue::Text(collation.into()),
            Children {
                left: Some(operand),
                ..Children::default()
            },
        )
    }

    // -- accessors ----------------------------------------------------------

    /// This node's completeness level.
    #[must_use]
    pub fn level(&self) -> Completeness {
        match self.shape {
            Shape::LeafOnly => Completeness::LeafOnly,
            Shape::Reduced(_) => Completeness::Reduced,
            Shape::Full(_) => Completeness::Full,
        }
    }

    fn children(&self) -> &Children {
        match &self.shape {
            Shape::LeafOnly => panic!(
                "contract violation: child access on a leaf-only {:?} node",
                self.op
            ),
            Shape::Reduced(ch) => ch,
            Shape::Full(tail) => &tail.children,
        }
    }

    fn children_mut(&mut self) -> &mut Children {
        match &mut self.shape {
            Shape::LeafOnly => panic!(
                "contract violation: child access on a leaf-only {:?} node",
                self.op
            ),
            Shape::Reduced(ch) => ch,
            Shape::Full(tail) => &mut tail.children,
        }
    }

    /// Left child. Panics on leaf-only nodes.
    #[must_use]
    pub fn left(&self) -> Option<&Self> {
        self.children().left.as_ref()
    }

    /// Right child. Panics on leaf-only nodes.
    #[must_use]
    pub fn right(&self) -> Option<&Self> {
        self.children().right.as_ref()
    }

    /// The collection union. Panics on leaf-only nodes.
    #[must_use]
    pub fn sub(&self) -> Option<&SubExpr> {
        self.children().sub.as_ref()
    }

    /// The argument list, if the union holds one. Panics on leaf-only
    /// nodes.
    #[must_use]
    pub fn arg_list(&self) -> Option<&ExprList> {
        match self.sub() {
            Some(SubExpr::List(list)) => Some(list),
            _ => None,
        }
    }

    /// The sub-select, if the union holds one. Panics on leaf-only nodes.
    #[must_use]
    pub fn sub_select(&self) -> Option<&Select> {
        match self.sub() {
            Some(SubExpr::Select(s)) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// The metadata tail. Panics on anything below full completeness.
    #[must_use]
    pub fn meta(&self) -> &ExprMeta {
        match &self.shape {
            Shape::Full(tail) => &tail.meta,
            _ => panic!(
                "contract violation: metadata access on a {:?}-level {:?} node",
                self.level(),
                self.op
            ),
        }
    }

    /// Mutable metadata tail. Panics on anything below full completeness.
    pub fn meta_mut(&mut self) -> &mut ExprMeta {
        let level = self.level();
        let op = self.op;
        match &mut self.shape {
            Shape::Full(tail) => &mut tail.meta,
            _ => panic!(
                "contract violation: metadata access on a {:?}-level {:?} node",
                level, op
            ),
        }
    }

    /// Height of the tree headed by this node. O(1) on full nodes.
    #[must_use]
    pub fn height(&self) -> u32 {
        match &self.shape {
            Shape::Full(tail) => tail.meta.height,
            Shape::LeafOnly => 1,
            Shape::Reduced(_) => {
                // Reduced nodes do not cache their height; walk the spine.
                let ch = self.children();
                let l = ch.left.as_ref().map_or(0, Self::height);
                let r = ch.right.as_ref().map_or(0, Self::height);
                let s = match &ch.sub {
                    Some(SubExpr::List(list)) => list.height(),
                    _ => 0,
                };
                1 + l.max(r).max(s)
            }
        }
    }

    /// Record the source span of this node (full nodes only).
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.meta_mut().span = span;
        self
    }

    /// Attach the accumulator slot of an aggregate-bound node.
    pub fn set_agg_ref(&mut self, agg: AggRef) {
        debug_assert!(matches!(self.op, ExprOp::AggFunction | ExprOp::AggColumn));
        self.meta_mut().agg = Some(agg);
    }

    /// Attach a window definition, turning a function invocation into a
    /// window-function invocation.
    pub fn set_window(&mut self, window: Window) {
        debug_assert!(matches!(self.op, ExprOp::Function | ExprOp::AggFunction));
        self.meta_mut().window = Some(Box::new(window));
    }

    // -- duplication --------------------------------------------------------

    /// Deep copy at reduced completeness, for long-lived storage.
    ///
    /// Interior nodes come back [`Completeness::Reduced`]; nodes with
    /// neither children nor a collection come back
    /// [`Completeness::LeafOnly`]. Argument lists are reduced along with
    /// their owner; sub-selects are copied whole, since the union member is
    /// kept out-of-line at every level. Completeness is never raised.
    #[must_use]
    pub fn dup_reduced(&self) -> Self {
        let children = match &self.shape {
            Shape::LeafOnly => {
                return Self {
                    op: self.op,
                    value: self.value.clone(),
                    shape: Shape::LeafOnly,
                };
            }
            Shape::Reduced(ch) => ch.as_ref(),
            Shape::Full(tail) => &tail.children,
        };
        if children.left.is_none() && children.right.is_none() && children.sub.is_none() {
            return Self {
                op: self.op,
                value: self.value.clone(),
                shape: Shape::LeafOnly,
            };
        }
        let reduced = Children {
            left: children.left.as_ref().map(Self::dup_reduced),
            right: children.right.as_ref().map(Self::dup_reduced),
            sub: children.sub.as_ref().map(|sub| match sub {
                SubExpr::List(list) => SubExpr::List(list.dup_reduced()),
                SubExpr::Select(s) => SubExpr::Select(s.clone()),
            }),
        };
        Self {
            op: self.op,
            value: self.value.clone(),
            shape: Shape::Reduced(Box::new(reduced)),
        }
    }
}

/// Dismantles the left/right spine with an explicit work-list so that
/// dropping a pathologically deep operator chain cannot overflow the call
/// stack.
impl Drop for Expr {
    fn drop(&mut self) {
        fn push_children(stack: &mut Vec<Expr>, ch: Children) {
            if let Some(l) = ch.left {
                stack.push(l);
            }
            if let Some(r) = ch.right {
                stack.push(r);
            }
            // ch.sub drops here; list entries and subquery clauses each
            // dismantle their own spines the same way.
        }

        let mut stack: Vec<Expr> = Vec::new();
        match mem::take(&mut self.shape) {
            Shape::LeafOnly => return,
            Shape::Reduced(ch) => push_children(&mut stack, *ch),
            Shape::Full(tail) => push_children(&mut stack, tail.children),
        }
        while let Some(mut e) = stack.pop() {
            match mem::take(&mut e.shape) {
                Shape::LeafOnly => {}
                Shape::Reduced(ch) => push_children(&mut stack, *ch),
                Shape::Full(tail) => push_children(&mut stack, tail.children),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Expression lists
// ---------------------------------------------------------------------------

/// One entry of an [`ExprList`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExprListItem {
    /// The expression.
    pub expr: Expr,
    /// `AS` alias of a result column, or the `column =` name of an UPDATE.
    pub name: Option<String>,
    /// Sort direction for ORDER BY / GROUP BY use.
    pub direction: SortDirection,
    /// Explicit NULLS FIRST/LAST, if written.
    pub nulls: Option<NullsOrder>,
    /// True once a nested-FROM subquery is known to use this column.
    pub used_in_nested_from: bool,
}

impl ExprListItem {
    fn new(expr: Expr) -> Self {
        Self {
            expr,
            name: None,
            direction: SortDirection::Asc,
            nulls: None,
            used_in_nested_from: false,
        }
    }
}

/// An ordered, optionally named sequence of expressions: result columns,
/// GROUP BY terms, function arguments.
///
/// Insertion order is semantically significant (it defines result-column
/// order) and entries are never reordered in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprList {
    items: Vec<ExprListItem>,
}

impl ExprList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one expression, preserving insertion order, and return the
    /// updated list. Construction happens by chaining appends.
    #[must_use]
    pub fn append(mut self, expr: Expr) -> Self {
        self.items.push(ExprListItem::new(expr));
        self
    }

    /// Append an expression with an alias name.
    #[must_use]
    pub fn append_named(mut self, expr: Expr, name: impl Into<String>) -> Self {
        let mut item = ExprListItem::new(expr);
        item.name = Some(name.into());
        self.items.push(item);
        self
    }

    /// Set the sort flags of the most recently appended entry.
    ///
    /// # Panics
    /// If the list is empty.
    pub fn set_sort_order(&mut self, direction: SortDirection, nulls: Option<NullsOrder>) {
        let item = self
            .items
            .last_mut()
            .expect("set_sort_order on an empty expression list");
        item.direction = direction;
        item.nulls = nulls;
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entry at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&ExprListItem> {
        self.items.get(idx)
    }

    /// Iterate the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExprListItem> {
        self.items.iter()
    }

    /// Greatest height among member expressions.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.items.iter().map(|i| i.expr.height()).max().unwrap_or(0)
    }

    /// Deep copy with every member expression reduced.
    #[must_use]
    pub fn dup_reduced(&self) -> Self {
        Self {
            items: self
                .items
                .iter()
                .map(|i| ExprListItem {
                    expr: i.expr.dup_reduced(),
                    name: i.name.clone(),
                    direction: i.direction,
                    nulls: i.nulls,
                    used_in_nested_from: i.used_in_nested_from,
                })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ExprList {
    type Item = &'a ExprListItem;
    type IntoIter = std::slice::Iter<'a, ExprListItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Aggregate info side table
// ---------------------------------------------------------------------------

/// Which array of an [`AggInfo`] an [`AggRef`] indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggRefKind {
    Column,
    Func,
}

/// Index of one aggregate column or function slot within an [`AggInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggRef {
    pub kind: AggRefKind,
    pub index: u16,
}

/// A source column routed through an aggregate accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct AggInfoColumn {
    pub cursor: CursorId,
    pub column: ColumnIdx,
    pub table: Option<TableId>,
}

/// One aggregate function invocation of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct AggInfoFunc {
    pub name: String,
    pub distinct: bool,
}

/// Side table collecting the aggregate columns and functions of one SELECT
/// block; aggregate-bound expression nodes hold [`AggRef`] indices into it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggInfo {
    /// The SELECT this belongs to.
    pub select_id: SelectId,
    pub columns: Vec<AggInfoColumn>,
    pub funcs: Vec<AggInfoFunc>,
}

impl AggInfo {
    /// An empty side table for the given SELECT block.
    #[must_use]
    pub fn new(select_id: SelectId) -> Self {
        Self {
            select_id,
            columns: Vec::new(),
            funcs: Vec::new(),
        }
    }

    /// Register a source column, returning its slot.
    pub fn add_column(&mut self, col: AggInfoColumn) -> AggRef {
        let index = u16::try_from(self.columns.len()).expect("aggregate column slots exhausted");
        self.columns.push(col);
        AggRef {
            kind: AggRefKind::Column,
            index,
        }
    }

    /// Register an aggregate function, returning its slot.
    pub fn add_func(&mut self, func: AggInfoFunc) -> AggRef {
        let index = u16::try_from(self.funcs.len()).expect("aggregate function slots exhausted");
        self.funcs.push(func);
        AggRef {
            kind: AggRefKind::Func,
            index,
        }
    }
}

// ---------------------------------------------------------------------------
// Window specifications
// ---------------------------------------------------------------------------

/// Window frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Rows,
    Range,
    Groups,
}

/// Window frame boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBound {
    /// `UNBOUNDED PRECEDING`.
    UnboundedPreceding,
    /// `expr PRECEDING`.
    Preceding(Box<Expr>),
    /// `CURRENT ROW`.
    CurrentRow,
    /// `expr FOLLOWING`.
    Following(Box<Expr>),
    /// `UNBOUNDED FOLLOWING`.
    UnboundedFollowing,
}

/// Window frame EXCLUDE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameExclude {
    NoOthers,
    CurrentRow,
    Group,
    Ties,
}

/// Window frame specification.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSpec {
    pub frame_type: FrameType,
    pub start: FrameBound,
    /// `None` means the BETWEEN-less syntax (end = current row).
    pub end: Option<FrameBound>,
    pub exclude: Option<FrameExclude>,
}

/// A window definition: either a named entry of a WINDOW clause or the
/// inline OVER clause of one window-function invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    /// Name, for WINDOW-clause definitions.
    pub name: Option<String>,
    /// Base window this one refines.
    pub base: Option<String>,
    pub partition_by: Option<ExprList>,
    pub order_by: Option<ExprList>,
    pub frame: Option<FrameSpec>,
    /// FILTER clause of the owning invocation.
    pub filter: Option<Box<Expr>>,
}

// ---------------------------------------------------------------------------
// Common table expressions
// ---------------------------------------------------------------------------

/// CTE materialization hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CteMaterialized {
    Materialized,
    NotMaterialized,
}

/// Usage record of a CTE, shared between every FROM term that references
/// it. Outlives parse-tree edits that may drop the [`Cte`] itself.
#[derive(Debug, PartialEq, Default)]
pub struct CteUse {
    /// Number of FROM terms using this CTE.
    pub n_use: Cell<u32>,
    /// Estimated rows in the materialization.
    pub row_est: Cell<LogEst>,
    pub materialized: Option<CteMaterialized>,
}

/// A single common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    /// Explicit column names, if written.
    pub columns: Vec<String>,
    pub materialized: Option<CteMaterialized>,
    pub query: Box<Select>,
    /// Shared usage record, once some FROM term resolves to this CTE.
    pub cte_use: Option<Rc<CteUse>>,
}

/// A WITH clause: one or more CTEs attached to a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

// ---------------------------------------------------------------------------
// FROM-clause terms
// ---------------------------------------------------------------------------

/// The kind of join connecting a FROM term to the term before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JoinType {
    /// Whether this is a NATURAL join.
    pub natural: bool,
    pub kind: JoinKind,
}

/// The join operator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    /// `,` or `CROSS JOIN`.
    #[default]
    Cross,
    /// `[INNER] JOIN`.
    Inner,
    /// `LEFT [OUTER] JOIN`.
    Left,
    /// `RIGHT [OUTER] JOIN`.
    Right,
    /// `FULL [OUTER] JOIN`.
    Full,
}

/// Join qualifier: an ON expression or a USING column list, mutually
/// exclusive for the lifetime of the term.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinQualifier {
    On(Expr),
    Using(Vec<String>),
}

/// What a FROM term actually names.
#[derive(Debug, Clone, PartialEq)]
pub enum SrcItemKind {
    /// A base table reference.
    Table {
        /// Schema qualifier (`main.t`), if written.
        schema: Option<String>,
        name: String,
        /// Catalog key, once resolved. Metadata lookup only.
        table: Option<TableId>,
    },
    /// A parenthesized subquery.
    Subquery(Box<Select>),
    /// A source manifested during rewriting: an ephemeral table or
    /// co-routine standing in for a flattened subquery.
    Ephemeral { via_coroutine: bool },
}

/// The accessory union of a FROM term. At most one of these applies.
#[derive(Debug, Clone, PartialEq)]
pub enum SrcAccess {
    /// `INDEXED BY name`.
    IndexedBy(String),
    /// `NOT INDEXED`.
    NotIndexed,
    /// Arguments of a table-valued function call.
    TableFunctionArgs(ExprList),
    /// Usage record of the CTE this term resolves to.
    CteUse(Rc<CteUse>),
}

/// One term of a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SrcItem {
    pub kind: SrcItemKind,
    /// The `B` of `A AS B`.
    pub alias: Option<String>,
    /// Join connecting this term to the previous one; meaningless on the
    /// first term.
    pub join_type: JoinType,
    join_qualifier: Option<JoinQualifier>,
    /// Cursor assigned to scan this term.
    pub cursor: Option<CursorId>,
    /// Bit N set if column N of the referenced table is used downstream;
    /// columns ≥ 63 collapse into the overflow sentinel.
    pub col_used: Bitmask,
    /// Accessory data (INDEXED BY, table-function args, CTE usage).
    pub access: Option<SrcAccess>,
}

impl SrcItem {
    fn new(kind: SrcItemKind, alias: Option<String>) -> Self {
        Self {
            kind,
            alias,
            join_type: JoinType::default(),
            join_qualifier: None,
            cursor: None,
            col_used: Bitmask::EMPTY,
            access: None,
        }
    }

    /// The join qualifier, if any.
    #[must_use]
    pub fn join_qualifier(&self) -> Option<&JoinQualifier> {
        self.join_qualifier.as_ref()
    }

    /// Attach an ON expression.
    ///
    /// # Panics
    /// If the term already carries a USING clause (or another ON): the two
    /// are mutually exclusive for the lifetime of the term.
    pub fn set_on(&mut self, on: Expr) {
        assert!(
            self.join_qualifier.is_none(),
            "contract violation: join term already has an ON or USING qualifier"
        );
        self.join_qualifier = Some(JoinQualifier::On(on));
    }

    /// Attach a USING column-name list.
    ///
    /// # Panics
    /// If the term already carries an ON clause (or another USING).
    pub fn set_using(&mut self, columns: Vec<String>) {
        assert!(
            self.join_qualifier.is_none(),
            "contract violation: join term already has an ON or USING qualifier"
        );
        self.join_qualifier = Some(JoinQualifier::Using(columns));
    }
}

/// The FROM clause: an ordered sequence of [`SrcItem`] terms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SrcList {
    items: Vec<SrcItem>,
}

impl SrcList {
    /// An empty FROM clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn append(mut self, pc: &ParseContext, item: SrcItem) -> Result<Self> {
        if self.items.len() >= pc.limits.max_from_terms {
            return Err(SquillError::TooManyTerms {
                what: "FROM-clause terms",
                count: self.items.len() + 1,
                max: pc.limits.max_from_terms,
            });
        }
        self.items.push(item);
        Ok(self)
    }

    /// Append a base table reference.
    pub fn append_table(
        self,
        pc: &ParseContext,
        schema: Option<String>,
        name: impl Into<String>,
        alias: Option<String>,
    ) -> Result<Self> {
        self.append(
            pc,
            SrcItem::new(
                SrcItemKind::Table {
                    schema,
                    name: name.into(),
                    table: None,
                },
                alias,
            ),
        )
    }

    /// Append a subquery term.
    pub fn append_subquery(
        self,
        pc: &ParseContext,
        query: Box<Select>,
        alias: Option<String>,
    ) -> Result<Self> {
        self.append(pc, SrcItem::new(SrcItemKind::Subquery(query), alias))
    }

    /// Set the join type of the most recently appended term.
    ///
    /// # Panics
    /// If the list is empty.
    pub fn set_join_type(&mut self, join_type: JoinType) {
        self.items
            .last_mut()
            .expect("set_join_type on an empty FROM clause")
            .join_type = join_type;
    }

    /// Attach a join qualifier to the most recently appended term, the
    /// second table of the pairwise join it closes.
    ///
    /// # Panics
    /// If the list is empty, or the term already carries a qualifier.
    pub fn attach_qualifier(&mut self, qualifier: JoinQualifier) {
        let item = self
            .items
            .last_mut()
            .expect("attach_qualifier on an empty FROM clause");
        match qualifier {
            JoinQualifier::On(e) => item.set_on(e),
            JoinQualifier::Using(cols) => item.set_using(cols),
        }
    }

    /// The grammar hangs each join operator on the term to its *left*;
    /// shift them so every term describes the join to the term before it.
    pub fn shift_join_types(&mut self) {
        for i in (1..self.items.len()).rev() {
            self.items[i].join_type = self.items[i - 1].join_type;
        }
        if let Some(first) = self.items.first_mut() {
            first.join_type = JoinType::default();
        }
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if there are no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Term at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&SrcItem> {
        self.items.get(idx)
    }

    /// Mutable term at `idx`.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut SrcItem> {
        self.items.get_mut(idx)
    }

    /// Iterate the terms in FROM order.
    pub fn iter(&self) -> impl Iterator<Item = &SrcItem> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// SELECT blocks
// ---------------------------------------------------------------------------

/// The set operator connecting a SELECT block to the prior block of a
/// compound chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectOp {
    /// Not part of a compound, or the leftmost block.
    #[default]
    Simple,
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// Status flags of a SELECT block, mutated by later rewriting passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SelectFlags(pub u32);

impl SelectFlags {
    /// Output should be DISTINCT.
    pub const DISTINCT: Self = Self(0x0001);
    /// The ALL keyword was written.
    pub const ALL: Self = Self(0x0002);
    /// Contains aggregate functions or a GROUP BY.
    pub const AGGREGATE: Self = Self(0x0004);
    /// Contains aggregate functions.
    pub const HAS_AGG: Self = Self(0x0008);
    /// Part of a compound chain.
    pub const COMPOUND: Self = Self(0x0010);
    /// Synthesized from a VALUES clause.
    pub const VALUES: Self = Self(0x0020);
    /// Single VALUES term with multiple rows.
    pub const MULTI_VALUE: Self = Self(0x0040);
    /// Part of a parenthesized FROM clause.
    pub const NESTED_FROM: Self = Self(0x0080);
    /// The recursive half of a recursive CTE.
    pub const RECURSIVE: Self = Self(0x0100);
    /// Row estimate pinned by a constant LIMIT.
    pub const FIXED_LIMIT: Self = Self(0x0200);
    /// Wildcards have been expanded.
    pub const EXPANDED: Self = Self(0x0400);

    /// True if every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for SelectFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// LIMIT/OFFSET expression pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub limit: Box<Expr>,
    pub offset: Option<Box<Expr>>,
}

/// One SELECT block.
///
/// Immutable after construction except for the fields the rewriting passes
/// own: the compound-chain link, the status flags, and the row estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Set operator joining this block to `prior`.
    pub op: SelectOp,
    /// Unique, monotonically increasing per compilation.
    pub id: SelectId,
    /// Status flags; rewriting passes update these.
    pub flags: SelectFlags,
    /// Estimated result rows; unset (zero) until the planner fills it in.
    pub row_est: LogEst,
    /// Result columns.
    pub columns: ExprList,
    /// FROM clause.
    pub src: SrcList,
    pub where_clause: Option<Box<Expr>>,
    pub group_by: Option<ExprList>,
    pub having: Option<Box<Expr>>,
    pub order_by: Option<ExprList>,
    pub limit: Option<LimitClause>,
    /// The block to the left in a compound chain.
    pub prior: Option<Box<Select>>,
    /// Attached WITH clause.
    pub with: Option<With>,
    /// Window functions in use in this block.
    pub windows: Vec<Window>,
    /// Named definitions from the WINDOW clause.
    pub window_defs: Vec<Window>,
}

impl Select {
    /// Compose a new SELECT block.
    ///
    /// An empty `columns` list becomes the implicit `*`. The block id is
    /// drawn from the parse context and is unique within the compilation.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        pc: &mut ParseContext,
        columns: ExprList,
        src: SrcList,
        where_clause: Option<Expr>,
        group_by: Option<ExprList>,
        having: Option<Expr>,
        order_by: Option<ExprList>,
        limit: Option<LimitClause>,
    ) -> Box<Self> {
        let columns = if columns.is_empty() {
            ExprList::new().append(Expr::asterisk())
        } else {
            columns
        };
        let id = pc.next_select_id();
        tracing::trace!(%id, result_columns = columns.len(), from_terms = src.len(), "new select block");
        Box::new(Self {
            op: SelectOp::Simple,
            id,
            flags: SelectFlags::default(),
            row_est: LogEst::ZERO,
            columns,
            src,
            where_clause: where_clause.map(Box::new),
            group_by,
            having: having.map(Box::new),
            order_by,
            limit,
            prior: None,
            with: None,
            windows: Vec::new(),
            window_defs: Vec::new(),
        })
    }

    /// Link `current` to the right of `prior` with the given set operator,
    /// returning the new rightmost block of the chain.
    #[must_use]
    pub fn compound(op: SelectOp, mut prior: Box<Self>, mut current: Box<Self>) -> Box<Self> {
        prior.flags.insert(SelectFlags::COMPOUND);
        current.flags.insert(SelectFlags::COMPOUND);
        current.op = op;
        current.prior = Some(prior);
        current
    }

    /// Attach a WITH clause.
    pub fn set_with(&mut self, with: With) {
        self.with = Some(with);
    }

    /// Iterate this block and its priors, rightmost first.
    pub fn iter_chain(&self) -> SelectChainIter<'_> {
        SelectChainIter { next: Some(self) }
    }

    /// Number of blocks in the compound chain, this one included.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.iter_chain().count()
    }
}

/// Unlinks the compound chain iteratively so that dropping a pathologically
/// long chain cannot overflow the call stack.
impl Drop for Select {
    fn drop(&mut self) {
        let mut prior = self.prior.take();
        while let Some(mut block) = prior {
            prior = block.prior.take();
        }
    }
}

/// Iterator over a compound chain, rightmost block first.
pub struct SelectChainIter<'a> {
    next: Option<&'a Select>,
}

impl<'a> Iterator for SelectChainIter<'a> {
    type Item = &'a Select;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.prior.as_deref();
        Some(cur)
    }
}

// ---------------------------------------------------------------------------
// Parse context
// ---------------------------------------------------------------------------

/// Resource limits enforced during AST construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum expression tree height.
    pub max_expr_depth: usize,
    /// Maximum number of FROM-clause terms; the column-usage bitmask can
    /// distinguish at most this many join participants.
    pub max_from_terms: usize,
    /// Largest explicit `?NNN` parameter number.
    pub max_variable_number: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expr_depth: 1000,
            max_from_terms: 64,
            max_variable_number: 32766,
        }
    }
}

/// Per-compilation state owned by the caller for the duration of one
/// statement: id counters, bind-parameter names, construction limits.
///
/// Every AST entity built against a context is owned by the statement tree
/// and dropped with it; nothing outlives the compilation.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Construction limits.
    pub limits: Limits,
    n_select: u32,
    n_cursor: i32,
    /// Names of the bind parameters seen so far; index + 1 is the number.
    /// Anonymous `?` parameters occupy a slot with an empty name.
    var_names: Vec<String>,
}

impl ParseContext {
    /// A fresh context with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh context with explicit limits.
    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Next unique SELECT block id (1-based).
    pub fn next_select_id(&mut self) -> SelectId {
        self.n_select += 1;
        SelectId(self.n_select)
    }

    /// Number of SELECT blocks created so far.
    #[must_use]
    pub fn select_count(&self) -> u32 {
        self.n_select
    }

    /// Allocate the next table/index cursor.
    pub fn next_cursor(&mut self) -> CursorId {
        let c = CursorId(self.n_cursor);
        self.n_cursor += 1;
        c
    }

    /// Number of distinct bind parameters seen so far.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.var_names.len()
    }

    /// Assign a number to a bind parameter token (prefix included).
    ///
    /// `?` takes the next free number; `?NNN` forces number NNN; named
    /// parameters (`:x`, `@x`, `$x`, `#x`) reuse the number of an earlier
    /// occurrence of the same name.
    pub fn variable_number(&mut self, text: &str) -> Result<VariableId> {
        if text == "?" {
            self.var_names.push(String::new());
            return self.last_variable();
        }
        if let Some(digits) = text.strip_prefix('?') {
            let n: u32 = digits.parse().map_err(|_| SquillError::TooManyTerms {
                what: "bind parameter number digits",
                count: digits.len(),
                max: 5,
            })?;
            if n == 0 || n > u32::from(self.limits.max_variable_number) {
                return Err(SquillError::TooManyTerms {
                    what: "bind parameters",
                    count: n as usize,
                    max: self.limits.max_variable_number as usize,
                });
            }
            while self.var_names.len() < n as usize {
                self.var_names.push(String::new());
            }
            return Ok(VariableId(n as u16));
        }
        // Named parameter: find-or-insert.
        if let Some(pos) = self.var_names.iter().position(|n| n == text) {
            return Ok(VariableId((pos + 1) as u16));
        }
        self.var_names.push(text.to_owned());
        self.last_variable()
    }

    fn last_variable(&self) -> Result<VariableId> {
        let n = self.var_names.len();
        if n > self.limits.max_variable_number as usize {
            return Err(SquillError::TooManyTerms {
                what: "bind parameters",
                count: n,
                max: self.limits.max_variable_number as usize,
            });
        }
        Ok(VariableId(n as u16))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pc() -> ParseContext {
        ParseContext::new()
    }

    fn col(c: i32, i: i16) -> Expr {
        Expr::column(CursorId(c), ColumnIdx(i), None)
    }

    #[test]
    fn test_constructors_produce_full_nodes() {
        let pc = pc();
        let e = Expr::binary(&pc, BinaryOp::Ge, col(0, 1), Expr::integer(1)).unwrap();
        assert_eq!(e.level(), Completeness::Full);
        assert_eq!(e.height(), 2);
        assert_eq!(e.left().unwrap().op, ExprOp::Column);
        assert_eq!(e.right().unwrap().value.as_int(), Some(1));
    }

    #[test]
    fn test_column_records_cursor_and_index() {
        let e = Expr::column(CursorId(3), ColumnIdx::ROWID, Some(TableId(7)));
        let meta = e.meta();
        assert_eq!(meta.cursor, Some(CursorId(3)));
        assert!(meta.column.unwrap().is_rowid());
        assert_eq!(meta.table, Some(TableId(7)));
    }

    #[test]
    fn test_in_list_and_in_select_are_exclusive_union_members() {
        let mut ctx = pc();
        let list = ExprList::new().append(Expr::integer(1)).append(Expr::integer(2));
        let e = Expr::in_list(&ctx, col(0, 0), list, false).unwrap();
        assert!(e.arg_list().is_some());
        assert!(e.sub_select().is_none());

        let sel = Select::new(
            &mut ctx,
            ExprList::new(),
            SrcList::new(),
            None,
            None,
            None,
            None,
            None,
        );
        let e = Expr::in_select(&ctx, col(0, 0), sel, true).unwrap();
        assert!(e.arg_list().is_none());
        assert!(e.sub_select().is_some());
    }

    #[test]
    fn test_dup_reduced_lowers_completeness() {
        let ctx = pc();
        let e = Expr::binary(&ctx, BinaryOp::Add, col(0, 0), Expr::integer(2)).unwrap();
        let r = e.dup_reduced();
        assert_eq!(r.level(), Completeness::Reduced);
        // Children are reduced too; the integer leaf became leaf-only.
        assert_eq!(r.right().unwrap().level(), Completeness::LeafOnly);
        assert_eq!(r.right().unwrap().value.as_int(), Some(2));
        // The original is untouched.
        assert_eq!(e.level(), Completeness::Full);
    }

    #[test]
    fn test_dup_reduced_keeps_the_union_out_of_line() {
        let ctx = pc();
        let list = ExprList::new().append(Expr::integer(1));
        let e = Expr::function(&ctx, "length", Some(list)).unwrap();
        let r = e.dup_reduced();
        assert_eq!(r.level(), Completeness::Reduced);
        assert_eq!(r.arg_list().unwrap().len(), 1);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_leaf_only_child_access_panics() {
        let leaf = Expr::integer(5).dup_reduced();
        assert_eq!(leaf.level(), Completeness::LeafOnly);
        let _ = leaf.left();
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_reduced_meta_access_panics() {
        let ctx = pc();
        let e = Expr::unary(&ctx, UnaryOp::Not, Expr::null()).unwrap();
        let r = e.dup_reduced();
        let _ = r.meta();
    }

    #[test]
    fn test_depth_limit_fails_construction() {
        let ctx = ParseContext::with_limits(Limits {
            max_expr_depth: 10,
            ..Limits::default()
        });
        let mut e = Expr::integer(0);
        let err = loop {
            match Expr::unary(&ctx, UnaryOp::Not, e) {
                Ok(next) => e = next,
                Err(err) => break err,
            }
        };
        assert_eq!(err, SquillError::ExpressionTooDeep { max: 10 });
    }

    #[test]
    fn test_deep_expression_chain_drops_without_overflow() {
        let ctx = ParseContext::with_limits(Limits {
            max_expr_depth: usize::MAX,
            ..Limits::default()
        });
        let mut e = Expr::integer(0);
        for _ in 0..200_000 {
            e = Expr::unary(&ctx, UnaryOp::BitNot, e).unwrap();
        }
        drop(e);
    }

    #[test]
    fn test_expr_list_preserves_insertion_order() {
        let list = ExprList::new()
            .append_named(Expr::integer(1), "a")
            .append(Expr::integer(2))
            .append_named(Expr::integer(3), "c");
        let names: Vec<_> = list.iter().map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec![Some("a"), None, Some("c")]);
        let values: Vec<_> = list.iter().map(|i| i.expr.value.as_int().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_expr_list_sort_flags() {
        let mut list = ExprList::new().append(Expr::integer(1));
        list.set_sort_order(SortDirection::Desc, Some(NullsOrder::Last));
        let item = list.get(0).unwrap();
        assert_eq!(item.direction, SortDirection::Desc);
        assert_eq!(item.nulls, Some(NullsOrder::Last));
    }

    #[test]
    fn test_select_ids_are_monotonic() {
        let mut ctx = pc();
        let a = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        let b = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        assert!(b.id > a.id);
        assert_eq!(ctx.select_count(), 2);
    }

    #[test]
    fn test_empty_result_list_becomes_star() {
        let mut ctx = pc();
        let s = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        assert_eq!(s.columns.len(), 1);
        assert_eq!(s.columns.get(0).unwrap().expr.op, ExprOp::Asterisk);
    }

    #[test]
    fn test_compound_chain_links_and_iterates() {
        let mut ctx = pc();
        let a = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        let b = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        let c = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        let ab = Select::compound(SelectOp::Union, a, b);
        let abc = Select::compound(SelectOp::Except, ab, c);

        assert_eq!(abc.chain_len(), 3);
        assert!(abc.flags.contains(SelectFlags::COMPOUND));
        let ops: Vec<_> = abc.iter_chain().map(|s| s.op).collect();
        assert_eq!(ops, vec![SelectOp::Except, SelectOp::Union, SelectOp::Simple]);
    }

    #[test]
    fn test_deep_compound_chain_drops_without_overflow() {
        let mut ctx = pc();
        let mut chain =
            Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        for _ in 0..100_000 {
            let next = Select::new(
                &mut ctx,
                ExprList::new(),
                SrcList::new(),
                None,
                None,
                None,
                None,
                None,
            );
            chain = Select::compound(SelectOp::UnionAll, chain, next);
        }
        drop(chain);
    }

    #[test]
    fn test_src_list_append_and_limit() {
        let ctx = pc();
        let src = SrcList::new()
            .append_table(&ctx, None, "t1", None)
            .unwrap()
            .append_table(&ctx, Some("main".to_owned()), "t2", Some("x".to_owned()))
            .unwrap();
        assert_eq!(src.len(), 2);
        match &src.get(1).unwrap().kind {
            SrcItemKind::Table { schema, name, .. } => {
                assert_eq!(schema.as_deref(), Some("main"));
                assert_eq!(name, "t2");
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let tight = ParseContext::with_limits(Limits {
            max_from_terms: 1,
            ..Limits::default()
        });
        let src = SrcList::new().append_table(&tight, None, "t1", None).unwrap();
        let err = src.append_table(&tight, None, "t2", None).unwrap_err();
        assert!(matches!(err, SquillError::TooManyTerms { .. }));
    }

    #[test]
    fn test_join_qualifier_on_then_using_panics() {
        let ctx = pc();
        let mut src = SrcList::new()
            .append_table(&ctx, None, "a", None)
            .unwrap()
            .append_table(&ctx, None, "b", None)
            .unwrap();
        src.attach_qualifier(JoinQualifier::On(
            Expr::binary(&ctx, BinaryOp::Eq, Expr::column(CursorId(0), ColumnIdx(0), None),
                Expr::column(CursorId(1), ColumnIdx(0), None)).unwrap(),
        ));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            src.attach_qualifier(JoinQualifier::Using(vec!["id".to_owned()]));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_shift_join_types() {
        let ctx = pc();
        let mut src = SrcList::new()
            .append_table(&ctx, None, "a", None)
            .unwrap()
            .append_table(&ctx, None, "b", None)
            .unwrap();
        // The grammar left the LEFT JOIN operator on the first term.
        src.get_mut(0).unwrap().join_type = JoinType {
            natural: false,
            kind: JoinKind::Left,
        };
        src.shift_join_types();
        assert_eq!(src.get(1).unwrap().join_type.kind, JoinKind::Left);
        assert_eq!(src.get(0).unwrap().join_type.kind, JoinKind::Cross);
    }

    #[test]
    fn test_col_used_bitmask_on_src_item() {
        let ctx = pc();
        let mut src = SrcList::new().append_table(&ctx, None, "t", None).unwrap();
        let item = src.get_mut(0).unwrap();
        item.col_used.set(2);
        item.col_used.set(80);
        assert!(item.col_used.contains(2));
        assert!(item.col_used.has_overflow());
    }

    #[test]
    fn test_variable_expression_carries_its_number() {
        let mut ctx = pc();
        let a = Expr::variable(&mut ctx, "?").unwrap();
        let b = Expr::variable(&mut ctx, ":who").unwrap();
        let c = Expr::variable(&mut ctx, ":who").unwrap();
        assert_eq!(a.meta().variable, Some(VariableId(1)));
        assert_eq!(b.meta().variable, Some(VariableId(2)));
        assert_eq!(c.meta().variable, Some(VariableId(2)));
        assert_eq!(b.value.as_text(), Some(":who"));
    }

    #[test]
    fn test_variable_numbering() {
        let mut ctx = pc();
        assert_eq!(ctx.variable_number("?").unwrap(), VariableId(1));
        assert_eq!(ctx.variable_number(":name").unwrap(), VariableId(2));
        assert_eq!(ctx.variable_number("?").unwrap(), VariableId(3));
        // Same name reuses its slot.
        assert_eq!(ctx.variable_number(":name").unwrap(), VariableId(2));
        // Explicit numbering.
        assert_eq!(ctx.variable_number("?7").unwrap(), VariableId(7));
        assert!(ctx.variable_number("?0").is_err());
    }

    #[test]
    fn test_agg_info_slots() {
        let mut info = AggInfo::new(SelectId(1));
        let c = info.add_column(AggInfoColumn {
            cursor: CursorId(0),
            column: ColumnIdx(2),
            table: None,
        });
        let f = info.add_func(AggInfoFunc {
            name: "count".to_owned(),
            distinct: false,
        });
        assert_eq!(c.kind, AggRefKind::Column);
        assert_eq!(f.kind, AggRefKind::Func);
        assert_eq!(c.index, 0);
        assert_eq!(f.index, 0);

        let ctx = pc();
        let mut e = Expr::agg_function(&ctx, "count", None).unwrap();
        e.set_agg_ref(f);
        assert_eq!(e.meta().agg, Some(f));
    }

    #[test]
    fn test_window_attachment() {
        let ctx = pc();
        let mut e = Expr::function(&ctx, "row_number", None).unwrap();
        e.set_window(Window {
            partition_by: Some(ExprList::new().append(col(0, 1))),
            frame: Some(FrameSpec {
                frame_type: FrameType::Rows,
                start: FrameBound::UnboundedPreceding,
                end: Some(FrameBound::CurrentRow),
                exclude: None,
            }),
            ..Window::default()
        });
        let w = e.meta().window.as_ref().unwrap();
        assert_eq!(w.partition_by.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_cte_attachment_and_shared_use() {
        let mut ctx = pc();
        let body = Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        let cte_use = Rc::new(CteUse::default());
        cte_use.n_use.set(1);
        let with = With {
            recursive: false,
            ctes: vec![Cte {
                name: "c".to_owned(),
                columns: vec![],
                materialized: Some(CteMaterialized::Materialized),
                query: body,
                cte_use: Some(Rc::clone(&cte_use)),
            }],
        };
        let mut outer =
            Select::new(&mut ctx, ExprList::new(), SrcList::new(), None, None, None, None, None);
        outer.set_with(with);
        assert_eq!(outer.with.as_ref().unwrap().ctes[0].name, "c");
        assert_eq!(cte_use.n_use.get(), 1);
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.merge(b), Span::new(2, 9));
        assert_eq!(a.len(), 3);
        assert!(!a.is_empty());
    }
}
