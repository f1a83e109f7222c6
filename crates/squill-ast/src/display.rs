//! SQL text rendering via `fmt::Display` for AST nodes.
//!
//! Every major node type renders back to SQL-shaped text for diagnostics
//! and EXPLAIN-style output. Resolved column references carry only a
//! cursor and a column index, so they render positionally as
//! `{cursor:column}`; everything else reconstructs the clause as written.
//! Rendering respects completeness levels: a leaf-only node renders from
//! its operator and payload alone and never touches the fields it lacks.

#[allow(clippy::wildcard_imports)]
use crate::*;
use std::fmt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn comma_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl IntoIterator<Item = T>) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Returns true if the name needs quoting (empty, leading non-letter, or
/// any byte outside the plain identifier alphabet).
fn needs_quoting(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    let first = name.as_bytes()[0];
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return true;
    }
    name.bytes()
        .any(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if needs_quoting(name) {
        write!(f, "\"{}\"", name.replace('"', "\"\""))
    } else {
        f.write_str(name)
    }
}

/// Write an operand, wrapping in parentheses if it is itself a binary or
/// unary application. This keeps precedence unambiguous and prevents
/// operator merging (`--x` would otherwise read as a line comment).
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr.op, ExprOp::Binary(_) | ExprOp::Unary(_)) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl Expr {
    /// Child accessors that respect the completeness level instead of
    /// enforcing it: rendering a leaf-only node is not a field access.
    fn left_or_none(&self) -> Option<&Self> {
        match self.level() {
            Completeness::LeafOnly => None,
            _ => self.left(),
        }
    }

    fn sub_or_none(&self) -> Option<&SubExpr> {
        match self.level() {
            Completeness::LeafOnly => None,
            _ => self.sub(),
        }
    }

    fn right_or_none(&self) -> Option<&Self> {
        match self.level() {
            Completeness::LeafOnly => None,
            _ => self.right(),
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: Option<&Expr>) -> fmt::Result {
    match child {
        Some(e) => write_operand(f, e),
        None => f.write_str("?"),
    }
}

fn write_sub_parens(f: &mut fmt::Formatter<'_>, sub: Option<&SubExpr>) -> fmt::Result {
    match sub {
        Some(SubExpr::List(list)) => write!(f, "({list})"),
        Some(SubExpr::Select(s)) => write!(f, "({s})"),
        None => f.write_str("()"),
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ExprOp::Null => f.write_str("NULL"),
            ExprOp::Integer | ExprOp::Float => match &self.value {
                ExprValue::Int(v) => write!(f, "{v}"),
                ExprValue::Text(t) => f.write_str(t),
                ExprValue::None => f.write_str("?"),
            },
            ExprOp::String => match self.value.as_text() {
                Some(t) => write!(f, "'{}'", t.replace('\'', "''")),
                None => f.write_str("''"),
            },
            ExprOp::Blob => write!(f, "X'{}'", self.value.as_text().unwrap_or("")),
            ExprOp::Asterisk => f.write_str("*"),
            ExprOp::Variable => f.write_str(self.value.as_text().unwrap_or("?")),
            ExprOp::Id => write_ident(f, self.value.as_text().unwrap_or("?")),
            ExprOp::Column | ExprOp::AggColumn => {
                if self.level() == Completeness::Full {
                    let meta = self.meta();
                    match (meta.cursor, meta.column) {
                        (Some(c), Some(i)) if i.is_rowid() => write!(f, "{{{}:rowid}}", c.0),
                        (Some(c), Some(i)) => write!(f, "{{{}:{}}}", c.0, i.0),
                        _ => f.write_str("{?}"),
                    }
                } else {
                    // Reduced copies keep no cursor metadata.
                    f.write_str("{?}")
                }
            }
            ExprOp::Unary(op) => {
                if op == UnaryOp::Not {
                    f.write_str("NOT ")?;
                } else {
                    write!(f, "{op}")?;
                }
                write_child(f, self.left_or_none())
            }
            ExprOp::Binary(op) => {
                write_child(f, self.left_or_none())?;
                write!(f, " {op} ")?;
                write_child(f, self.right_or_none())
            }
            ExprOp::IsNull { negated } => {
                write_child(f, self.left_or_none())?;
                f.write_str(if negated { " IS NOT NULL" } else { " IS NULL" })
            }
            ExprOp::Between { negated } => {
                write_child(f, self.left_or_none())?;
                f.write_str(if negated { " NOT BETWEEN " } else { " BETWEEN " })?;
                let bounds = match self.sub_or_none() {
                    Some(SubExpr::List(list)) => (list.get(0), list.get(1)),
                    _ => (None, None),
                };
                write_child(f, bounds.0.map(|i| &i.expr))?;
                f.write_str(" AND ")?;
                write_child(f, bounds.1.map(|i| &i.expr))
            }
            ExprOp::In { negated } => {
                write_child(f, self.left_or_none())?;
                f.write_str(if negated { " NOT IN " } else { " IN " })?;
                write_sub_parens(f, self.sub_or_none())
            }
            ExprOp::Exists { negated } => {
                f.write_str(if negated { "NOT EXISTS " } else { "EXISTS " })?;
                write_sub_parens(f, self.sub_or_none())
            }
            ExprOp::ScalarSubquery => write_sub_parens(f, self.sub_or_none()),
            ExprOp::Case => {
                f.write_str("CASE")?;
                if let Some(operand) = self.left_or_none() {
                    write!(f, " {operand}")?;
                }
                if let Some(SubExpr::List(branches)) = self.sub_or_none() {
                    let mut rest = branches.items.as_slice();
                    while let [when, then, tail @ ..] = rest {
                        write!(f, " WHEN {} THEN {}", when.expr, then.expr)?;
                        rest = tail;
                    }
                    if let [fallback] = rest {
                        write!(f, " ELSE {}", fallback.expr)?;
                    }
                }
                f.write_str(" END")
            }
            ExprOp::Function | ExprOp::AggFunction => {
                write_ident(f, self.value.as_text().unwrap_or("?"))?;
                match self.sub_or_none() {
                    Some(SubExpr::List(args)) => write!(f, "({args})")?,
                    _ => f.write_str("()")?,
                }
                if self.level() == Completeness::Full {
                    if let Some(w) = &self.meta().window {
                        if let Some(filter) = &w.filter {
                            write!(f, " FILTER (WHERE {filter})")?;
                        }
                        write!(f, " OVER {w}")?;
                    }
                }
                Ok(())
            }
            ExprOp::Cast => {
                f.write_str("CAST(")?;
                write_child(f, self.left_or_none())?;
                write!(f, " AS {})", self.value.as_text().unwrap_or(""))
            }
            ExprOp::Collate => {
                write_child(f, self.left_or_none())?;
                f.write_str(" COLLATE ")?;
                f.write_str(self.value.as_text().unwrap_or(""))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ExprList
// ---------------------------------------------------------------------------

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        })
    }
}

impl fmt::Display for NullsOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        })
    }
}

impl fmt::Display for ExprListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(name) = &self.name {
            f.write_str(" AS ")?;
            write_ident(f, name)?;
        }
        if self.direction == SortDirection::Desc {
            f.write_str(" DESC")?;
        }
        if let Some(nulls) = self.nulls {
            write!(f, " {nulls}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ExprList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        comma_list(f, self.iter())
    }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rows => "ROWS",
            Self::Range => "RANGE",
            Self::Groups => "GROUPS",
        })
    }
}

impl fmt::Display for FrameBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundedPreceding => f.write_str("UNBOUNDED PRECEDING"),
            Self::Preceding(e) => write!(f, "{e} PRECEDING"),
            Self::CurrentRow => f.write_str("CURRENT ROW"),
            Self::Following(e) => write!(f, "{e} FOLLOWING"),
            Self::UnboundedFollowing => f.write_str("UNBOUNDED FOLLOWING"),
        }
    }
}

impl fmt::Display for FrameExclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoOthers => "NO OTHERS",
            Self::CurrentRow => "CURRENT ROW",
            Self::Group => "GROUP",
            Self::Ties => "TIES",
        })
    }
}

impl fmt::Display for FrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frame_type)?;
        if let Some(end) = &self.end {
            write!(f, " BETWEEN {} AND {end}", self.start)?;
        } else {
            write!(f, " {}", self.start)?;
        }
        if let Some(excl) = &self.exclude {
            write!(f, " EXCLUDE {excl}")?;
        }
        Ok(())
    }
}

/// Renders the parenthesized window specification; the FILTER clause and
/// the definition name belong to the surrounding invocation or WINDOW
/// clause and are rendered there.
impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut need_space = if let Some(base) = &self.base {
            write_ident(f, base)?;
            true
        } else {
            false
        };
        if let Some(partition) = &self.partition_by {
            if need_space {
                f.write_str(" ")?;
            }
            write!(f, "PARTITION BY {partition}")?;
            need_space = true;
        }
        if let Some(order) = &self.order_by {
            if need_space {
                f.write_str(" ")?;
            }
            write!(f, "ORDER BY {order}")?;
            need_space = true;
        }
        if let Some(frame) = &self.frame {
            if need_space {
                f.write_str(" ")?;
            }
            write!(f, "{frame}")?;
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// CTEs
// ---------------------------------------------------------------------------

impl fmt::Display for CteMaterialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Materialized => "MATERIALIZED",
            Self::NotMaterialized => "NOT MATERIALIZED",
        })
    }
}

impl fmt::Display for Cte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, &self.name)?;
        if !self.columns.is_empty() {
            f.write_str("(")?;
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_ident(f, col)?;
            }
            f.write_str(")")?;
        }
        f.write_str(" AS ")?;
        if let Some(mat) = self.materialized {
            write!(f, "{mat} ")?;
        }
        write!(f, "({})", self.query)
    }
}

impl fmt::Display for With {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WITH ")?;
        if self.recursive {
            f.write_str("RECURSIVE ")?;
        }
        comma_list(f, &self.ctes)
    }
}

// ---------------------------------------------------------------------------
// FROM terms
// ---------------------------------------------------------------------------

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cross => "CROSS",
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
        })
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.natural {
            f.write_str("NATURAL ")?;
        }
        write!(f, "{} JOIN", self.kind)
    }
}

impl fmt::Display for JoinQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On(e) => write!(f, "ON {e}"),
            Self::Using(cols) => {
                f.write_str("USING (")?;
                for (i, col) in cols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_ident(f, col)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for SrcItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SrcItemKind::Table { schema, name, .. } => {
                if let Some(schema) = schema {
                    write_ident(f, schema)?;
                    f.write_str(".")?;
                }
                write_ident(f, name)?;
            }
            SrcItemKind::Subquery(query) => write!(f, "({query})")?,
            SrcItemKind::Ephemeral { via_coroutine } => {
                f.write_str(if *via_coroutine {
                    "(coroutine)"
                } else {
                    "(ephemeral)"
                })?;
            }
        }
        if let Some(SrcAccess::TableFunctionArgs(args)) = &self.access {
            write!(f, "({args})")?;
        }
        if let Some(alias) = &self.alias {
            f.write_str(" AS ")?;
            write_ident(f, alias)?;
        }
        match &self.access {
            Some(SrcAccess::IndexedBy(name)) => {
                f.write_str(" INDEXED BY ")?;
                write_ident(f, name)?;
            }
            Some(SrcAccess::NotIndexed) => f.write_str(" NOT INDEXED")?,
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for SrcList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                // A plain cross join is the comma of `FROM a, b`.
                if item.join_type.kind == JoinKind::Cross && !item.join_type.natural {
                    f.write_str(", ")?;
                } else {
                    write!(f, " {} ", item.join_type)?;
                }
            }
            write!(f, "{item}")?;
            if let Some(qualifier) = item.join_qualifier() {
                write!(f, " {qualifier}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SELECT blocks
// ---------------------------------------------------------------------------

impl fmt::Display for SelectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "",
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        })
    }
}

impl fmt::Display for LimitClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LIMIT {}", self.limit)?;
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

impl Select {
    /// Render one block without its compound chain.
    fn fmt_core(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.flags.contains(SelectFlags::DISTINCT) {
            f.write_str("DISTINCT ")?;
        }
        write!(f, "{}", self.columns)?;
        if !self.src.is_empty() {
            write!(f, " FROM {}", self.src)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {where_clause}")?;
        }
        if let Some(group_by) = &self.group_by {
            write!(f, " GROUP BY {group_by}")?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if !self.window_defs.is_empty() {
            f.write_str(" WINDOW ")?;
            for (i, w) in self.window_defs.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_ident(f, w.name.as_deref().unwrap_or("?"))?;
                write!(f, " AS {w}")?;
            }
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " ORDER BY {order_by}")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " {limit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(with) = &self.with {
            write!(f, "{with} ")?;
        }
        // iter_chain runs rightmost-first; SQL reads left to right. The set
        // operator tag lives on the right-hand block of each pair.
        let blocks: Vec<&Self> = self.iter_chain().collect();
        for (i, block) in blocks.iter().rev().enumerate() {
            if i > 0 {
                write!(f, " {} ", block.op)?;
            }
            block.fmt_core(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use squill_types::{ColumnIdx, CursorId};

    fn pc() -> ParseContext {
        ParseContext::new()
    }

    fn col(c: i32, i: i16) -> Expr {
        Expr::column(CursorId(c), ColumnIdx(i), None)
    }

    #[test]
    fn test_render_literals_and_operators() {
        let ctx = pc();
        assert_eq!(Expr::null().to_string(), "NULL");
        assert_eq!(Expr::integer(42).to_string(), "42");
        assert_eq!(
            Expr::literal(ExprOp::String, "it's").to_string(),
            "'it''s'"
        );
        assert_eq!(Expr::literal(ExprOp::Blob, "CAFE").to_string(), "X'CAFE'");
        assert_eq!(col(0, 1).to_string(), "{0:1}");
        assert_eq!(
            Expr::column(CursorId(2), ColumnIdx::ROWID, None).to_string(),
            "{2:rowid}"
        );

        let e = Expr::binary(&ctx, BinaryOp::Ge, col(0, 1), Expr::integer(10)).unwrap();
        assert_eq!(e.to_string(), "{0:1} >= 10");

        // Nested applications pick up parentheses.
        let inner = Expr::binary(&ctx, BinaryOp::Add, Expr::integer(1), Expr::integer(2)).unwrap();
        let outer = Expr::binary(&ctx, BinaryOp::Multiply, inner, Expr::integer(3)).unwrap();
        assert_eq!(outer.to_string(), "(1 + 2) * 3");

        let neg = Expr::unary(&ctx, UnaryOp::Negate, col(0, 0)).unwrap();
        let double_neg = Expr::unary(&ctx, UnaryOp::Negate, neg).unwrap();
        assert_eq!(double_neg.to_string(), "-(-{0:0})");

        let not = Expr::unary(&ctx, UnaryOp::Not, Expr::is_null(&ctx, col(0, 0), true).unwrap())
            .unwrap();
        assert_eq!(not.to_string(), "NOT {0:0} IS NOT NULL");
    }

    #[test]
    fn test_render_case_between_in() {
        let ctx = pc();
        let branches = ExprList::new()
            .append(Expr::integer(1))
            .append(Expr::literal(ExprOp::String, "one"))
            .append(Expr::literal(ExprOp::String, "other"));
        let case = Expr::case(&ctx, Some(col(0, 0)), branches).unwrap();
        assert_eq!(
            case.to_string(),
            "CASE {0:0} WHEN 1 THEN 'one' ELSE 'other' END"
        );

        let between =
            Expr::between(&ctx, col(0, 1), Expr::integer(1), Expr::integer(9), false).unwrap();
        assert_eq!(between.to_string(), "{0:1} BETWEEN 1 AND 9");

        let list = ExprList::new().append(Expr::integer(1)).append(Expr::integer(2));
        let in_list = Expr::in_list(&ctx, col(0, 0), list, true).unwrap();
        assert_eq!(in_list.to_string(), "{0:0} NOT IN (1, 2)");
    }

    #[test]
    fn test_render_function_with_window() {
        let ctx = pc();
        let mut e = Expr::function(&ctx, "row_number", None).unwrap();
        e.set_window(Window {
            partition_by: Some(ExprList::new().append(col(0, 1))),
            order_by: Some(ExprList::new().append(col(0, 2))),
            frame: Some(FrameSpec {
                frame_type: FrameType::Rows,
                start: FrameBound::UnboundedPreceding,
                end: Some(FrameBound::CurrentRow),
                exclude: None,
            }),
            ..Window::default()
        });
        assert_eq!(
            e.to_string(),
            "row_number() OVER (PARTITION BY {0:1} ORDER BY {0:2} \
             ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)"
        );
    }

    #[test]
    fn test_render_select_with_join() {
        let mut ctx = pc();
        let mut src = SrcList::new()
            .append_table(&ctx, None, "t1", None)
            .unwrap()
            .append_table(&ctx, None, "t2", None)
            .unwrap();
        src.set_join_type(JoinType {
            natural: false,
            kind: JoinKind::Left,
        });
        let on = Expr::binary(&ctx, BinaryOp::Eq, col(0, 0), col(1, 0)).unwrap();
        src.attach_qualifier(JoinQualifier::On(on));

        let columns = ExprList::new()
            .append(col(0, 1))
            .append_named(Expr::agg_function(&ctx, "count", None).unwrap(), "n");
        let where_clause =
            Expr::binary(&ctx, BinaryOp::Ge, col(0, 1), Expr::integer(10)).unwrap();
        let mut order_by = ExprList::new().append(Expr::integer(2));
        order_by.set_sort_order(SortDirection::Desc, None);
        let limit = LimitClause {
            limit: Box::new(Expr::integer(5)),
            offset: None,
        };

        let select = Select::new(
            &mut ctx,
            columns,
            src,
            Some(where_clause),
            Some(ExprList::new().append(col(0, 1))),
            None,
            Some(order_by),
            Some(limit),
        );
        assert_eq!(
            select.to_string(),
            "SELECT {0:1}, count() AS n FROM t1 LEFT JOIN t2 ON {0:0} = {1:0} \
             WHERE {0:1} >= 10 GROUP BY {0:1} ORDER BY 2 DESC LIMIT 5"
        );
    }

    #[test]
    fn test_render_compound_chain_left_to_right() {
        let mut ctx = pc();
        let mk = |ctx: &mut ParseContext, v: i64| {
            Select::new(
                ctx,
                ExprList::new().append(Expr::integer(v)),
                SrcList::new(),
                None,
                None,
                None,
                None,
                None,
            )
        };
        let a = mk(&mut ctx, 1);
        let b = mk(&mut ctx, 2);
        let c = mk(&mut ctx, 3);
        let chain = Select::compound(SelectOp::Except, Select::compound(SelectOp::Union, a, b), c);
        assert_eq!(
            chain.to_string(),
            "SELECT 1 UNION SELECT 2 EXCEPT SELECT 3"
        );
    }

    #[test]
    fn test_render_with_clause_and_subquery_term() {
        let mut ctx = pc();
        let body = Select::new(
            &mut ctx,
            ExprList::new().append(Expr::integer(1)),
            SrcList::new(),
            None,
            None,
            None,
            None,
            None,
        );
        let inner_src = SrcList::new().append_table(&ctx, None, "c", None).unwrap();
        let inner = Select::new(&mut ctx, ExprList::new(), inner_src, None, None, None, None, None);
        let src = SrcList::new()
            .append_subquery(&ctx, inner, Some("sub".to_owned()))
            .unwrap();
        let mut outer = Select::new(&mut ctx, ExprList::new(), src, None, None, None, None, None);
        outer.set_with(With {
            recursive: false,
            ctes: vec![Cte {
                name: "c".to_owned(),
                columns: vec!["x".to_owned()],
                materialized: Some(CteMaterialized::Materialized),
                query: body,
                cte_use: None,
            }],
        });
        assert_eq!(
            outer.to_string(),
            "WITH c(x) AS MATERIALIZED (SELECT 1) \
             SELECT * FROM (SELECT * FROM c) AS sub"
        );
    }

    #[test]
    fn test_render_reduced_nodes_without_metadata() {
        let ctx = pc();
        let e = Expr::binary(&ctx, BinaryOp::Add, col(0, 0), Expr::integer(2)).unwrap();
        let r = e.dup_reduced();
        // The reduced copy lost its cursor metadata but still renders.
        assert_eq!(r.to_string(), "{?} + 2");
    }

    #[test]
    fn test_quoting_of_awkward_identifiers() {
        assert_eq!(Expr::id("plain").to_string(), "plain");
        assert_eq!(Expr::id("has space").to_string(), "\"has space\"");
        assert_eq!(Expr::id("1st").to_string(), "\"1st\"");
        assert_eq!(Expr::id("say\"no").to_string(), "\"say\"\"no\"");
    }
}
