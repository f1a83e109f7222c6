//! End-to-end checks across the front-end crates: the token stream a
//! parser-action layer would consume, and the tree it would build.

use squill::ast::{
    catalog::{Affinity, Catalog, ColumnDesc, TableDesc},
    BinaryOp, Completeness, Expr, ExprList, JoinKind, JoinQualifier, JoinType, ParseContext,
    Select, SelectOp, SortDirection, SrcItemKind, SrcList,
};
use squill::parser::{TokenKind, Tokenizer};
use squill::types::{Bitmask, ColumnIdx, LogEst};

#[test]
fn token_stream_for_a_join_query() {
    let src = b"SELECT t1.a, count(*) FROM t1 LEFT JOIN t2 ON t1.id = t2.id \
                WHERE t1.a >= 10 GROUP BY t1.a ORDER BY 2 DESC LIMIT 5";
    let tokens = Tokenizer::tokenize(src);
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();

    assert_eq!(kinds[0], TokenKind::KwSelect);
    assert!(kinds.contains(&TokenKind::KwLeft));
    assert!(kinds.contains(&TokenKind::KwJoin));
    assert!(kinds.contains(&TokenKind::KwOn));
    assert!(kinds.contains(&TokenKind::KwGroup));
    assert!(kinds.contains(&TokenKind::KwLimit));
    assert_eq!(*kinds.last().unwrap(), TokenKind::Eof);

    // Every token is a view: reassembling the identifiers needs no copies.
    let idents: Vec<&[u8]> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Id)
        .map(|t| t.text(src))
        .collect();
    assert_eq!(idents[0], b"t1");
    assert_eq!(idents[1], b"a");
}

#[test]
fn build_the_tree_a_parser_would() {
    let mut catalog = Catalog::new();
    let t1 = catalog.register(TableDesc::new(
        "t1",
        vec![
            ColumnDesc {
                name: "id".to_owned(),
                affinity: Affinity::Integer,
                collation: None,
            },
            ColumnDesc {
                name: "a".to_owned(),
                affinity: Affinity::Numeric,
                collation: None,
            },
        ],
    ));
    let t2 = catalog.register(TableDesc::new("t2", vec![]));

    let mut pc = ParseContext::new();
    let c1 = pc.next_cursor();
    let c2 = pc.next_cursor();

    // FROM t1 LEFT JOIN t2 ON t1.id = t2.id
    let mut src = SrcList::new()
        .append_table(&pc, None, "t1", None)
        .unwrap()
        .append_table(&pc, None, "t2", None)
        .unwrap();
    src.set_join_type(JoinType {
        natural: false,
        kind: JoinKind::Left,
    });
    let on = Expr::binary(
        &pc,
        BinaryOp::Eq,
        Expr::column(c1, ColumnIdx(0), Some(t1)),
        Expr::column(c2, ColumnIdx(0), Some(t2)),
    )
    .unwrap();
    src.attach_qualifier(JoinQualifier::On(on));

    // WHERE t1.a >= 10
    let where_clause = Expr::binary(
        &pc,
        BinaryOp::Ge,
        Expr::column(c1, ColumnIdx(1), Some(t1)),
        Expr::integer(10),
    )
    .unwrap();

    let columns = ExprList::new()
        .append(Expr::column(c1, ColumnIdx(1), Some(t1)))
        .append_named(Expr::agg_function(&pc, "count", None).unwrap(), "n");
    let mut order_by = ExprList::new().append(Expr::integer(2));
    order_by.set_sort_order(SortDirection::Desc, None);

    let select = Select::new(
        &mut pc,
        columns,
        src,
        Some(where_clause),
        Some(ExprList::new().append(Expr::column(c1, ColumnIdx(1), Some(t1)))),
        None,
        Some(order_by),
        None,
    );

    assert_eq!(select.id.0, 1);
    assert_eq!(select.columns.len(), 2);
    assert_eq!(select.src.len(), 2);
    assert_eq!(select.src.get(1).unwrap().join_type.kind, JoinKind::Left);
    assert!(matches!(
        select.src.get(1).unwrap().join_qualifier(),
        Some(JoinQualifier::On(_))
    ));
    match &select.src.get(0).unwrap().kind {
        SrcItemKind::Table { name, .. } => assert_eq!(name, "t1"),
        other => panic!("unexpected FROM term {other:?}"),
    }

    // The column reference resolves its metadata through the catalog key.
    let col = &select.columns.get(0).unwrap().expr;
    let meta = col.meta();
    let desc = catalog.column(meta.table.unwrap(), meta.column.unwrap()).unwrap();
    assert_eq!(desc.name, "a");
}

#[test]
fn compound_chain_and_reduced_storage() {
    let mut pc = ParseContext::new();
    let mk = |pc: &mut ParseContext| {
        Select::new(
            pc,
            ExprList::new().append(Expr::integer(1)),
            SrcList::new(),
            None,
            None,
            None,
            None,
            None,
        )
    };
    let a = mk(&mut pc);
    let b = mk(&mut pc);
    let chain = Select::compound(SelectOp::Union, a, b);
    assert_eq!(chain.chain_len(), 2);
    assert_eq!(chain.op, SelectOp::Union);
    assert_eq!(chain.prior.as_ref().unwrap().op, SelectOp::Simple);

    // Long-lived storage keeps a reduced copy of the WHERE tree.
    let cond = Expr::binary(
        &pc,
        BinaryOp::And,
        Expr::binary(&pc, BinaryOp::Lt, Expr::integer(1), Expr::integer(2)).unwrap(),
        Expr::null(),
    )
    .unwrap();
    let stored = cond.dup_reduced();
    assert_eq!(stored.level(), Completeness::Reduced);
    assert_eq!(stored.left().unwrap().level(), Completeness::Reduced);
    assert_eq!(stored.right().unwrap().level(), Completeness::LeafOnly);
}

#[test]
fn estimate_and_usage_types_work_together() {
    // A FROM term tracks which columns are used, with the documented
    // overflow behavior past 62.
    let pc = ParseContext::new();
    let mut src = SrcList::new().append_table(&pc, None, "wide", None).unwrap();
    let item = src.get_mut(0).unwrap();
    for idx in [0, 7, 62, 100] {
        item.col_used.set(idx);
    }
    assert!(item.col_used.contains(7));
    assert!(item.col_used.has_overflow());
    assert_eq!(item.col_used.intersect(Bitmask::single(62)), Bitmask::single(62));

    // Row estimates round-trip within the grain.
    let est = LogEst::encode(25000.0);
    assert_eq!(est, LogEst(146));
    let back = est.decode();
    assert!((back / 25000.0 - 1.0).abs() < 0.05);
}
