#![allow(missing_docs)]

mod common;

use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use strata::compile::{Domain, PredicateCompiler};
use strata::exec::{QueryExecutor, SqliteExecutor};
use strata::expr::{ComparisonOp, Direction, ExpressionNode, FieldPath, Literal};
use strata::schema::ObjectType;
use strata::sql::{ParamSet, SelectQuery, SqlExpr};
use strata::Value;

fn arb_op() -> impl Strategy<Value = ComparisonOp> {
    prop_oneof![
        Just(ComparisonOp::Eq),
        Just(ComparisonOp::Neq),
        Just(ComparisonOp::Lt),
        Just(ComparisonOp::Gt),
        Just(ComparisonOp::Lte),
        Just(ComparisonOp::Gte),
    ]
}

fn arb_equality() -> impl Strategy<Value = ComparisonOp> {
    prop_oneof![Just(ComparisonOp::Eq), Just(ComparisonOp::Neq)]
}

fn arb_comparison() -> impl Strategy<Value = ExpressionNode> {
    prop_oneof![
        (arb_op(), 0i64..7).prop_map(|(op, v)| ExpressionNode::field_cmp("uid", op, Literal::Int(v))),
        (arb_op(), 0i64..5).prop_map(|(op, v)| {
            ExpressionNode::field_cmp("score", op, Literal::Float(v as f64 * 0.75))
        }),
        arb_equality().prop_map(|op| ExpressionNode::field_cmp("score", op, Literal::Null)),
        (
            arb_equality(),
            prop::sample::select(vec!["Home", "About", "Team", "Nope"])
        )
            .prop_map(|(op, title)| {
                ExpressionNode::field_cmp("title", op, Literal::String(title.to_string()))
            }),
        (arb_equality(), any::<bool>())
            .prop_map(|(op, flag)| ExpressionNode::field_cmp("hidden", op, Literal::Bool(flag))),
        prop::collection::vec(0i64..7, 1..=4).prop_map(|items| {
            ExpressionNode::compare(
                ComparisonOp::In,
                ExpressionNode::FieldPath(FieldPath::new("uid")),
                ExpressionNode::ListLiteral(items.into_iter().map(Literal::Int).collect()),
            )
        }),
    ]
}

fn arb_filter() -> impl Strategy<Value = ExpressionNode> {
    arb_comparison().prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| ExpressionNode::and(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| ExpressionNode::or(l, r)),
        ]
    })
}

fn compile(page: &ObjectType, ast: &ExpressionNode, domain: Domain) -> (Option<SqlExpr>, ParamSet) {
    let mut params = ParamSet::new();
    let expr = PredicateCompiler::new(page, "t", &mut params)
        .compile(Some(ast), domain)
        .unwrap();
    (expr, params)
}

/// Page uids matching `predicate`, ascending.
fn matching(exec: &SqliteExecutor, predicate: Option<SqlExpr>, params: ParamSet) -> Vec<i64> {
    let mut query = SelectQuery::from_table("pages", "t");
    query.params = params;
    query.select_column("uid");
    if let Some(predicate) = predicate {
        query.and_where(predicate);
    }
    query.order(SqlExpr::column("t", "uid"), Direction::Ascending);
    let rendered = query.render().unwrap();
    exec.execute(&rendered)
        .unwrap()
        .iter()
        .map(|row| match row.get("uid") {
            Some(Value::Int(uid)) => *uid,
            other => panic!("unexpected uid {other:?}"),
        })
        .collect()
}

fn runner() -> TestRunner {
    TestRunner::new(Config {
        cases: 128,
        ..Config::default()
    })
}

#[test]
fn prop_negated_domain_matches_sql_not() {
    let schema = common::schema();
    let page = schema.object("Page").unwrap();
    let exec = common::seeded();
    runner()
        .run(&arb_filter(), |ast| {
            let (negated, params) = compile(page, &ast, Domain::Negated);
            let pushed = matching(&exec, negated, params);

            let (normal, params) = compile(page, &ast, Domain::Normal);
            let wrapped = normal.map(|expr| SqlExpr::Not(Box::new(expr)));
            let outside = matching(&exec, wrapped, params);

            prop_assert_eq!(pushed, outside, "filter: {}", ast);
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_double_negation_is_identity() {
    let schema = common::schema();
    let page = schema.object("Page").unwrap();
    let exec = common::seeded();
    runner()
        .run(&arb_filter(), |ast| {
            let twice = ExpressionNode::not(ExpressionNode::not(ast.clone()));
            let (plain, plain_params) = compile(page, &ast, Domain::Normal);
            let (doubled, doubled_params) = compile(page, &twice, Domain::Normal);
            prop_assert_eq!(&plain, &doubled, "filter: {}", ast);
            prop_assert_eq!(
                matching(&exec, plain, plain_params),
                matching(&exec, doubled, doubled_params)
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn prop_filter_and_negation_never_overlap() {
    let schema = common::schema();
    let page = schema.object("Page").unwrap();
    let exec = common::seeded();
    runner()
        .run(&arb_filter(), |ast| {
            let (normal, params) = compile(page, &ast, Domain::Normal);
            let kept = matching(&exec, normal, params);
            let (negated, params) = compile(page, &ast, Domain::Negated);
            let dropped = matching(&exec, negated, params);
            prop_assert!(
                kept.iter().all(|uid| !dropped.contains(uid)),
                "filter: {} kept {:?} dropped {:?}",
                ast,
                kept,
                dropped
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn null_comparisons_flip_with_the_domain() {
    let schema = common::schema();
    let page = schema.object("Page").unwrap();
    let exec = common::seeded();
    let eq_null = ExpressionNode::field_cmp("score", ComparisonOp::Eq, Literal::Null);

    let (normal, params) = compile(page, &eq_null, Domain::Normal);
    assert_eq!(normal, Some(SqlExpr::is_null(SqlExpr::column("t", "score"))));
    assert!(params.is_empty());
    assert_eq!(matching(&exec, normal, params), vec![2, 5]);

    let (negated, params) = compile(page, &eq_null, Domain::Negated);
    assert_eq!(negated, Some(SqlExpr::is_not_null(SqlExpr::column("t", "score"))));
    assert_eq!(matching(&exec, negated, params), vec![1, 3, 4]);
}
