#![allow(missing_docs)]

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use strata::context::{AspectContext, ColumnSet};
use strata::exec::{QueryExecutor, SqliteExecutor};
use strata::resolve::{resolver_for, Arguments, FieldInfo, FieldPathId, ResolveContext, ResolverBuffer};
use strata::{EngineConfig, Execution, ExpressionParser, DefaultParser, Row, Selection, Value};

/// `n` pages, each with two contents.
fn fixture(n: i64) -> SqliteExecutor {
    let exec = common::empty();
    let mut sql = String::new();
    for uid in 1..=n {
        sql.push_str(&format!(
            "INSERT INTO pages (uid, pid, title, sorting) VALUES ({uid}, 0, 'p{uid}', {uid});\n"
        ));
        for slot in 0..2 {
            let content = uid * 10 + slot;
            sql.push_str(&format!(
                "INSERT INTO contents (uid, pid, header, sorting, media) VALUES \
                 ({content}, {uid}, 'c{content}', {slot}, 'images_{uid},files_{uid}');\n"
            ));
        }
        sql.push_str(&format!(
            "INSERT INTO images VALUES ({uid}, 'i{uid}', {uid});\n\
             INSERT INTO files VALUES ({uid}, 'f{uid}', {uid});\n"
        ));
    }
    exec.execute_batch(&sql).unwrap();
    exec
}

fn page(uid: i64) -> Row {
    Row::from([("uid".to_string(), Value::Int(uid))])
}

#[test]
fn one_statement_per_field_regardless_of_sibling_count() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let page_type = schema.object("Page").unwrap();
    for n in [1_i64, 5, 100] {
        let exec = fixture(n);
        let mut ctx = ResolveContext::new(&schema, &config, &aspects, &exec);
        let resolver = resolver_for(&schema, page_type, "contents").unwrap();
        let info = FieldInfo::new(
            "contents",
            FieldPathId::root("pages").child("contents"),
            ColumnSet::All,
        );
        let args = Arguments::default();
        for uid in 1..=n {
            resolver.collect(Some(&page(uid)), &args, &mut ctx, &info).unwrap();
        }
        for uid in 1..=n {
            let value = resolver.resolve(Some(&page(uid)), &args, &mut ctx, &info).unwrap();
            assert_eq!(common::ints(&value, "uid"), vec![uid * 10, uid * 10 + 1]);
        }
        assert_eq!(exec.statements_executed(), 1, "n = {n}");
    }
}

#[test]
fn nested_levels_batch_across_parents() {
    let schema = common::schema();
    let config = EngineConfig::default();
    for n in [1_i64, 5, 100] {
        let exec = fixture(n);
        let root = Selection::new("pages")
            .fields(["title"])
            .child(
                Selection::new("contents")
                    .fields(["header"])
                    .child(Selection::new("media").fields(["name"])),
            );
        let value = Execution::new(&schema, &config)
            .run(&exec, &root, "Page")
            .unwrap();
        let Value::List(pages) = &value else {
            panic!("expected list");
        };
        assert_eq!(pages.len() as i64, n);
        // pages, contents, media on files, media on images.
        assert_eq!(exec.statements_executed(), 4, "n = {n}");
    }
}

#[test]
fn collecting_the_same_key_twice_is_harmless() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let exec = fixture(2);
    let mut ctx = ResolveContext::new(&schema, &config, &aspects, &exec);
    let resolver = resolver_for(&schema, schema.object("Page").unwrap(), "contents").unwrap();
    let info = FieldInfo::new("contents", FieldPathId::root("pages").child("contents"), ColumnSet::All);
    let args = Arguments::default();
    for _ in 0..3 {
        resolver.collect(Some(&page(1)), &args, &mut ctx, &info).unwrap();
    }
    let value = resolver.resolve(Some(&page(1)), &args, &mut ctx, &info).unwrap();
    assert_eq!(common::ints(&value, "uid"), vec![10, 11]);
    let again = resolver.resolve(Some(&page(1)), &args, &mut ctx, &info).unwrap();
    assert_eq!(value, again);
    assert_eq!(exec.statements_executed(), 1);
}

#[test]
fn resolving_an_uncollected_row_is_fatal() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let exec = fixture(2);
    let mut ctx = ResolveContext::new(&schema, &config, &aspects, &exec);
    let resolver = resolver_for(&schema, schema.object("Page").unwrap(), "contents").unwrap();
    let info = FieldInfo::new("contents", FieldPathId::root("pages").child("contents"), ColumnSet::All);
    let args = Arguments::default();
    resolver.collect(Some(&page(1)), &args, &mut ctx, &info).unwrap();
    resolver.resolve(Some(&page(1)), &args, &mut ctx, &info).unwrap();

    let err = resolver.resolve(Some(&page(2)), &args, &mut ctx, &info).unwrap_err();
    assert_eq!(err.code(), "BufferState");
    assert!(err.is_fatal());

    let err = resolver.collect(Some(&page(2)), &args, &mut ctx, &info).unwrap_err();
    assert_eq!(err.code(), "BufferState");
}

#[test]
fn cancelled_flush_stays_collecting_and_retries() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let exec = fixture(3);
    let cancel = Arc::new(AtomicBool::new(true));
    let mut ctx = ResolveContext::new(&schema, &config, &aspects, &exec).with_cancel(Arc::clone(&cancel));
    let resolver = resolver_for(&schema, schema.object("Page").unwrap(), "contents").unwrap();
    let info = FieldInfo::new("contents", FieldPathId::root("pages").child("contents"), ColumnSet::All);
    let args = Arguments::default();
    for uid in 1..=3 {
        resolver.collect(Some(&page(uid)), &args, &mut ctx, &info).unwrap();
    }

    let err = resolver.resolve(Some(&page(1)), &args, &mut ctx, &info).unwrap_err();
    assert_eq!(err.code(), "Cancelled");
    assert_eq!(exec.statements_executed(), 0);
    match ctx.cache.get(&info.path) {
        Some(ResolverBuffer::Collecting(keys)) => assert_eq!(keys.len(), 3),
        other => panic!("expected collecting buffer, got {other:?}"),
    }

    cancel.store(false, std::sync::atomic::Ordering::SeqCst);
    let value = resolver.resolve(Some(&page(3)), &args, &mut ctx, &info).unwrap();
    assert_eq!(common::ints(&value, "uid"), vec![30, 31]);
    assert_eq!(exec.statements_executed(), 1);
}

#[test]
fn invalid_relation_filter_issues_no_statement() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let exec = fixture(2);
    let mut ctx = ResolveContext::new(&schema, &config, &aspects, &exec);
    let resolver = resolver_for(&schema, schema.object("Page").unwrap(), "contents").unwrap();
    let info = FieldInfo::new("contents", FieldPathId::root("pages").child("contents"), ColumnSet::All);
    let args = Arguments {
        filter: DefaultParser.parse_filter("title = `x`").unwrap(),
        order: None,
    };
    resolver.collect(Some(&page(1)), &args, &mut ctx, &info).unwrap();
    let err = resolver.resolve(Some(&page(1)), &args, &mut ctx, &info).unwrap_err();
    assert_eq!(err.code(), "UnknownField");
    assert_eq!(exec.statements_executed(), 0);
}
