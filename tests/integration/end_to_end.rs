#![allow(missing_docs)]

mod common;

use serde_json::json;
use strata::exec::QueryExecutor;
use strata::{EngineConfig, Execution, Selection};

#[test]
fn in_list_filter_returns_exactly_the_listed_rows() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("images")
        .argument("filter", "uid in [1, 2, 5]")
        .fields(["uid"]);
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Image")
        .unwrap();
    let mut ids = common::ints(&value, "uid");
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 5]);
    assert_eq!(exec.statements_executed(), 1);
}

#[test]
fn order_argument_orders_root_rows() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("images")
        .argument("filter", "uid in [1, 2, 5]")
        .argument("order", "width desc")
        .fields(["uid", "name"]);
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Image")
        .unwrap();
    assert_eq!(common::ints(&value, "uid"), vec![1, 2, 5]);
    assert_eq!(
        common::texts(&value, "name"),
        vec!["hero.png", "logo.png", "thumb.png"]
    );
}

#[test]
fn null_comparisons_select_missing_values() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let run = |filter: &str| {
        let root = Selection::new("pages")
            .argument("filter", filter)
            .argument("order", "uid asc")
            .fields(["uid"]);
        let value = Execution::new(&schema, &config)
            .run(&exec, &root, "Page")
            .unwrap();
        common::ints(&value, "uid")
    };
    assert_eq!(run("score = null"), vec![2, 5]);
    assert_eq!(run("score != null"), vec![1, 3, 4]);
    assert_eq!(run("not score = null"), vec![1, 3, 4]);
    assert_eq!(run("not (score > 2 or hidden = true)"), vec![1]);
}

#[test]
fn nested_selection_batches_each_field_once() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("pages")
        .argument("filter", "pid = 0")
        .fields(["title"])
        .child(
            Selection::new("contents")
                .argument("order", "sorting desc")
                .fields(["header"])
                .child(Selection::new("media").fields(["name"])),
        )
        .child(Selection::new("headline").fields(["header"]))
        .child(Selection::new("parent").fields(["title"]));
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Page")
        .unwrap();

    assert_eq!(
        common::to_json(&value),
        json!([
            {
                "title": "Home",
                "contents": [
                    { "header": "Intro", "media": [{ "name": "notes.txt" }] },
                    {
                        "header": "Welcome",
                        "media": [{ "name": "brochure.pdf" }, { "name": "hero.png" }]
                    }
                ],
                "headline": { "header": "Welcome" },
                "parent": null
            },
            {
                "title": "Archive",
                "contents": [],
                "headline": null,
                "parent": null
            }
        ])
    );
    // pages, contents, media (files + images), headline, parent.
    assert_eq!(exec.statements_executed(), 6);
}

#[test]
fn child_pages_resolve_their_parent() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("pages")
        .argument("filter", "pid != 0")
        .argument("order", "title asc")
        .fields(["title"])
        .child(Selection::new("parent").fields(["title"]))
        .child(Selection::new("owner").fields(["uid"]));
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Page")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        json!([
            { "title": "About", "parent": { "title": "Home" }, "owner": { "uid": 1 } },
            { "title": "History", "parent": { "title": "About" }, "owner": { "uid": 2 } },
            { "title": "Team", "parent": { "title": "Home" }, "owner": { "uid": 1 } }
        ])
    );
}

#[test]
fn required_single_relation_without_rows_is_an_empty_list() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("pages")
        .argument("filter", "uid = 1")
        .fields(["uid"])
        .child(Selection::new("owner").fields(["uid"]))
        .child(Selection::new("parent").fields(["uid"]))
        .child(Selection::new("contents").argument("filter", "ctype = `none`").fields(["uid"]));
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Page")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        json!([{ "uid": 1, "owner": [], "parent": null, "contents": [] }])
    );
}

#[test]
fn symmetric_links_match_either_endpoint() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("pages")
        .argument("filter", "uid in [1, 4, 5]")
        .argument("order", "uid asc")
        .fields(["uid"])
        .child(Selection::new("links").argument("order", "label asc").fields(["label"]));
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Page")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        json!([
            { "uid": 1, "links": [{ "label": "home-about" }, { "label": "team-home" }] },
            { "uid": 4, "links": [{ "label": "history-dangling" }] },
            { "uid": 5, "links": [] }
        ])
    );
    assert_eq!(exec.statements_executed(), 2);
}

#[test]
fn invalid_expressions_fail_before_any_statement() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let cases = [
        (Selection::new("pages").argument("order", "title on Int ascending"), "LeafTypeConstraint"),
        (Selection::new("pages").argument("order", "a.b ascending"), "NestedFieldNotSupported"),
        (Selection::new("pages").argument("order", "contents asc"), "FieldNotOrderable"),
        (Selection::new("pages").argument("filter", "title = 5"), "TypeMismatch"),
        (Selection::new("pages").argument("filter", "uid in []"), "InListEmpty"),
        (Selection::new("pages").argument("filter", "title < null"), "NullNotAllowed"),
        (Selection::new("pages").argument("filter", "uid = "), "SyntaxError"),
        (Selection::new("pages").argument("limit", "3"), "UnknownArgument"),
        (Selection::new("pages").fields(["bodytext"]), "UnknownSelection"),
        (
            Selection::new("pages").child(
                Selection::new("contents").argument("filter", "name on Image = `x`"),
            ),
            "ConstraintOutOfScope",
        ),
    ];
    for (root, code) in cases {
        let exec = common::seeded();
        let err = Execution::new(&schema, &config)
            .run(&exec, &root, "Page")
            .unwrap_err();
        assert_eq!(err.code(), code, "{root:?}");
        assert!(err.is_user_facing());
        assert_eq!(exec.statements_executed(), 0, "{root:?}");
    }
}
