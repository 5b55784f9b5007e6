#![allow(missing_docs)]

mod common;

use serde_json::json;
use strata::context::{AspectContext, ColumnSet};
use strata::exec::{QueryExecutor, SqliteExecutor};
use strata::resolve::{resolver_for, Arguments, FieldInfo, FieldPathId, ResolveContext};
use strata::{DefaultParser, EngineConfig, Error, Execution, ExpressionParser, Row, Selection, Value};

fn content(uid: i64, media: &str) -> Row {
    Row::from([
        ("uid".to_string(), Value::Int(uid)),
        ("media".to_string(), Value::String(media.to_string())),
    ])
}

/// Resolves `media` for each row in `contents`, collecting all of them first.
fn media(
    exec: &SqliteExecutor,
    contents: &[Row],
    filter: Option<&str>,
    order: Option<&str>,
) -> Result<Vec<Vec<String>>, Error> {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = AspectContext::new();
    let mut ctx = ResolveContext::new(&schema, &config, &aspects, exec);
    let resolver = resolver_for(&schema, schema.object("Content").unwrap(), "media")?;
    let info = FieldInfo::new(
        "media",
        FieldPathId::root("contents").child("media"),
        ColumnSet::All,
    );
    let args = Arguments {
        filter: match filter {
            Some(text) => DefaultParser.parse_filter(text)?,
            None => None,
        },
        order: match order {
            Some(text) => DefaultParser.parse_order(text)?,
            None => None,
        },
    };
    for row in contents {
        resolver.collect(Some(row), &args, &mut ctx, &info)?;
    }
    let mut out = Vec::new();
    for row in contents {
        let value = resolver.resolve(Some(row), &args, &mut ctx, &info)?;
        out.push(common::texts(&value, "name"));
    }
    Ok(out)
}

#[test]
fn inline_references_follow_declared_default_order() {
    let exec = common::seeded();
    let got = media(
        &exec,
        &[content(1, "images_1,files_1,images_2"), content(2, " files_2 , ,images_1")],
        None,
        None,
    )
    .unwrap();
    assert_eq!(
        got,
        vec![
            vec!["brochure.pdf", "hero.png", "logo.png"],
            vec!["hero.png", "notes.txt"],
        ]
    );
    // One statement per target table, shared by both rows.
    assert_eq!(exec.statements_executed(), 2);
}

#[test]
fn bare_identifiers_use_the_first_target_table() {
    let exec = common::seeded();
    let got = media(&exec, &[content(1, "2"), content(2, "images_2,1")], None, None).unwrap();
    assert_eq!(got, vec![vec!["notes.txt"], vec!["brochure.pdf", "logo.png"]]);
}

#[test]
fn unconstrained_order_sorts_across_tables() {
    let exec = common::seeded();
    let got = media(
        &exec,
        &[content(1, "images_1,files_1,images_2,files_2")],
        None,
        Some("name asc"),
    )
    .unwrap();
    assert_eq!(
        got,
        vec![vec!["brochure.pdf", "hero.png", "logo.png", "notes.txt"]]
    );
}

#[test]
fn field_missing_on_one_table_sorts_as_null() {
    let exec = common::seeded();
    let rows = [content(1, "images_1,files_1,images_2")];
    let desc = media(&exec, &rows, None, Some("width desc")).unwrap();
    assert_eq!(desc, vec![vec!["hero.png", "logo.png", "brochure.pdf"]]);

    let asc = media(&exec, &rows, None, Some("width asc")).unwrap();
    assert_eq!(asc, vec![vec!["brochure.pdf", "logo.png", "hero.png"]]);
}

#[test]
fn constrained_keys_apply_per_table() {
    let exec = common::seeded();
    let got = media(
        &exec,
        &[content(1, "images_2,files_2,images_1,files_1")],
        None,
        Some("size on File desc, name asc"),
    )
    .unwrap();
    assert_eq!(
        got,
        vec![vec!["brochure.pdf", "notes.txt", "hero.png", "logo.png"]]
    );
}

#[test]
fn filters_on_fields_of_one_type_exclude_the_other() {
    let exec = common::seeded();
    let rows = [content(1, "images_1,files_1,images_2")];
    assert_eq!(
        media(&exec, &rows, Some("width > 100"), None).unwrap(),
        vec![vec!["hero.png", "logo.png"]]
    );
    assert_eq!(
        media(&exec, &rows, Some("not width > 500"), None).unwrap(),
        vec![vec!["brochure.pdf", "logo.png"]]
    );
    assert_eq!(
        media(&exec, &rows, Some("name on File = `brochure.pdf`"), None).unwrap(),
        vec![vec!["brochure.pdf"]]
    );
    assert_eq!(
        media(&exec, &rows, Some("name on Image = `hero.png` or name on File = `brochure.pdf`"), None)
            .unwrap(),
        vec![vec!["brochure.pdf", "hero.png"]]
    );
}

#[test]
fn abstract_and_foreign_constraints_are_rejected() {
    let exec = common::seeded();
    let rows = [content(1, "images_1")];
    let err = media(&exec, &rows, None, Some("name on Asset asc")).unwrap_err();
    assert_eq!(err.code(), "AbstractTypeConstraint");
    let err = media(&exec, &rows, None, Some("title on Page asc")).unwrap_err();
    assert_eq!(err.code(), "ConstraintOutOfScope");
    let err = media(&exec, &rows, Some("name on Video = `x`"), None).unwrap_err();
    assert_eq!(err.code(), "UnknownType");
    assert_eq!(exec.statements_executed(), 0);
}

#[test]
fn malformed_references_are_fatal() {
    let exec = common::seeded();
    for stored in ["videos_3", "images_", "images_1,links_100"] {
        let err = media(&exec, &[content(1, stored)], None, None).unwrap_err();
        assert_eq!(err.code(), "MalformedKey", "{stored}");
        assert!(err.is_fatal());
    }
    assert_eq!(exec.statements_executed(), 0);
}

#[test]
fn runtime_renders_type_specific_fields() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = common::seeded();
    let root = Selection::new("contents")
        .argument("filter", "uid = 10")
        .fields(["header"])
        .child(
            Selection::new("media")
                .argument("order", "name desc")
                .fields(["name", "width", "size"]),
        );
    let value = Execution::new(&schema, &config)
        .run(&exec, &root, "Content")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        json!([{
            "header": "Welcome",
            "media": [
                { "name": "hero.png", "width": 800 },
                { "name": "brochure.pdf", "size": 2048 }
            ]
        }])
    );
}
