#![allow(missing_docs)]

mod common;

use std::collections::{BTreeSet, HashSet};

use strata::context::{
    Aspect, AspectContext, ColumnSet, LanguageAspect, OverlayMode, WorkspaceAspect,
};
use strata::exec::{QueryAssembler, QueryExecutor, SqliteExecutor};
use strata::resolve::{resolver_for, Arguments, FieldInfo, FieldPathId, ResolveContext};
use strata::{EngineConfig, Execution, Row, Selection, Value};

const WORKSPACE_ROWS: &str = "
    INSERT INTO pages (uid, pid, title, sorting, version_origin, version_workspace, version_state) VALUES
        (1, 0, 'Home', 1, 0, 0, 0),
        (2, 1, 'About', 2, 0, 0, 0),
        (3, 1, 'Team', 1, 0, 0, 0),
        (20, 1, 'About (draft)', 2, 2, 7, 0),
        (21, 0, 'About', 9, 2, 7, 4),
        (30, 1, 'Team', 1, 3, 7, 2),
        (40, 1, 'Jobs', 5, 0, 7, 1),
        (50, 0, 'Home (ws8)', 1, 1, 8, 0);
";

const LANGUAGE_ROWS: &str = "
    INSERT INTO pages (uid, pid, title, sorting) VALUES (1, 0, 'Home', 1);
    INSERT INTO contents (uid, pid, header, sorting, language_id, translation_source) VALUES
        (10, 1, 'Welcome', 1, 0, 0),
        (11, 1, 'Intro', 2, 0, 0),
        (12, 1, 'Willkommen', 1, 1, 10),
        (13, 1, 'Nur deutsch', 3, 1, 0),
        (14, 1, 'Footer', 4, -1, 0);
";

const TRANSLATED_DRAFT_ROWS: &str = "
    INSERT INTO pages (uid, pid, title, sorting, language_id, translation_source, version_origin, version_workspace, version_state) VALUES
        (1, 0, 'Home', 1, 0, 0, 0, 0, 0),
        (2, 0, 'Start', 1, 1, 1, 0, 0, 0),
        (3, 0, 'Start DRAFT', 1, 1, 1, 2, 7, 0);
";

fn with_rows(rows: &str) -> SqliteExecutor {
    let exec = common::empty();
    exec.execute_batch(rows).unwrap();
    exec
}

fn workspace(id: i64) -> AspectContext {
    AspectContext::new().with(Aspect::Workspace(WorkspaceAspect::new(id)))
}

fn language(id: i64, overlay: OverlayMode) -> AspectContext {
    AspectContext::new().with(Aspect::Language(LanguageAspect::new(id, overlay)))
}

fn pages(aspects: AspectContext, root: Selection) -> serde_json::Value {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = with_rows(WORKSPACE_ROWS);
    let value = Execution::new(&schema, &config)
        .with_aspects(aspects)
        .run(&exec, &root, "Page")
        .unwrap();
    common::to_json(&value)
}

/// Headers of page 1's contents under `aspects`, through the relation resolver.
fn home_contents(aspects: &AspectContext) -> Vec<String> {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = with_rows(LANGUAGE_ROWS);
    let mut ctx = ResolveContext::new(&schema, &config, aspects, &exec);
    let resolver = resolver_for(&schema, schema.object("Page").unwrap(), "contents").unwrap();
    let info = FieldInfo::new(
        "contents",
        FieldPathId::root("pages").child("contents"),
        ColumnSet::Only(BTreeSet::from(["header".to_string()])),
    );
    let args = Arguments::default();
    let home = Row::from([("uid".to_string(), Value::Int(1))]);
    resolver.collect(Some(&home), &args, &mut ctx, &info).unwrap();
    let value = resolver.resolve(Some(&home), &args, &mut ctx, &info).unwrap();
    assert_eq!(exec.statements_executed(), 1);
    common::texts(&value, "header")
}

#[test]
fn live_workspace_reads_only_live_rows() {
    let root = Selection::new("pages")
        .argument("order", "uid asc")
        .fields(["uid", "title"]);
    assert_eq!(
        pages(workspace(0), root),
        serde_json::json!([
            { "uid": 1, "title": "Home" },
            { "uid": 2, "title": "About" },
            { "uid": 3, "title": "Team" }
        ])
    );
}

#[test]
fn workspace_overlays_deletes_moves_and_new_rows() {
    let root = Selection::new("pages")
        .argument("order", "sorting asc")
        .fields(["uid", "pid", "title", "sorting"]);
    assert_eq!(
        pages(workspace(7), root),
        serde_json::json!([
            { "uid": 1, "pid": 0, "title": "Home", "sorting": 1 },
            { "uid": 40, "pid": 1, "title": "Jobs", "sorting": 5 },
            { "uid": 2, "pid": 0, "title": "About (draft)", "sorting": 9 }
        ])
    );
}

#[test]
fn filters_see_workspace_values() {
    let root = Selection::new("pages")
        .argument("filter", "pid = 0")
        .argument("order", "uid asc")
        .fields(["uid", "title"]);
    assert_eq!(
        pages(workspace(7), root),
        serde_json::json!([
            { "uid": 1, "title": "Home" },
            { "uid": 2, "title": "About (draft)" }
        ])
    );
    let root = Selection::new("pages")
        .argument("filter", "title = `Home (ws8)`")
        .fields(["uid", "title"]);
    assert_eq!(
        pages(workspace(8), root),
        serde_json::json!([{ "uid": 1, "title": "Home (ws8)" }])
    );
}

#[test]
fn language_modes_pick_rows() {
    assert_eq!(
        home_contents(&language(0, OverlayMode::On)),
        vec!["Welcome", "Intro", "Footer"]
    );
    assert_eq!(
        home_contents(&language(1, OverlayMode::Off)),
        vec!["Willkommen", "Nur deutsch", "Footer"]
    );
    assert_eq!(
        home_contents(&language(1, OverlayMode::Mixed)),
        vec!["Willkommen", "Intro", "Footer"]
    );
    assert_eq!(
        home_contents(&language(1, OverlayMode::On)),
        vec!["Willkommen", "Footer"]
    );
    assert_eq!(
        home_contents(&language(1, OverlayMode::OnWithFloating)),
        vec!["Willkommen", "Nur deutsch", "Footer"]
    );
}

#[test]
fn overlaid_rows_keep_the_default_language_identity() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = with_rows(LANGUAGE_ROWS);
    let root = Selection::new("pages")
        .fields(["title"])
        .child(Selection::new("contents").fields(["uid", "header"]));
    let value = Execution::new(&schema, &config)
        .with_aspects(language(1, OverlayMode::Mixed))
        .run(&exec, &root, "Page")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        serde_json::json!([{
            "title": "Home",
            "contents": [
                { "uid": 10, "header": "Willkommen" },
                { "uid": 11, "header": "Intro" },
                { "uid": 14, "header": "Footer" }
            ]
        }])
    );
}

#[test]
fn nested_views_compose_with_shared_parameter_names() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = workspace(7).with(Aspect::Language(LanguageAspect::new(1, OverlayMode::Mixed)));
    let page = schema.object("Page").unwrap();
    let build = || {
        let assembler = QueryAssembler::new(&schema, &config, &aspects);
        let mut query = assembler.table(page).unwrap();
        query
            .project(&ColumnSet::Only(BTreeSet::from(["title".to_string()])))
            .project_source();
        query.build().unwrap().render().unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first, second);

    let sql = &first.sql;
    // Language outermost, workspace inside it, and the translation leg reads
    // the workspace view too.
    let language_join = sql.find(r#") AS "tr" ON"#).unwrap();
    let workspace_join = sql.find(r#"LEFT JOIN "pages" AS "ov""#).unwrap();
    assert!(workspace_join < language_join);
    assert_eq!(sql.matches(r#"LEFT JOIN "pages" AS "ov""#).count(), 2);
    assert!(!sql.contains(r#"LEFT JOIN "pages" AS "tr""#));
    assert!(!sql.contains(r#""score""#));
    assert!(!sql.contains(r#""hidden""#));

    let names: HashSet<&str> = first.params.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names.len(), first.params.len());
    assert!(names.iter().all(|name| name.starts_with(":p_")));

    let exec = with_rows(WORKSPACE_ROWS);
    let root = Selection::new("pages").argument("order", "uid asc").fields(["uid", "title"]);
    let value = Execution::new(&schema, &config)
        .with_aspects(aspects.clone())
        .run(&exec, &root, "Page")
        .unwrap();
    assert_eq!(
        common::to_json(&value),
        serde_json::json!([
            { "uid": 1, "title": "Home" },
            { "uid": 2, "title": "About (draft)" },
            { "uid": 40, "title": "Jobs" }
        ])
    );
}

#[test]
fn translations_follow_the_active_workspace() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let exec = with_rows(TRANSLATED_DRAFT_ROWS);
    let root = Selection::new("pages").fields(["uid", "title"]);
    let run = |workspace_id: i64| {
        let aspects = workspace(workspace_id)
            .with(Aspect::Language(LanguageAspect::new(1, OverlayMode::Mixed)));
        let value = Execution::new(&schema, &config)
            .with_aspects(aspects)
            .run(&exec, &root, "Page")
            .unwrap();
        common::to_json(&value)
    };
    assert_eq!(run(0), serde_json::json!([{ "uid": 1, "title": "Start" }]));
    assert_eq!(run(7), serde_json::json!([{ "uid": 1, "title": "Start DRAFT" }]));
}

#[test]
fn tables_without_the_aspect_are_read_directly() {
    let schema = common::schema();
    let config = EngineConfig::default();
    let aspects = workspace(7).with(Aspect::Language(LanguageAspect::new(1, OverlayMode::On)));
    let assembler = QueryAssembler::new(&schema, &config, &aspects);
    let mut query = assembler.table(schema.object("Image").unwrap()).unwrap();
    query.project(&ColumnSet::All);
    let rendered = query.build().unwrap().render().unwrap();
    assert_eq!(
        rendered.sql,
        r#"SELECT "t"."uid", "t"."name", "t"."width" FROM "images" AS "t""#
    );
    assert!(rendered.params.is_empty());
}
