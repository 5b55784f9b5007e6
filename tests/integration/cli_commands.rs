#![allow(missing_docs)]

mod common;

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    schema: PathBuf,
    db: PathBuf,
}

fn setup() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let schema = dir.path().join("schema.toml");
    fs::write(&schema, common::SCHEMA).expect("write schema");
    let db = dir.path().join("site.db");
    common::seeded_file(&db);
    Fixture {
        _dir: dir,
        schema,
        db,
    }
}

fn strata() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("strata");
    cmd.env_remove("STRATA_CONFIG").env_remove("STRATA_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn check_accepts_valid_expressions() {
    let fx = setup();
    strata()
        .args(["check", "--type", "Page", "--filter", "uid in [1, 2]", "--order", "title asc"])
        .arg("--schema")
        .arg(&fx.schema)
        .assert()
        .success()
        .stdout("ok\n");
}

#[test]
fn check_reports_validation_errors_with_code() {
    let fx = setup();
    let output = strata()
        .args(["check", "--type", "Page", "--order", "title on Int asc"])
        .arg("--schema")
        .arg(&fx.schema)
        .assert()
        .code(2)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[LeafTypeConstraint]"), "{stderr}");
}

#[test]
fn compile_prints_nested_view_sql() {
    let fx = setup();
    let output = strata()
        .args([
            "--format",
            "json",
            "compile",
            "--type",
            "Page",
            "--filter",
            "uid = 1",
            "--workspace",
            "7",
        ])
        .arg("--schema")
        .arg(&fx.schema)
        .assert()
        .success()
        .get_output()
        .clone();
    let body = stdout_json(&output);
    let sql = body["sql"].as_str().unwrap();
    assert!(sql.contains(r#"FROM (SELECT "base"."uid""#), "{sql}");
    assert!(sql.contains(r#"LEFT JOIN "pages" AS "ov""#), "{sql}");
    let mut values: Vec<i64> = body["params"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_i64().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 7]);
}

#[test]
fn compile_text_lists_parameters() {
    let fx = setup();
    let output = strata()
        .args(["compile", "--type", "Image", "--filter", "name = `hero.png`"])
        .arg("--schema")
        .arg(&fx.schema)
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("SELECT "), "{stdout}");
    assert!(stdout.contains("= 'hero.png'"), "{stdout}");
}

#[test]
fn query_prints_rows() {
    let fx = setup();
    let output = strata()
        .args([
            "--format",
            "json",
            "query",
            "--type",
            "Image",
            "--filter",
            "uid in [1, 2, 5]",
            "--order",
            "uid asc",
            "--select",
            "uid,name",
        ])
        .arg("--schema")
        .arg(&fx.schema)
        .arg("--db")
        .arg(&fx.db)
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(output.stdout.ends_with(b"]\n"));
    assert_eq!(
        stdout_json(&output),
        json!([
            { "uid": 1, "name": "hero.png" },
            { "uid": 2, "name": "logo.png" },
            { "uid": 5, "name": "thumb.png" }
        ])
    );
}

#[test]
fn query_selects_through_relations() {
    let fx = setup();
    let output = strata()
        .args([
            "query",
            "--type",
            "Page",
            "--filter",
            "uid = 1",
            "--select",
            "title,contents.header,contents.media.name",
        ])
        .arg("--schema")
        .arg(&fx.schema)
        .arg("--db")
        .arg(&fx.db)
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(
        stdout_json(&output),
        json!([{
            "title": "Home",
            "contents": [
                { "header": "Welcome", "media": [{ "name": "brochure.pdf" }, { "name": "hero.png" }] },
                { "header": "Intro", "media": [{ "name": "notes.txt" }] }
            ]
        }])
    );
}

#[test]
fn config_from_environment_applies_limits() {
    let fx = setup();
    let config = fx.schema.with_file_name("engine.toml");
    fs::write(&config, "[limits]\nmax_in_list = 1\n").unwrap();
    let output = strata()
        .env("STRATA_CONFIG", &config)
        .args(["check", "--type", "Page", "--filter", "uid in [1, 2]"])
        .arg("--schema")
        .arg(&fx.schema)
        .assert()
        .code(2)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[InListTooLarge]"), "{stderr}");
}

#[test]
fn missing_database_is_an_internal_error() {
    let fx = setup();
    let missing = fx.db.with_file_name("missing.db");
    strata()
        .args(["query", "--type", "Page"])
        .arg("--schema")
        .arg(&fx.schema)
        .arg("--db")
        .arg(&missing)
        .assert()
        .code(1);
    assert!(!missing.exists());
}
