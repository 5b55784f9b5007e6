#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use strata::exec::SqliteExecutor;
use strata::{EngineConfig, Schema, Value};

pub const SCHEMA: &str = r#"
interfaces = ["Asset"]

[tables.pages]
columns = ["uid", "pid", "title", "sorting", "hidden", "score", "language_id", "translation_source", "version_origin", "version_workspace", "version_state"]
default_sort = [{ column = "sorting" }]
versioning = { position = ["pid", "sorting"] }
localization = {}

[tables.contents]
columns = ["uid", "pid", "header", "sorting", "ctype", "media", "language_id", "translation_source"]
default_sort = [{ column = "sorting" }]
localization = {}

[tables.images]
columns = ["uid", "name", "width"]
default_sort = [{ column = "name" }]

[tables.files]
columns = ["uid", "name", "size"]
default_sort = [{ column = "name" }]

[tables.links]
columns = ["uid", "left_page", "right_page", "label"]

[types.Page]
table = "pages"
[types.Page.fields]
uid = { scalar = "Int" }
pid = { scalar = "Int" }
title = { scalar = "String" }
sorting = { scalar = "Int" }
hidden = { scalar = "Boolean" }
score = { scalar = "Float" }
contents = { relation = ["Content"], column = "pid", max = "many" }
headline = { relation = ["Content"], column = "pid", match = { ctype = "header" } }
parent = { relation = ["Page"], storage = "inline", column = "pid" }
owner = { relation = ["Page"], storage = "inline", column = "pid", min = 1 }
links = { relation = ["Link"], storage = "symmetric", column = "left_page", mirror = "right_page", max = "many" }

[types.Content]
table = "contents"
[types.Content.fields]
uid = { scalar = "Int" }
pid = { scalar = "Int" }
header = { scalar = "String" }
sorting = { scalar = "Int" }
ctype = { scalar = "String" }
media = { relation = ["Asset"], storage = "inline", column = "media", max = "many" }

[types.Image]
table = "images"
implements = ["Asset"]
[types.Image.fields]
uid = { scalar = "Int" }
name = { scalar = "String" }
width = { scalar = "Int" }

[types.File]
table = "files"
implements = ["Asset"]
[types.File.fields]
uid = { scalar = "Int" }
name = { scalar = "String" }
size = { scalar = "Int" }

[types.Link]
table = "links"
[types.Link.fields]
uid = { scalar = "Int" }
label = { scalar = "String" }
"#;

pub const DDL: &str = "
    CREATE TABLE pages (uid INTEGER PRIMARY KEY, pid INTEGER NOT NULL DEFAULT 0, title TEXT,
        sorting INTEGER NOT NULL DEFAULT 0, hidden INTEGER NOT NULL DEFAULT 0, score REAL,
        language_id INTEGER NOT NULL DEFAULT 0, translation_source INTEGER NOT NULL DEFAULT 0,
        version_origin INTEGER NOT NULL DEFAULT 0, version_workspace INTEGER NOT NULL DEFAULT 0,
        version_state INTEGER NOT NULL DEFAULT 0);
    CREATE TABLE contents (uid INTEGER PRIMARY KEY, pid INTEGER NOT NULL DEFAULT 0, header TEXT,
        sorting INTEGER NOT NULL DEFAULT 0, ctype TEXT, media TEXT,
        language_id INTEGER NOT NULL DEFAULT 0, translation_source INTEGER NOT NULL DEFAULT 0);
    CREATE TABLE images (uid INTEGER PRIMARY KEY, name TEXT, width INTEGER);
    CREATE TABLE files (uid INTEGER PRIMARY KEY, name TEXT, size INTEGER);
    CREATE TABLE links (uid INTEGER PRIMARY KEY, left_page INTEGER, right_page INTEGER, label TEXT);
";

pub const SEED: &str = "
    INSERT INTO pages (uid, pid, title, sorting, hidden, score) VALUES
        (1, 0, 'Home', 1, 0, 1.5),
        (2, 1, 'About', 2, 0, NULL),
        (3, 1, 'Team', 1, 1, 3.0),
        (4, 2, 'History', 1, 0, 2.5),
        (5, 0, 'Archive', 3, 1, NULL);
    INSERT INTO contents (uid, pid, header, sorting, ctype, media) VALUES
        (10, 1, 'Welcome', 1, 'header', 'images_1,files_1'),
        (11, 1, 'Intro', 2, 'text', 'files_2'),
        (12, 2, 'Who we are', 1, 'text', NULL),
        (13, 4, 'Founded', 1, 'header', '2');
    INSERT INTO images VALUES
        (1, 'hero.png', 800), (2, 'logo.png', 120), (3, 'icon.png', NULL),
        (4, 'banner.png', 1200), (5, 'thumb.png', 64);
    INSERT INTO files VALUES (1, 'brochure.pdf', 2048), (2, 'notes.txt', 12);
    INSERT INTO links VALUES
        (100, 1, 2, 'home-about'), (101, 3, 1, 'team-home'), (102, 4, NULL, 'history-dangling');
";

pub fn schema() -> Arc<Schema> {
    Schema::from_toml_str(SCHEMA, &EngineConfig::default()).expect("schema builds")
}

/// In-memory database with the sample tables, seeded.
pub fn seeded() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().expect("open in-memory db");
    exec.execute_batch(DDL).expect("create tables");
    exec.execute_batch(SEED).expect("seed rows");
    exec
}

/// In-memory database with the sample tables and no rows.
pub fn empty() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().expect("open in-memory db");
    exec.execute_batch(DDL).expect("create tables");
    exec
}

/// On-disk database with the sample tables, seeded.
pub fn seeded_file(path: &Path) {
    let exec = SqliteExecutor::open(path).expect("open db file");
    exec.execute_batch(DDL).expect("create tables");
    exec.execute_batch(SEED).expect("seed rows");
}

/// Integer `field` of every object in a list value.
pub fn ints(value: &Value, field: &str) -> Vec<i64> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(row) => row[field].as_i64().expect("integer field"),
                other => panic!("expected object, got {other:?}"),
            })
            .collect(),
        other => panic!("expected list, got {other:?}"),
    }
}

/// Text `field` of every object in a list value.
pub fn texts(value: &Value, field: &str) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(row) => row[field].as_str().expect("text field").to_string(),
                other => panic!("expected object, got {other:?}"),
            })
            .collect(),
        other => panic!("expected list, got {other:?}"),
    }
}

pub fn to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).expect("value serializes")
}
