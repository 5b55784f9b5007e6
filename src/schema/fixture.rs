//! Sample schema shared by unit tests.

use std::sync::Arc;

use super::Schema;
use crate::config::EngineConfig;

pub(crate) const SAMPLE: &str = r#"
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
parent = { relation = ["Page"], storage = "inline", column = "pid" }
links = { relation = ["Link"], storage = "symmetric", column = "left_page", mirror = "right_page", max = "many" }

[types.Content]
table = "contents"
[types.Content.fields]
uid = { scalar = "Int" }
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

pub(crate) fn sample() -> Arc<Schema> {
    Schema::from_toml_str(SAMPLE, &EngineConfig::default()).expect("sample schema builds")
}
