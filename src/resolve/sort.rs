use std::cmp::Ordering;

use crate::compile::PostFetchKey;
use crate::expr::Direction;
use crate::value::{Row, Value};

/// Stable multi-key sort over rows from several tables.
///
/// A key reads its value only from rows whose `source_alias` column names one
/// of the key's tables; every other row contributes `NULL`, and `NULL` sorts
/// smallest.
pub fn post_fetch_sort(rows: &mut [&Row], keys: &[PostFetchKey], source_alias: &str) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in keys {
            let ord = sort_value(a, key, source_alias).sort_cmp(sort_value(b, key, source_alias));
            let ord = match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn sort_value<'r>(row: &'r Row, key: &PostFetchKey, source_alias: &str) -> &'r Value {
    static NULL: Value = Value::Null;
    let applies = row
        .get(source_alias)
        .and_then(Value::as_str)
        .is_some_and(|source| key.tables.contains(source));
    if !applies {
        return &NULL;
    }
    row.get(&key.alias).unwrap_or(&NULL)
}
