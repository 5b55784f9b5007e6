use crate::error::ResolverError;
use crate::value::RowKey;

/// Splits a stored inline reference list into `(table, key)` pairs.
///
/// Entries are comma separated. An entry `images_12` names table `images`
/// and identity `12`; an entry without `_` belongs to `default_table`. Empty
/// entries are skipped and duplicates are dropped, keeping the first
/// occurrence.
pub fn parse_inline_keys(
    stored: &str,
    default_table: &str,
    allowed: &[&str],
) -> Result<Vec<(String, RowKey)>, ResolverError> {
    let mut out: Vec<(String, RowKey)> = Vec::new();
    for entry in stored.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (table, id) = match entry.rsplit_once('_') {
            Some((table, id)) => (table, id),
            None => (default_table, entry),
        };
        if id.is_empty() {
            return Err(ResolverError::MalformedKey {
                value: entry.to_string(),
                reason: "missing identifier",
            });
        }
        if !allowed.contains(&table) {
            return Err(ResolverError::MalformedKey {
                value: entry.to_string(),
                reason: "table is not a target of the relation",
            });
        }
        let pair = (table.to_string(), RowKey::parse(id));
        if !out.contains(&pair) {
            out.push(pair);
        }
    }
    Ok(out)
}
