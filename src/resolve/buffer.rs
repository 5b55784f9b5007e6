use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::compile::SortPlan;
use crate::error::ResolverError;
use crate::value::{Row, RowKey};

/// Keys collected for one field, grouped by target table, in first-seen
/// order and without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySet {
    by_table: BTreeMap<String, Vec<RowKey>>,
    seen: FxHashSet<(String, RowKey)>,
}

impl KeySet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` for `table`. Returns `false` when it was already present.
    pub fn insert(&mut self, table: &str, key: RowKey) -> bool {
        if !self.seen.insert((table.to_string(), key.clone())) {
            return false;
        }
        self.by_table.entry(table.to_string()).or_default().push(key);
        true
    }

    /// Whether `key` was collected for `table`.
    pub fn contains(&self, table: &str, key: &RowKey) -> bool {
        self.seen.contains(&(table.to_string(), key.clone()))
    }

    /// Tables with at least one key, and their keys.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[RowKey])> {
        self.by_table.iter().map(|(t, k)| (t.as_str(), k.as_slice()))
    }

    /// Total keys across tables.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// No key collected.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Index slot: the table qualifies identities of inline relations, and is
/// absent for keys that are parent identities.
type IndexKey = (Option<String>, RowKey);

/// Rows of one flushed field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedBuffer {
    keys: KeySet,
    rows: Vec<Row>,
    index: FxHashMap<IndexKey, SmallVec<[usize; 4]>>,
    plan: SortPlan,
}

impl ResolvedBuffer {
    /// Empty buffer answering for `keys`, ordered by `plan`.
    pub fn new(keys: KeySet, plan: SortPlan) -> Self {
        Self {
            keys,
            rows: Vec::new(),
            index: FxHashMap::default(),
            plan,
        }
    }

    /// Appends a fetched row and returns its position.
    pub fn push(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Indexes row `pos` under `(table, key)`. A row lands in a slot once.
    pub fn index(&mut self, table: Option<&str>, key: RowKey, pos: usize) {
        let slot = self.index.entry((table.map(str::to_string), key)).or_default();
        if !slot.contains(&pos) {
            slot.push(pos);
        }
    }

    /// Positions indexed under `(table, key)`, in fetch order.
    pub fn lookup(&self, table: Option<&str>, key: &RowKey) -> &[usize] {
        self.index
            .get(&(table.map(str::to_string), key.clone()))
            .map(|slot| slot.as_slice())
            .unwrap_or(&[])
    }

    /// Row at `pos`.
    pub fn row(&self, pos: usize) -> Option<&Row> {
        self.rows.get(pos)
    }

    /// Keys the flush answered for.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Sort plan computed at flush time.
    pub fn plan(&self) -> &SortPlan {
        &self.plan
    }

    /// Fetched rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No row fetched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-field buffer state. Absent from the cache means idle.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolverBuffer {
    /// Keys accumulated; no statement issued yet.
    Collecting(KeySet),
    /// Batched fetch done.
    Resolved(ResolvedBuffer),
}

impl ResolverBuffer {
    /// Records a key. Collecting after the flush is a protocol violation.
    pub fn collect(&mut self, handle: &str, table: &str, key: RowKey) -> Result<bool, ResolverError> {
        match self {
            ResolverBuffer::Collecting(keys) => Ok(keys.insert(table, key)),
            ResolverBuffer::Resolved(_) => Err(ResolverError::BufferState {
                handle: handle.to_string(),
                detail: "received keys after it was flushed",
            }),
        }
    }

    /// Whether the batched fetch already ran.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolverBuffer::Resolved(_))
    }
}
