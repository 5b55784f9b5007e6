use rustc_hash::FxHashMap;

use super::{FieldPathId, ResolverBuffer};

/// Request-scoped buffer store. Created per execution and dropped with it.
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: FxHashMap<FieldPathId, ResolverBuffer>,
}

impl RequestCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer at `path`.
    pub fn get(&self, path: &FieldPathId) -> Option<&ResolverBuffer> {
        self.entries.get(path)
    }

    /// Mutable buffer at `path`.
    pub fn get_mut(&mut self, path: &FieldPathId) -> Option<&mut ResolverBuffer> {
        self.entries.get_mut(path)
    }

    /// Stores `buffer` at `path`, replacing any previous state.
    pub fn set(&mut self, path: FieldPathId, buffer: ResolverBuffer) {
        self.entries.insert(path, buffer);
    }

    /// Whether a buffer exists at `path`.
    pub fn has(&self, path: &FieldPathId) -> bool {
        self.entries.contains_key(path)
    }

    /// Buffer at `path`, created in the collecting state when absent.
    pub fn entry(&mut self, path: &FieldPathId) -> &mut ResolverBuffer {
        self.entries
            .entry(path.clone())
            .or_insert_with(|| ResolverBuffer::Collecting(Default::default()))
    }

    /// Number of buffers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No buffer.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
