//! Authority-side replication list

use bonesync_core::{BoneSyncError, BoneSyncResult};

/// Kind of remote-visible write, as reported to change subscribers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListOperation {
    Add,
    Set,
    Clear,
}

/// One remote-visible write. Every write carries the complete value, never
/// a patch, so a lost write is healed by the next delivered one.
#[derive(Clone, Debug, PartialEq)]
pub enum ListWrite<T> {
    Add(T),
    Set { index: usize, value: T },
    Clear,
}

impl<T> ListWrite<T> {
    pub fn operation(&self) -> ListOperation {
        match self {
            ListWrite::Add(_) => ListOperation::Add,
            ListWrite::Set { .. } => ListOperation::Set,
            ListWrite::Clear => ListOperation::Clear,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ListWrite<U> {
        match self {
            ListWrite::Add(value) => ListWrite::Add(f(value)),
            ListWrite::Set { index, value } => ListWrite::Set {
                index,
                value: f(value),
            },
            ListWrite::Clear => ListWrite::Clear,
        }
    }
}

/// Ordered value store owned by the authority.
///
/// Every mutation updates the local value and queues a `ListWrite` for the
/// transport. Writes are drained in the order they were made.
#[derive(Debug, Clone)]
pub struct SyncList<T> {
    values: Vec<T>,
    pending: Vec<ListWrite<T>>,
}

impl<T> Default for SyncList<T> {
    fn default() -> Self {
        SyncList {
            values: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<T: Clone> SyncList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SyncList {
            values: Vec::with_capacity(capacity),
            pending: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last written value at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Overwrite the value at `index`
    pub fn set(&mut self, index: usize, value: T) -> BoneSyncResult<()> {
        let count = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(BoneSyncError::ChannelIndexOutOfRange { index, count })?;
        *slot = value.clone();
        self.pending.push(ListWrite::Set { index, value });
        Ok(())
    }

    /// Append a value at the tail
    pub fn push(&mut self, value: T) {
        self.values.push(value.clone());
        self.pending.push(ListWrite::Add(value));
    }

    /// Remove every value
    pub fn clear(&mut self) {
        self.values.clear();
        self.pending.push(ListWrite::Clear);
    }

    /// Number of writes waiting for the transport
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the queued writes, oldest first
    pub fn drain_writes(&mut self) -> std::vec::Drain<'_, ListWrite<T>> {
        self.pending.drain(..)
    }
}
