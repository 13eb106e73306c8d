//! Observer-side replication list and change subscription

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bonesync_core::{BoneSyncError, BoneSyncResult};

use crate::{ListOperation, ListWrite};

/// Remote-visible change notification: `(operation, index)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListChange {
    pub operation: ListOperation,
    pub index: usize,
}

/// Shared dirty counter bumped on every applied write.
///
/// One counter can be subscribed to several lists; the owner drains it once
/// per tick, which coalesces any number of writes into one reaction.
#[derive(Clone, Debug, Default)]
pub struct ChangeCounter {
    count: Arc<AtomicUsize>,
}

impl ChangeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, _change: ListChange) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Notifications since the last `take`
    pub fn pending(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Return and reset the notification count
    pub fn take(&self) -> usize {
        self.count.swap(0, Ordering::Relaxed)
    }
}

/// Observer copy of a replicated list
#[derive(Debug, Clone)]
pub struct ReplicaList<T> {
    values: Vec<T>,
    subscribers: Vec<ChangeCounter>,
}

impl<T> Default for ReplicaList<T> {
    fn default() -> Self {
        ReplicaList {
            values: Vec::new(),
            subscribers: Vec::new(),
        }
    }
}

impl<T: Clone> ReplicaList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Latest delivered value at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Register a counter notified on every applied write
    pub fn subscribe(&mut self, counter: ChangeCounter) {
        self.subscribers.push(counter);
    }

    /// Apply one delivered write and notify subscribers.
    ///
    /// A `Set` beyond the current count is rejected and nobody is notified.
    pub fn apply(&mut self, write: ListWrite<T>) -> BoneSyncResult<ListChange> {
        let change = match write {
            ListWrite::Add(value) => {
                self.values.push(value);
                ListChange {
                    operation: ListOperation::Add,
                    index: self.values.len() - 1,
                }
            }
            ListWrite::Set { index, value } => {
                let count = self.values.len();
                let slot = self
                    .values
                    .get_mut(index)
                    .ok_or(BoneSyncError::ChannelIndexOutOfRange { index, count })?;
                *slot = value;
                ListChange {
                    operation: ListOperation::Set,
                    index,
                }
            }
            ListWrite::Clear => {
                self.values.clear();
                ListChange {
                    operation: ListOperation::Clear,
                    index: 0,
                }
            }
        };

        for subscriber in &self.subscribers {
            subscriber.notify(change);
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncList;
    use proptest::prelude::*;

    #[test]
    fn test_replica_notifies_every_write() {
        let counter = ChangeCounter::new();
        let mut replica = ReplicaList::new();
        replica.subscribe(counter.clone());

        replica.apply(ListWrite::Add(1u32)).unwrap();
        replica.apply(ListWrite::Add(2)).unwrap();
        let change = replica.apply(ListWrite::Set { index: 1, value: 5 }).unwrap();

        assert_eq!(
            change,
            ListChange {
                operation: ListOperation::Set,
                index: 1
            }
        );
        assert_eq!(counter.take(), 3);
        assert_eq!(counter.pending(), 0);
        assert_eq!(replica.values(), &[1, 5]);
    }

    #[test]
    fn test_one_counter_many_lists() {
        let counter = ChangeCounter::new();
        let mut a = ReplicaList::new();
        let mut b = ReplicaList::new();
        a.subscribe(counter.clone());
        b.subscribe(counter.clone());

        a.apply(ListWrite::Add(1u8)).unwrap();
        b.apply(ListWrite::Add(2u8)).unwrap();

        assert_eq!(counter.take(), 2);
    }

    #[test]
    fn test_replica_rejects_out_of_range_set() {
        let counter = ChangeCounter::new();
        let mut replica: ReplicaList<u32> = ReplicaList::new();
        replica.subscribe(counter.clone());

        let err = replica
            .apply(ListWrite::Set { index: 0, value: 1 })
            .unwrap_err();
        assert_eq!(
            err,
            BoneSyncError::ChannelIndexOutOfRange { index: 0, count: 0 }
        );
        assert_eq!(counter.pending(), 0);
    }

    proptest! {
        #[test]
        fn prop_replica_converges_to_authority(
            initial in prop::collection::vec(any::<i32>(), 1..16),
            edits in prop::collection::vec((any::<usize>(), any::<i32>()), 0..64),
        ) {
            let mut authority = SyncList::new();
            let mut replica = ReplicaList::new();

            authority.clear();
            for v in &initial {
                authority.push(*v);
            }
            for (index, value) in edits {
                authority.set(index % initial.len(), value).unwrap();
            }
            for write in authority.drain_writes() {
                replica.apply(write).unwrap();
            }

            prop_assert_eq!(replica.values(), authority.values());
        }
    }
}
