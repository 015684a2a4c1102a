//! Fixed-capacity, lock-free entry storage for one call site.
//!
//! # Layout
//!
//! ```text
//!   reserved ──► 3
//!   slots:  [ e0 ][ e1 ][ e2 ][ ---- ][ ---- ]   capacity = LIMIT
//!            installation order ──►
//! ```
//!
//! # Publication Protocol
//!
//! 1. A writer reserves the next index by bumping `reserved` with a CAS
//!    that fails once `reserved == capacity`.
//! 2. It builds the entry completely inside an `Arc`.
//! 3. It stores the `Arc` into its slot with release ordering.
//!
//! Readers scan `slots[..reserved]` and skip empty slots (reserved but not
//! yet stored), so they observe either nothing or a complete entry. Two
//! writers racing on the same key both install; the duplicate is wasted
//! capacity, never an incorrect entry.
//!
//! Invalidated entries are re-armed in place with a compare-and-swap, which
//! leaves `reserved` untouched.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;

use super::entry::Guarded;

/// Outcome of probing the table for a key.
pub enum Probe<T> {
    /// A valid entry matched.
    Hit(Arc<T>),
    /// Only invalidated entries matched; the first one is at `index`.
    Stale { index: usize, entry: Arc<T> },
    /// No entry matched.
    Miss,
}

/// Bounded entry table; see the module docs for the protocol.
pub struct EntryTable<T> {
    slots: Box<[ArcSwapOption<T>]>,
    reserved: AtomicUsize,
}

impl<T: Guarded> EntryTable<T> {
    /// Allocate a table holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| ArcSwapOption::empty()).collect(),
            reserved: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of reserved slots, including ones still being published.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.reserved.load(Ordering::Acquire).min(self.slots.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan entries in installation order; the first valid match wins.
    #[inline]
    pub fn probe(&self, key: T::Key) -> Probe<T> {
        let mut stale = None;
        for (index, slot) in self.slots[..self.len()].iter().enumerate() {
            let guard = slot.load();
            let Some(entry) = &*guard else {
                continue;
            };
            if entry.guard_key() != key {
                continue;
            }
            if entry.is_valid() {
                return Probe::Hit(Arc::clone(entry));
            }
            if stale.is_none() {
                stale = Some((index, Arc::clone(entry)));
            }
        }
        match stale {
            Some((index, entry)) => Probe::Stale { index, entry },
            None => Probe::Miss,
        }
    }

    /// Append a fully built entry.
    ///
    /// Returns the published entry and the resulting entry count, or hands
    /// the entry back if the table is full.
    pub fn install(&self, entry: T) -> Result<(Arc<T>, usize), T> {
        let capacity = self.slots.len();
        let reservation =
            self.reserved
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < capacity).then_some(n + 1)
                });
        match reservation {
            Ok(index) => {
                let entry = Arc::new(entry);
                self.slots[index].store(Some(Arc::clone(&entry)));
                Ok((entry, index + 1))
            }
            Err(_) => Err(entry),
        }
    }

    /// Replace the stale entry at `index` with `fresh`.
    ///
    /// Returns `fresh` and whether this call performed the swap. Losing the
    /// race means another thread already re-armed the slot.
    pub fn rearm(&self, index: usize, stale: &Arc<T>, fresh: T) -> (Arc<T>, bool) {
        let fresh = Arc::new(fresh);
        let previous = self.slots[index].compare_and_swap(stale, Some(Arc::clone(&fresh)));
        let swapped = matches!(&*previous, Some(prev) if Arc::ptr_eq(prev, stale));
        (fresh, swapped)
    }

    /// Number of distinct guard keys among published entries.
    pub fn distinct_keys(&self) -> usize {
        let entries = self.entries();
        entries
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                !entries[..*i]
                    .iter()
                    .any(|prev| prev.guard_key() == e.guard_key())
            })
            .count()
    }

    /// Snapshot of the published entries in installation order.
    pub fn entries(&self) -> Vec<Arc<T>> {
        self.slots[..self.len()]
            .iter()
            .filter_map(|slot| slot.load_full())
            .collect()
    }
}

impl<T: Guarded> fmt::Debug for EntryTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct Probe8 {
        key: u32,
        value: u32,
        valid: AtomicBool,
    }

    impl Probe8 {
        fn new(key: u32, value: u32) -> Self {
            Self {
                key,
                value,
                valid: AtomicBool::new(true),
            }
        }
    }

    impl Guarded for Probe8 {
        type Key = u32;

        fn guard_key(&self) -> u32 {
            self.key
        }

        fn is_valid(&self) -> bool {
            self.valid.load(Ordering::Acquire)
        }
    }

    fn hit_value(table: &EntryTable<Probe8>, key: u32) -> Option<u32> {
        match table.probe(key) {
            Probe::Hit(entry) => Some(entry.value),
            _ => None,
        }
    }

    #[test]
    fn test_install_until_full() {
        let table = EntryTable::with_capacity(4);
        assert!(table.is_empty());
        for key in 0..4 {
            let (_, count) = table.install(Probe8::new(key, key * 10)).ok().unwrap();
            assert_eq!(count, key as usize + 1);
        }
        let rejected = table.install(Probe8::new(9, 90)).err().unwrap();
        assert_eq!(rejected.key, 9);
        assert_eq!(table.len(), 4);

        assert_eq!(hit_value(&table, 2), Some(20));
        assert!(matches!(table.probe(9), Probe::Miss));
    }

    #[test]
    fn test_first_match_wins() {
        let table = EntryTable::with_capacity(4);
        table.install(Probe8::new(1, 10)).ok().unwrap();
        table.install(Probe8::new(1, 11)).ok().unwrap();
        assert_eq!(hit_value(&table, 1), Some(10));
        assert_eq!(table.distinct_keys(), 1);

        table.install(Probe8::new(2, 20)).ok().unwrap();
        assert_eq!(table.distinct_keys(), 2);
    }

    #[test]
    fn test_invalid_entry_is_bypassed() {
        let table = EntryTable::with_capacity(4);
        let (first, _) = table.install(Probe8::new(1, 10)).ok().unwrap();
        table.install(Probe8::new(1, 11)).ok().unwrap();
        first.valid.store(false, Ordering::Release);

        // The later duplicate still serves the key.
        assert_eq!(hit_value(&table, 1), Some(11));
    }

    #[test]
    fn test_stale_and_rearm() {
        let table = EntryTable::with_capacity(2);
        table.install(Probe8::new(1, 10)).ok().unwrap();
        let (second, _) = table.install(Probe8::new(2, 20)).ok().unwrap();
        second.valid.store(false, Ordering::Release);

        let Probe::Stale { index, entry } = table.probe(2) else {
            panic!("expected stale entry");
        };
        assert_eq!(index, 1);

        let (fresh, swapped) = table.rearm(index, &entry, Probe8::new(2, 21));
        assert!(swapped);
        assert_eq!(fresh.value, 21);
        assert_eq!(hit_value(&table, 2), Some(21));
        assert_eq!(table.len(), 2);

        // A second re-arm against the old entry loses.
        let (_, swapped) = table.rearm(index, &entry, Probe8::new(2, 22));
        assert!(!swapped);
        assert_eq!(hit_value(&table, 2), Some(21));
    }

    #[test]
    fn test_concurrent_installs_never_exceed_capacity() {
        let table = EntryTable::with_capacity(8);
        std::thread::scope(|s| {
            for t in 0..16u32 {
                let table = &table;
                s.spawn(move || {
                    let _ = table.install(Probe8::new(t, t));
                });
            }
        });
        assert_eq!(table.len(), 8);
        let entries = table.entries();
        assert_eq!(entries.len(), 8);
        for entry in entries {
            assert_eq!(entry.key, entry.value);
        }
    }
}
