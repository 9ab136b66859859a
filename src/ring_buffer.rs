//! Fixed-capacity FIFO buffer.
//!
//! Used for the event history and the feedback ledger. Once full, every push
//! evicts the oldest entry; capacity is never exceeded and overflow is never
//! an error.

use std::collections::VecDeque;

/// A bounded, append-only buffer with oldest-first eviction.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::RingBuffer;
///
/// let mut buffer = RingBuffer::new(2);
/// assert_eq!(buffer.push(1), None);
/// assert_eq!(buffer.push(2), None);
/// assert_eq!(buffer.push(3), Some(1));
/// assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one so the most recent entry is
    /// always observable.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an entry, returning the evicted oldest entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops every retained entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Returns up to `limit` of the newest entries matching `predicate`, in
    /// chronological order (most recent last).
    pub fn recent_matching<F>(&self, limit: usize, predicate: F) -> Vec<&T>
    where
        F: Fn(&T) -> bool,
    {
        let mut recent: Vec<&T> = self
            .items
            .iter()
            .rev()
            .filter(|item| predicate(item))
            .take(limit)
            .collect();
        recent.reverse();
        recent
    }

    /// Returns up to `limit` of the newest entries matching `predicate`,
    /// most recent first.
    pub fn newest_matching<F>(&self, limit: usize, predicate: F) -> Vec<&T>
    where
        F: Fn(&T) -> bool,
    {
        self.items
            .iter()
            .rev()
            .filter(|item| predicate(item))
            .take(limit)
            .collect()
    }
}
