//! Bounded FIFO buffer
//!
//! Used for the alert history (10,000 records) and the anomaly baselines
//! (1,000 values). Pushing onto a full buffer evicts the oldest entry.

use std::collections::VecDeque;

/// Fixed-capacity FIFO buffer
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Append an item, evicting from the front when at capacity.
    /// Returns the evicted item, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }

        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };

        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Most recently pushed item
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut buffer = BoundedBuffer::new(3);
        assert!(buffer.push(1).is_none());
        assert!(buffer.push(2).is_none());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.back(), Some(&2));
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut buffer = BoundedBuffer::new(3);
        for i in 0..3 {
            buffer.push(i);
        }

        assert_eq!(buffer.push(3), Some(0));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut buffer = BoundedBuffer::new(0);
        assert_eq!(buffer.push("x"), Some("x"));
        assert!(buffer.is_empty());
    }
}
