/// Fixed-capacity submission queue refilled every frame.
///
/// Pushing past capacity drops the item and reports `false`; the queue never
/// grows. Storage is allocated once up front.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Vec<T>,
    capacity: usize,
    dropped: usize,
}

impl<T> BoundedQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.dropped = 0;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
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

    /// Submissions rejected since the last `clear`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_is_dropped() {
        let mut queue = BoundedQueue::with_capacity(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));

        assert_eq!(queue.as_slice(), &[1, 2]);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn clear_resets_count_but_keeps_storage() {
        let mut queue = BoundedQueue::with_capacity(4);
        for i in 0..6 {
            queue.push(i);
        }
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 0);
        assert!(queue.items.capacity() >= 4);
    }
}
