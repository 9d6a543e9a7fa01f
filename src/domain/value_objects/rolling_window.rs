use std::collections::VecDeque;

/// Bounded FIFO buffer; pushing past capacity evicts the oldest item
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    /// A zero capacity is raised to one so the window can always hold the latest item
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item, returning the evicted oldest one if the window was full
    pub fn push(&mut self, item: T) -> Option<T> {
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

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RollingWindow<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut window = RollingWindow::new(3);
        assert_eq!(window.push(1), None);
        assert_eq!(window.push(2), None);
        assert_eq!(window.len(), 2);
        assert_eq!(window.latest(), Some(&2));
    }

    #[test]
    fn test_push_evicts_exactly_the_oldest() {
        for capacity in 1..=6 {
            let mut window = RollingWindow::new(capacity);
            for i in 0..capacity {
                window.push(i);
            }
            let evicted = window.push(capacity);
            assert_eq!(evicted, Some(0));
            assert_eq!(window.len(), capacity);
            assert_eq!(window.to_vec(), (1..=capacity).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut window = RollingWindow::new(0);
        window.push("a");
        window.push("b");
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.to_vec(), vec!["b"]);
    }

    #[test]
    fn test_clear() {
        let mut window = RollingWindow::new(2);
        window.push(1.0);
        window.clear();
        assert!(window.is_empty());
    }
}
