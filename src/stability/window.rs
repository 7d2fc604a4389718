use std::collections::VecDeque;

/// Default number of recent observations kept for the majority vote
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded FIFO of the most recent quantized notes
/// Invariant: `len() <= capacity()`, the oldest entry is evicted on overflow
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    notes: VecDeque<i32>,
    capacity: usize,
}

impl ObservationWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            notes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity; a smaller capacity evicts the oldest entries
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict_overflow();
    }

    /// Append a note, evicting the oldest entry beyond capacity
    pub fn push(&mut self, note: i32) {
        self.notes.push_back(note);
        self.evict_overflow();
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Most frequent note and its count
    ///
    /// Ties go to the most recently observed candidate: the tally is built
    /// newest-to-oldest and only a strictly higher count replaces the leader.
    /// An even capacity split between two notes therefore favours whichever arrived last.
    pub fn majority(&self) -> Option<(i32, usize)> {
        // At most `capacity` distinct notes
        let mut tally: Vec<(i32, usize)> = Vec::with_capacity(self.notes.len());
        for &note in self.notes.iter().rev() {
            match tally.iter_mut().find(|(candidate, _)| *candidate == note) {
                Some((_, count)) => *count += 1,
                None => tally.push((note, 1)),
            }
        }

        let mut best: Option<(i32, usize)> = None;
        for (note, count) in tally {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((note, count));
            }
        }
        best
    }

    fn evict_overflow(&mut self) {
        while self.notes.len() > self.capacity {
            self.notes.pop_front();
        }
    }
}

impl Default for ObservationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = ObservationWindow::new(3);
        for note in [60, 61, 62, 63] {
            window.push(note);
        }
        assert_eq!(window.len(), 3);
        // 60 was evicted, so each remaining note appears once and 63 is newest
        assert_eq!(window.majority(), Some((63, 1)));
    }

    #[test]
    fn test_majority_counts() {
        let mut window = ObservationWindow::new(10);
        for note in [60, 64, 60, 60, 64] {
            window.push(note);
        }
        assert_eq!(window.majority(), Some((60, 3)));
    }

    #[test]
    fn test_majority_tie_prefers_most_recent() {
        let mut window = ObservationWindow::new(10);
        for note in [60, 64, 60, 64] {
            window.push(note);
        }
        assert_eq!(window.majority(), Some((64, 2)));

        window.push(60);
        window.push(64);
        window.push(60);
        assert_eq!(window.majority(), Some((60, 4)));
    }

    #[test]
    fn test_empty_window_has_no_majority() {
        let window = ObservationWindow::default();
        assert!(window.is_empty());
        assert_eq!(window.majority(), None);
    }

    #[test]
    fn test_shrinking_capacity_keeps_newest() {
        let mut window = ObservationWindow::new(5);
        for note in [50, 50, 50, 70, 70] {
            window.push(note);
        }
        window.set_capacity(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.majority(), Some((70, 2)));
    }

    #[test]
    fn test_clear() {
        let mut window = ObservationWindow::new(4);
        window.push(60);
        window.push(60);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 4);
    }
}
