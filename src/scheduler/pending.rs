use std::{collections::VecDeque, time::Instant};

/// One armed deadline.
pub(crate) struct Entry<T> {
    pub(crate) due: Instant,
    /// Arming sequence number, breaks ties between equal deadlines.
    pub(crate) seq: u64,
    pub(crate) payload: T,
}

/// Deadlines ordered by `(due, seq)`.
///
/// Entries with the same deadline keep their arming order, because `seq`
/// only ever grows.
pub(crate) struct PendingQueue<T> {
    entries: VecDeque<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
        }
    }
}

impl<T> PendingQueue<T> {
    /// Insert `payload` behind every entry due at or before `due`, returns its sequence number.
    pub(crate) fn insert(&mut self, due: Instant, payload: T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let index = self.entries.partition_point(|entry| entry.due <= due);

        self.entries.insert(index, Entry { due, seq, payload });

        seq
    }

    /// Remove the entry armed as `seq` for `due`.
    pub(crate) fn remove(&mut self, due: Instant, seq: u64) -> Option<T> {
        let index = self
            .entries
            .binary_search_by(|entry| (entry.due, entry.seq).cmp(&(due, seq)))
            .ok()?;

        self.entries.remove(index).map(|entry| entry.payload)
    }

    /// Pop the front entry if it is due at `now` and was armed before `horizon`.
    pub(crate) fn pop_due(&mut self, now: Instant, horizon: u64) -> Option<Entry<T>> {
        let front = self.entries.front()?;

        if front.due > now || front.seq >= horizon {
            return None;
        }

        self.entries.pop_front()
    }

    /// The sequence number the next insertion will receive.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.entries.front().map(|entry| entry.due)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn payloads(queue: &PendingQueue<&'static str>) -> Vec<&'static str> {
        queue.iter().map(|entry| entry.payload).collect()
    }

    #[test]
    fn keeps_deadline_order_with_stable_ties() {
        let base = Instant::now();
        let mut queue = PendingQueue::default();

        queue.insert(base + Duration::from_millis(20), "b");
        queue.insert(base + Duration::from_millis(10), "a");
        queue.insert(base + Duration::from_millis(20), "c");
        queue.insert(base + Duration::from_millis(30), "d");
        queue.insert(base + Duration::from_millis(10), "a2");

        assert_eq!(payloads(&queue), ["a", "a2", "b", "c", "d"]);
        assert_eq!(queue.next_due(), Some(base + Duration::from_millis(10)));
    }

    #[test]
    fn remove_targets_exact_arming() {
        let base = Instant::now();
        let due = base + Duration::from_millis(5);
        let mut queue = PendingQueue::default();

        let first = queue.insert(due, "first");
        let second = queue.insert(due, "second");

        assert_eq!(queue.remove(due, second), Some("second"));
        assert_eq!(queue.remove(due, second), None);
        assert_eq!(queue.remove(base, first), None);
        assert_eq!(payloads(&queue), ["first"]);
    }

    #[test]
    fn pop_due_stops_at_deadline_and_horizon() {
        let base = Instant::now();
        let mut queue = PendingQueue::default();

        queue.insert(base, "old");
        let horizon = queue.next_seq();
        queue.insert(base, "new");
        queue.insert(base + Duration::from_millis(1), "later");

        assert_eq!(queue.pop_due(base, horizon).map(|e| e.payload), Some("old"));
        assert!(queue.pop_due(base, horizon).is_none());

        let horizon = queue.next_seq();
        assert_eq!(queue.pop_due(base, horizon).map(|e| e.payload), Some("new"));
        assert!(queue.pop_due(base, horizon).is_none());
        assert_eq!(queue.len(), 1);
    }
}
