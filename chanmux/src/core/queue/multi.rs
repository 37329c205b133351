use crate::prelude::*;

/// Handle to an entry of a [`MultiQueue`] used for arbitrary removal.
///
/// Keys are invalidated once the entry leaves the queue. A stale key never refers to a newer entry
/// occupying the same slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    index: usize,
    generation: u64,
}

/// Fixed number of FIFO queues sharing one global arrival order.
///
/// Entries of all queues form a single doubly linked list ordered by arrival, stored in an arena.
/// Each queue keeps the index of its oldest entry. When a queue head leaves, the next head is
/// found by scanning forward through the global list, which is linear in the number of entries of
/// other queues that arrived in between.
///
/// * [`MultiQueue::dequeue_any`] returns entries in their true arrival order.
/// * [`MultiQueue::dequeue`] returns entries of a single queue in that queue's arrival order.
/// * [`MultiQueue::remove`] removes an arbitrary entry and keeps both orders consistent.
#[derive(Clone, Debug)]
pub struct MultiQueue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    first: Option<usize>,
    last: Option<usize>,
    heads: Vec<Option<usize>>,
    counts: Vec<usize>,
    total: usize,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u64,
    entry: Option<Entry<T>>,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    queue: usize,
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<T> MultiQueue<T> {
    /// Creates `queue_count` empty queues.
    pub fn new(queue_count: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            first: None,
            last: None,
            heads: vec![None; queue_count],
            counts: vec![0; queue_count],
            total: 0,
        }
    }

    /// Number of queues.
    pub fn queue_count(&self) -> usize {
        self.heads.len()
    }

    /// Total number of entries in all queues.
    pub fn total_count(&self) -> usize {
        self.total
    }

    /// Returns `true` if all queues are empty.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of entries in the specified queue.
    pub fn count(&self, queue: usize) -> Result<usize> {
        self.check_queue(queue)?;
        Ok(self.counts[queue])
    }

    /// Appends `value` to the specified queue.
    pub fn enqueue(&mut self, queue: usize, value: T) -> Result<EntryKey> {
        self.check_queue(queue)?;

        let entry = Entry {
            queue,
            value,
            prev: self.last,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };

        match self.last.and_then(|last| self.entry_mut(last)) {
            Some(last) => last.next = Some(index),
            None => self.first = Some(index),
        }
        self.last = Some(index);

        if self.heads[queue].is_none() {
            self.heads[queue] = Some(index);
        }
        self.counts[queue] += 1;
        self.total += 1;

        Ok(EntryKey {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Removes the oldest entry of the specified queue.
    pub fn dequeue(&mut self, queue: usize) -> Result<T> {
        self.check_queue(queue)?;
        let index = self.heads[queue].ok_or(Error::Empty)?;
        self.unlink(index).map(|(_, value)| value).ok_or(Error::Empty)
    }

    /// Removes the oldest entry among all queues.
    ///
    /// Returns the queue index together with the value.
    pub fn dequeue_any(&mut self) -> Result<(usize, T)> {
        let index = self.first.ok_or(Error::Empty)?;
        self.unlink(index).ok_or(Error::Empty)
    }

    /// Returns the oldest entry of the specified queue.
    pub fn peek(&self, queue: usize) -> Result<&T> {
        self.check_queue(queue)?;
        self.heads[queue]
            .and_then(|index| self.entry(index))
            .map(|entry| &entry.value)
            .ok_or(Error::Empty)
    }

    /// Returns the oldest entry among all queues together with its queue index.
    pub fn peek_any(&self) -> Result<(usize, &T)> {
        self.first
            .and_then(|index| self.entry(index))
            .map(|entry| (entry.queue, &entry.value))
            .ok_or(Error::Empty)
    }

    /// Removes an entry by its key.
    ///
    /// Returns [`None`] if entry has already left the queue.
    pub fn remove(&mut self, key: EntryKey) -> Option<(usize, T)> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation || slot.entry.is_none() {
            return None;
        }
        self.unlink(key.index)
    }

    /// Removes all entries in their arrival order.
    pub fn drain(&mut self) -> Vec<(usize, T)> {
        let mut drained = Vec::with_capacity(self.total);
        while let Ok(entry) = self.dequeue_any() {
            drained.push(entry);
        }
        drained
    }

    fn unlink(&mut self, index: usize) -> Option<(usize, T)> {
        let slot = self.slots.get_mut(index)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);

        match entry.prev.and_then(|prev| self.entry_mut(prev)) {
            Some(prev) => prev.next = entry.next,
            None => self.first = entry.next,
        }
        match entry.next.and_then(|next| self.entry_mut(next)) {
            Some(next) => next.prev = entry.prev,
            None => self.last = entry.prev,
        }

        if self.heads[entry.queue] == Some(index) {
            self.heads[entry.queue] = self.scan_forward(entry.next, entry.queue);
        }
        self.counts[entry.queue] -= 1;
        self.total -= 1;

        Some((entry.queue, entry.value))
    }

    fn scan_forward(&self, mut cursor: Option<usize>, queue: usize) -> Option<usize> {
        if self.counts[queue] <= 1 {
            return None;
        }
        while let Some(index) = cursor {
            let entry = self.entry(index)?;
            if entry.queue == queue {
                return Some(index);
            }
            cursor = entry.next;
        }
        None
    }

    fn entry(&self, index: usize) -> Option<&Entry<T>> {
        self.slots.get(index).and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<T>> {
        self.slots.get_mut(index).and_then(|slot| slot.entry.as_mut())
    }

    fn check_queue(&self, queue: usize) -> Result<()> {
        if queue >= self.heads.len() {
            return Err(Error::OutOfRange {
                index: queue,
                count: self.heads.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_and_per_queue_order() {
        let mut queues = MultiQueue::new(2);
        for (queue, value) in [(0, "a"), (1, "b"), (0, "c")] {
            queues.enqueue(queue, value).unwrap();
        }

        assert_eq!(queues.peek_any().unwrap(), (0, &"a"));
        assert_eq!(queues.dequeue(1).unwrap(), "b");
        assert_eq!(queues.dequeue_any().unwrap(), (0, "a"));
        assert_eq!(queues.dequeue_any().unwrap(), (0, "c"));
        assert!(matches!(queues.dequeue_any(), Err(Error::Empty)));
        assert!(queues.is_empty());
    }

    #[test]
    fn head_is_repaired_after_dequeue() {
        let mut queues = MultiQueue::new(3);
        queues.enqueue(0, 1).unwrap();
        queues.enqueue(1, 2).unwrap();
        queues.enqueue(2, 3).unwrap();
        queues.enqueue(0, 4).unwrap();
        queues.enqueue(1, 5).unwrap();

        assert_eq!(queues.dequeue(0).unwrap(), 1);
        assert_eq!(*queues.peek(0).unwrap(), 4);
        assert_eq!(queues.count(0).unwrap(), 1);
        assert_eq!(queues.count(1).unwrap(), 2);
        assert_eq!(queues.total_count(), 4);

        assert_eq!(queues.dequeue(0).unwrap(), 4);
        assert!(matches!(queues.peek(0), Err(Error::Empty)));
        assert_eq!(queues.dequeue_any().unwrap(), (1, 2));
        assert_eq!(queues.dequeue(1).unwrap(), 5);
        assert_eq!(queues.dequeue_any().unwrap(), (2, 3));
    }

    #[test]
    fn arbitrary_removal_keeps_orders() {
        let mut queues = MultiQueue::new(2);
        let a = queues.enqueue(0, 'a').unwrap();
        let b = queues.enqueue(1, 'b').unwrap();
        let c = queues.enqueue(0, 'c').unwrap();
        queues.enqueue(1, 'd').unwrap();

        assert_eq!(queues.remove(c), Some((0, 'c')));
        assert_eq!(queues.remove(c), None);
        assert_eq!(queues.remove(a), Some((0, 'a')));
        assert!(matches!(queues.dequeue(0), Err(Error::Empty)));

        // Slot of `a` is reused, the stale key must not match the new entry.
        let e = queues.enqueue(0, 'e').unwrap();
        assert_eq!(queues.remove(a), None);
        assert_ne!(a, e);

        assert_eq!(queues.remove(b), Some((1, 'b')));
        assert_eq!(queues.drain(), vec![(1, 'd'), (0, 'e')]);
    }

    #[test]
    fn out_of_range_queue() {
        let mut queues = MultiQueue::<u8>::new(1);

        assert!(matches!(
            queues.enqueue(1, 0),
            Err(Error::OutOfRange { index: 1, count: 1 })
        ));
        assert!(matches!(queues.dequeue(5), Err(Error::OutOfRange { .. })));
        assert!(matches!(queues.count(1), Err(Error::OutOfRange { .. })));
        assert!(matches!(queues.peek(1), Err(Error::OutOfRange { .. })));
        assert_eq!(queues.queue_count(), 1);
    }
}
