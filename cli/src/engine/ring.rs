/// Fixed-capacity ring buffer for per-process power history.
///
/// Overwrites the oldest element on overflow; insertion is O(1) and the
/// length never exceeds the capacity chosen at construction.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<f64>,
    capacity: usize,
    head: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed value.
    pub fn latest(&self) -> Option<f64> {
        if self.slots.is_empty() {
            None
        } else if self.slots.len() < self.capacity {
            self.slots.last().copied()
        } else {
            let idx = (self.head + self.capacity - 1) % self.capacity;
            Some(self.slots[idx])
        }
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let (older, newer) = if self.slots.len() < self.capacity {
            (&self.slots[..], &[][..])
        } else {
            let (newer, older) = self.slots.split_at(self.head);
            (older, newer)
        };
        older.iter().chain(newer.iter()).copied()
    }
}
