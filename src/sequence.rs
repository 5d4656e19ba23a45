//! Monotonic identifier sequences.
//!
//! Each graph owns two of these, one for node ids and one for edge ids.
//! Values are never reused and the counter never rewinds, even after
//! removals; a sequence can be seeded so a graph restored from a snapshot
//! keeps allocating past its previous high-water mark.

/// A monotonic counter producing unique `u64` ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    next_value: u64,
    last: Option<u64>,
}

impl IdSequence {
    /// Sequence whose first produced value is 0.
    pub fn new() -> Self {
        IdSequence {
            next_value: 0,
            last: None,
        }
    }

    /// Sequence whose first produced value is `seed`.
    pub fn starting_at(seed: u64) -> Self {
        IdSequence {
            next_value: seed,
            last: None,
        }
    }

    /// Produce the next unused value. Each call returns a strictly greater
    /// value than the previous one.
    pub fn next(&mut self) -> u64 {
        let value = self.next_value;
        self.next_value += 1;
        self.last = Some(value);
        value
    }

    /// The most recently produced value, without advancing. `None` until the
    /// first call to [`next`](Self::next).
    pub fn current(&self) -> Option<u64> {
        self.last
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}
