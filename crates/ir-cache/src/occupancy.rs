/// Identifier of a logical sequence (conversation / request).
pub type SeqId = u32;

/// State of one cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The slot holds a token of this sequence.
    Occupied(SeqId),
    /// The slot was invalidated by a removal. Its storage is not reclaimed.
    Removed,
}

impl Slot {
    /// Returns true if the slot holds a token of `seq`.
    pub fn is_owned_by(&self, seq: SeqId) -> bool {
        matches!(self, Slot::Occupied(s) if *s == seq)
    }
}

/// Append-only record of which sequence owns each cache slot.
///
/// Slot `i` of every layer store belongs to `slots[i]`. Entries are never
/// compacted, so a slot index stays valid for the lifetime of the cache.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    slots: Vec<Slot>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots ever written.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, i: usize) -> Option<Slot> {
        self.slots.get(i).copied()
    }

    /// Records one new slot per entry of `seqs`, in order.
    pub fn append(&mut self, seqs: &[SeqId]) {
        self.slots.extend(seqs.iter().map(|&s| Slot::Occupied(s)));
    }

    /// Marks slots in `[begin, min(end, len))` owned by `seq` as removed.
    ///
    /// Out-of-range bounds are clamped. Returns the number of slots flipped.
    pub fn remove(&mut self, seq: SeqId, begin: usize, end: usize) -> usize {
        let end = end.min(self.slots.len());
        if begin >= end {
            return 0;
        }
        let mut removed = 0;
        for slot in &mut self.slots[begin..end] {
            if slot.is_owned_by(seq) {
                *slot = Slot::Removed;
                removed += 1;
            }
        }
        removed
    }

    /// Drops every slot record.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
