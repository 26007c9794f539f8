use std::collections::BTreeSet;

/// Hands out spawn slots to players admitted by the host
pub trait SpawnAllocator {
    /// Reserve a slot, `None` when everything is taken
    fn allocate(&mut self) -> Option<u8>;

    /// Return a slot to the pool
    fn release(&mut self, slot: u8);
}

/// Allocates the lowest free slot in `0..slots`
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    slots: u8,
    taken: BTreeSet<u8>,
}

impl SlotAllocator {
    pub fn new(slots: u8) -> Self {
        Self {
            slots,
            taken: BTreeSet::new(),
        }
    }

    /// Mark a slot as used without going through `allocate` (host's own entry)
    pub fn reserve(&mut self, slot: u8) -> bool {
        slot < self.slots && self.taken.insert(slot)
    }

    pub fn in_use(&self) -> usize {
        self.taken.len()
    }
}

impl SpawnAllocator for SlotAllocator {
    fn allocate(&mut self) -> Option<u8> {
        let slot = (0..self.slots).find(|slot| !self.taken.contains(slot))?;
        self.taken.insert(slot);
        Some(slot)
    }

    fn release(&mut self, slot: u8) {
        if !self.taken.remove(&slot) {
            tracing::debug!("Released spawn slot {} that was not taken", slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_lowest_free() {
        let mut alloc = SlotAllocator::new(3);
        assert_eq!(alloc.allocate(), Some(0));
        assert_eq!(alloc.allocate(), Some(1));

        alloc.release(0);
        assert_eq!(alloc.allocate(), Some(0));
        assert_eq!(alloc.allocate(), Some(2));
        assert_eq!(alloc.allocate(), None);
    }

    #[test]
    fn test_reserve() {
        let mut alloc = SlotAllocator::new(2);
        assert!(alloc.reserve(0));
        assert!(!alloc.reserve(0));
        assert!(!alloc.reserve(5));

        assert_eq!(alloc.allocate(), Some(1));
        assert_eq!(alloc.in_use(), 2);
    }
}
