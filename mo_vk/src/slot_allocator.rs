use std::collections::BTreeSet;

/// Hands out small `u32` slot indices below a fixed capacity.
///
/// The lowest vacant index is always handed out first. Freed indices go back into a vacancy
/// set instead of being forgotten, so the live range stays compact and never grows past the
/// worst-case number of simultaneously live slots.
///
/// ```
/// use mo_vk::SlotAllocator;
///
/// let mut slots = SlotAllocator::new(4);
/// let a = slots.alloc().unwrap(); // 0
/// let _b = slots.alloc().unwrap(); // 1
/// slots.free(a);
/// assert_eq!(slots.alloc(), Some(0));
/// ```
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    vacant: BTreeSet<u32>,
    next: u32,
    len: u32,
    capacity: u32,
}

impl SlotAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            vacant: BTreeSet::new(),
            next: 0,
            len: 0,
            capacity,
        }
    }

    /// Returns `None` once every slot below the capacity is live.
    pub fn alloc(&mut self) -> Option<u32> {
        let slot = match self.vacant.pop_first() {
            Some(slot) => slot,
            None if self.next < self.capacity => {
                let slot = self.next;
                self.next += 1;
                slot
            }
            None => return None,
        };

        self.len += 1;
        Some(slot)
    }

    /// Returns `slot` to the vacancy set. Freeing a slot that is not live is ignored.
    pub fn free(&mut self, slot: u32) {
        if !self.is_allocated(slot) {
            tracing::warn!("Bindless - Ignoring free of slot {slot} which is not allocated.");
            return;
        }

        self.vacant.insert(slot);
        self.len -= 1;
    }

    pub fn is_allocated(&self, slot: u32) -> bool {
        slot < self.next && !self.vacant.contains(&slot)
    }

    /// Highest index ever handed out + 1.
    pub fn high_water_mark(&self) -> u32 {
        self.next
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
