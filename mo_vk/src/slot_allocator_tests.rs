use super::*;

#[test]
fn sequential_alloc_starts_at_zero() {
    let mut slots = SlotAllocator::new(8);
    assert_eq!(slots.alloc(), Some(0));
    assert_eq!(slots.alloc(), Some(1));
    assert_eq!(slots.alloc(), Some(2));
    assert_eq!(slots.len(), 3);
    assert_eq!(slots.high_water_mark(), 3);
}

#[test]
fn new_allocator_is_empty() {
    let slots = SlotAllocator::new(8);
    assert!(slots.is_empty());
    assert_eq!(slots.high_water_mark(), 0);
    assert_eq!(slots.capacity(), 8);
}

#[test]
fn freed_slot_is_reused_before_fresh_ones() {
    let mut slots = SlotAllocator::new(8);
    let a = slots.alloc().unwrap();
    let _b = slots.alloc().unwrap();
    slots.free(a);

    assert_eq!(slots.alloc(), Some(a));
    assert_eq!(slots.alloc(), Some(2));
}

#[test]
fn lowest_vacant_slot_wins_regardless_of_free_order() {
    let mut slots = SlotAllocator::new(8);
    for _ in 0..5 {
        slots.alloc();
    }
    slots.free(3);
    slots.free(1);
    slots.free(4);

    assert_eq!(slots.alloc(), Some(1));
    assert_eq!(slots.alloc(), Some(3));
    assert_eq!(slots.alloc(), Some(4));
    assert_eq!(slots.alloc(), Some(5));
}

#[test]
fn capacity_is_a_hard_cap() {
    let mut slots = SlotAllocator::new(2);
    assert_eq!(slots.alloc(), Some(0));
    assert_eq!(slots.alloc(), Some(1));
    assert_eq!(slots.alloc(), None);
    assert_eq!(slots.len(), 2);

    slots.free(0);
    assert_eq!(slots.alloc(), Some(0));
    assert_eq!(slots.alloc(), None);
}

#[test]
fn double_free_is_ignored() {
    let mut slots = SlotAllocator::new(4);
    let a = slots.alloc().unwrap();
    slots.free(a);
    slots.free(a);
    assert_eq!(slots.len(), 0);

    assert_eq!(slots.alloc(), Some(0));
    assert_eq!(slots.alloc(), Some(1));
}

#[test]
fn free_of_never_allocated_slot_is_ignored() {
    let mut slots = SlotAllocator::new(4);
    slots.alloc();
    slots.free(3);
    assert_eq!(slots.len(), 1);
    assert!(!slots.is_allocated(3));
    assert_eq!(slots.alloc(), Some(1));
}

#[test]
fn high_water_mark_does_not_shrink() {
    let mut slots = SlotAllocator::new(4);
    slots.alloc();
    slots.alloc();
    slots.free(1);
    slots.free(0);
    assert!(slots.is_empty());
    assert_eq!(slots.high_water_mark(), 2);
}
