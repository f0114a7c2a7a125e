use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone)]
struct CountingFence {
    waits: Arc<AtomicUsize>,
}

impl CountingFence {
    fn new() -> Self {
        Self {
            waits: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl FrameFence for CountingFence {
    fn wait_signaled(&self) -> VkResult<()> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn run_frame(pacer: &mut FramePacer<CountingFence>, image: u32, fence: &CountingFence) -> usize {
    let slot = pacer.begin_frame().unwrap();
    pacer.image_acquired(image).unwrap();
    pacer.submitted(Some(fence.clone()));
    pacer.presented();
    slot
}

#[test]
fn slots_cycle_modulo_frames_in_flight() {
    let mut pacer = FramePacer::new(2, 3);
    let fence = CountingFence::new();

    let slots: Vec<usize> = (0..5)
        .map(|i| run_frame(&mut pacer, i % 3, &fence))
        .collect();

    assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    assert_eq!(pacer.frame_count(), 5);
}

#[test]
fn slot_walks_through_the_state_machine() {
    let mut pacer: FramePacer<CountingFence> = FramePacer::new(2, 2);
    assert_eq!(pacer.state(0), FrameSlotState::Idle);

    pacer.begin_frame().unwrap();
    assert_eq!(pacer.state(0), FrameSlotState::Acquiring);

    pacer.image_acquired(0).unwrap();
    assert_eq!(pacer.state(0), FrameSlotState::Recording);

    pacer.submitted(Some(CountingFence::new()));
    assert_eq!(pacer.state(0), FrameSlotState::Submitted);

    pacer.presented();
    assert_eq!(pacer.state(0), FrameSlotState::Presented);
    assert_eq!(pacer.current_frame(), 1);
}

#[test]
fn begin_frame_waits_on_the_slot_fence() {
    let mut pacer = FramePacer::new(2, 2);
    let first = CountingFence::new();
    let second = CountingFence::new();

    run_frame(&mut pacer, 0, &first);
    run_frame(&mut pacer, 1, &second);
    assert_eq!(first.waits(), 0);

    // Slot 0 comes around again and must wait for frame 0.
    pacer.begin_frame().unwrap();
    assert_eq!(first.waits(), 1);
    assert_eq!(second.waits(), 0);
}

#[test]
fn reused_image_waits_for_the_slot_that_last_used_it() {
    // Three images, two slots: slot 1 can be handed the image slot 0 rendered last.
    let mut pacer = FramePacer::new(2, 3);
    let slot0 = CountingFence::new();
    let slot1 = CountingFence::new();

    run_frame(&mut pacer, 2, &slot0);
    assert_eq!(pacer.image_owner(2), Some(0));

    pacer.begin_frame().unwrap();
    pacer.image_acquired(2).unwrap();
    assert_eq!(slot0.waits(), 1);
    assert_eq!(pacer.image_owner(2), Some(1));

    pacer.submitted(Some(slot1.clone()));
    pacer.presented();
    assert_eq!(slot1.waits(), 0);
}

#[test]
fn image_owned_by_the_current_slot_does_not_wait_twice() {
    let mut pacer = FramePacer::new(2, 2);
    let slot0 = CountingFence::new();
    let slot1 = CountingFence::new();

    run_frame(&mut pacer, 0, &slot0);
    run_frame(&mut pacer, 1, &slot1);

    pacer.begin_frame().unwrap();
    pacer.image_acquired(0).unwrap();
    // Once in begin_frame, not again for the image.
    assert_eq!(slot0.waits(), 1);
}

#[test]
fn aborted_frame_keeps_the_last_fence() {
    let mut pacer = FramePacer::new(1, 2);
    let fence = CountingFence::new();
    run_frame(&mut pacer, 0, &fence);

    pacer.begin_frame().unwrap();
    pacer.abort_frame();
    assert_eq!(pacer.state(0), FrameSlotState::Idle);
    assert_eq!(pacer.current_frame(), 0);

    pacer.begin_frame().unwrap();
    assert_eq!(fence.waits(), 2);
}

#[test]
fn failed_submission_keeps_the_previous_fence() {
    let mut pacer = FramePacer::new(1, 1);
    let fence = CountingFence::new();
    run_frame(&mut pacer, 0, &fence);

    pacer.begin_frame().unwrap();
    pacer.image_acquired(0).unwrap();
    pacer.submitted(None);
    pacer.presented();

    assert!(pacer.previous_fence().is_some());
}

#[test]
fn wait_all_drains_every_fence_and_reset_clears_images() {
    let mut pacer = FramePacer::new(2, 2);
    let a = CountingFence::new();
    let b = CountingFence::new();
    run_frame(&mut pacer, 0, &a);
    run_frame(&mut pacer, 1, &b);

    pacer.wait_all().unwrap();
    assert_eq!((a.waits(), b.waits()), (1, 1));
    assert_eq!(pacer.state(0), FrameSlotState::Idle);
    assert!(pacer.previous_fence().is_none());

    pacer.reset_images(4);
    assert_eq!(pacer.image_owner(0), None);
    assert_eq!(pacer.image_owner(3), None);
}

#[test]
fn out_of_range_image_index_grows_the_table() {
    let mut pacer: FramePacer<CountingFence> = FramePacer::new(2, 1);
    pacer.begin_frame().unwrap();
    pacer.image_acquired(3).unwrap();
    assert_eq!(pacer.image_owner(3), Some(0));
}
