//! CPU/GPU frame pacing.
//!
//! The pacer knows nothing about the GPU API. It tracks which frame slot is being recorded,
//! which fence guards every slot and which slot last rendered into each swap chain image.

use crate::error::VkResult;

/// A fence that can be waited on from the CPU.
pub trait FrameFence {
    fn wait_signaled(&self) -> VkResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presented,
}

struct FrameSlot<F> {
    state: FrameSlotState,
    fence: Option<F>,
}

pub struct FramePacer<F: FrameFence> {
    slots: Vec<FrameSlot<F>>,
    current: usize,
    images_in_flight: Vec<Option<usize>>,
    frame_count: u64,
}

impl<F: FrameFence> FramePacer<F> {
    pub fn new(frames_in_flight: usize, image_count: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame in flight");
        Self {
            slots: (0..frames_in_flight)
                .map(|_| FrameSlot {
                    state: FrameSlotState::Idle,
                    fence: None,
                })
                .collect(),
            current: 0,
            images_in_flight: vec![None; image_count],
            frame_count: 0,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Number of frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn state(&self, slot: usize) -> FrameSlotState {
        self.slots[slot].state
    }

    /// Slot that owned the swap chain image `image_index` the last time it was rendered.
    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .flatten()
    }

    /// Fence of the most recently submitted frame, used to chain the next submission.
    pub fn previous_fence(&self) -> Option<&F> {
        let previous = (self.current + self.slots.len() - 1) % self.slots.len();
        self.slots[previous].fence.as_ref()
    }

    /// Waits until the current slot's previous submission has retired and starts acquiring.
    pub fn begin_frame(&mut self) -> VkResult<usize> {
        let slot = &mut self.slots[self.current];
        debug_assert!(
            matches!(slot.state, FrameSlotState::Idle | FrameSlotState::Presented),
            "frame slot {} began while {:?}",
            self.current,
            slot.state
        );
        if let Some(fence) = &slot.fence {
            fence.wait_signaled()?;
        }
        slot.state = FrameSlotState::Acquiring;
        Ok(self.current)
    }

    /// Marks `image_index` as owned by the current slot, waiting for the slot that used it
    /// before if that is a different one.
    pub fn image_acquired(&mut self, image_index: u32) -> VkResult<()> {
        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            self.images_in_flight.resize(image + 1, None);
        }

        if let Some(owner) = self.images_in_flight[image] {
            if owner != self.current {
                if let Some(fence) = &self.slots[owner].fence {
                    fence.wait_signaled()?;
                }
            }
        }
        self.images_in_flight[image] = Some(self.current);

        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, FrameSlotState::Acquiring);
        slot.state = FrameSlotState::Recording;
        Ok(())
    }

    /// Gives up on the current frame, for example after an out-of-date acquire. The slot keeps
    /// the fence of its last real submission.
    pub fn abort_frame(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert!(matches!(
            slot.state,
            FrameSlotState::Acquiring | FrameSlotState::Recording
        ));
        slot.state = FrameSlotState::Idle;
    }

    /// `fence` is `None` when the submission did not reach the queue.
    pub fn submitted(&mut self, fence: Option<F>) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, FrameSlotState::Recording);
        if fence.is_some() {
            slot.fence = fence;
        }
        slot.state = FrameSlotState::Submitted;
    }

    /// Completes the frame and moves on to the next slot.
    pub fn presented(&mut self) {
        let slot = &mut self.slots[self.current];
        debug_assert_eq!(slot.state, FrameSlotState::Submitted);
        slot.state = FrameSlotState::Presented;
        self.current = (self.current + 1) % self.slots.len();
        self.frame_count += 1;
    }

    /// Waits on every outstanding fence and returns all slots to idle.
    pub fn wait_all(&mut self) -> VkResult<()> {
        for slot in &mut self.slots {
            if let Some(fence) = slot.fence.take() {
                fence.wait_signaled()?;
            }
            slot.state = FrameSlotState::Idle;
        }
        Ok(())
    }

    /// Forgets image ownership after the swap chain was rebuilt.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, None);
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
