//! Image layout bookkeeping.
//!
//! vulkano records the actual pipeline barriers. The table here lists the transitions the
//! deferred pipeline performs so that the layout tracked on the CPU can be validated against it.

use crate::error::{VkError, VkResult};
use parking_lot::Mutex;
use vulkano::image::ImageLayout;
use vulkano::sync::{AccessFlags, PipelineStages};

/// Synchronization scopes of a supported layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
}

/// Looks up the barrier scopes for `old -> new`.
///
/// Only the transitions the deferred pipeline performs are listed. Anything else is a programming
/// error and is reported as [`VkError::UnsupportedLayoutTransition`].
pub fn transition_masks(old: ImageLayout, new: ImageLayout) -> VkResult<TransitionMasks> {
    use ImageLayout::*;

    if old == new && !matches!(new, Undefined | Preinitialized) {
        return Ok(TransitionMasks {
            src_stages: PipelineStages::empty(),
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::empty(),
            dst_access: AccessFlags::empty(),
        });
    }

    let (src_stages, src_access) = match old {
        Undefined => (PipelineStages::TOP_OF_PIPE, AccessFlags::empty()),
        TransferDstOptimal => (PipelineStages::ALL_TRANSFER, AccessFlags::TRANSFER_WRITE),
        ColorAttachmentOptimal => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        DepthStencilAttachmentOptimal => (
            PipelineStages::LATE_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        DepthStencilReadOnlyOptimal | ShaderReadOnlyOptimal => {
            (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ)
        }
        PresentSrc => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
        _ => return Err(VkError::UnsupportedLayoutTransition { old, new }),
    };

    let supported = match old {
        Undefined => matches!(
            new,
            TransferDstOptimal
                | ColorAttachmentOptimal
                | DepthStencilAttachmentOptimal
                | DepthStencilReadOnlyOptimal
                | ShaderReadOnlyOptimal
                | PresentSrc
        ),
        TransferDstOptimal => matches!(new, ShaderReadOnlyOptimal),
        ColorAttachmentOptimal => matches!(new, ShaderReadOnlyOptimal | PresentSrc),
        DepthStencilAttachmentOptimal => {
            matches!(new, ShaderReadOnlyOptimal | DepthStencilReadOnlyOptimal)
        }
        DepthStencilReadOnlyOptimal => {
            matches!(new, DepthStencilAttachmentOptimal | ShaderReadOnlyOptimal)
        }
        ShaderReadOnlyOptimal => matches!(
            new,
            ColorAttachmentOptimal | DepthStencilAttachmentOptimal | DepthStencilReadOnlyOptimal
        ),
        PresentSrc => matches!(new, ColorAttachmentOptimal),
        _ => false,
    };
    if !supported {
        return Err(VkError::UnsupportedLayoutTransition { old, new });
    }

    let (dst_stages, dst_access) = match new {
        TransferDstOptimal => (PipelineStages::ALL_TRANSFER, AccessFlags::TRANSFER_WRITE),
        ColorAttachmentOptimal => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        DepthStencilAttachmentOptimal => (
            PipelineStages::EARLY_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        DepthStencilReadOnlyOptimal | ShaderReadOnlyOptimal => {
            (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ)
        }
        PresentSrc => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
        _ => return Err(VkError::UnsupportedLayoutTransition { old, new }),
    };

    Ok(TransitionMasks {
        src_stages,
        src_access,
        dst_stages,
        dst_access,
    })
}

/// Last known layout of an image, shared between passes.
#[derive(Debug)]
pub struct TrackedLayout(Mutex<ImageLayout>);

impl TrackedLayout {
    pub fn new(layout: ImageLayout) -> Self {
        Self(Mutex::new(layout))
    }

    pub fn get(&self) -> ImageLayout {
        *self.0.lock()
    }

    /// Moves to `new` if the transition is in the table. On error the layout is unchanged.
    pub fn transition(&self, new: ImageLayout) -> VkResult<()> {
        let mut layout = self.0.lock();
        transition_masks(*layout, new)?;
        *layout = new;
        Ok(())
    }

    pub fn discard(&self) {
        *self.0.lock() = ImageLayout::Undefined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_sample_is_supported() {
        let upload = transition_masks(ImageLayout::Undefined, ImageLayout::TransferDstOptimal)
            .unwrap();
        assert_eq!(upload.dst_access, AccessFlags::TRANSFER_WRITE);

        let sample = transition_masks(
            ImageLayout::TransferDstOptimal,
            ImageLayout::ShaderReadOnlyOptimal,
        )
        .unwrap();
        assert_eq!(sample.src_access, AccessFlags::TRANSFER_WRITE);
        assert_eq!(sample.dst_stages, PipelineStages::FRAGMENT_SHADER);
    }

    #[test]
    fn gbuffer_round_trip_is_supported() {
        transition_masks(
            ImageLayout::ShaderReadOnlyOptimal,
            ImageLayout::ColorAttachmentOptimal,
        )
        .unwrap();
        let back = transition_masks(
            ImageLayout::ColorAttachmentOptimal,
            ImageLayout::ShaderReadOnlyOptimal,
        )
        .unwrap();
        assert_eq!(back.src_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn same_layout_is_a_no_op() {
        let masks = transition_masks(
            ImageLayout::ShaderReadOnlyOptimal,
            ImageLayout::ShaderReadOnlyOptimal,
        )
        .unwrap();
        assert!(masks.src_stages.is_empty());
        assert!(masks.dst_access.is_empty());
    }

    #[test]
    fn unhandled_pairs_are_rejected() {
        for (old, new) in [
            (ImageLayout::PresentSrc, ImageLayout::TransferDstOptimal),
            (ImageLayout::ShaderReadOnlyOptimal, ImageLayout::PresentSrc),
            (ImageLayout::ColorAttachmentOptimal, ImageLayout::Undefined),
            (ImageLayout::General, ImageLayout::ShaderReadOnlyOptimal),
            (ImageLayout::Undefined, ImageLayout::Undefined),
        ] {
            let err = transition_masks(old, new).unwrap_err();
            assert!(matches!(
                err,
                VkError::UnsupportedLayoutTransition { old: o, new: n } if o == old && n == new
            ));
        }
    }
}

#[cfg(test)]
mod tracked_tests {
    use super::*;

    #[test]
    fn upload_path_is_tracked() {
        let layout = TrackedLayout::new(ImageLayout::Undefined);
        layout.transition(ImageLayout::TransferDstOptimal).unwrap();
        layout.transition(ImageLayout::ShaderReadOnlyOptimal).unwrap();
        assert_eq!(layout.get(), ImageLayout::ShaderReadOnlyOptimal);
    }

    #[test]
    fn rejected_transition_keeps_the_layout() {
        let layout = TrackedLayout::new(ImageLayout::ShaderReadOnlyOptimal);
        assert!(matches!(
            layout.transition(ImageLayout::PresentSrc),
            Err(VkError::UnsupportedLayoutTransition { .. })
        ));
        assert_eq!(layout.get(), ImageLayout::ShaderReadOnlyOptimal);
    }

    #[test]
    fn discard_forgets_the_contents() {
        let layout = TrackedLayout::new(ImageLayout::ColorAttachmentOptimal);
        layout.discard();
        assert_eq!(layout.get(), ImageLayout::Undefined);
        layout.transition(ImageLayout::ColorAttachmentOptimal).unwrap();
    }
}
