pub mod attachment;
pub mod bindless;
pub mod context;
pub mod error;
pub mod frame;
pub mod layout;
pub mod slot_allocator;
pub mod swapchain;
pub mod texture;

pub use attachment::{AttachmentRole, AttachmentSet, AttachmentSpec};
pub use bindless::{BindlessDescriptorTable, BindlessTextureRegistry, BindlessWriter, ImageKey};
pub use context::VulkanContext;
pub use error::{VkError, VkResult, VkResultExt};
pub use frame::{FrameFence, FramePacer, FrameSlotState};
pub use layout::{TrackedLayout, TransitionMasks, transition_masks};
pub use slot_allocator::SlotAllocator;
pub use swapchain::{AcquiredImage, FrameScheduler};
pub use texture::{Texture, TextureCreateInfo, TextureId, TextureOwnership};

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Size of the bindless texture array. Must match `textures[]` in the shaders.
pub const BINDLESS_CAPACITY: u32 = 1024;

/// Registry used by the renderer.
pub type TextureRegistry = BindlessTextureRegistry<BindlessDescriptorTable>;
