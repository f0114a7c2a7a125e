//! Deferred renderer built from four crates: the GPU layer (`vk`), the scene model (`ecs`),
//! the frame graph (`renderpass`) and the application shell (`core`).

pub use mo_core as core;
pub use mo_ecs as ecs;
pub use mo_renderpass as renderpass;
pub use mo_vk as vk;

pub mod prelude {
    pub use mo_core::{App, AppError, RendererConfig};
    pub use mo_ecs::prelude::*;
    pub use mo_vk::{Texture, TextureCreateInfo, VulkanContext};
}
