pub mod draw;
pub mod error;
pub mod gbuffer_pass;
pub mod lighting_pass;
pub mod lights;
pub mod present_pass;
pub mod renderer;
pub mod shadow_pass;

mod pipeline;

pub use draw::{DefaultSlots, DrawBatch, DrawRecord, MeshSource, plan_draws};
pub use error::{PassError, PassResult};
pub use gbuffer_pass::{GBufferPass, GBufferTargets};
pub use lighting_pass::LightingPass;
pub use lights::{LightState, LightingUniform, MAX_POINT_LIGHTS};
pub use present_pass::PresentPass;
pub use renderer::{DeferredRenderer, RendererSettings};
pub use shadow_pass::{LightSpace, ShadowPass, fit_light_to_frustum, shadow_light_space};

use bevy_ecs::prelude::*;
use mo_vk::{TextureRegistry, VulkanContext};
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

/// Per-frame values handed to every pass before recording.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Frame-in-flight slot, selects per-frame resources.
    pub frame_index: usize,
    pub delta_time: f32,
    pub extent: [u32; 2],
}

/// Recording state shared by the passes of one frame.
pub struct PassContext<'a> {
    pub gpu: &'a VulkanContext,
    pub builder: &'a mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    pub registry: &'a mut TextureRegistry,
    pub default_slots: DefaultSlots,
    pub frame_index: usize,
}

pub trait RenderPassTrait {
    /// CPU-side preparation for the frame: matrices, light lists.
    fn on_update(&mut self, frame: &FrameInfo, world: &World) -> PassResult<()>;

    /// Records the pass into `ctx.builder`.
    fn draw(&mut self, ctx: &mut PassContext<'_>, world: &World) -> PassResult<()>;

    /// Size-dependent resources need to be recreated when the swap chain changes. Called with
    /// the device idle.
    fn on_resize(&mut self, gpu: &VulkanContext, extent: [u32; 2]) -> PassResult<()>;
}
