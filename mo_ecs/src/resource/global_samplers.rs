use bevy_ecs::prelude::*;
use mo_vk::{VkResult, VkResultExt, VulkanContext};
use std::sync::Arc;
use vulkano::image::sampler::{
    BorderColor, Filter, Sampler, SamplerAddressMode, SamplerCreateInfo,
};

#[derive(Resource, Clone)]
pub struct GlobalSamplers {
    /// Full-screen copies.
    pub clamp: Arc<Sampler>,
    /// Per-texel G-buffer reads.
    pub nearest: Arc<Sampler>,
    /// Material textures.
    pub wrap: Arc<Sampler>,
    /// Shadow map. Everything outside the map reads depth 1.0, i.e. lit.
    pub shadow: Arc<Sampler>,
}

impl GlobalSamplers {
    pub fn new(ctx: &VulkanContext) -> VkResult<Self> {
        let clamp = Sampler::new(
            ctx.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )
        .vk_op("create clamp sampler")?;

        let nearest = Sampler::new(
            ctx.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )
        .vk_op("create nearest sampler")?;

        let wrap = Sampler::new(
            ctx.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: [SamplerAddressMode::Repeat; 3],
                ..Default::default()
            },
        )
        .vk_op("create wrap sampler")?;

        let shadow = Sampler::new(
            ctx.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                address_mode: [SamplerAddressMode::ClampToBorder; 3],
                border_color: BorderColor::FloatOpaqueWhite,
                ..Default::default()
            },
        )
        .vk_op("create shadow sampler")?;

        tracing::info!("ECS - Global samplers successfully created.");

        Ok(Self {
            clamp,
            nearest,
            wrap,
            shadow,
        })
    }
}
