use bevy_ecs::prelude::Resource;
use mo_vk::{Texture, TextureCreateInfo, VkResult, VulkanContext};
use std::sync::Arc;

const WHITE: [u8; 4] = [255, 255, 255, 255];
/// Tangent-space +Z.
const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];

/// Textures substituted for missing material maps.
#[derive(Resource, Clone)]
pub struct DefaultTextures {
    pub white: Arc<Texture>,
    pub flat_normal: Arc<Texture>,
}

impl DefaultTextures {
    pub fn new(ctx: &VulkanContext) -> VkResult<Self> {
        let white = Arc::new(Self::solid(ctx, WHITE)?);
        let flat_normal = Arc::new(Self::solid(ctx, FLAT_NORMAL)?);

        tracing::info!("ECS - Default Textures resources successfully loaded.");

        Ok(Self { white, flat_normal })
    }

    /// 1x1 texture of a single RGBA8 color.
    pub fn solid(ctx: &VulkanContext, rgba: [u8; 4]) -> VkResult<Texture> {
        Texture::create(ctx, rgba.to_vec(), TextureCreateInfo::default())
    }
}
