use crate::context::VulkanContext;
use crate::error::{VkResult, VkResultExt};
use crate::layout::TrackedLayout;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use vulkano::sync::GpuFuture;
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage},
    command_buffer::{
        AutoCommandBufferBuilder, CommandBufferUsage, CopyBufferToImageInfo,
        PrimaryCommandBufferAbstract,
    },
    format::Format,
    image::{
        Image, ImageCreateInfo, ImageLayout, ImageType, ImageUsage,
        view::ImageView,
    },
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter},
};

/// Process-unique identity of a texture. Used as the bindless registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl TextureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Who destroys the underlying image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOwnership {
    /// Device memory allocated by us, released with the last `Arc<Texture>`.
    Owned,
    /// Presentation-engine image; the swap chain releases it.
    Swapchain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureCreateInfo {
    pub image_type: ImageType,
    pub format: Format,
    pub extent: [u32; 3],
    pub usage: ImageUsage,
    pub mip_levels: u32,
    pub array_layers: u32,
}

impl TextureCreateInfo {
    /// Render target that is sampled by a later pass.
    pub fn color_target(format: Format, extent: [u32; 2]) -> Self {
        Self {
            format,
            extent: [extent[0], extent[1], 1],
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            ..Default::default()
        }
    }

    pub fn depth_target(format: Format, extent: [u32; 2], sampled: bool) -> Self {
        let mut usage = ImageUsage::DEPTH_STENCIL_ATTACHMENT;
        if sampled {
            usage |= ImageUsage::SAMPLED;
        }
        Self {
            format,
            extent: [extent[0], extent[1], 1],
            usage,
            ..Default::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.extent[0]
    }

    pub fn height(&self) -> u32 {
        self.extent[1]
    }
}

impl Default for TextureCreateInfo {
    fn default() -> Self {
        Self {
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [1, 1, 1],
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            mip_levels: 1,
            array_layers: 1,
        }
    }
}

pub struct Texture {
    id: TextureId,
    image_view: Arc<ImageView>,
    info: TextureCreateInfo,
    ownership: TextureOwnership,
    layout: TrackedLayout,
}

impl Texture {
    /// Allocates an uninitialized image, typically a render target.
    pub fn new(ctx: &VulkanContext, create_info: TextureCreateInfo) -> VkResult<Texture> {
        let image = Image::new(
            ctx.memory_allocator().clone(),
            ImageCreateInfo {
                image_type: create_info.image_type,
                format: create_info.format,
                extent: create_info.extent,
                usage: create_info.usage,
                mip_levels: create_info.mip_levels,
                array_layers: create_info.array_layers,
                ..Default::default()
            },
            AllocationCreateInfo::default(),
        )
        .vk_op("create image")?;
        let image_view = ImageView::new_default(image).vk_op("create image view")?;

        Ok(Self {
            id: TextureId::next(),
            image_view,
            info: create_info,
            ownership: TextureOwnership::Owned,
            layout: TrackedLayout::new(ImageLayout::Undefined),
        })
    }

    /// Creates a sampled texture from in-memory pixels and blocks until the upload finished.
    pub fn create<T>(
        ctx: &VulkanContext,
        image_data: Vec<T>,
        mut create_info: TextureCreateInfo,
    ) -> VkResult<Texture>
    where
        T: BufferContents + Copy,
    {
        create_info.usage |= ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED;
        let texture = Self::new(ctx, create_info)?;

        let upload_buffer = Buffer::from_iter(
            ctx.memory_allocator().clone(),
            BufferCreateInfo {
                usage: BufferUsage::TRANSFER_SRC,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            image_data,
        )
        .vk_op("allocate texture upload buffer")?;

        let mut uploads = AutoCommandBufferBuilder::primary(
            ctx.command_buffer_allocator().clone(),
            ctx.graphics_queue().queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .vk_op("allocate upload command buffer")?;

        texture.transition(ImageLayout::TransferDstOptimal)?;
        uploads
            .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
                upload_buffer,
                texture.image_view.image().clone(),
            ))
            .vk_op("record texture upload")?;
        texture.transition(ImageLayout::ShaderReadOnlyOptimal)?;

        uploads
            .build()
            .vk_op("build upload command buffer")?
            .execute(ctx.graphics_queue().clone())
            .vk_op("submit texture upload")?
            .then_signal_fence_and_flush()
            .vk_op("flush texture upload")?
            .wait(None)
            .vk_op("wait for texture upload")?;

        tracing::debug!(
            "Context - Uploaded {}x{} {:?} texture {:?}.",
            texture.width(),
            texture.height(),
            texture.format(),
            texture.id
        );
        Ok(texture)
    }

    /// Wraps a presentation-engine image. Never destroyed by a pass.
    pub fn from_swapchain(image: Arc<Image>) -> VkResult<Texture> {
        let extent = image.extent();
        let info = TextureCreateInfo {
            image_type: image.image_type(),
            format: image.format(),
            extent,
            usage: image.usage(),
            mip_levels: image.mip_levels(),
            array_layers: image.array_layers(),
        };
        let image_view = ImageView::new_default(image).vk_op("create swap chain image view")?;

        Ok(Self {
            id: TextureId::next(),
            image_view,
            info,
            ownership: TextureOwnership::Swapchain,
            layout: TrackedLayout::new(ImageLayout::Undefined),
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn image_view(&self) -> &Arc<ImageView> {
        &self.image_view
    }

    pub fn image(&self) -> &Arc<Image> {
        self.image_view.image()
    }

    pub fn info(&self) -> &TextureCreateInfo {
        &self.info
    }

    pub fn width(&self) -> u32 {
        self.info.width()
    }

    pub fn height(&self) -> u32 {
        self.info.height()
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.info.width(), self.info.height()]
    }

    pub fn format(&self) -> Format {
        self.info.format
    }

    pub fn usage(&self) -> ImageUsage {
        self.info.usage
    }

    pub fn mip_levels(&self) -> u32 {
        self.info.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.info.array_layers
    }

    pub fn ownership(&self) -> TextureOwnership {
        self.ownership
    }

    pub fn is_swapchain_image(&self) -> bool {
        self.ownership == TextureOwnership::Swapchain
    }

    pub fn layout(&self) -> ImageLayout {
        self.layout.get()
    }

    /// Records that the image is now in `new`. vulkano issues the barrier; this only
    /// validates the transition and tracks the layout.
    pub fn transition(&self, new: ImageLayout) -> VkResult<()> {
        self.layout.transition(new)
    }

    /// Forgets the contents. Render passes with an `Undefined` initial layout do this.
    pub fn discard_contents(&self) {
        self.layout.discard();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("format", &self.info.format)
            .field("extent", &self.info.extent)
            .field("ownership", &self.ownership)
            .field("layout", &self.layout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_ids_are_unique() {
        let a = TextureId::next();
        let b = TextureId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn target_descriptions_carry_attachment_usage() {
        let color = TextureCreateInfo::color_target(Format::R16G16B16A16_SFLOAT, [640, 480]);
        assert_eq!(color.extent, [640, 480, 1]);
        assert!(color.usage.contains(ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED));

        let depth = TextureCreateInfo::depth_target(Format::D32_SFLOAT, [2048, 2048], true);
        assert!(depth.usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT));
        assert!(depth.usage.contains(ImageUsage::SAMPLED));

        let scratch = TextureCreateInfo::depth_target(Format::D32_SFLOAT, [8, 8], false);
        assert!(!scratch.usage.contains(ImageUsage::SAMPLED));
    }
}
