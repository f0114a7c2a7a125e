use crate::MAX_FRAMES_IN_FLIGHT;
use crate::attachment::{AttachmentSet, AttachmentSpec};
use crate::context::VulkanContext;
use crate::error::{VkError, VkResult, VkResultExt};
use crate::frame::{FrameFence, FramePacer};
use crate::texture::Texture;
use std::sync::Arc;
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, PrimaryAutoCommandBuffer, RenderPassBeginInfo, SubpassEndInfo,
};
use vulkano::device::{Device, Queue};
use vulkano::format::Format;
use vulkano::image::{Image, ImageLayout, ImageUsage};
use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass};
use vulkano::swapchain::{
    self, CompositeAlpha, PresentMode, Surface, Swapchain, SwapchainAcquireFuture,
    SwapchainCreateInfo, SwapchainPresentInfo,
};
use vulkano::sync::future::FenceSignalFuture;
use vulkano::sync::{self as vk_sync, GpuFuture};
use vulkano::{Validated, VulkanError};

type FrameFuture = Arc<FenceSignalFuture<Box<dyn GpuFuture>>>;

impl FrameFence for FrameFuture {
    fn wait_signaled(&self) -> VkResult<()> {
        self.wait(None).vk_op("wait for frame fence")
    }
}

/// A swap chain image acquired for the current frame.
pub struct AcquiredImage {
    pub image_index: u32,
    pub frame_index: usize,
    acquire_future: SwapchainAcquireFuture,
}

/// Owns the swap chain, its framebuffers and the per-frame-in-flight synchronization.
pub struct FrameScheduler {
    device: Arc<Device>,
    queue: Arc<Queue>,
    surface: Arc<Surface>,
    swapchain: Arc<Swapchain>,
    images: Vec<Arc<Texture>>,
    attachments: AttachmentSet,
    render_pass: Arc<RenderPass>,
    framebuffers: Vec<Arc<Framebuffer>>,
    pacer: FramePacer<FrameFuture>,
    needs_recreate: bool,
}

impl FrameScheduler {
    pub fn new(ctx: &VulkanContext, extent: [u32; 2], prefer_mailbox: bool) -> VkResult<Self> {
        let device = ctx.device().clone();
        let surface = ctx.surface().clone();
        let physical_device = ctx.physical_device();

        let capabilities = physical_device
            .surface_capabilities(&surface, Default::default())
            .vk_op("query surface capabilities")?;
        let formats = physical_device
            .surface_formats(&surface, Default::default())
            .vk_op("query surface formats")?;
        let image_format = formats
            .iter()
            .map(|(format, _)| *format)
            .find(|format| *format == Format::B8G8R8A8_SRGB)
            .or_else(|| formats.first().map(|(format, _)| *format))
            .ok_or(VkError::UnsupportedSurface { what: "format" })?;

        let present_mode = if prefer_mailbox
            && physical_device
                .surface_present_modes(&surface, Default::default())
                .vk_op("query present modes")?
                .into_iter()
                .any(|mode| mode == PresentMode::Mailbox)
        {
            PresentMode::Mailbox
        } else {
            PresentMode::Fifo
        };

        let composite_alpha = capabilities
            .supported_composite_alpha
            .into_iter()
            .next()
            .unwrap_or(CompositeAlpha::Opaque);

        let mut min_image_count = capabilities.min_image_count.max(MAX_FRAMES_IN_FLIGHT as u32);
        if let Some(max) = capabilities.max_image_count {
            min_image_count = min_image_count.min(max);
        }

        let image_extent = capabilities.current_extent.unwrap_or([
            extent[0].clamp(
                capabilities.min_image_extent[0],
                capabilities.max_image_extent[0],
            ),
            extent[1].clamp(
                capabilities.min_image_extent[1],
                capabilities.max_image_extent[1],
            ),
        ]);

        let (swapchain, images) = Swapchain::new(
            device.clone(),
            surface.clone(),
            SwapchainCreateInfo {
                min_image_count,
                image_format,
                image_extent,
                image_usage: ImageUsage::COLOR_ATTACHMENT,
                composite_alpha,
                present_mode,
                ..Default::default()
            },
        )
        .vk_op("create swap chain")?;

        let attachments = AttachmentSet::new(vec![
            AttachmentSpec::color(image_format).with_final_layout(ImageLayout::PresentSrc),
        ])?;
        let render_pass = attachments.build_render_pass(device.clone())?;
        let (images, framebuffers) = Self::wrap_images(images, &render_pass)?;

        tracing::info!(
            "Render - Swap chain {:?} {}x{} with {} images ({:?}) successfully created.",
            image_format,
            image_extent[0],
            image_extent[1],
            images.len(),
            present_mode,
        );

        let pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT, images.len());
        Ok(Self {
            device,
            queue: ctx.graphics_queue().clone(),
            surface,
            swapchain,
            images,
            attachments,
            render_pass,
            framebuffers,
            pacer,
            needs_recreate: false,
        })
    }

    fn wrap_images(
        images: Vec<Arc<Image>>,
        render_pass: &Arc<RenderPass>,
    ) -> VkResult<(Vec<Arc<Texture>>, Vec<Arc<Framebuffer>>)> {
        let textures = images
            .into_iter()
            .map(|image| Texture::from_swapchain(image).map(Arc::new))
            .collect::<VkResult<Vec<_>>>()?;
        let framebuffers = textures
            .iter()
            .map(|texture| {
                Framebuffer::new(
                    render_pass.clone(),
                    FramebufferCreateInfo {
                        attachments: vec![texture.image_view().clone()],
                        ..Default::default()
                    },
                )
                .vk_op("create swap chain framebuffer")
            })
            .collect::<VkResult<Vec<_>>>()?;
        Ok((textures, framebuffers))
    }

    /// Waits for the current frame slot and acquires the next image. Returns `None` when the
    /// swap chain is out of date; the caller recreates it and skips the frame.
    pub fn acquire_next_image(&mut self) -> VkResult<Option<AcquiredImage>> {
        let frame_index = self.pacer.begin_frame()?;

        let (image_index, suboptimal, acquire_future) =
            match swapchain::acquire_next_image(self.swapchain.clone(), None)
                .map_err(Validated::unwrap)
            {
                Ok(acquired) => acquired,
                Err(VulkanError::OutOfDate) => {
                    tracing::debug!("Render - Swap chain out of date on acquire.");
                    self.pacer.abort_frame();
                    self.needs_recreate = true;
                    return Ok(None);
                }
                Err(err) => {
                    self.pacer.abort_frame();
                    return Err(VkError::Vulkan {
                        op: "acquire swap chain image",
                        message: format!("{err:?}"),
                    });
                }
            };
        if suboptimal {
            self.needs_recreate = true;
        }

        self.pacer.image_acquired(image_index)?;
        Ok(Some(AcquiredImage {
            image_index,
            frame_index,
            acquire_future,
        }))
    }

    /// Gives the acquired image back without rendering, for example when recording failed.
    pub fn abandon(&mut self, acquired: AcquiredImage) {
        drop(acquired);
        self.pacer.abort_frame();
    }

    pub fn begin_render_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        acquired: &AcquiredImage,
    ) -> VkResult<()> {
        builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some([0.0, 0.0, 0.0, 1.0].into())],
                    ..RenderPassBeginInfo::framebuffer(
                        self.framebuffers[acquired.image_index as usize].clone(),
                    )
                },
                Default::default(),
            )
            .vk_op("begin present render pass")?;
        Ok(())
    }

    pub fn end_render_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        acquired: &AcquiredImage,
    ) -> VkResult<()> {
        builder
            .end_render_pass(SubpassEndInfo::default())
            .vk_op("end present render pass")?;
        self.attachments
            .record_final_layouts(&[&*self.images[acquired.image_index as usize]])
    }

    /// Submits the frame after the acquire semaphore, presents it and stores the frame fence.
    pub fn swap_image(
        &mut self,
        acquired: AcquiredImage,
        command_buffer: Arc<PrimaryAutoCommandBuffer>,
    ) -> VkResult<()> {
        let previous: Box<dyn GpuFuture> = match self.pacer.previous_fence() {
            Some(fence) => fence.clone().boxed(),
            None => {
                let mut now = vk_sync::now(self.device.clone());
                now.cleanup_finished();
                now.boxed()
            }
        };

        let execution = previous
            .join(acquired.acquire_future)
            .then_execute(self.queue.clone(), command_buffer);
        let execution = match execution {
            Ok(execution) => execution,
            Err(err) => {
                self.pacer.abort_frame();
                return Err(VkError::Vulkan {
                    op: "submit frame command buffer",
                    message: format!("{err:?}"),
                });
            }
        };

        let flushed = execution
            .then_swapchain_present(
                self.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(
                    self.swapchain.clone(),
                    acquired.image_index,
                ),
            )
            .boxed()
            .then_signal_fence_and_flush()
            .map_err(Validated::unwrap);

        let result = match flushed {
            Ok(future) => {
                self.pacer.submitted(Some(Arc::new(future)));
                Ok(())
            }
            Err(VulkanError::OutOfDate) => {
                tracing::debug!("Render - Swap chain out of date on present.");
                self.needs_recreate = true;
                self.pacer.submitted(None);
                Ok(())
            }
            Err(err) => {
                self.pacer.submitted(None);
                Err(VkError::Vulkan {
                    op: "present swap chain image",
                    message: format!("{err:?}"),
                })
            }
        };
        self.pacer.presented();
        result
    }

    /// Rebuilds the swap chain, its views and framebuffers at `extent`.
    pub fn recreate(&mut self, extent: [u32; 2]) -> VkResult<()> {
        self.pacer.wait_all()?;
        unsafe { self.device.wait_idle() }.vk_op("wait for device idle")?;

        let capabilities = self
            .device
            .physical_device()
            .surface_capabilities(&self.surface, Default::default())
            .vk_op("query surface capabilities")?;
        let image_extent = capabilities.current_extent.unwrap_or(extent);

        let (swapchain, images) = self
            .swapchain
            .recreate(SwapchainCreateInfo {
                image_extent,
                ..self.swapchain.create_info()
            })
            .vk_op("recreate swap chain")?;
        let (images, framebuffers) = Self::wrap_images(images, &self.render_pass)?;

        self.swapchain = swapchain;
        self.pacer.reset_images(images.len());
        self.images = images;
        self.framebuffers = framebuffers;
        self.needs_recreate = false;

        tracing::info!(
            "Render - Swap chain recreated at {}x{}.",
            image_extent[0],
            image_extent[1]
        );
        Ok(())
    }

    /// Blocks until every submitted frame finished.
    pub fn wait_idle(&mut self) -> VkResult<()> {
        self.pacer.wait_all()
    }

    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    pub fn request_recreate(&mut self) {
        self.needs_recreate = true;
    }

    pub fn extent(&self) -> [u32; 2] {
        self.swapchain.image_extent()
    }

    pub fn image_format(&self) -> Format {
        self.swapchain.image_format()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn current_frame(&self) -> usize {
        self.pacer.current_frame()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.pacer.frames_in_flight()
    }
}
