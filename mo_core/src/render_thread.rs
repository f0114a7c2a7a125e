//! The thread that owns the world and does all GPU work.

use crate::config::RendererConfig;
use crate::window_state::WindowState;
use anyhow::{Context, Result};
use bevy_ecs::prelude::*;
use mo_ecs::resource::{Camera, DefaultTextures, GlobalSamplers, TextureReleases, Timer};
use mo_renderpass::{DeferredRenderer, FrameInfo};
use mo_vk::{AcquiredImage, FrameScheduler, VkResultExt, VulkanContext};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer,
};

/// How long a minimized window sleeps between checks.
const MINIMIZED_POLL: Duration = Duration::from_millis(16);

/// Builds GPU assets and spawns entities before the first frame.
pub type SceneSetup = dyn FnOnce(&VulkanContext, &mut World) -> Result<()> + Send;

/// Everything moved onto the render thread.
pub struct RenderThread {
    pub gpu: VulkanContext,
    pub world: World,
    pub startup_schedule: Schedule,
    pub runtime_schedule: Schedule,
    pub scene_setup: Option<Box<SceneSetup>>,
    pub config: RendererConfig,
    pub window_state: Arc<WindowState>,
}

impl RenderThread {
    pub fn spawn(self) -> std::io::Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("render".to_owned())
            .spawn(move || self.run())
    }

    fn run(self) -> Result<()> {
        let window_state = self.window_state.clone();
        let result = self.render_loop();
        if let Err(err) = &result {
            tracing::error!("Runtime - Render thread stopped: {err:#}");
            window_state.request_close();
        }
        window_state.render_thread_exited();
        result
    }

    fn render_loop(self) -> Result<()> {
        let Self {
            gpu,
            mut world,
            mut startup_schedule,
            mut runtime_schedule,
            scene_setup,
            config,
            window_state,
        } = self;

        world.insert_resource(DefaultTextures::new(&gpu).context("create default textures")?);
        world.insert_resource(GlobalSamplers::new(&gpu).context("create global samplers")?);
        world.init_resource::<Timer>();
        world.init_resource::<Camera>();
        world.init_resource::<TextureReleases>();

        if let Some(setup) = scene_setup {
            setup(&gpu, &mut world).context("scene setup")?;
        }
        startup_schedule.run(&mut world);
        tracing::info!("Runtime - Startup systems finished running.");

        let mut scheduler = FrameScheduler::new(&gpu, window_state.size(), config.prefer_mailbox)
            .context("create swap chain")?;
        let extent = scheduler.extent();
        resize_camera(&mut world, extent);
        let mut renderer = DeferredRenderer::new(
            &gpu,
            &world,
            config.renderer_settings(),
            scheduler.render_pass(),
            extent,
        )
        .context("create deferred renderer")?;

        let mut seen_generation = window_state.resize_generation();
        window_state.acknowledge(seen_generation);
        tracing::info!("Runtime - Starting render loop.");

        while !window_state.close_requested() {
            let generation = window_state.resize_generation();
            if generation != seen_generation || scheduler.needs_recreate() {
                if !window_state.is_minimized() {
                    let extent = window_state.size();
                    scheduler.recreate(extent).context("recreate swap chain")?;
                    let extent = scheduler.extent();
                    renderer
                        .on_resize(&gpu, extent)
                        .context("recreate render targets")?;
                    resize_camera(&mut world, extent);
                }
                seen_generation = generation;
                window_state.acknowledge(generation);
            }

            if window_state.is_minimized() {
                thread::sleep(MINIMIZED_POLL);
                continue;
            }

            runtime_schedule.run(&mut world);
            renderer.free_released_textures(&mut world);
            render_frame(&gpu, &world, &mut scheduler, &mut renderer)?;
        }

        tracing::info!("Runtime - Render loop finished, waiting for the device.");
        scheduler.wait_idle()?;
        gpu.wait_idle()?;
        Ok(())
    }
}

fn resize_camera(world: &mut World, extent: [u32; 2]) {
    world
        .resource_mut::<Camera>()
        .resize([extent[0] as f32, extent[1] as f32]);
}

fn render_frame(
    gpu: &VulkanContext,
    world: &World,
    scheduler: &mut FrameScheduler,
    renderer: &mut DeferredRenderer,
) -> Result<()> {
    let Some(acquired) = scheduler.acquire_next_image()? else {
        return Ok(());
    };

    let frame = FrameInfo {
        frame_index: acquired.frame_index,
        delta_time: world.resource::<Timer>().delta_time(),
        extent: scheduler.extent(),
    };

    let recorded = record_frame(gpu, world, &frame, scheduler, renderer, &acquired);
    match recorded {
        Ok(command_buffer) => scheduler.swap_image(acquired, command_buffer)?,
        Err(err) => {
            scheduler.abandon(acquired);
            return Err(err.context("record frame"));
        }
    }
    Ok(())
}

fn record_frame(
    gpu: &VulkanContext,
    world: &World,
    frame: &FrameInfo,
    scheduler: &FrameScheduler,
    renderer: &mut DeferredRenderer,
    acquired: &AcquiredImage,
) -> Result<Arc<PrimaryAutoCommandBuffer>> {
    let mut builder = AutoCommandBufferBuilder::primary(
        gpu.command_buffer_allocator().clone(),
        gpu.graphics_queue().queue_family_index(),
        CommandBufferUsage::OneTimeSubmit,
    )
    .vk_op("begin frame command buffer")?;
    renderer.record_frame(gpu, world, frame, &mut builder, scheduler, acquired)?;
    Ok(builder.build().vk_op("build frame command buffer")?)
}
