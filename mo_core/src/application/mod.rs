use crate::config::RendererConfig;
use crate::error::AppError;
use crate::render_thread::{RenderThread, SceneSetup};
use crate::window_state::WindowState;
use anyhow::Result;
use bevy_ecs::prelude::*;
use mo_ecs::resource::{Camera, TextureReleases, Timer};
use mo_vk::VulkanContext;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// How often the event loop wakes up to notice a render thread that stopped on its own.
const RENDER_THREAD_POLL: Duration = Duration::from_millis(50);

/// The world and schedules before they move to the render thread.
#[derive(Default)]
struct PendingScene {
    world: World,
    startup_schedule: Schedule,
    runtime_schedule: Schedule,
    scene_setup: Option<Box<SceneSetup>>,
}

/// Owns the window on the event thread and the render thread's lifetime.
pub struct App {
    config: RendererConfig,
    scene: PendingScene,
    window: Option<Arc<Window>>,
    window_state: Option<Arc<WindowState>>,
    render_thread: Option<JoinHandle<Result<()>>>,
    exit_error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: RendererConfig) -> Result<Self, AppError> {
        // Embedders and tests may already have installed a subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init();

        config.validate()?;

        let mut world = World::new();
        world.init_resource::<Timer>();
        world.init_resource::<Camera>();
        world.init_resource::<TextureReleases>();

        let mut runtime_schedule = Schedule::default();
        runtime_schedule.add_systems((Timer::update_timer, Camera::update_camera));

        Ok(Self {
            config,
            scene: PendingScene {
                world,
                startup_schedule: Schedule::default(),
                runtime_schedule,
                scene_setup: None,
            },
            window: None,
            window_state: None,
            render_thread: None,
            exit_error: None,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn init_resource<R: Resource + FromWorld>(&mut self) -> &mut Self {
        self.scene.world.init_resource::<R>();
        self
    }

    pub fn insert_resource<R: Resource>(&mut self, resource: R) -> &mut Self {
        self.scene.world.insert_resource(resource);
        self
    }

    pub fn add_entity<B: Bundle>(&mut self, entity: B) -> Entity {
        self.scene.world.spawn(entity).id()
    }

    pub fn add_startup_system<M>(&mut self, system: impl IntoSystemConfigs<M>) -> &mut Self {
        self.scene.startup_schedule.add_systems(system);
        self
    }

    pub fn add_runtime_system<M>(&mut self, system: impl IntoSystemConfigs<M>) -> &mut Self {
        self.scene.runtime_schedule.add_systems(system);
        self
    }

    /// Runs once on the render thread with the GPU context, before the startup systems.
    pub fn set_scene_setup(
        &mut self,
        setup: impl FnOnce(&VulkanContext, &mut World) -> Result<()> + Send + 'static,
    ) -> &mut Self {
        self.scene.scene_setup = Some(Box::new(setup));
        self
    }

    /// Runs the event loop until the window closes or the render thread fails.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        self.shutdown();
        match self.exit_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        if self.window.is_some() {
            return Ok(());
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.size[0], self.config.size[1]));
        let window = Arc::new(event_loop.create_window(attributes)?);
        let gpu = VulkanContext::new(event_loop, window.clone(), self.config.validation)?;

        let size = window.inner_size();
        let window_state = Arc::new(WindowState::new([size.width, size.height]));
        tracing::info!("Context - Render Context and Window successfully created.");

        let scene = std::mem::take(&mut self.scene);
        let render_thread = RenderThread {
            gpu,
            world: scene.world,
            startup_schedule: scene.startup_schedule,
            runtime_schedule: scene.runtime_schedule,
            scene_setup: scene.scene_setup,
            config: self.config.clone(),
            window_state: window_state.clone(),
        }
        .spawn()?;

        self.window = Some(window);
        self.window_state = Some(window_state);
        self.render_thread = Some(render_thread);
        Ok(())
    }

    /// Stops the render thread and collects its result.
    fn shutdown(&mut self) {
        if let Some(state) = &self.window_state {
            state.request_close();
        }
        let Some(handle) = self.render_thread.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(())) => tracing::info!("Runtime - Render thread finished."),
            Ok(Err(err)) => self.exit_error = Some(err),
            Err(_) => self.exit_error = Some(AppError::RenderThreadPanicked.into()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::wait_duration(RENDER_THREAD_POLL));
        if let Err(err) = self.start(event_loop) {
            tracing::error!("Runtime - Failed to start: {err}");
            self.exit_error = Some(err.into());
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.window_state.clone() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let generation = state.request_resize([size.width, size.height]);
                if !state.wait_for_ack(generation, self.config.resize_ack_timeout) {
                    tracing::warn!(
                        "Runtime - Resize {generation} to {}x{} not acknowledged within {:?}.",
                        size.width,
                        size.height,
                        self.config.resize_ack_timeout
                    );
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let stopped = self
            .window_state
            .as_ref()
            .is_some_and(|state| state.close_requested() || !state.is_render_thread_alive());
        if stopped {
            self.shutdown();
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
