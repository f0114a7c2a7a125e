use mo_renderpass::PassError;
use mo_vk::VkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid renderer config: `{field}` {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("failed to create the window")]
    Window(#[from] winit::error::OsError),

    #[error("failed to spawn the render thread")]
    Spawn(#[from] std::io::Error),

    #[error("render thread panicked")]
    RenderThreadPanicked,

    #[error(transparent)]
    Vk(#[from] VkError),

    #[error(transparent)]
    Pass(#[from] PassError),
}
