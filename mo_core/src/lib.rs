pub mod application;
pub mod config;
pub mod error;
pub mod render_thread;
pub mod window_state;

pub use application::App;
pub use config::RendererConfig;
pub use error::AppError;
pub use render_thread::SceneSetup;
pub use window_state::WindowState;
