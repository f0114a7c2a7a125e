pub mod camera;
pub mod default_tex;
pub mod global_samplers;
pub mod texture_releases;
pub mod timer;

pub use camera::{Camera, CameraSettings, OrthographicCameraSize};
pub use default_tex::DefaultTextures;
pub use global_samplers::GlobalSamplers;
pub use texture_releases::TextureReleases;
pub use timer::Timer;
