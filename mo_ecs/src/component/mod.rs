pub mod directional_light;
pub mod point_light;
pub mod renderable;
pub mod transform;

pub use directional_light::DirectionalLight;
pub use point_light::PointLight;
pub use renderable::Renderable;
pub use transform::Transform;
