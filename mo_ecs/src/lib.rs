pub mod component;
pub mod model;
pub mod resource;

pub mod prelude {
    pub use crate::component::*;
    pub use crate::model::{Geometry, Material, MeshDesc, Model, StaticVertex};
    pub use crate::resource::*;
}
