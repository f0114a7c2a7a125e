use crate::model::Model;
use bevy_ecs::prelude::*;
use mo_vk::Texture;
use std::sync::Arc;

/// Textures the application no longer draws with. The renderer drains this once per frame
/// and returns their bindless slots to the registry.
#[derive(Resource)]
pub struct TextureReleases<I: Send + Sync + 'static = Texture> {
    pending: Vec<Arc<I>>,
}

impl<I: Send + Sync + 'static> Default for TextureReleases<I> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<I: Send + Sync + 'static> TextureReleases<I> {
    pub fn release(&mut self, image: Arc<I>) {
        self.pending.push(image);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Arc<I>> + '_ {
        self.pending.drain(..)
    }
}

impl TextureReleases<Texture> {
    /// Queues every map of every material of `model`.
    pub fn release_model(&mut self, model: &Model) {
        for material in model.materials() {
            self.pending.extend(material.diffuse.iter().cloned());
            self.pending.extend(material.normal.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue_in_release_order() {
        let mut releases = TextureReleases::<u32>::default();
        releases.release(Arc::new(3));
        releases.release(Arc::new(8));
        assert_eq!(releases.len(), 2);

        let drained: Vec<u32> = releases.drain().map(|image| *image).collect();
        assert_eq!(drained, vec![3, 8]);
        assert!(releases.is_empty());
    }

    #[test]
    fn works_as_a_world_resource() {
        let mut world = World::new();
        world.init_resource::<TextureReleases<u32>>();
        world
            .resource_mut::<TextureReleases<u32>>()
            .release(Arc::new(1));
        assert_eq!(world.resource::<TextureReleases<u32>>().len(), 1);
    }
}
