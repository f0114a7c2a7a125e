use super::*;
use mo_vk::ImageKey;

struct FakeImage(ImageKey);

#[derive(Default)]
struct CountingWriter {
    writes: usize,
}

impl BindlessWriter for CountingWriter {
    type Image = FakeImage;

    fn image_key(image: &FakeImage) -> ImageKey {
        image.0
    }

    fn write_image(&mut self, _slot: u32, _image: &FakeImage) {
        self.writes += 1;
    }

    fn write_fallback(&mut self, _slot: u32) {}
}

struct FakeMaterial {
    color: Vec4,
    diffuse: Option<FakeImage>,
    normal: Option<FakeImage>,
}

struct FakeModel {
    meshes: Vec<MeshDesc>,
    materials: Vec<FakeMaterial>,
}

impl MeshSource for FakeModel {
    type Image = FakeImage;

    fn meshes(&self) -> &[MeshDesc] {
        &self.meshes
    }

    fn base_color(&self, material: usize) -> Vec4 {
        self.materials[material].color
    }

    fn diffuse(&self, material: usize) -> Option<&FakeImage> {
        self.materials[material].diffuse.as_ref()
    }

    fn normal(&self, material: usize) -> Option<&FakeImage> {
        self.materials[material].normal.as_ref()
    }
}

fn mesh(material_index: usize) -> MeshDesc {
    MeshDesc {
        index_count: 36,
        first_index: 0,
        vertex_offset: 0,
        material_index,
    }
}

fn single_texture_model(diffuse: ImageKey) -> FakeModel {
    FakeModel {
        meshes: vec![mesh(0)],
        materials: vec![FakeMaterial {
            color: Vec4::ONE,
            diffuse: Some(FakeImage(diffuse)),
            normal: None,
        }],
    }
}

const DEFAULTS: DefaultSlots = DefaultSlots {
    diffuse: 0,
    normal: 1,
};

fn registry() -> BindlessTextureRegistry<CountingWriter> {
    let mut registry = BindlessTextureRegistry::new(64, CountingWriter::default());
    // Slots 0 and 1 hold the default textures, like in the renderer.
    registry.add_texture(&FakeImage(u64::MAX)).unwrap();
    registry.add_texture(&FakeImage(u64::MAX - 1)).unwrap();
    registry
}

#[test]
fn entities_sharing_a_texture_consume_one_slot() {
    let a = single_texture_model(77);
    let b = single_texture_model(77);
    let mut registry = registry();

    let batches = plan_draws(
        [
            (Mat4::IDENTITY, Vec4::ONE, Some(&a)),
            (Mat4::from_translation(bevy_math::Vec3::X), Vec4::ONE, Some(&b)),
        ],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].draws[0].diffuse_slot, 2);
    assert_eq!(batches[1].draws[0].diffuse_slot, 2);
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.writer().writes, 3);
}

#[test]
fn entities_without_a_model_are_skipped() {
    let model = single_texture_model(5);
    let mut registry = registry();

    let batches = plan_draws(
        [
            (Mat4::IDENTITY, Vec4::ONE, None),
            (Mat4::IDENTITY, Vec4::ONE, Some(&model)),
            (Mat4::IDENTITY, Vec4::ONE, None),
        ],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].draws.len(), 1);
}

#[test]
fn missing_maps_fall_back_to_default_slots() {
    let model = FakeModel {
        meshes: vec![mesh(0)],
        materials: vec![FakeMaterial {
            color: Vec4::new(0.5, 0.5, 0.5, 1.0),
            diffuse: None,
            normal: None,
        }],
    };
    let mut registry = registry();

    let batches = plan_draws(
        [(Mat4::IDENTITY, Vec4::new(1.0, 0.0, 1.0, 1.0), Some(&model))],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();

    let draw = batches[0].draws[0];
    assert_eq!((draw.diffuse_slot, draw.normal_slot), (0, 1));
    assert_eq!(draw.base_color, Vec4::new(0.5, 0.0, 0.5, 1.0));
    assert_eq!(registry.len(), 2);
}

#[test]
fn each_mesh_uses_its_own_material() {
    let model = FakeModel {
        meshes: vec![mesh(0), mesh(1)],
        materials: vec![
            FakeMaterial {
                color: Vec4::ONE,
                diffuse: Some(FakeImage(10)),
                normal: Some(FakeImage(11)),
            },
            FakeMaterial {
                color: Vec4::ONE,
                diffuse: Some(FakeImage(20)),
                normal: None,
            },
        ],
    };
    let mut registry = registry();

    let batches = plan_draws(
        [(Mat4::IDENTITY, Vec4::ONE, Some(&model))],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();

    let draws = &batches[0].draws;
    assert_eq!((draws[0].diffuse_slot, draws[0].normal_slot), (2, 3));
    assert_eq!((draws[1].diffuse_slot, draws[1].normal_slot), (4, 1));
}

#[test]
fn renderables_without_a_model_in_the_world_plan_nothing() {
    let mut world = World::new();
    world.spawn((Transform::default(), Renderable::default()));
    world.spawn((Transform::from_xyz(1.0, 0.0, 0.0), Renderable::default()));
    // No transform: not a renderable instance at all.
    world.spawn(Renderable::default());

    let instances = gather_renderables(&world);
    assert_eq!(instances.len(), 2);

    let mut registry: BindlessTextureRegistry<TextureKeyWriter> =
        BindlessTextureRegistry::new(8, TextureKeyWriter);
    let batches = plan_draws(
        instances
            .iter()
            .map(|i| (i.model_matrix, i.tint, i.model.as_deref())),
        &mut registry,
        DEFAULTS,
    )
    .unwrap();
    assert!(batches.is_empty());
    assert!(registry.is_empty());
}

struct TextureKeyWriter;

impl BindlessWriter for TextureKeyWriter {
    type Image = Texture;

    fn image_key(image: &Texture) -> ImageKey {
        image.id().0
    }

    fn write_image(&mut self, _slot: u32, _image: &Texture) {}

    fn write_fallback(&mut self, _slot: u32) {}
}

#[test]
fn capacity_errors_propagate() {
    let model = single_texture_model(9);
    let mut registry = BindlessTextureRegistry::new(2, CountingWriter::default());
    registry.add_texture(&FakeImage(1)).unwrap();
    registry.add_texture(&FakeImage(2)).unwrap();

    let result = plan_draws(
        [(Mat4::IDENTITY, Vec4::ONE, Some(&model))],
        &mut registry,
        DEFAULTS,
    );
    assert!(matches!(
        result,
        Err(mo_vk::VkError::BindlessCapacityExceeded { capacity: 2 })
    ));
}

#[derive(Component)]
struct Decal(Arc<FakeImage>);

#[test]
fn despawned_texture_slot_is_reused() {
    let mut world = World::new();
    world.init_resource::<TextureReleases<FakeImage>>();
    let decal = world.spawn(Decal(Arc::new(FakeImage(77)))).id();
    let mut registry = registry();

    let first = single_texture_model(77);
    let batches = plan_draws(
        [(Mat4::IDENTITY, Vec4::ONE, Some(&first))],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();
    assert_eq!(batches[0].draws[0].diffuse_slot, 2);

    let Decal(image) = world.entity_mut(decal).take::<Decal>().unwrap();
    world.despawn(decal);
    world.resource_mut::<TextureReleases<FakeImage>>().release(image);

    assert_eq!(free_released_textures(&mut world, &mut registry, DEFAULTS), 1);
    assert!(world.resource::<TextureReleases<FakeImage>>().is_empty());
    assert_eq!(registry.slot_of(&FakeImage(77)), None);

    let second = single_texture_model(90);
    let batches = plan_draws(
        [(Mat4::IDENTITY, Vec4::ONE, Some(&second))],
        &mut registry,
        DEFAULTS,
    )
    .unwrap();
    assert_eq!(batches[0].draws[0].diffuse_slot, 2);
}

#[test]
fn releasing_unregistered_textures_frees_nothing() {
    let mut world = World::new();
    let mut registry = registry();
    assert_eq!(free_released_textures(&mut world, &mut registry, DEFAULTS), 0);

    world.init_resource::<TextureReleases<FakeImage>>();
    world
        .resource_mut::<TextureReleases<FakeImage>>()
        .release(Arc::new(FakeImage(404)));

    assert_eq!(free_released_textures(&mut world, &mut registry, DEFAULTS), 0);
    assert!(world.resource::<TextureReleases<FakeImage>>().is_empty());
    assert_eq!(registry.len(), 2);
}

#[test]
fn default_textures_are_never_released() {
    let mut world = World::new();
    world.init_resource::<TextureReleases<FakeImage>>();
    let mut registry = registry();
    world
        .resource_mut::<TextureReleases<FakeImage>>()
        .release(Arc::new(FakeImage(u64::MAX)));

    assert_eq!(free_released_textures(&mut world, &mut registry, DEFAULTS), 0);
    assert_eq!(registry.slot_of(&FakeImage(u64::MAX)), Some(0));
}
