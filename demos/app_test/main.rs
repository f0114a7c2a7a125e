use anyhow::Result;
use bevy_ecs::prelude::*;
use bevy_math::{Quat, Vec3, Vec4};
use mo_core::{App, RendererConfig};
use mo_ecs::component::{DirectionalLight, PointLight, Renderable, Transform};
use mo_ecs::model::{Material, Model, primitives};
use mo_ecs::resource::{Camera, CameraSettings, Timer};
use mo_vk::{Texture, TextureCreateInfo, VulkanContext};
use std::sync::Arc;

/// Spins an entity around Y, radians per second.
#[derive(Component)]
struct Spin(f32);

fn spin(timer: Res<Timer>, mut query: Query<(&mut Transform, &Spin)>) {
    for (mut transform, spin) in &mut query {
        transform.rotation *= Quat::from_rotation_y(spin.0 * timer.delta_time());
    }
}

fn checker(gpu: &VulkanContext, size: u32) -> Result<Texture> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let value = if (x / 4 + y / 4) % 2 == 0 { 230 } else { 90 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    let info = TextureCreateInfo {
        extent: [size, size, 1],
        ..Default::default()
    };
    Ok(Texture::create(gpu, pixels, info)?)
}

fn build_scene(gpu: &VulkanContext, world: &mut World) -> Result<()> {
    let checker = Arc::new(checker(gpu, 64)?);

    let cube = Arc::new(Model::from_geometry(
        gpu,
        primitives::cube(1.0),
        vec![Material::default().with_diffuse(checker.clone())],
    )?);
    let ground = Arc::new(Model::from_geometry(
        gpu,
        primitives::plane(20.0),
        vec![Material::default().with_base_color(Vec4::new(0.8, 0.8, 0.75, 1.0))],
    )?);

    world.spawn((
        Transform::from_xyz(0.0, -0.5, 0.0),
        Renderable::new(ground),
    ));

    let tints = [
        Vec4::new(1.0, 0.4, 0.4, 1.0),
        Vec4::new(0.4, 1.0, 0.4, 1.0),
        Vec4::new(0.4, 0.4, 1.0, 1.0),
        Vec4::ONE,
    ];
    for (i, tint) in tints.into_iter().enumerate() {
        let x = i as f32 * 2.0 - 3.0;
        world.spawn((
            Transform::from_xyz(x, 0.25, 0.0).with_scale(Vec3::splat(0.75 + 0.25 * i as f32)),
            Renderable::new(cube.clone()).with_color(tint),
            Spin(0.5 + 0.3 * i as f32),
        ));
    }

    world.spawn(DirectionalLight::new(
        Vec3::new(-0.4, -1.0, -0.3),
        Vec3::new(1.0, 0.95, 0.85),
        1.5,
        true,
    ));

    let point_lights = [
        (Vec3::new(-3.0, 1.5, 2.0), Vec3::new(1.0, 0.3, 0.2)),
        (Vec3::new(3.0, 1.5, 2.0), Vec3::new(0.2, 0.4, 1.0)),
        (Vec3::new(0.0, 2.5, -2.5), Vec3::new(0.3, 1.0, 0.4)),
    ];
    for (position, color) in point_lights {
        world.spawn((Transform::from_translation(position), PointLight::new(color, 4.0)));
    }

    tracing::info!("Demo - Scene with {} cubes and {} point lights built.", tints.len(), point_lights.len());
    Ok(())
}

fn main() -> Result<()> {
    let config = RendererConfig::default()
        .with_title("mo deferred - app_test")
        .with_size(1600, 900);
    let mut app = App::new(config)?;

    let camera = Camera::new(
        Transform::from_xyz(0.0, 4.0, 9.0).looking_at(Vec3::ZERO, Vec3::Y),
        CameraSettings::new_perspective(),
    );
    app.insert_resource(camera);
    app.set_scene_setup(build_scene);
    app.add_runtime_system(spin);

    app.run()
}
