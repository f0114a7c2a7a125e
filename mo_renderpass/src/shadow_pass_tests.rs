use super::*;
use bevy_math::{Quat, Vec4};
use mo_ecs::component::{DirectionalLight, Transform};
use mo_ecs::resource::CameraSettings;

const EPSILON: f32 = 1e-4;

fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    let mut i = 0;
    for x in [min.x, max.x] {
        for y in [min.y, max.y] {
            for z in [min.z, max.z] {
                corners[i] = Vec3::new(x, y, z);
                i += 1;
            }
        }
    }
    corners
}

fn assert_in_clip_volume(light: &LightSpace, corners: &[Vec3; 8]) {
    for corner in corners {
        let clip = light.light_space * Vec4::new(corner.x, corner.y, corner.z, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 + EPSILON, "x out of range: {ndc:?}");
        assert!(ndc.y.abs() <= 1.0 + EPSILON, "y out of range: {ndc:?}");
        assert!(
            (-EPSILON..=1.0 + EPSILON).contains(&ndc.z),
            "z out of range: {ndc:?}"
        );
    }
}

#[test]
fn fitted_projection_contains_every_corner() {
    let corners = box_corners(Vec3::new(-3.0, -1.0, -8.0), Vec3::new(5.0, 2.0, -0.5));
    let direction = Vec3::new(0.3, -1.0, 0.2).normalize();

    let light = fit_light_to_frustum(&corners, direction, 10.0);

    assert_in_clip_volume(&light, &corners);
    assert_eq!(light.light_space, light.proj * light.view);
}

#[test]
fn fitted_projection_contains_a_camera_frustum() {
    let mut camera = Camera::new(
        Transform::from_xyz(2.0, 3.0, 6.0).with_rotation(Quat::from_rotation_y(0.4)),
        CameraSettings::new_perspective(),
    );
    camera.resize([1280.0, 720.0]);
    let corners = camera.frustum_corners();

    let light = fit_light_to_frustum(&corners, Vec3::new(-0.5, -1.0, -0.3).normalize(), 10.0);

    assert_in_clip_volume(&light, &corners);
}

#[test]
fn light_parallel_to_the_up_axis_still_has_a_basis() {
    let corners = box_corners(Vec3::splat(-1.0), Vec3::splat(1.0));

    let light = fit_light_to_frustum(&corners, Vec3::NEG_Y, 10.0);

    assert!(!light.light_space.is_nan());
    assert_in_clip_volume(&light, &corners);
}

#[test]
fn depth_range_is_widened_on_both_ends() {
    let corners = box_corners(Vec3::splat(-1.0), Vec3::splat(1.0));
    let direction = Vec3::new(0.0, -1.0, -1.0).normalize();

    let tight = fit_light_to_frustum(&corners, direction, 1.0);
    let padded = fit_light_to_frustum(&corners, direction, 10.0);

    assert_eq!(tight.view, padded.view);
    // A wider depth range means a smaller z scale in the projection.
    assert!(padded.proj.z_axis.z.abs() < tight.proj.z_axis.z.abs());

    // The light sits at distance 1 from the centroid, inside the box, so the range
    // straddles the eye and both ends grow.
    let near_point = tight.view.transform_point3(Vec3::ZERO) + Vec3::new(0.0, 0.0, 5.0);
    let clip = padded.proj * near_point.extend(1.0);
    assert!((-EPSILON..=1.0 + EPSILON).contains(&(clip.z / clip.w)));
}

fn light_depth(light: &LightSpace, point: Vec3) -> f32 {
    let clip = light.light_space * point.extend(1.0);
    clip.z / clip.w
}

#[test]
fn surfaces_nearer_the_light_store_smaller_depth() {
    let corners = box_corners(Vec3::new(-2.0, -1.0, -2.0), Vec3::new(2.0, 3.0, 2.0));
    let travel = Vec3::new(-0.4, -1.0, -0.3).normalize();

    let light = fit_light_to_frustum(&corners, -travel, 10.0);

    // The eye sits upstream of the light, above the scene for a downward light.
    let eye = light.view.inverse().w_axis.truncate();
    assert!(eye.y > 1.0, "eye below the scene: {eye:?}");

    let occluder = Vec3::new(0.0, 1.5, 0.0);
    let receiver = occluder + travel * 1.5;
    let occluder_depth = light_depth(&light, occluder);
    let receiver_depth = light_depth(&light, receiver);
    assert!((0.0..=1.0).contains(&occluder_depth));
    assert!((0.0..=1.0).contains(&receiver_depth));
    assert!(
        occluder_depth < receiver_depth,
        "occluder {occluder_depth} must be in front of receiver {receiver_depth}"
    );
}

fn world_with_camera() -> World {
    let mut world = World::new();
    world.insert_resource(Camera::new(
        Transform::from_xyz(0.0, 4.0, 9.0).looking_at(Vec3::ZERO, Vec3::Y),
        CameraSettings::new_perspective(),
    ));
    world
}

#[test]
fn shadow_caster_is_fitted_from_the_lit_side() {
    let mut world = world_with_camera();
    let travel = Vec3::new(-0.4, -1.0, -0.3);
    world.spawn(DirectionalLight::new(travel, Vec3::ONE, 1.0, true));

    let light = shadow_light_space(&world, 10.0).unwrap();

    let camera = world.resource::<Camera>();
    let expected = fit_light_to_frustum(&camera.frustum_corners(), -travel.normalize(), 10.0);
    assert_eq!(light, expected);

    let occluder = Vec3::new(0.0, 1.0, 0.0);
    let receiver = occluder + travel.normalize();
    assert!(light_depth(&light, occluder) < light_depth(&light, receiver));
}

#[test]
fn no_shadow_caster_means_identity() {
    let mut world = world_with_camera();
    world.spawn(DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 1.0, false));

    assert_eq!(shadow_light_space(&world, 10.0).unwrap(), LightSpace::IDENTITY);
}

#[test]
fn missing_camera_is_reported() {
    let world = World::new();
    assert!(matches!(
        shadow_light_space(&world, 10.0),
        Err(PassError::MissingResource("Camera"))
    ));
}
