use bevy_ecs::prelude::*;
use bevy_math::{Vec3, Vec4};
use mo_ecs::component::{DirectionalLight, PointLight, Transform};
use vulkano::buffer::BufferContents;

/// Point lights beyond this count are dropped. Must match `MAX_POINT_LIGHTS` in `lighting.frag`.
pub const MAX_POINT_LIGHTS: usize = 16;

const AMBIENT: Vec4 = Vec4::new(1.0, 1.0, 1.0, 0.1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightState {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Lights read from the world for one frame.
#[derive(Debug, Clone, Default)]
pub struct LightState {
    pub directional: Option<DirectionalLight>,
    pub point_lights: Vec<PointLightState>,
}

impl LightState {
    pub fn is_empty(&self) -> bool {
        self.directional.is_none() && self.point_lights.is_empty()
    }
}

/// The first shadow-casting directional light, or the first directional light if none casts.
pub fn active_directional_light(world: &World) -> Option<DirectionalLight> {
    let mut first = None;
    for entity in world.iter_entities() {
        if let Some(light) = entity.get::<DirectionalLight>() {
            if light.is_shadow_caster {
                return Some(*light);
            }
            first.get_or_insert(*light);
        }
    }
    first
}

/// Collects the active directional light and every point light with a transform.
pub fn gather_lights(world: &World) -> LightState {
    let point_lights = world
        .iter_entities()
        .filter_map(|entity| {
            let light = entity.get::<PointLight>()?;
            let transform = entity.get::<Transform>()?;
            Some(PointLightState {
                position: transform.translation,
                color: light.color,
                intensity: light.intensity,
            })
        })
        .collect();

    LightState {
        directional: active_directional_light(world),
        point_lights,
    }
}

/// `LightingData` uniform block of `lighting.frag` (std140).
#[derive(BufferContents, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct LightingUniform {
    pub camera_position: [f32; 4],
    /// rgb color, a strength.
    pub ambient: [f32; 4],
    /// xyz travel direction, w is 1 when a directional light exists.
    pub dir_direction: [f32; 4],
    /// rgb color, a intensity.
    pub dir_color: [f32; 4],
    pub point_positions: [[f32; 4]; MAX_POINT_LIGHTS],
    /// rgb color, a intensity.
    pub point_colors: [[f32; 4]; MAX_POINT_LIGHTS],
    pub num_point_lights: u32,
    pub _pad: [u32; 3],
}

impl LightingUniform {
    pub fn from_lights(camera_position: Vec3, lights: &LightState) -> Self {
        let mut uniform = Self {
            camera_position: camera_position.extend(1.0).into(),
            ambient: AMBIENT.into(),
            dir_direction: [0.0; 4],
            dir_color: [0.0; 4],
            point_positions: [[0.0; 4]; MAX_POINT_LIGHTS],
            point_colors: [[0.0; 4]; MAX_POINT_LIGHTS],
            num_point_lights: 0,
            _pad: [0; 3],
        };

        if let Some(light) = &lights.directional {
            uniform.dir_direction = light.normalized_direction().extend(1.0).into();
            uniform.dir_color = light.color.extend(light.intensity).into();
        }

        if lights.point_lights.len() > MAX_POINT_LIGHTS {
            tracing::debug!(
                "Render - {} point lights in the scene, only the first {MAX_POINT_LIGHTS} are shaded.",
                lights.point_lights.len()
            );
        }
        for (i, light) in lights.point_lights.iter().take(MAX_POINT_LIGHTS).enumerate() {
            uniform.point_positions[i] = light.position.extend(1.0).into();
            uniform.point_colors[i] = light.color.extend(light.intensity).into();
            uniform.num_point_lights += 1;
        }

        uniform
    }

    pub fn has_directional_light(&self) -> bool {
        self.dir_direction[3] != 0.0
    }
}
