//! Scene lights and the per-frame constant block for the scene pass.
//!
//! Two point lights with colour pre-scaled by strength, a flat ambient term
//! and a specular exponent. The first light can orbit a fixed centre.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::camera::CameraMatrices;

// ============================================================================
// Lights
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub colour: Vec3,
    pub strength: f32,
    pub position: Vec3,
}

impl PointLight {
    pub fn new(colour: Vec3, strength: f32, position: Vec3) -> Self {
        Self {
            colour,
            strength,
            position,
        }
    }

    /// Colour multiplied by strength, as the shaders consume it.
    pub fn scaled_colour(&self) -> Vec3 {
        self.colour * self.strength
    }

    /// Display size of the light's marker. Grows sub-linearly with strength.
    pub fn marker_scale(&self) -> f32 {
        self.strength.max(0.0).powf(0.7)
    }
}

/// Circular path in the XZ plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightOrbit {
    pub centre: Vec3,
    pub radius: f32,
    /// Radians per second. The angle decreases over time.
    pub speed: f32,
    pub angle: f32,
    pub enabled: bool,
}

impl Default for LightOrbit {
    fn default() -> Self {
        Self {
            centre: Vec3::new(20.0, 10.0, 20.0),
            radius: 20.0,
            speed: 0.7,
            angle: 0.0,
            enabled: true,
        }
    }
}

impl LightOrbit {
    pub fn position(&self) -> Vec3 {
        self.centre + Vec3::new(self.angle.cos() * self.radius, 0.0, self.angle.sin() * self.radius)
    }

    /// Position at the current angle, then advance the angle if enabled.
    pub fn step(&mut self, frame_time: f32) -> Vec3 {
        let position = self.position();
        if self.enabled {
            self.angle = (self.angle - self.speed * frame_time).rem_euclid(TAU);
        }
        position
    }
}

/// Where and how to draw one light's marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightMarker {
    pub position: Vec3,
    pub scale: f32,
    pub colour: Vec3,
}

/// The two scene lights; light 0 follows the orbit.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLights {
    pub lights: [PointLight; 2],
    pub orbit: LightOrbit,
}

impl Default for SceneLights {
    fn default() -> Self {
        Self {
            lights: [
                PointLight::new(Vec3::new(0.8, 0.8, 1.0), 10.0, Vec3::new(30.0, 10.0, 0.0)),
                PointLight::new(Vec3::new(1.0, 0.8, 0.2), 40.0, Vec3::new(-70.0, 30.0, 100.0)),
            ],
            orbit: LightOrbit::default(),
        }
    }
}

impl SceneLights {
    pub fn update(&mut self, frame_time: f32) {
        self.lights[0].position = self.orbit.step(frame_time);
    }

    /// Flip the orbit animation. Returns the new state.
    pub fn toggle_orbit(&mut self) -> bool {
        self.orbit.enabled = !self.orbit.enabled;
        self.orbit.enabled
    }

    pub fn markers(&self) -> [LightMarker; 2] {
        self.lights.map(|light| LightMarker {
            position: light.position,
            scale: light.marker_scale(),
            colour: light.colour,
        })
    }
}

/// Surface shading terms shared by the whole scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneShading {
    pub ambient: Vec3,
    pub specular_power: f32,
    pub background: [f32; 4],
}

impl Default for SceneShading {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.3, 0.3, 0.4),
            specular_power: 256.0,
            background: [0.3, 0.3, 0.4, 1.0],
        }
    }
}

// ============================================================================
// GPU Uniforms
// ============================================================================

/// GPU-ready per-frame uniforms for the scene pass.
///
/// Matches `FrameConstants` in `shader_scene.wgsl`.
/// Total size: 368 bytes (16-byte aligned).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PerFrameConstants {
    pub camera_matrix: [[f32; 4]; 4],     // 64 bytes
    pub view_matrix: [[f32; 4]; 4],       // 64 bytes
    pub projection_matrix: [[f32; 4]; 4], // 64 bytes
    pub view_projection_matrix: [[f32; 4]; 4], // 64 bytes

    pub light1_colour: [f32; 3], // 12 bytes
    pub _pad1: f32,              // 4 bytes
    pub light1_position: [f32; 3],
    pub _pad2: f32,
    pub light2_colour: [f32; 3],
    pub _pad3: f32,
    pub light2_position: [f32; 3],
    pub _pad4: f32,

    pub ambient_colour: [f32; 3], // 12 bytes
    pub specular_power: f32,      // 4 bytes

    pub camera_position: [f32; 3], // 12 bytes
    pub frame_time: f32,           // 4 bytes

    pub viewport_width: f32,  // 4 bytes
    pub viewport_height: f32, // 4 bytes
    pub _pad5: [f32; 2],      // 8 bytes
} // Total: 368 bytes

impl PerFrameConstants {
    pub fn new(
        matrices: &CameraMatrices,
        camera_position: Vec3,
        lights: &SceneLights,
        shading: &SceneShading,
        frame_time: f32,
        viewport: (u32, u32),
    ) -> Self {
        let [l1, l2] = lights.lights;
        Self {
            camera_matrix: matrices.world.to_cols_array_2d(),
            view_matrix: matrices.view.to_cols_array_2d(),
            projection_matrix: matrices.projection.to_cols_array_2d(),
            view_projection_matrix: matrices.view_projection.to_cols_array_2d(),
            light1_colour: l1.scaled_colour().to_array(),
            _pad1: 0.0,
            light1_position: l1.position.to_array(),
            _pad2: 0.0,
            light2_colour: l2.scaled_colour().to_array(),
            _pad3: 0.0,
            light2_position: l2.position.to_array(),
            _pad4: 0.0,
            ambient_colour: shading.ambient.to_array(),
            specular_power: shading.specular_power,
            camera_position: camera_position.to_array(),
            frame_time,
            viewport_width: viewport.0 as f32,
            viewport_height: viewport.1 as f32,
            _pad5: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    #[test]
    fn test_uniforms_size() {
        assert_eq!(std::mem::size_of::<PerFrameConstants>(), 368);
    }

    #[test]
    fn test_marker_scale() {
        let light = PointLight::new(Vec3::ONE, 10.0, Vec3::ZERO);
        assert!((light.marker_scale() - 10f32.powf(0.7)).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_sets_position_then_advances() {
        let mut lights = SceneLights::default();
        lights.update(1.0);
        // Angle 0 at the first update.
        assert!(lights.lights[0].position.abs_diff_eq(Vec3::new(40.0, 10.0, 20.0), 1e-4));
        assert!((lights.orbit.angle - (TAU - 0.7)).abs() < 1e-5);

        lights.update(0.0);
        let expected = Vec3::new(20.0 + (-0.7f32).cos() * 20.0, 10.0, 20.0 + (-0.7f32).sin() * 20.0);
        assert!(lights.lights[0].position.abs_diff_eq(expected, 1e-3));
    }

    #[test]
    fn test_toggle_orbit_freezes_angle() {
        let mut lights = SceneLights::default();
        assert!(!lights.toggle_orbit());
        lights.update(5.0);
        lights.update(5.0);
        assert_eq!(lights.orbit.angle, 0.0);
        assert!(lights.toggle_orbit());
    }

    #[test]
    fn test_second_light_is_static() {
        let mut lights = SceneLights::default();
        let before = lights.lights[1];
        lights.update(3.0);
        assert_eq!(lights.lights[1], before);
    }

    #[test]
    fn test_frame_constants_premultiply_colour() {
        let camera = Camera::default();
        let lights = SceneLights::default();
        let constants = PerFrameConstants::new(
            &camera.matrices(),
            camera.position(),
            &lights,
            &SceneShading::default(),
            0.016,
            (1280, 720),
        );
        assert_eq!(constants.light1_colour, [8.0, 8.0, 10.0]);
        assert_eq!(constants.light2_colour, [40.0, 32.0, 8.0]);
        assert_eq!(constants.specular_power, 256.0);
        assert_eq!(constants.viewport_width, 1280.0);
        assert_eq!(constants.camera_matrix, camera.world_matrix().to_cols_array_2d());
    }
}
