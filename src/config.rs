//! Pipeline configuration loaded from JSON.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes. Angles are stored in degrees for readability.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::lighting::{LightOrbit, PointLight, SceneLights, SceneShading};
use crate::post_params::EffectSettings;
use crate::post_processing::PostProcess;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub rotation_degrees: [f32; 3],
    /// Horizontal field of view.
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-100.0, 80.0, -100.0],
            rotation_degrees: [30.0, 40.0, 0.0],
            fov_degrees: 60.0,
            near_clip: 0.1,
            far_clip: 10_000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub colour: [f32; 3],
    pub strength: f32,
    pub position: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            colour: [1.0, 1.0, 1.0],
            strength: 10.0,
            position: [0.0, 10.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub centre: [f32; 3],
    pub radius: f32,
    /// Radians per second.
    pub speed: f32,
    pub enabled: bool,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            centre: [20.0, 10.0, 20.0],
            radius: 20.0,
            speed: 0.7,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    pub ambient: [f32; 3],
    pub specular_power: f32,
    pub background: [f32; 4],
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            ambient: [0.3, 0.3, 0.4],
            specular_power: 256.0,
            background: [0.3, 0.3, 0.4, 1.0],
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub camera: CameraConfig,
    pub lights: [LightConfig; 2],
    pub orbit: OrbitConfig,
    pub shading: ShadingConfig,
    /// Wait for vertical sync when presenting.
    pub frame_lock: bool,
    /// Seed for the grey-noise offsets.
    pub seed: u64,
    pub effects: EffectSettings,
    /// Effects stacked before the first frame.
    pub initial_effects: Vec<PostProcess>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            camera: CameraConfig::default(),
            lights: [
                LightConfig {
                    colour: [0.8, 0.8, 1.0],
                    strength: 10.0,
                    position: [30.0, 10.0, 0.0],
                },
                LightConfig {
                    colour: [1.0, 0.8, 0.2],
                    strength: 40.0,
                    position: [-70.0, 30.0, 100.0],
                },
            ],
            orbit: OrbitConfig::default(),
            shading: ShadingConfig::default(),
            frame_lock: true,
            seed: 0x5eed,
            effects: EffectSettings::default(),
            initial_effects: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "viewport must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let cam = &self.camera;
        if !(cam.near_clip > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "near clip must be positive, got {}",
                cam.near_clip
            )));
        }
        if !(cam.far_clip > cam.near_clip) {
            return Err(ConfigError::Invalid(format!(
                "far clip ({}) must be beyond near clip ({})",
                cam.far_clip, cam.near_clip
            )));
        }
        if !(cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "field of view must be in (0, 180) degrees, got {}",
                cam.fov_degrees
            )));
        }
        if !(self.effects.grain_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "grain size must be positive, got {}",
                self.effects.grain_size
            )));
        }
        Ok(())
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn build_camera(&self) -> Camera {
        let cam = &self.camera;
        let [rx, ry, rz] = cam.rotation_degrees.map(f32::to_radians);
        Camera::new(Vec3::from(cam.position), Vec3::new(rx, ry, rz)).with_lens(
            cam.fov_degrees.to_radians(),
            self.aspect_ratio(),
            cam.near_clip,
            cam.far_clip,
        )
    }

    pub fn build_lights(&self) -> SceneLights {
        SceneLights {
            lights: self.lights.clone().map(|l| {
                PointLight::new(Vec3::from(l.colour), l.strength, Vec3::from(l.position))
            }),
            orbit: LightOrbit {
                centre: Vec3::from(self.orbit.centre),
                radius: self.orbit.radius,
                speed: self.orbit.speed,
                angle: 0.0,
                enabled: self.orbit.enabled,
            },
        }
    }

    pub fn build_shading(&self) -> SceneShading {
        SceneShading {
            ambient: Vec3::from(self.shading.ambient),
            specular_power: self.shading.specular_power,
            background: self.shading.background,
        }
    }
}
