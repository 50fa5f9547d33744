//! Post-processing parameter block and the animation state behind it.
//!
//! One `PostProcessConstants` block is shared by every effect. Before each
//! draw the effect's populate function (see `post_processing`) writes the
//! fields it uses; the block is then uploaded as-is.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::polygon::screen_footprint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::post_processing::PostProcess;

// ============================================================================
// GPU Uniforms
// ============================================================================

/// GPU-ready post-processing uniforms.
///
/// Laid out to match the `PostParams` struct in `shader_post.wgsl`.
/// Total size: 144 bytes (16-byte aligned).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PostProcessConstants {
    /// Clip-space corners of the masking quad (TL, TR, BL, BR).
    pub polygon_points: [[f32; 4]; 4], // 64 bytes

    /// Screen region in normalized coordinates.
    pub area_top_left: [f32; 2], // 8 bytes
    pub area_size: [f32; 2],     // 8 bytes
    pub area_depth: f32,         // 4 bytes

    pub burn_height: f32,   // 4 bytes
    pub distort_level: f32, // 4 bytes
    pub spiral_level: f32,  // 4 bytes

    pub tint_colour: [f32; 3], // 12 bytes
    pub hue_shift: f32,        // 4 bytes

    /// Viewport size divided by the grain size.
    pub noise_scale: [f32; 2], // 8 bytes
    /// Random offset in [0, 1], re-rolled every grey-noise pass.
    pub noise_offset: [f32; 2], // 8 bytes

    pub underwater_level: f32, // 4 bytes

    /// Spiral footprint in scene UV: radius, then centre.
    pub spiral_radius: f32,       // 4 bytes
    pub spiral_centre: [f32; 2], // 8 bytes
} // Total: 144 bytes

impl Default for PostProcessConstants {
    fn default() -> Self {
        Self {
            polygon_points: [[0.0; 4]; 4],
            area_top_left: [0.0, 0.0],
            area_size: [1.0, 1.0],
            area_depth: 0.0,
            burn_height: 0.0,
            distort_level: 0.0,
            spiral_level: 0.0,
            tint_colour: [1.0, 1.0, 1.0],
            hue_shift: 0.0,
            noise_scale: [1.0, 1.0],
            noise_offset: [0.0, 0.0],
            underwater_level: 0.0,
            spiral_radius: 0.5,
            spiral_centre: [0.5, 0.5],
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Tunable rates and constants for the animated effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub tint_colour: [f32; 3],
    /// Noise grain size in pixels.
    pub grain_size: f32,
    /// Burn height advance per second (wraps at 1.0).
    pub burn_speed: f32,
    pub distortion_level: f32,
    /// Spiral phase advance in radians per second.
    pub spiral_speed: f32,
    /// Hue shift advance per second, in full hue turns.
    pub hue_speed: f32,
    pub underwater_speed: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            tint_colour: [1.0, 0.0, 0.0],
            grain_size: 50.0,
            burn_speed: 0.2,
            distortion_level: 0.03,
            spiral_speed: 1.0,
            hue_speed: 0.5,
            underwater_speed: 0.5,
        }
    }
}

/// Clamp a frame time to something the accumulators can safely integrate.
///
/// Non-finite and negative values become zero.
pub fn sanitize_frame_time(frame_time: f32) -> f32 {
    if frame_time.is_finite() && frame_time > 0.0 {
        frame_time
    } else {
        0.0
    }
}

/// Per-pass inputs to the populate functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectContext {
    /// Sanitized frame time in seconds.
    pub frame_time: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl EffectContext {
    pub fn new(frame_time: f32, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            frame_time: sanitize_frame_time(frame_time),
            viewport_width: viewport_width as f32,
            viewport_height: viewport_height as f32,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Owns the parameter block plus every accumulator that animates it.
///
/// Accumulators advance only when their effect is applied, so an effect
/// that appears twice in a frame animates twice as fast.
#[derive(Clone, Debug)]
pub struct PostProcessState {
    constants: PostProcessConstants,
    settings: EffectSettings,
    spiral_phase: f32,
    hue_phase: f32,
    underwater_phase: f32,
    rng: StdRng,
}

impl PostProcessState {
    pub fn new(settings: EffectSettings, seed: u64) -> Self {
        Self {
            constants: PostProcessConstants::default(),
            settings,
            spiral_phase: 0.0,
            hue_phase: 0.0,
            underwater_phase: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn constants(&self) -> &PostProcessConstants {
        &self.constants
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn burn_height(&self) -> f32 {
        self.constants.burn_height
    }

    pub fn spiral_phase(&self) -> f32 {
        self.spiral_phase
    }

    pub fn hue_phase(&self) -> f32 {
        self.hue_phase
    }

    pub fn underwater_phase(&self) -> f32 {
        self.underwater_phase
    }

    /// Rewind every accumulator to zero.
    pub fn reset_animation(&mut self) {
        self.constants.burn_height = 0.0;
        self.spiral_phase = 0.0;
        self.hue_phase = 0.0;
        self.underwater_phase = 0.0;
    }

    /// Fill the block for a full-screen pass of `effect`.
    pub fn prepare(&mut self, effect: PostProcess, ctx: &EffectContext) -> &PostProcessConstants {
        self.reset_area();
        (effect.entry().populate)(self, ctx);
        &self.constants
    }

    /// Fill the block for a pass masked by the given clip-space quad.
    pub fn prepare_masked(
        &mut self,
        effect: PostProcess,
        ctx: &EffectContext,
        polygon: &[Vec4; 4],
    ) -> &PostProcessConstants {
        self.reset_area();
        for (dst, point) in self.constants.polygon_points.iter_mut().zip(polygon) {
            *dst = point.to_array();
        }
        let (centre, radius) = screen_footprint(polygon);
        self.constants.spiral_centre = centre.to_array();
        self.constants.spiral_radius = radius;
        (effect.entry().populate)(self, ctx);
        &self.constants
    }

    fn reset_area(&mut self) {
        self.constants.area_top_left = [0.0, 0.0];
        self.constants.area_size = [1.0, 1.0];
        self.constants.area_depth = 0.0;
        self.constants.spiral_centre = [0.5, 0.5];
        self.constants.spiral_radius = 0.5;
    }

    // ========================================================================
    // Populate functions (referenced from the effect table)
    // ========================================================================

    pub(crate) fn populate_nothing(&mut self, _ctx: &EffectContext) {}

    pub(crate) fn populate_tint(&mut self, _ctx: &EffectContext) {
        self.constants.tint_colour = self.settings.tint_colour;
    }

    pub(crate) fn populate_grey_noise(&mut self, ctx: &EffectContext) {
        let grain = self.settings.grain_size.max(1.0);
        self.constants.noise_scale = [ctx.viewport_width / grain, ctx.viewport_height / grain];
        self.constants.noise_offset = [self.rng.random::<f32>(), self.rng.random::<f32>()];
    }

    pub(crate) fn populate_burn(&mut self, ctx: &EffectContext) {
        let next = self.constants.burn_height + self.settings.burn_speed * ctx.frame_time;
        self.constants.burn_height = wrap(next, 1.0);
    }

    pub(crate) fn populate_distort(&mut self, _ctx: &EffectContext) {
        self.constants.distort_level = self.settings.distortion_level;
    }

    pub(crate) fn populate_spiral(&mut self, ctx: &EffectContext) {
        self.constants.spiral_level = (1.0 - self.spiral_phase.cos()) * 4.0;
        self.spiral_phase = wrap(self.spiral_phase + self.settings.spiral_speed * ctx.frame_time, TAU);
    }

    pub(crate) fn populate_hls_gradient(&mut self, ctx: &EffectContext) {
        self.constants.hue_shift = self.hue_phase;
        self.hue_phase = wrap(self.hue_phase + self.settings.hue_speed * ctx.frame_time, 1.0);
    }

    pub(crate) fn populate_under_water(&mut self, ctx: &EffectContext) {
        self.constants.underwater_level = self.underwater_phase;
        self.underwater_phase =
            wrap(self.underwater_phase + self.settings.underwater_speed * ctx.frame_time, 1.0);
    }
}

/// Keep an accumulator inside `[0, period)`; non-finite input resets it.
fn wrap(value: f32, period: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(period);
    // rem_euclid can round up to exactly `period` for tiny negative inputs.
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dt: f32) -> EffectContext {
        EffectContext::new(dt, 800, 600)
    }

    /// Distance on a circle of circumference 1.
    fn circular_distance(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(1.0);
        d.min(1.0 - d)
    }

    #[test]
    fn test_constants_size() {
        assert_eq!(std::mem::size_of::<PostProcessConstants>(), 144);
        assert_eq!(std::mem::size_of::<PostProcessConstants>() % 16, 0);
    }

    #[test]
    fn test_burn_height_wraps() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        let expected = [0.2, 0.4, 0.6, 0.8, 0.0, 0.2];
        for want in expected {
            state.prepare(PostProcess::Burn, &ctx(1.0));
            let got = state.burn_height();
            assert!((0.0..1.0).contains(&got), "burn height {got} out of range");
            assert!(
                circular_distance(got, want) < 1e-4,
                "expected {want}, got {got}"
            );
        }
    }

    #[test]
    fn test_burn_only_advances_when_applied() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        state.prepare(PostProcess::Tint, &ctx(1.0));
        state.prepare(PostProcess::Spiral, &ctx(1.0));
        assert_eq!(state.burn_height(), 0.0);
    }

    #[test]
    fn test_spiral_level_uses_phase_before_advance() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);

        let first = state.prepare(PostProcess::Spiral, &ctx(0.5)).spiral_level;
        assert_eq!(first, 0.0);
        assert!((state.spiral_phase() - 0.5).abs() < 1e-6);

        let second = state.prepare(PostProcess::Spiral, &ctx(0.5)).spiral_level;
        assert!((second - (1.0 - 0.5f32.cos()) * 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_spiral_phase_stays_bounded() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        for _ in 0..1000 {
            state.prepare(PostProcess::Spiral, &ctx(0.37));
        }
        assert!(state.spiral_phase() >= 0.0 && state.spiral_phase() < TAU);
        let level = state.constants().spiral_level;
        assert!((0.0..=8.0).contains(&level));
    }

    #[test]
    fn test_hue_and_underwater_accumulate() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);

        state.prepare(PostProcess::HlsGradient, &ctx(0.5));
        assert_eq!(state.constants().hue_shift, 0.0);
        state.prepare(PostProcess::HlsGradient, &ctx(0.5));
        assert!((state.constants().hue_shift - 0.25).abs() < 1e-6);

        state.prepare(PostProcess::UnderWater, &ctx(1.0));
        state.prepare(PostProcess::UnderWater, &ctx(1.0));
        assert!((state.constants().underwater_level - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_grey_noise_scale_and_offset() {
        let mut state = PostProcessState::new(EffectSettings::default(), 7);
        let first = *state.prepare(PostProcess::GreyNoise, &ctx(0.016));
        assert_eq!(first.noise_scale, [16.0, 12.0]);
        for v in first.noise_offset {
            assert!((0.0..=1.0).contains(&v));
        }

        let second = *state.prepare(PostProcess::GreyNoise, &ctx(0.016));
        assert_ne!(first.noise_offset, second.noise_offset);
    }

    #[test]
    fn test_grey_noise_is_deterministic_per_seed() {
        let mut a = PostProcessState::new(EffectSettings::default(), 42);
        let mut b = PostProcessState::new(EffectSettings::default(), 42);
        for _ in 0..4 {
            let pa = a.prepare(PostProcess::GreyNoise, &ctx(0.1)).noise_offset;
            let pb = b.prepare(PostProcess::GreyNoise, &ctx(0.1)).noise_offset;
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn test_fixed_constants() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        assert_eq!(state.prepare(PostProcess::Tint, &ctx(0.0)).tint_colour, [1.0, 0.0, 0.0]);
        assert!((state.prepare(PostProcess::Distort, &ctx(0.0)).distort_level - 0.03).abs() < 1e-7);
    }

    #[test]
    fn test_bad_frame_times_do_not_poison_accumulators() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        for dt in [f32::NAN, f32::INFINITY, -3.0, f32::NEG_INFINITY] {
            state.prepare(PostProcess::Burn, &ctx(dt));
            state.prepare(PostProcess::Spiral, &ctx(dt));
            state.prepare(PostProcess::HlsGradient, &ctx(dt));
            state.prepare(PostProcess::UnderWater, &ctx(dt));
        }
        assert_eq!(state.burn_height(), 0.0);
        assert_eq!(state.spiral_phase(), 0.0);
        assert_eq!(state.hue_phase(), 0.0);
        assert_eq!(state.underwater_phase(), 0.0);
    }

    #[test]
    fn test_hue_and_underwater_wrap_at_one() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        // 0.5 per second: 0.5, then 1.0 wraps to 0.0, then 0.5 again.
        for _ in 0..3 {
            state.prepare(PostProcess::HlsGradient, &ctx(1.0));
            state.prepare(PostProcess::UnderWater, &ctx(1.0));
        }
        assert!((state.hue_phase() - 0.5).abs() < 1e-6);
        assert!((state.underwater_phase() - 0.5).abs() < 1e-6);

        for _ in 0..1000 {
            state.prepare(PostProcess::HlsGradient, &ctx(7.3));
            state.prepare(PostProcess::UnderWater, &ctx(7.3));
            assert!((0.0..1.0).contains(&state.hue_phase()), "hue {}", state.hue_phase());
            assert!(
                (0.0..1.0).contains(&state.underwater_phase()),
                "underwater {}",
                state.underwater_phase()
            );
        }
        assert!((0.0..1.0).contains(&state.constants().hue_shift));
        assert!((0.0..1.0).contains(&state.constants().underwater_level));
    }

    #[test]
    fn test_masked_prepare_writes_polygon_and_resets_area() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        state.constants.area_size = [0.5, 0.5];

        let quad = [
            Vec4::new(-1.0, 1.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
            Vec4::new(-1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, -1.0, 0.0, 1.0),
        ];
        let constants = *state.prepare_masked(PostProcess::Retro, &ctx(0.0), &quad);
        assert_eq!(constants.polygon_points[3], [1.0, -1.0, 0.0, 1.0]);
        assert_eq!(constants.area_top_left, [0.0, 0.0]);
        assert_eq!(constants.area_size, [1.0, 1.0]);
        assert_eq!(constants.area_depth, 0.0);
    }

    #[test]
    fn test_spiral_footprint_follows_pass_shape() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        // Left half of the screen; the right corners sit behind the camera.
        let quad = [
            Vec4::new(-1.0, 1.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, -1.0),
            Vec4::new(-1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, -1.0, 0.0, -1.0),
        ];
        let masked = *state.prepare_masked(PostProcess::Spiral, &ctx(0.1), &quad);
        assert_eq!(masked.spiral_centre, [0.0, 0.5]);
        assert!((masked.spiral_radius - 0.5).abs() < 1e-6);

        let full = *state.prepare(PostProcess::Spiral, &ctx(0.1));
        assert_eq!(full.spiral_centre, [0.5, 0.5]);
        assert_eq!(full.spiral_radius, 0.5);
    }

    #[test]
    fn test_reset_animation() {
        let mut state = PostProcessState::new(EffectSettings::default(), 1);
        state.prepare(PostProcess::Burn, &ctx(1.0));
        state.prepare(PostProcess::UnderWater, &ctx(1.0));
        state.reset_animation();
        assert_eq!(state.burn_height(), 0.0);
        assert_eq!(state.underwater_phase(), 0.0);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: EffectSettings = serde_json::from_str(r#"{ "grain_size": 25.0 }"#).unwrap();
        assert_eq!(settings.grain_size, 25.0);
        assert_eq!(settings.tint_colour, [1.0, 0.0, 0.0]);
    }
}
