//! Frame orchestration.
//!
//! [`PostProcessPipeline`] owns every piece of mutable per-frame state: the
//! camera, lights, effect stack, ping-pong roles and effect animation. Each
//! frame runs the same fixed sequence:
//!
//! 1. Scene pass into the primary surface.
//! 2. Seed: copy primary into secondary, then swap.
//! 3. Masked passes for each fixed window, all onto the same target.
//! 4. Swap, then each stacked effect in order, swapping after each.
//! 5. Copy the last result to the presentation surface and present.

use glam::Vec4;

use crate::backend::{BackendError, PassShape, PassTarget, PostProcessPass, RenderBackend, SceneFrame};
use crate::camera::{Camera, CameraControls};
use crate::config::{ConfigError, PipelineConfig};
use crate::frame_stats::{FrameRateMonitor, FrameRateSample};
use crate::input::Command;
use crate::lighting::{PerFrameConstants, SceneLights, SceneShading};
use crate::polygon::{fixed_windows, PolygonWindow};
use crate::post_params::{sanitize_frame_time, EffectContext, PostProcessState};
use crate::post_processing::{EffectStack, PostProcess};
use crate::render_targets::RenderTargetPool;

/// Summary of one rendered frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// Zero-based index of the frame.
    pub frame: u64,
    pub scene_passes: usize,
    pub post_process_passes: usize,
    pub vsync: bool,
    /// Present when the frame-rate window closed on this frame.
    pub frame_rate: Option<FrameRateSample>,
}

impl FrameStats {
    pub fn total_passes(&self) -> usize {
        self.scene_passes + self.post_process_passes
    }
}

pub struct PostProcessPipeline<B: RenderBackend> {
    backend: B,
    camera: Camera,
    lights: SceneLights,
    shading: SceneShading,
    windows: Vec<PolygonWindow>,
    stack: EffectStack,
    targets: RenderTargetPool<B::Surface>,
    params: PostProcessState,
    frame_lock: bool,
    frame_count: u64,
    monitor: FrameRateMonitor,
}

impl<B: RenderBackend> PostProcessPipeline<B> {
    /// Build the pipeline around `backend`. Fails if `config` does not validate.
    pub fn new(backend: B, config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let [primary, secondary] = backend.offscreen_surfaces();
        let (width, height) = backend.viewport_size();

        let mut camera = config.build_camera();
        if width > 0 && height > 0 {
            camera.set_aspect_ratio(width as f32 / height as f32);
        }

        let stack: EffectStack = config.initial_effects.iter().copied().collect();
        log::info!(
            "Post-process pipeline ready: {}x{}, {} stacked effect(s), frame lock {}",
            width,
            height,
            stack.len(),
            if config.frame_lock { "on" } else { "off" }
        );

        Ok(Self {
            backend,
            camera,
            lights: config.build_lights(),
            shading: config.build_shading(),
            windows: fixed_windows(),
            stack,
            targets: RenderTargetPool::new(primary, secondary),
            params: PostProcessState::new(config.effects.clone(), config.seed),
            frame_lock: config.frame_lock,
            frame_count: 0,
            monitor: FrameRateMonitor::default(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn lights(&self) -> &SceneLights {
        &self.lights
    }

    pub fn effect_stack(&self) -> &EffectStack {
        &self.stack
    }

    pub fn effect_stack_mut(&mut self) -> &mut EffectStack {
        &mut self.stack
    }

    pub fn windows(&self) -> &[PolygonWindow] {
        &self.windows
    }

    pub fn params(&self) -> &PostProcessState {
        &self.params
    }

    pub fn frame_lock(&self) -> bool {
        self.frame_lock
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // ========================================================================
    // Input and simulation
    // ========================================================================

    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::AppendEffect(effect) => {
                if self.stack.append(effect) {
                    log::info!("Stacked effect '{}' ({} total)", effect, self.stack.len());
                } else {
                    log::warn!("Ignoring request to stack effect '{}'", effect);
                }
            }
            Command::ClearEffects => {
                self.stack.clear();
                log::info!("Cleared effect stack");
            }
            Command::ToggleFrameLock => {
                self.frame_lock = !self.frame_lock;
                log::info!("Frame lock {}", if self.frame_lock { "on" } else { "off" });
            }
            Command::ToggleLightOrbit => {
                let enabled = self.lights.toggle_orbit();
                log::info!("Light orbit {}", if enabled { "on" } else { "off" });
            }
        }
    }

    /// Advance the camera and lights by `frame_time` seconds.
    pub fn update(&mut self, frame_time: f32, controls: &CameraControls) {
        let dt = sanitize_frame_time(frame_time);
        self.lights.update(dt);
        self.camera.control(dt, controls);
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Issue every pass for one frame and present it.
    ///
    /// `frame_time` drives the effect animation and the frame-rate monitor.
    pub fn render_frame(&mut self, frame_time: f32) -> Result<FrameStats, BackendError> {
        let (width, height) = self.backend.viewport_size();
        let ctx = EffectContext::new(frame_time, width, height);
        let mut post_process_passes = 0;

        // Scene
        let matrices = self.camera.matrices();
        let scene = SceneFrame {
            target: self.targets.primary(),
            constants: PerFrameConstants::new(
                &matrices,
                self.camera.position(),
                &self.lights,
                &self.shading,
                ctx.frame_time,
                (width, height),
            ),
            markers: self.lights.markers(),
            clear_colour: self.shading.background,
        };
        self.backend.render_scene(&scene)?;

        // Seed the ping-pong pair with the scene
        self.targets.seed();
        let target = PassTarget::Surface(self.targets.write_target());
        self.full_screen(PostProcess::None, target, &ctx)?;
        post_process_passes += 1;
        self.targets.swap();

        // Masked windows, all accumulated onto the same target
        let projected: Vec<(PostProcess, [Vec4; 4])> = self
            .windows
            .iter()
            .map(|window| (window.effect, window.project(&matrices.view_projection)))
            .collect();
        for (effect, polygon) in &projected {
            self.masked(*effect, polygon, &ctx)?;
            post_process_passes += 1;
        }
        self.targets.swap();

        // Stacked full-screen effects
        let stack = self.stack.clone();
        for effect in &stack {
            let target = PassTarget::Surface(self.targets.write_target());
            self.full_screen(effect, target, &ctx)?;
            post_process_passes += 1;
            self.targets.swap();
        }

        // Final copy to the presentation surface
        self.full_screen(PostProcess::None, PassTarget::Presentation, &ctx)?;
        post_process_passes += 1;

        self.backend.present(self.frame_lock)?;

        let stats = FrameStats {
            frame: self.frame_count,
            scene_passes: 1,
            post_process_passes,
            vsync: self.frame_lock,
            frame_rate: self.monitor.record(ctx.frame_time),
        };
        self.frame_count += 1;
        Ok(stats)
    }

    /// Update then render, as one interactive frame.
    pub fn run_frame(&mut self, frame_time: f32, controls: &CameraControls) -> Result<FrameStats, BackendError> {
        let stats = self.render_frame(frame_time)?;
        self.update(frame_time, controls);
        Ok(stats)
    }

    fn full_screen(
        &mut self,
        effect: PostProcess,
        target: PassTarget<B::Surface>,
        ctx: &EffectContext,
    ) -> Result<(), BackendError> {
        let pass = PostProcessPass {
            effect,
            shape: PassShape::FullScreen,
            target,
            source: self.targets.read_source(),
            constants: *self.params.prepare(effect, ctx),
        };
        log::debug!("Full-screen pass '{}': {:?} <- {:?}", effect, pass.target, pass.source);
        self.backend.draw_post_process(&pass)
    }

    fn masked(&mut self, effect: PostProcess, polygon: &[Vec4; 4], ctx: &EffectContext) -> Result<(), BackendError> {
        let pass = PostProcessPass {
            effect,
            shape: PassShape::Polygon,
            target: PassTarget::Surface(self.targets.write_target()),
            source: self.targets.read_source(),
            constants: *self.params.prepare_masked(effect, ctx, polygon),
        };
        log::debug!("Masked pass '{}': {:?} <- {:?}", effect, pass.target, pass.source);
        self.backend.draw_post_process(&pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{RecordingBackend, Submission};
    use glam::Vec3;

    fn pipeline_with(effects: &[PostProcess]) -> PostProcessPipeline<RecordingBackend> {
        let config = PipelineConfig {
            initial_effects: effects.to_vec(),
            ..PipelineConfig::default()
        };
        PostProcessPipeline::new(RecordingBackend::new(800, 600), &config).unwrap()
    }

    fn post(effect: PostProcess, shape: PassShape, target: PassTarget<u8>, source: u8) -> (PostProcess, PassShape, PassTarget<u8>, u8) {
        (effect, shape, target, source)
    }

    /// Post-process draws without their constants.
    fn draws(backend: &RecordingBackend) -> Vec<(PostProcess, PassShape, PassTarget<u8>, u8)> {
        backend
            .submissions
            .iter()
            .filter_map(|s| match s {
                Submission::PostProcess {
                    effect,
                    shape,
                    target,
                    source,
                    ..
                } => Some((*effect, *shape, *target, *source)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_frame_pass_sequence() {
        let mut pipeline = pipeline_with(&[PostProcess::Tint, PostProcess::GreyNoise]);
        let stats = pipeline.render_frame(1.0 / 60.0).unwrap();
        assert_eq!(stats.total_passes(), 10);

        let backend = pipeline.backend();
        assert_eq!(backend.draw_count(), 10);
        assert_eq!(backend.submissions.first(), Some(&Submission::Scene { target: 0 }));
        assert_eq!(backend.submissions.last(), Some(&Submission::Present { vsync: true }));

        use PassShape::{FullScreen, Polygon};
        use PassTarget::{Presentation, Surface};
        assert_eq!(
            draws(backend),
            vec![
                post(PostProcess::None, FullScreen, Surface(1), 0),
                post(PostProcess::HlsGradient, Polygon, Surface(0), 1),
                post(PostProcess::UnderWater, Polygon, Surface(0), 1),
                post(PostProcess::Retro, Polygon, Surface(0), 1),
                post(PostProcess::Spiral, Polygon, Surface(0), 1),
                post(PostProcess::Distort, Polygon, Surface(0), 1),
                post(PostProcess::Tint, FullScreen, Surface(1), 0),
                post(PostProcess::GreyNoise, FullScreen, Surface(0), 1),
                post(PostProcess::None, FullScreen, Presentation, 0),
            ]
        );
    }

    #[test]
    fn test_empty_stack_presents_masked_output() {
        let mut pipeline = pipeline_with(&[]);
        pipeline.render_frame(0.016).unwrap();

        let draws = draws(pipeline.backend());
        assert_eq!(draws.len(), 7);
        // Masked passes wrote surface 0, so the final copy reads it.
        assert_eq!(draws[5].2, PassTarget::Surface(0));
        assert_eq!(draws[6], post(PostProcess::None, PassShape::FullScreen, PassTarget::Presentation, 0));
    }

    #[test]
    fn test_every_pass_reads_a_different_surface_than_it_writes() {
        let mut pipeline = pipeline_with(&[PostProcess::Bloom, PostProcess::Retro, PostProcess::Tint]);
        pipeline.render_frame(0.016).unwrap();
        pipeline.render_frame(0.016).unwrap();

        for (_, _, target, source) in draws(pipeline.backend()) {
            assert_ne!(target, PassTarget::Surface(source));
        }
    }

    #[test]
    fn test_frames_repeat_after_odd_stack() {
        let mut pipeline = pipeline_with(&[PostProcess::Tint]);
        pipeline.render_frame(0.016).unwrap();
        let first = draws(pipeline.backend());
        pipeline.backend_mut().submissions.clear();

        pipeline.render_frame(0.016).unwrap();
        assert_eq!(draws(pipeline.backend()), first);
        assert_eq!(pipeline.frame_count(), 2);
    }

    #[test]
    fn test_stack_persists_across_frames() {
        let mut pipeline = pipeline_with(&[]);
        pipeline.apply_command(Command::AppendEffect(PostProcess::Retro));
        pipeline.render_frame(0.016).unwrap();
        pipeline.render_frame(0.016).unwrap();
        assert_eq!(pipeline.effect_stack().len(), 1);
        assert_eq!(pipeline.backend().draw_count(), 2 * 9);
    }

    #[test]
    fn test_commands() {
        let mut pipeline = pipeline_with(&[]);
        pipeline.apply_command(Command::AppendEffect(PostProcess::None));
        assert!(pipeline.effect_stack().is_empty());

        pipeline.apply_command(Command::AppendEffect(PostProcess::Bloom));
        pipeline.apply_command(Command::AppendEffect(PostProcess::HlsGradient));
        assert_eq!(pipeline.effect_stack().len(), 2);
        pipeline.apply_command(Command::ClearEffects);
        assert!(pipeline.effect_stack().is_empty());

        pipeline.apply_command(Command::ToggleFrameLock);
        let stats = pipeline.render_frame(0.016).unwrap();
        assert!(!stats.vsync);
        assert_eq!(pipeline.backend().submissions.last(), Some(&Submission::Present { vsync: false }));

        assert!(pipeline.lights().orbit.enabled);
        pipeline.apply_command(Command::ToggleLightOrbit);
        assert!(!pipeline.lights().orbit.enabled);
    }

    #[test]
    fn test_backend_error_stops_frame() {
        let mut pipeline = pipeline_with(&[PostProcess::Tint]);
        pipeline.backend_mut().fail_post_process_at = Some(2);

        let err = pipeline.render_frame(0.016).unwrap_err();
        assert!(matches!(err, BackendError::MissingPipeline { effect: PostProcess::UnderWater, .. }));
        let backend = pipeline.backend();
        assert_eq!(backend.post_process_draws().len(), 2);
        assert!(!backend.submissions.iter().any(|s| matches!(s, Submission::Present { .. })));
        assert_eq!(pipeline.frame_count(), 0);
    }

    #[test]
    fn test_masked_passes_carry_projected_windows() {
        let mut pipeline = pipeline_with(&[]);
        let view_projection = pipeline.camera().view_projection_matrix();
        pipeline.render_frame(0.016).unwrap();

        let masked: Vec<_> = pipeline
            .backend()
            .submissions
            .iter()
            .filter_map(|s| match s {
                Submission::PostProcess {
                    shape: PassShape::Polygon,
                    constants,
                    ..
                } => Some(constants.polygon_points),
                _ => None,
            })
            .collect();
        assert_eq!(masked.len(), 5);

        for (points, window) in masked.iter().zip(pipeline.windows()) {
            let expected = window.project(&view_projection).map(|p| p.to_array());
            assert_eq!(*points, expected);
        }
    }

    #[test]
    fn test_stacked_burn_animates_per_frame() {
        let mut pipeline = pipeline_with(&[PostProcess::Burn]);
        pipeline.render_frame(1.0).unwrap();
        pipeline.render_frame(1.0).unwrap();
        assert!((pipeline.params().burn_height() - 0.4).abs() < 1e-5);

        let last_burn = pipeline
            .backend()
            .submissions
            .iter()
            .rev()
            .find_map(|s| match s {
                Submission::PostProcess {
                    effect: PostProcess::Burn,
                    constants,
                    ..
                } => Some(constants.burn_height),
                _ => None,
            })
            .unwrap();
        assert!((last_burn - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_full_screen_passes_cover_whole_screen() {
        let mut pipeline = pipeline_with(&[PostProcess::Tint]);
        pipeline.render_frame(0.016).unwrap();
        for s in &pipeline.backend().submissions {
            if let Submission::PostProcess { constants, .. } = s {
                assert_eq!(constants.area_top_left, [0.0, 0.0]);
                assert_eq!(constants.area_size, [1.0, 1.0]);
                assert_eq!(constants.area_depth, 0.0);
            }
        }
    }

    #[test]
    fn test_aspect_follows_backend_viewport() {
        let pipeline = pipeline_with(&[]);
        assert!((pipeline.camera().aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_update_moves_camera_and_orbits_light() {
        let mut pipeline = pipeline_with(&[]);
        let start = pipeline.camera().position();
        let controls = CameraControls {
            move_forward: true,
            ..CameraControls::none()
        };
        pipeline.update(0.5, &controls);
        let moved = pipeline.camera().position() - start;
        assert!((moved.length() - 25.0).abs() < 1e-3);
        assert!(pipeline.lights().lights[0].position.abs_diff_eq(Vec3::new(40.0, 10.0, 20.0), 1e-4));

        // Bad frame times are ignored.
        let before = pipeline.camera().position();
        pipeline.update(f32::NAN, &controls);
        assert_eq!(pipeline.camera().position(), before);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            camera: crate::config::CameraConfig {
                near_clip: 0.0,
                ..Default::default()
            },
            ..PipelineConfig::default()
        };
        let result = PostProcessPipeline::new(RecordingBackend::new(800, 600), &config);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = PipelineConfig {
            camera: crate::config::CameraConfig {
                near_clip: 5.0,
                far_clip: 5.0,
                ..Default::default()
            },
            ..PipelineConfig::default()
        };
        let result = PostProcessPipeline::new(RecordingBackend::new(800, 600), &config);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
