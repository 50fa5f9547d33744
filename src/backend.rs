//! Boundary between the frame orchestration and the GPU.
//!
//! The pipeline describes every pass as plain data and hands it to a
//! [`RenderBackend`]. The wgpu implementation lives in `gpu`; tests use a
//! recording backend.

use std::fmt;

use crate::lighting::{LightMarker, PerFrameConstants};
use crate::post_params::PostProcessConstants;
use crate::post_processing::PostProcess;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no suitable GPU adapter found")]
    AdapterUnavailable,

    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("no pipeline for {shape:?} pass of effect '{effect}'")]
    MissingPipeline { effect: PostProcess, shape: PassShape },

    #[error("unknown surface {0}")]
    UnknownSurface(String),

    #[error("readback failed: {0}")]
    Readback(String),
}

/// Where a pass writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassTarget<S> {
    /// One of the two off-screen surfaces.
    Surface(S),
    /// The surface handed to the display.
    Presentation,
}

/// Geometry covered by a post-process draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassShape {
    /// Quad covering the viewport.
    FullScreen,
    /// Quad built from the four clip-space points in the constants.
    Polygon,
}

/// One post-process draw: a four-vertex strip sampling `source`.
#[derive(Clone, Debug, PartialEq)]
pub struct PostProcessPass<S> {
    pub effect: PostProcess,
    pub shape: PassShape,
    pub target: PassTarget<S>,
    pub source: S,
    pub constants: PostProcessConstants,
}

/// Main scene pass: clear `target` and draw the lit scene plus light markers.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneFrame<S> {
    pub target: S,
    pub constants: PerFrameConstants,
    pub markers: [LightMarker; 2],
    pub clear_colour: [f32; 4],
}

/// GPU collaborator driven by the frame pipeline.
///
/// Calls arrive in frame order from one thread. Each call must be complete
/// with respect to its inputs when it returns: a later call may rewrite
/// shared uniform storage.
pub trait RenderBackend {
    type Surface: Copy + PartialEq + fmt::Debug;

    /// The two off-screen surfaces, primary first. Must be distinct.
    fn offscreen_surfaces(&self) -> [Self::Surface; 2];

    fn viewport_size(&self) -> (u32, u32);

    fn render_scene(&mut self, frame: &SceneFrame<Self::Surface>) -> Result<(), BackendError>;

    fn draw_post_process(&mut self, pass: &PostProcessPass<Self::Surface>) -> Result<(), BackendError>;

    /// Hand the presentation surface to the display.
    fn present(&mut self, vsync: bool) -> Result<(), BackendError>;
}
