//! World-placed quads that frame masked post-process passes.
//!
//! A window is a canonical square pushed through a placement matrix and the
//! camera's view-projection. The resulting homogeneous corners go to the GPU
//! untouched; perspective division happens in the rasterizer.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::post_processing::PostProcess;

/// Canonical square corners in strip order: TL, TR, BL, BR.
pub const UNIT_SQUARE: [Vec3; 4] = [
    Vec3::new(-1.0, 1.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(-1.0, -1.0, 0.0),
    Vec3::new(1.0, -1.0, 0.0),
];

/// Uniform scale applied to every fixed window.
pub const WINDOW_SCALE: f32 = 5.0;

/// A named quad in the scene with the effect it frames.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonWindow {
    pub name: &'static str,
    pub corners: [Vec3; 4],
    pub placement: Mat4,
    pub effect: PostProcess,
}

impl PolygonWindow {
    pub fn new(name: &'static str, effect: PostProcess, placement: Mat4) -> Self {
        Self {
            name,
            corners: UNIT_SQUARE,
            placement,
            effect,
        }
    }

    /// Clip-space corners of this window as seen through `view_projection`.
    pub fn project(&self, view_projection: &Mat4) -> [Vec4; 4] {
        project_polygon(&self.corners, &self.placement, view_projection)
    }
}

/// Scale, then yaw about Y, then translate.
pub fn placement_matrix(scale: f32, yaw: f32, translation: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(scale), Quat::from_rotation_y(yaw), translation)
}

/// Transform each corner by `placement` and then by `view_projection`.
///
/// Results are homogeneous; `w` is not divided out.
pub fn project_polygon(corners: &[Vec3; 4], placement: &Mat4, view_projection: &Mat4) -> [Vec4; 4] {
    let to_clip = *view_projection * *placement;
    corners.map(|c| to_clip * c.extend(1.0))
}

/// The five windows placed around the scene, in draw order.
/// Screen-space centre and radius of a projected quad, in scene UV (top-left
/// origin). Corners behind the camera are ignored; if none are in front the
/// result covers the whole screen.
pub fn screen_footprint(polygon: &[Vec4; 4]) -> (Vec2, f32) {
    let visible: Vec<Vec2> = polygon
        .iter()
        .filter(|p| p.w > MIN_VISIBLE_W)
        .map(|p| {
            let ndc = p.truncate().truncate() / p.w;
            Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5)
        })
        .collect();
    if visible.is_empty() {
        return (Vec2::splat(0.5), 0.5);
    }

    let centre = visible.iter().copied().sum::<Vec2>() / visible.len() as f32;
    let radius = visible
        .iter()
        .map(|uv| uv.distance(centre))
        .fold(0.0f32, f32::max);
    (centre, radius.max(MIN_FOOTPRINT_RADIUS))
}

const MIN_VISIBLE_W: f32 = 1e-4;
const MIN_FOOTPRINT_RADIUS: f32 = 1e-4;

pub fn fixed_windows() -> Vec<PolygonWindow> {
    use std::f32::consts::FRAC_PI_2;

    let side = |name, effect, z| {
        PolygonWindow::new(
            name,
            effect,
            placement_matrix(WINDOW_SCALE, FRAC_PI_2, Vec3::new(-60.0, 10.0, z)),
        )
    };

    vec![
        PolygonWindow::new(
            "square",
            PostProcess::HlsGradient,
            placement_matrix(WINDOW_SCALE, 0.0, Vec3::new(0.0, 10.0, -50.0)),
        ),
        side("spade", PostProcess::UnderWater, 18.0),
        side("diamond", PostProcess::Retro, 5.0),
        side("club", PostProcess::Spiral, -6.0),
        side("heart", PostProcess::Distort, -19.0),
    ]
}
