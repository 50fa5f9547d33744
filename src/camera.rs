//! Camera pose, lens and matrix derivation.
//!
//! The camera is treated like any other object in the scene: it has a
//! "world" matrix built from its Euler rotation and position, and the view
//! matrix used by the shaders is the affine inverse of that world matrix.
//!
//! Matrices are column-major `glam::Mat4` values applied as `M * v`. Their
//! memory layout is identical to the row-vector (`v * M`) matrices the
//! shaders consume, so they can be uploaded without any transposition.
//!
//! The projection is left-handed: view-space +Z points into the screen and
//! depth is mapped to `[0, 1]` between the near and far clip planes.

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Turn rate for the rotation controls, in radians per second.
pub const ROTATION_SPEED: f32 = 1.5;

/// Movement rate for the translation controls, in units per second.
pub const MOVEMENT_SPEED: f32 = 50.0;

// ============================================================================
// Controls
// ============================================================================

/// Snapshot of the held camera controls for one update step.
///
/// The input backend is responsible for filling this in; the camera only
/// integrates it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraControls {
    pub turn_up: bool,
    pub turn_down: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
}

impl CameraControls {
    /// No controls held.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether any control is held this step.
    pub fn any(&self) -> bool {
        self.turn_up
            || self.turn_down
            || self.turn_left
            || self.turn_right
            || self.move_forward
            || self.move_backward
            || self.move_left
            || self.move_right
    }
}

// ============================================================================
// Camera
// ============================================================================

/// All four camera matrices derived from one pose/lens snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraMatrices {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

/// A perspective camera positioned with Euler angles.
///
/// Nothing derived is cached: every matrix accessor recomputes from the
/// current pose and lens.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    position: Vec3,
    /// Euler angles in radians (pitch about X, yaw about Y, roll about Z).
    rotation: Vec3,
    /// Horizontal field of view in radians, measured left to right.
    fov_x: f32,
    aspect_ratio: f32,
    near_clip: f32,
    far_clip: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            fov_x: std::f32::consts::FRAC_PI_3,
            aspect_ratio: 4.0 / 3.0,
            near_clip: 0.1,
            far_clip: 10_000.0,
        }
    }
}

impl Camera {
    /// Create a camera at the given pose with the default lens.
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    /// Replace the lens settings.
    pub fn with_lens(mut self, fov_x: f32, aspect_ratio: f32, near_clip: f32, far_clip: f32) -> Self {
        self.fov_x = fov_x;
        self.aspect_ratio = aspect_ratio;
        self.near_clip = near_clip;
        self.far_clip = far_clip;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    pub fn fov(&self) -> f32 {
        self.fov_x
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    pub fn set_fov(&mut self, fov_x: f32) {
        self.fov_x = fov_x;
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    pub fn set_near_clip(&mut self, near_clip: f32) {
        self.near_clip = near_clip;
    }

    pub fn set_far_clip(&mut self, far_clip: f32) {
        self.far_clip = far_clip;
    }

    /// Integrate the held controls over `frame_time` seconds.
    ///
    /// Pitch and yaw change at [`ROTATION_SPEED`]. Translation happens at
    /// [`MOVEMENT_SPEED`] along the camera's local axes, taken from the world
    /// matrix as it stood at the start of this step: forward/back along the
    /// local Z axis, left/right along the local X axis.
    pub fn control(&mut self, frame_time: f32, controls: &CameraControls) {
        let world = self.world_matrix();
        let local_x = world.x_axis.truncate();
        let local_z = world.z_axis.truncate();

        let turn = ROTATION_SPEED * frame_time;
        if controls.turn_down {
            self.rotation.x += turn;
        }
        if controls.turn_up {
            self.rotation.x -= turn;
        }
        if controls.turn_right {
            self.rotation.y += turn;
        }
        if controls.turn_left {
            self.rotation.y -= turn;
        }

        let step = MOVEMENT_SPEED * frame_time;
        if controls.move_right {
            self.position += local_x * step;
        }
        if controls.move_left {
            self.position -= local_x * step;
        }
        if controls.move_forward {
            self.position += local_z * step;
        }
        if controls.move_backward {
            self.position -= local_z * step;
        }
    }

    /// Rotation about Z, then X, then Y, then translation.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_z(self.rotation.z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        inverse_affine(&self.world_matrix())
    }

    /// Left-handed perspective projection with `[0, 1]` depth.
    ///
    /// The vertical scale is the horizontal scale multiplied by the aspect
    /// ratio, and clip-space W carries view-space Z.
    pub fn projection_matrix(&self) -> Mat4 {
        let scale_x = 1.0 / (self.fov_x * 0.5).tan();
        let scale_y = self.aspect_ratio * scale_x;
        let scale_za = self.far_clip / (self.far_clip - self.near_clip);
        let scale_zb = -self.near_clip * scale_za;

        Mat4::from_cols(
            Vec4::new(scale_x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale_y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale_za, 1.0),
            Vec4::new(0.0, 0.0, scale_zb, 0.0),
        )
    }

    /// View followed by projection.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Derive every matrix in one go.
    pub fn matrices(&self) -> CameraMatrices {
        let world = self.world_matrix();
        let view = inverse_affine(&world);
        let projection = self.projection_matrix();
        CameraMatrices {
            world,
            view,
            projection,
            view_projection: projection * view,
        }
    }
}

/// Invert a matrix made only of rotation and translation.
///
/// The rotation block is transposed and the translation is negated and
/// rotated by it; no general 4x4 inversion is needed.
pub fn inverse_affine(m: &Mat4) -> Mat4 {
    let rotation = Mat3::from_mat4(*m).transpose();
    let translation = -(rotation * m.w_axis.truncate());

    Mat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

// ============================================================================
// Tests
// ============================================================================
