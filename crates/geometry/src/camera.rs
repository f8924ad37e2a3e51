use glam::{Mat4, Vec3, Vec4};
use portalspace_common::Transform;
use serde::{Deserialize, Serialize};

/// Perspective camera: world pose, lens parameters and an optional projection
/// override.
///
/// The camera looks down its local -Z axis. Portal virtual cameras replace the
/// projection with an oblique one each pass; `reset_projection` returns to the
/// lens-derived matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub transform: Transform,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection_override: Option<Mat4>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            projection_override: None,
        }
    }
}

impl Camera {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Direction the camera looks in, world space.
    pub fn view_direction(&self) -> Vec3 {
        self.transform.rotation * Vec3::NEG_Z
    }

    /// Copy fov, aspect and clip distances from another camera.
    pub fn copy_lens(&mut self, other: &Camera) {
        self.fov = other.fov;
        self.aspect = other.aspect;
        self.near = other.near;
        self.far = other.far;
    }

    /// World-to-camera matrix. Scale on the camera transform is ignored.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.transform.rotation, self.transform.position).inverse()
    }

    /// Projection derived from the lens parameters alone.
    pub fn base_projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_override.unwrap_or_else(|| self.base_projection())
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection_override = Some(projection);
    }

    pub fn reset_projection(&mut self) {
        self.projection_override = None;
    }

    pub fn has_projection_override(&self) -> bool {
        self.projection_override.is_some()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a world point into viewport space.
    ///
    /// `x` and `y` are in `[0, 1]` across the visible area, `z` is the depth
    /// along the view direction (positive in front of the camera).
    pub fn world_to_viewport(&self, world: Vec3) -> Vec3 {
        let view = self.view_matrix().transform_point3(world);
        let clip = self.projection_matrix() * Vec4::new(view.x, view.y, view.z, 1.0);
        let w = if clip.w.abs() < f32::EPSILON {
            f32::EPSILON.copysign(clip.w)
        } else {
            clip.w
        };
        Vec3::new(clip.x / w * 0.5 + 0.5, clip.y / w * 0.5 + 0.5, -view.z)
    }

    /// Half width and half height of the near clip rectangle.
    pub fn near_plane_half_extents(&self) -> (f32, f32) {
        let half_height = self.near * (self.fov * 0.5).tan();
        (half_height * self.aspect, half_height)
    }

    /// Distance from the eye to a corner of the near clip rectangle.
    pub fn near_plane_corner_distance(&self) -> f32 {
        let (half_width, half_height) = self.near_plane_half_extents();
        Vec3::new(half_width, half_height, self.near).length()
    }
}
