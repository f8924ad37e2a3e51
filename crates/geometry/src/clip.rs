use glam::{Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::plane::Side;

/// Derives a projection whose near plane lies on a portal surface.
///
/// Near the surface the oblique matrix loses most of its depth precision, so
/// when the camera-space distance to the plane is within `near_clip_limit` the
/// unmodified projection is returned instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlaneSolver {
    /// Pushes the clip plane towards the camera so geometry touching the
    /// surface is not cut.
    pub near_clip_offset: f32,
    pub near_clip_limit: f32,
}

/// Result of a [`ClipPlaneSolver::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSolution {
    pub projection: Mat4,
    pub oblique: bool,
    /// Signed `w` term of the camera-space clip plane.
    pub camera_space_distance: f32,
}

impl ClipPlaneSolver {
    pub fn new(near_clip_offset: f32, near_clip_limit: f32) -> Self {
        Self {
            near_clip_offset,
            near_clip_limit,
        }
    }

    /// Solve for `camera` looking through the plane at `plane_origin` with
    /// normal `plane_normal`. `base_projection` supplies fov and clip
    /// distances; the caller assigns the result to the camera.
    pub fn solve(
        &self,
        camera: &Camera,
        base_projection: Mat4,
        plane_origin: Vec3,
        plane_normal: Vec3,
    ) -> ClipSolution {
        let plane = self.camera_space_plane(camera, plane_origin, plane_normal);

        if plane.w.abs() > self.near_clip_limit {
            ClipSolution {
                projection: oblique_projection(base_projection, plane),
                oblique: true,
                camera_space_distance: plane.w,
            }
        } else {
            ClipSolution {
                projection: base_projection,
                oblique: false,
                camera_space_distance: plane.w,
            }
        }
    }

    /// Camera-space plane `(n, d)` with `n` facing away from the camera, so the
    /// eye sits on the negative side.
    pub fn camera_space_plane(&self, camera: &Camera, plane_origin: Vec3, plane_normal: Vec3) -> Vec4 {
        let facing = Side::of(plane_normal.dot(plane_origin - camera.position())).sign();
        let view = camera.view_matrix();

        let cam_space_pos = view.transform_point3(plane_origin);
        let cam_space_normal = view.transform_vector3(plane_normal) * facing;
        let cam_space_dst = -cam_space_pos.dot(cam_space_normal) + self.near_clip_offset;

        cam_space_normal.extend(cam_space_dst)
    }
}

/// Replace the near plane of `projection` with `clip_plane` (camera space).
///
/// Lengyel's oblique frustum for `[0, 1]` clip depth: the third row becomes
/// the clip plane scaled so the far plane still passes through the frustum
/// corner opposite the clip plane.
pub fn oblique_projection(projection: Mat4, clip_plane: Vec4) -> Mat4 {
    let corner = projection.inverse()
        * Vec4::new(clip_plane.x.signum(), clip_plane.y.signum(), 1.0, 1.0);
    let denom = clip_plane.dot(corner);
    if denom.abs() < f32::EPSILON {
        return projection;
    }

    let row = clip_plane * (projection.row(3).dot(corner) / denom);
    let mut m = projection;
    m.x_axis.z = row.x;
    m.y_axis.z = row.y;
    m.z_axis.z = row.z;
    m.w_axis.z = row.w;
    m
}
