use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounds of a unit cube centred on the origin, the local bounds of a
    /// portal screen mesh.
    pub fn unit() -> Self {
        Self::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Enclosing box of this box after an affine transform.
    pub fn transformed(&self, m: Mat4) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in self.corners() {
            let p = m.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }
}

/// A renderable surface: mesh-local bounds plus the mesh's world matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub local_bounds: Aabb,
    pub local_to_world: Mat4,
}

impl Surface {
    pub fn world_bounds(&self) -> Aabb {
        self.local_bounds.transformed(self.local_to_world)
    }

    pub fn world_corners(&self) -> [Vec3; 8] {
        self.local_bounds
            .corners()
            .map(|c| self.local_to_world.transform_point3(c))
    }
}

/// Six inward-facing planes extracted from a view-projection matrix.
#[derive(Clone, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb-Hartmann extraction for `[0, 1]` clip depth.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Conservative p-vertex test: may report boxes near frustum corners as
    /// visible, never culls a visible box.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = plane.truncate();
            let p = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if normal.dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Viewport-space extent of a surface as seen by one camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub min: Vec3,
    pub max: Vec3,
}

impl ScreenRect {
    /// Project the eight corners of `surface` into `camera`'s viewport.
    ///
    /// Corners behind the camera mirror across the view axis after the
    /// perspective divide, so they are pinned to the opposite viewport edge
    /// instead. Returns `None` when every corner is behind the camera.
    pub fn of_surface(surface: &Surface, camera: &Camera) -> Option<Self> {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any_in_front = false;

        for corner in surface.world_corners() {
            let mut v = camera.world_to_viewport(corner);
            if v.z > 0.0 {
                any_in_front = true;
            } else {
                v.x = if v.x <= 0.5 { 1.0 } else { 0.0 };
                v.y = if v.y <= 0.5 { 1.0 } else { 0.0 };
            }
            min = min.min(v);
            max = max.max(v);
        }

        any_in_front.then_some(Self { min, max })
    }
}

/// Whether any part of `surface` lies inside `camera`'s frustum.
pub fn visible_from_camera(surface: &Surface, camera: &Camera) -> bool {
    Frustum::from_view_projection(&camera.view_projection()).intersects_aabb(&surface.world_bounds())
}

/// Whether `far` can be seen through `near` from `camera`: their viewport
/// rectangles overlap and `far` reaches deeper than `near` starts.
pub fn bounds_overlap_in_frustum(near: &Surface, far: &Surface, camera: &Camera) -> bool {
    let (Some(near), Some(far)) = (
        ScreenRect::of_surface(near, camera),
        ScreenRect::of_surface(far, camera),
    ) else {
        return false;
    };

    if far.max.z <= near.min.z {
        return false;
    }
    if far.max.x < near.min.x || far.min.x > near.max.x {
        return false;
    }
    if far.max.y < near.min.y || far.min.y > near.max.y {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use portalspace_common::Transform;

    fn screen_at(position: Vec3, size: f32) -> Surface {
        Surface {
            local_bounds: Aabb::unit(),
            local_to_world: Transform {
                position,
                scale: Vec3::new(size, size, 0.05),
                ..Transform::default()
            }
            .local_to_world(),
        }
    }

    #[test]
    fn aabb_transformed_by_translation() {
        let b = Aabb::unit().transformed(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!(b.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-6));
        assert!(b.extents().abs_diff_eq(Vec3::splat(0.5), 1e-6));
    }

    #[test]
    fn surface_ahead_is_visible() {
        let cam = Camera::default();
        assert!(visible_from_camera(&screen_at(Vec3::new(0.0, 0.0, -5.0), 2.0), &cam));
    }

    #[test]
    fn surface_behind_is_not_visible() {
        let cam = Camera::default();
        assert!(!visible_from_camera(&screen_at(Vec3::new(0.0, 0.0, 5.0), 2.0), &cam));
    }

    #[test]
    fn surface_far_to_the_side_is_not_visible() {
        let cam = Camera::default();
        assert!(!visible_from_camera(&screen_at(Vec3::new(500.0, 0.0, -5.0), 2.0), &cam));
    }

    #[test]
    fn screen_rect_none_when_behind() {
        let cam = Camera::default();
        assert!(ScreenRect::of_surface(&screen_at(Vec3::new(0.0, 0.0, 5.0), 1.0), &cam).is_none());
    }

    #[test]
    fn aligned_surfaces_overlap() {
        let cam = Camera::default();
        let near = screen_at(Vec3::new(0.0, 0.0, -5.0), 2.0);
        let far = screen_at(Vec3::new(0.0, 0.0, -15.0), 2.0);
        assert!(bounds_overlap_in_frustum(&near, &far, &cam));
    }

    #[test]
    fn far_surface_in_front_of_near_does_not_count() {
        let cam = Camera::default();
        let near = screen_at(Vec3::new(0.0, 0.0, -15.0), 2.0);
        let far = screen_at(Vec3::new(0.0, 0.0, -5.0), 2.0);
        assert!(!bounds_overlap_in_frustum(&near, &far, &cam));
    }

    #[test]
    fn offset_surfaces_do_not_overlap() {
        let cam = Camera::default();
        let near = screen_at(Vec3::new(0.0, 0.0, -5.0), 2.0);
        let far = screen_at(Vec3::new(50.0, 0.0, -15.0), 2.0);
        assert!(!bounds_overlap_in_frustum(&near, &far, &cam));
    }
}
