//! Slice plane coordination for travellers in transit.
//!
//! Travellers straddling a portal are drawn twice: the original on the source
//! side and the clone on the destination side. Both are cut at the portal
//! plane by the slicing shader, driven by the uniforms written here.

use glam::Vec3;
use portalspace_common::{EntityId, PortalId, Transform};
use portalspace_geometry::{Camera, Side, side_of_plane};

use crate::error::SceneError;
use crate::scene::Scene;

/// Offset that hides a traveller's geometry entirely on the cut side.
pub const HIDE_DST: f32 = -1000.0;
/// Offset that keeps a traveller's geometry entirely on the cut side.
pub const SHOW_DST: f32 = 1000.0;

#[derive(Clone, Copy)]
struct Plane {
    origin: Vec3,
    normal: Vec3,
}

impl Plane {
    fn of(transform: &Transform) -> Self {
        Self {
            origin: transform.position,
            normal: transform.forward(),
        }
    }

    fn side(self, point: Vec3) -> Side {
        side_of_plane(point, self.origin, self.normal)
    }

    fn same_side(self, a: Vec3, b: Vec3) -> bool {
        self.side(a) == self.side(b)
    }
}

impl Scene {
    /// Recompute slice centre, normal and offset for every traveller tracked
    /// by `portal`, as seen from the external viewer at `viewer_position`.
    ///
    /// Travellers without graphics are skipped. Unlinked portals do nothing.
    pub fn update_slice_params(
        &mut self,
        portal: PortalId,
        viewer_position: Vec3,
    ) -> Result<(), SceneError> {
        let source = self.portal(portal).ok_or(SceneError::UnknownPortal(portal))?;
        let Some(destination) = self.linked_portal(portal) else {
            return Ok(());
        };
        let here = Plane::of(&source.transform);
        let there = Plane::of(&destination.transform);
        let thickness = source.screen.thickness();
        let tracked = source.tracked.clone();

        for id in tracked {
            let Some(traveller) = self.traveller_mut(id) else {
                continue;
            };
            let position = traveller.transform.position;
            let side = here.side(position);

            let mut offset = 0.0;
            if !here.same_side(viewer_position, position) {
                offset = -thickness;
            }
            let mut clone_offset = 0.0;
            if side == there.side(viewer_position) {
                clone_offset = -thickness;
            }

            let Some((originals, clones)) = traveller.slice_materials_mut() else {
                continue;
            };
            for material in originals {
                material.set_slice_centre(here.origin);
                material.set_slice_normal(here.normal * -side.sign());
                material.set_slice_offset_dst(offset);
            }
            for material in clones {
                material.set_slice_centre(there.origin);
                material.set_slice_normal(there.normal * side.sign());
                material.set_slice_offset_dst(clone_offset);
            }
        }
        Ok(())
    }

    /// Adjust slice offsets for one capture pass through `portal` with the
    /// virtual camera at `camera_position`.
    ///
    /// Covers the travellers of this portal and the clones of the linked
    /// portal's travellers, which may both be visible through this portal.
    /// The linked portal's screen thickness is refreshed against `viewer`'s
    /// lens as a side effect and returned.
    pub fn handle_clipping(
        &mut self,
        portal: PortalId,
        camera_position: Vec3,
        viewer: &Camera,
    ) -> Result<f32, SceneError> {
        let source = self.portal(portal).ok_or(SceneError::UnknownPortal(portal))?;
        let Some(linked) = source.linked() else {
            return Ok(0.0);
        };
        let here = Plane::of(&source.transform);
        let own: Vec<EntityId> = source.tracked.clone();

        let destination = self
            .portal_mut(linked)
            .ok_or(SceneError::UnknownPortal(linked))?;
        let thickness = destination.protect_screen_from_clipping(camera_position, viewer);
        let there = Plane::of(&destination.transform);
        let theirs: Vec<EntityId> = destination.tracked.clone();

        for id in own {
            let Some(traveller) = self.traveller_mut(id) else {
                continue;
            };
            let position = traveller.transform.position;

            // Hide the sliver behind the screen, or avoid a seam at its edge.
            let dst = if here.same_side(position, camera_position) {
                HIDE_DST
            } else {
                SHOW_DST
            };
            traveller.set_slice_offset_dst(dst, false);

            let clone_side = -here.side(position);
            let dst = if there.side(camera_position) == clone_side {
                thickness
            } else {
                -thickness
            };
            traveller.set_slice_offset_dst(dst, true);
        }

        for id in theirs {
            let Some(traveller) = self.traveller_mut(id) else {
                continue;
            };
            if traveller.graphics_clone().is_none() {
                continue;
            }
            let Some(graphics_position) = traveller.graphics_position() else {
                continue;
            };

            let dst = if there.side(graphics_position) != here.side(camera_position) {
                HIDE_DST
            } else {
                SHOW_DST
            };
            traveller.set_slice_offset_dst(dst, true);

            let dst = if there.same_side(traveller.transform.position, camera_position) {
                thickness
            } else {
                -thickness
            };
            traveller.set_slice_offset_dst(dst, false);
        }

        Ok(thickness)
    }
}
