use glam::{Quat, Vec3};
use portalspace_common::{EntityId, PortalId, Transform};
use serde::{Deserialize, Serialize};

use crate::material::MaterialInstance;

/// Renderable payload of a traveller, positioned relative to the traveller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsObject {
    pub local: Transform,
    /// Material instances of every renderer in the object.
    pub materials: Vec<MaterialInstance>,
}

impl GraphicsObject {
    pub fn new(materials: Vec<MaterialInstance>) -> Self {
        Self {
            local: Transform::default(),
            materials,
        }
    }
}

/// Render-only duplicate shown on the far side of a portal while its source
/// is in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsClone {
    /// World-space pose.
    pub transform: Transform,
    pub active: bool,
    pub materials: Vec<MaterialInstance>,
}

/// A scene object that can cross portals.
#[derive(Debug, Clone)]
pub struct Traveller {
    id: EntityId,
    pub name: String,
    pub transform: Transform,
    /// Anchor, relative to the traveller, used for side tests when the root
    /// pivot does not represent the object's extent.
    pub crossing_reference: Option<Transform>,
    /// Portal-to-reference vector captured on the previous frame, before any
    /// teleport. Baseline for crossing detection.
    pub previous_offset_from_portal: Vec3,
    pub graphics: Option<GraphicsObject>,
    clone: Option<GraphicsClone>,
    pub(crate) tracked_by: Option<PortalId>,
}

impl Traveller {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            transform,
            crossing_reference: None,
            previous_offset_from_portal: Vec3::ZERO,
            graphics: None,
            clone: None,
            tracked_by: None,
        }
    }

    pub fn with_graphics(mut self, graphics: GraphicsObject) -> Self {
        self.graphics = Some(graphics);
        self
    }

    pub fn with_crossing_reference(mut self, reference: Transform) -> Self {
        self.crossing_reference = Some(reference);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tracked_by(&self) -> Option<PortalId> {
        self.tracked_by
    }

    pub fn graphics_clone(&self) -> Option<&GraphicsClone> {
        self.clone.as_ref()
    }

    pub fn graphics_clone_mut(&mut self) -> Option<&mut GraphicsClone> {
        self.clone.as_mut()
    }

    /// World position used for side and offset tests.
    pub fn reference_point(&self) -> Vec3 {
        match &self.crossing_reference {
            Some(reference) => self.transform.transform_point(reference.position),
            None => self.transform.position,
        }
    }

    /// World position of the graphics object, if any.
    pub fn graphics_position(&self) -> Option<Vec3> {
        self.graphics
            .as_ref()
            .map(|g| self.transform.transform_point(g.local.position))
    }

    /// Material arrays used for slicing, original then clone. Available once
    /// the clone has been created.
    pub fn slice_materials_mut(
        &mut self,
    ) -> Option<(&mut [MaterialInstance], &mut [MaterialInstance])> {
        match (self.graphics.as_mut(), self.clone.as_mut()) {
            (Some(graphics), Some(clone)) => {
                Some((graphics.materials.as_mut_slice(), clone.materials.as_mut_slice()))
            }
            _ => None,
        }
    }

    /// Called when the traveller first touches a portal threshold. Creates the
    /// clone on first use, reactivates it afterwards. Returns `true` when a
    /// clone was created.
    pub fn enter_threshold(&mut self) -> bool {
        let Some(graphics) = &self.graphics else {
            tracing::trace!(traveller = %self.id, "no graphics, skipping clone");
            return false;
        };

        if let Some(clone) = &mut self.clone {
            clone.active = true;
            return false;
        }

        let clone = GraphicsClone {
            transform: self.transform.mul_transform(&graphics.local),
            active: true,
            materials: graphics.materials.clone(),
        };
        self.clone = Some(clone);
        tracing::debug!(traveller = %self.id, name = %self.name, "created graphics clone");
        true
    }

    /// Called when the traveller leaves a threshold without crossing. Hides the
    /// clone and disables slicing on the original.
    pub fn exit_threshold(&mut self) {
        let Some(clone) = &mut self.clone else {
            return;
        };
        clone.active = false;
        if let Some(graphics) = &mut self.graphics {
            for material in &mut graphics.materials {
                material.set_slice_normal(Vec3::ZERO);
            }
        }
    }

    pub fn teleport(&mut self, position: Vec3, rotation: Quat) {
        tracing::trace!(
            traveller = %self.id,
            from = ?self.transform.position,
            to = ?position,
            "teleport"
        );
        self.transform.set_position_and_rotation(position, rotation);
    }

    /// Write `dst` into the slice offset of the original (`clone == false`) or
    /// clone materials.
    pub fn set_slice_offset_dst(&mut self, dst: f32, clone: bool) {
        let Some((originals, clones)) = self.slice_materials_mut() else {
            return;
        };
        let targets = if clone { clones } else { originals };
        for material in targets {
            material.set_slice_offset_dst(dst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_body() -> Traveller {
        Traveller::new("box", Transform::from_position(Vec3::new(1.0, 0.0, 0.0))).with_graphics(
            GraphicsObject::new(vec![MaterialInstance::new("a"), MaterialInstance::new("b")]),
        )
    }

    #[test]
    fn reference_point_defaults_to_root() {
        let t = Traveller::new("t", Transform::from_position(Vec3::new(3.0, 2.0, 1.0)));
        assert_eq!(t.reference_point(), Vec3::new(3.0, 2.0, 1.0));
    }

    #[test]
    fn reference_point_follows_anchor() {
        let t = Traveller::new(
            "t",
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
        )
        .with_crossing_reference(Transform::from_position(Vec3::new(0.0, 0.0, 1.0)));
        assert!(t.reference_point().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn clone_created_once_then_reused() {
        let mut t = with_body();
        assert!(t.enter_threshold());
        assert!(t.graphics_clone().is_some_and(|c| c.active));

        t.exit_threshold();
        assert!(t.graphics_clone().is_some_and(|c| !c.active));

        // Mid-transit state on the clone survives re-entry.
        t.set_slice_offset_dst(7.0, true);
        assert!(!t.enter_threshold());
        let clone = t.graphics_clone().unwrap();
        assert!(clone.active);
        assert_eq!(clone.materials[0].slice().offset_dst, 7.0);
    }

    #[test]
    fn exit_disables_original_slicing() {
        let mut t = with_body();
        t.enter_threshold();
        for m in &mut t.graphics.as_mut().unwrap().materials {
            m.set_slice_normal(Vec3::Z);
        }
        t.exit_threshold();
        for m in &t.graphics.as_ref().unwrap().materials {
            assert_eq!(m.slice().normal, Vec3::ZERO);
        }
    }

    #[test]
    fn no_graphics_means_no_clone() {
        let mut t = Traveller::new("proxy", Transform::default());
        assert!(!t.enter_threshold());
        t.exit_threshold();
        t.set_slice_offset_dst(1.0, false);
        assert!(t.graphics_clone().is_none());
        assert!(t.slice_materials_mut().is_none());
    }

    #[test]
    fn offset_writes_target_one_side() {
        let mut t = with_body();
        t.enter_threshold();
        t.set_slice_offset_dst(-1000.0, false);
        let (originals, clones) = t.slice_materials_mut().unwrap();
        assert!(originals.iter().all(|m| m.slice().offset_dst == -1000.0));
        assert!(clones.iter().all(|m| m.slice().offset_dst == 0.0));
    }

    #[test]
    fn teleport_moves_root() {
        let mut t = with_body();
        t.teleport(Vec3::new(0.0, 5.0, 0.0), Quat::from_rotation_x(0.5));
        assert_eq!(t.transform.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(t.transform.rotation, Quat::from_rotation_x(0.5));
    }
}
