//! Per-frame portal crossing detection and teleport hand-off.

use glam::Vec3;
use portalspace_common::{EntityId, PortalId, Transform};
use portalspace_geometry::Side;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::scene::{Scene, SceneEvent};

/// A completed teleport through a portal pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crossing {
    pub traveller: EntityId,
    pub from: PortalId,
    pub to: PortalId,
    /// Traveller pose just before the teleport. The clone is left here.
    pub before: Transform,
    pub after: Transform,
}

enum Step {
    Crossed { before: Transform, after: Transform },
    Stayed,
}

impl Scene {
    /// Run crossing detection for every traveller tracked by `portal`.
    ///
    /// A crossing needs a definite side on both frames. A reference point lying
    /// exactly on the plane never fires and leaves the previous baseline in
    /// place. An unlinked portal does nothing.
    pub fn handle_travellers(&mut self, portal: PortalId) -> Result<Vec<Crossing>, SceneError> {
        let source = self.portal(portal).ok_or(SceneError::UnknownPortal(portal))?;
        if source.tracked.is_empty() {
            return Ok(Vec::new());
        }
        let Some(destination) = self.linked_portal(portal) else {
            tracing::trace!(portal = %portal, "unlinked portal, skipping crossing detection");
            return Ok(Vec::new());
        };

        let to = destination.id();
        let origin = source.position();
        let normal = source.forward();
        let through = destination.transform.local_to_world() * source.transform.world_to_local();
        let tracked = source.tracked.clone();

        let mut crossings = Vec::new();
        for id in tracked {
            let Some(traveller) = self.traveller_mut(id) else {
                continue;
            };

            let m = Transform::from_matrix(through * traveller.transform.local_to_world());
            let offset = traveller.reference_point() - origin;
            let current = Side::of(offset.dot(normal));
            let previous = Side::of(traveller.previous_offset_from_portal.dot(normal));

            let step = if is_crossing(previous, current) {
                let before = traveller.transform;
                traveller.teleport(m.position, m.rotation);
                if let Some(clone) = traveller.graphics_clone_mut() {
                    clone.transform.set_position_and_rotation(before.position, before.rotation);
                }
                Step::Crossed {
                    before,
                    after: traveller.transform,
                }
            } else {
                if let Some(clone) = traveller.graphics_clone_mut() {
                    clone.transform.set_position_and_rotation(m.position, m.rotation);
                }
                if current != Side::On {
                    traveller.previous_offset_from_portal = offset;
                }
                Step::Stayed
            };

            if let Step::Crossed { before, after } = step {
                self.stop_tracking(portal, id);
                self.begin_tracking(to, id);
                tracing::info!(
                    traveller = %id,
                    from = %portal,
                    to = %to,
                    position = ?after.position,
                    "traveller crossed portal"
                );
                self.events.push(SceneEvent::Teleported {
                    traveller: id,
                    from: portal,
                    to,
                    before,
                    after,
                });
                crossings.push(Crossing {
                    traveller: id,
                    from: portal,
                    to,
                    before,
                    after,
                });
            }
        }
        Ok(crossings)
    }

    /// Crossing detection for every portal, in portal id order.
    pub fn handle_all_travellers(&mut self) -> Vec<Crossing> {
        let mut crossings = Vec::new();
        for id in self.portal_ids() {
            match self.handle_travellers(id) {
                Ok(mut c) => crossings.append(&mut c),
                Err(e) => tracing::warn!(portal = %id, error = %e, "crossing detection failed"),
            }
        }
        crossings
    }

    /// Vector from `portal` to the traveller's reference point.
    pub fn offset_from_portal(&self, portal: PortalId, traveller: EntityId) -> Option<Vec3> {
        let p = self.portal(portal)?;
        let t = self.traveller(traveller)?;
        Some(t.reference_point() - p.position())
    }
}

fn is_crossing(previous: Side, current: Side) -> bool {
    previous != Side::On && current != Side::On && previous != current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialInstance;
    use crate::portal::{Portal, Screen};
    use crate::traveller::{GraphicsObject, Traveller};
    use glam::{Mat4, Quat};
    use std::f32::consts::{FRAC_PI_2, PI};

    struct Pair {
        scene: Scene,
        a: PortalId,
        b: PortalId,
    }

    fn pair(b_transform: Transform) -> Pair {
        let mut scene = Scene::new();
        let a = scene.add_portal(Portal::new("a", Transform::default(), Screen::new(2.0, 2.0)));
        let b = scene.add_portal(Portal::new("b", b_transform, Screen::new(2.0, 2.0)));
        scene.link(a, b).unwrap();
        Pair { scene, a, b }
    }

    fn body(position: Vec3) -> Traveller {
        Traveller::new("body", Transform::from_position(position))
            .with_graphics(GraphicsObject::new(vec![MaterialInstance::new("skin")]))
    }

    fn move_to(scene: &mut Scene, id: EntityId, position: Vec3) {
        scene.traveller_mut(id).unwrap().transform.position = position;
    }

    #[test]
    fn sign_flip_teleports_once_and_hands_off() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(body(Vec3::new(0.0, 0.0, 1.0)));
        scene.on_threshold_enter(a, t).unwrap();
        assert!(scene.handle_all_travellers().is_empty());

        move_to(&mut scene, t, Vec3::new(0.0, 0.0, -1.0));
        let crossings = scene.handle_all_travellers();
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].from, a);
        assert_eq!(crossings[0].to, b);

        let teleports = scene
            .events()
            .iter()
            .filter(|e| matches!(e, SceneEvent::Teleported { .. }))
            .count();
        assert_eq!(teleports, 1);

        assert!(!scene.portal(a).unwrap().is_tracking(t));
        assert!(scene.portal(b).unwrap().is_tracking(t));
        let traveller = scene.traveller(t).unwrap();
        assert_eq!(traveller.tracked_by(), Some(b));
        assert!(traveller.transform.position.abs_diff_eq(Vec3::new(20.0, 0.0, -1.0), 1e-5));

        let clone = traveller.graphics_clone().unwrap();
        assert!(clone.transform.position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
        assert!(clone.transform.rotation.abs_diff_eq(Quat::IDENTITY, 1e-5));
    }

    #[test]
    fn no_retrigger_after_hand_off() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(body(Vec3::new(0.0, 0.0, 1.0)));
        scene.on_threshold_enter(a, t).unwrap();
        move_to(&mut scene, t, Vec3::new(0.0, 0.0, -1.0));
        scene.handle_all_travellers();

        for _ in 0..3 {
            assert!(scene.handle_all_travellers().is_empty());
        }
        assert!(scene.portal(b).unwrap().is_tracking(t));
        assert!(!scene.portal(a).unwrap().is_tracking(t));
    }

    #[test]
    fn teleport_pose_goes_through_pair() {
        let b_transform = Transform::from_position_rotation(
            Vec3::new(5.0, 2.0, -7.0),
            Quat::from_rotation_y(FRAC_PI_2),
        );
        let Pair { mut scene, a, .. } = pair(b_transform);
        scene.portal_mut(a).unwrap().transform =
            Transform::from_position_rotation(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(PI));

        // Portal a faces -Z; start in front of it.
        let t = scene.add_traveller(body(Vec3::new(1.0, 0.5, -0.5)));
        scene.on_threshold_enter(a, t).unwrap();

        let pre = Transform::from_position_rotation(
            Vec3::new(1.2, 0.5, 0.5),
            Quat::from_rotation_x(0.3),
        );
        scene.traveller_mut(t).unwrap().transform = pre;

        let crossings = scene.handle_travellers(a).unwrap();
        assert_eq!(crossings.len(), 1);

        let portal_a = scene.portal(a).unwrap();
        let expected: Mat4 = b_transform.local_to_world()
            * portal_a.transform.world_to_local()
            * pre.local_to_world();
        let got = scene.traveller(t).unwrap().transform.local_to_world();
        assert!(got.abs_diff_eq(expected, 1e-4));

        let clone = scene.traveller(t).unwrap().graphics_clone().unwrap();
        assert!(clone.transform.position.abs_diff_eq(pre.position, 1e-6));
        assert!(clone.transform.rotation.abs_diff_eq(pre.rotation, 1e-6));
        assert_eq!(crossings[0].before, pre);
    }

    #[test]
    fn clone_mirrors_pose_before_crossing() {
        let Pair { mut scene, a, .. } = pair(Transform::from_position(Vec3::new(0.0, 10.0, 0.0)));
        let t = scene.add_traveller(body(Vec3::new(0.5, 0.0, 2.0)));
        scene.on_threshold_enter(a, t).unwrap();
        move_to(&mut scene, t, Vec3::new(0.5, 0.0, 1.0));
        scene.handle_all_travellers();

        let traveller = scene.traveller(t).unwrap();
        let clone = traveller.graphics_clone().unwrap();
        assert!(clone.transform.position.abs_diff_eq(Vec3::new(0.5, 10.0, 1.0), 1e-5));
        assert_eq!(traveller.previous_offset_from_portal, Vec3::new(0.5, 0.0, 1.0));
    }

    #[test]
    fn on_plane_frame_keeps_baseline() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(body(Vec3::new(0.0, 0.0, 1.0)));
        scene.on_threshold_enter(a, t).unwrap();

        move_to(&mut scene, t, Vec3::new(0.3, 0.0, 0.0));
        assert!(scene.handle_all_travellers().is_empty());
        assert_eq!(
            scene.traveller(t).unwrap().previous_offset_from_portal,
            Vec3::new(0.0, 0.0, 1.0)
        );
        assert!(scene.portal(a).unwrap().is_tracking(t));

        // Leaving the plane on the far side is still a crossing.
        move_to(&mut scene, t, Vec3::new(0.3, 0.0, -0.2));
        assert_eq!(scene.handle_all_travellers().len(), 1);
        assert!(scene.portal(b).unwrap().is_tracking(t));
    }

    #[test]
    fn on_plane_baseline_is_replaced_without_crossing() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(body(Vec3::ZERO));
        scene.on_threshold_enter(a, t).unwrap();

        move_to(&mut scene, t, Vec3::new(0.0, 0.0, -1.0));
        assert!(scene.handle_all_travellers().is_empty());
        assert!(scene.portal(a).unwrap().is_tracking(t));

        move_to(&mut scene, t, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(scene.handle_all_travellers().len(), 1);
        assert!(scene.portal(b).unwrap().is_tracking(t));
    }

    #[test]
    fn crossing_reference_drives_side_test() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(
            body(Vec3::new(0.0, 0.0, 3.0))
                .with_crossing_reference(Transform::from_position(Vec3::new(0.0, 0.0, -2.0))),
        );
        scene.on_threshold_enter(a, t).unwrap();

        // Root still in front, reference point now behind.
        move_to(&mut scene, t, Vec3::new(0.0, 0.0, 1.5));
        assert_eq!(scene.handle_all_travellers().len(), 1);
        assert!(scene.portal(b).unwrap().is_tracking(t));
    }

    #[test]
    fn proxy_without_graphics_still_teleports() {
        let Pair { mut scene, a, b } = pair(Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        let t = scene.add_traveller(Traveller::new("proxy", Transform::from_position(Vec3::Z)));
        scene.on_threshold_enter(a, t).unwrap();
        move_to(&mut scene, t, -Vec3::Z);

        assert_eq!(scene.handle_all_travellers().len(), 1);
        assert!(scene.portal(b).unwrap().is_tracking(t));
        assert!(scene.traveller(t).unwrap().graphics_clone().is_none());
    }

    #[test]
    fn unlinked_portal_never_teleports() {
        let mut scene = Scene::new();
        let a = scene.add_portal(Portal::new("a", Transform::default(), Screen::new(1.0, 1.0)));
        let t = scene.add_traveller(body(Vec3::Z));
        scene.on_threshold_enter(a, t).unwrap();
        move_to(&mut scene, t, -Vec3::Z);

        assert!(scene.handle_travellers(a).unwrap().is_empty());
        assert!(scene.portal(a).unwrap().is_tracking(t));
        assert!(matches!(
            scene.handle_travellers(PortalId::new()),
            Err(SceneError::UnknownPortal(_))
        ));
    }

    #[test]
    fn side_rule() {
        assert!(is_crossing(Side::Front, Side::Back));
        assert!(!is_crossing(Side::Front, Side::On));
        assert!(!is_crossing(Side::On, Side::Back));
        assert!(!is_crossing(Side::On, Side::On));
        assert!(!is_crossing(Side::Back, Side::Back));
    }
}
