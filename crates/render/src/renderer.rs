use glam::Mat4;
use portalspace_common::{PortalId, Transform};
use portalspace_geometry::{Camera, bounds_overlap_in_frustum, visible_from_camera};
use portalspace_kernel::{Portal, RenderTarget, RenderTargetHandle, Scene, ShadowCasting};

use crate::backend::RenderBackend;
use crate::error::RenderError;

/// Result of rendering one portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No linked partner, nothing to show.
    Inert,
    /// The linked screen is out of view; the target keeps last frame's image.
    Skipped,
    Rendered { passes: usize },
}

/// Virtual camera poses for looking through `source` out of `destination`,
/// deepest recursion level first.
///
/// Each level maps the previous pose through `source ∘ destination⁻¹`. Levels
/// past the first stop as soon as `destination`'s screen is no longer seen
/// through `source`'s screen. At least one pose is always produced, even for
/// settings that skipped validation.
pub fn view_poses(source: &Portal, destination: &Portal, viewer: &Camera) -> Vec<Transform> {
    let limit = source.settings.recursion_limit.max(1) as usize;
    let through = source.transform.local_to_world() * destination.transform.world_to_local();
    let near = source.screen_surface();
    let far = destination.screen_surface();

    let mut camera = source.camera;
    camera.copy_lens(viewer);
    camera.set_projection(viewer.projection_matrix());

    let mut pose = Mat4::from_rotation_translation(viewer.transform.rotation, viewer.transform.position);
    let mut poses = Vec::with_capacity(limit);
    for depth in 0..limit {
        if depth > 0 && !bounds_overlap_in_frustum(&near, &far, &camera) {
            tracing::trace!(portal = %source.id(), depth, "recursion culled");
            break;
        }
        pose = through * pose;
        let t = Transform::from_matrix(pose);
        camera.transform.set_position_and_rotation(t.position, t.rotation);
        poses.push(t);
    }
    poses.reverse();
    poses
}

/// Drives the three per-frame portal phases against a backend.
pub struct PortalRenderer<B> {
    backend: B,
}

impl<B: RenderBackend> PortalRenderer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Refresh slice parameters of the portal's travellers.
    pub fn pre_render(
        &self,
        scene: &mut Scene,
        portal: PortalId,
        viewer: &Camera,
    ) -> Result<(), RenderError> {
        scene.update_slice_params(portal, viewer.position())?;
        Ok(())
    }

    /// Capture the view through `portal` into its render target, which the
    /// linked portal's screen displays.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        portal: PortalId,
        viewer: &Camera,
    ) -> Result<RenderOutcome, RenderError> {
        let _span = tracing::debug_span!("portal_render", portal = %portal).entered();

        let Some(linked) = scene
            .portal(portal)
            .ok_or(RenderError::UnknownPortal(portal))?
            .linked()
        else {
            tracing::trace!(portal = %portal, "inert portal");
            return Ok(RenderOutcome::Inert);
        };

        let target = self.ensure_target(scene, portal, linked)?;

        let (Some(source), Some(destination)) = (scene.portal(portal), scene.portal(linked)) else {
            return Err(RenderError::UnknownPortal(linked));
        };
        if !visible_from_camera(&destination.screen_surface(), viewer) {
            tracing::trace!(portal = %portal, "linked screen not visible");
            return Ok(RenderOutcome::Skipped);
        }

        let poses = view_poses(source, destination, viewer);

        set_screen_hidden(scene, portal, true);
        set_display_mask(scene, linked, false);
        let passes = self.capture(scene, portal, linked, &poses, viewer, target);
        set_screen_hidden(scene, portal, false);

        let passes = passes?;
        tracing::debug!(portal = %portal, passes, "portal rendered");
        Ok(RenderOutcome::Rendered { passes })
    }

    /// Refresh slice parameters again and re-protect the screen against the
    /// viewer's near plane.
    pub fn post_render(
        &self,
        scene: &mut Scene,
        portal: PortalId,
        viewer: &Camera,
    ) -> Result<(), RenderError> {
        scene.update_slice_params(portal, viewer.position())?;
        scene
            .portal_mut(portal)
            .ok_or(RenderError::UnknownPortal(portal))?
            .protect_screen_from_clipping(viewer.position(), viewer);
        Ok(())
    }

    fn capture(
        &mut self,
        scene: &mut Scene,
        portal: PortalId,
        linked: PortalId,
        poses: &[Transform],
        viewer: &Camera,
        target: RenderTargetHandle,
    ) -> Result<usize, RenderError> {
        let source = scene.portal(portal).ok_or(RenderError::UnknownPortal(portal))?;
        let solver = source.clip_solver();
        let (plane_origin, plane_normal) = (source.position(), source.forward());
        let base = viewer.projection_matrix();
        let mut camera = source.camera;
        camera.copy_lens(viewer);

        for (pass, pose) in poses.iter().enumerate() {
            camera.transform.set_position_and_rotation(pose.position, pose.rotation);
            let clip = solver.solve(&camera, base, plane_origin, plane_normal);
            camera.set_projection(clip.projection);
            if let Some(p) = scene.portal_mut(portal) {
                p.camera = camera;
            }

            scene.handle_clipping(portal, camera.position(), viewer)?;
            self.backend.render_view(scene, &camera, target)?;

            if pass == 0 {
                set_display_mask(scene, linked, true);
            }
        }
        Ok(poses.len())
    }

    /// Make sure `portal` owns a target at the output size, recreating it on
    /// mismatch and publishing it to the linked screen.
    fn ensure_target(
        &mut self,
        scene: &mut Scene,
        portal: PortalId,
        linked: PortalId,
    ) -> Result<RenderTargetHandle, RenderError> {
        let (width, height) = self.backend.output_size();
        let source = scene
            .portal_mut(portal)
            .ok_or(RenderError::UnknownPortal(portal))?;

        if let Some(existing) = source.view_texture {
            if existing.matches(width, height) {
                return Ok(existing.handle);
            }
            self.backend.release_render_target(existing.handle);
            source.view_texture = None;
        }

        let handle = match self.backend.create_render_target(width, height) {
            Ok(handle) => handle,
            Err(e) => {
                // The linked screen may still point at the released target.
                if let Some(destination) = scene.portal_mut(linked) {
                    destination.screen.material.main_tex = None;
                    destination.screen.material.display_mask = false;
                }
                return Err(e);
            }
        };
        let source = scene
            .portal_mut(portal)
            .ok_or(RenderError::UnknownPortal(portal))?;
        source.view_texture = Some(RenderTarget {
            handle,
            width,
            height,
        });
        tracing::debug!(portal = %portal, width, height, handle = handle.0, "view texture created");

        if let Some(destination) = scene.portal_mut(linked) {
            destination.screen.material.main_tex = Some(handle);
            destination.screen.material.display_mask = true;
        }
        Ok(handle)
    }
}

fn set_screen_hidden(scene: &mut Scene, portal: PortalId, hidden: bool) {
    if let Some(p) = scene.portal_mut(portal) {
        p.screen.shadow_casting = if hidden {
            ShadowCasting::ShadowsOnly
        } else {
            ShadowCasting::On
        };
    }
}

fn set_display_mask(scene: &mut Scene, portal: PortalId, shown: bool) {
    if let Some(p) = scene.portal_mut(portal) {
        p.screen.material.display_mask = shown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DebugBackend;
    use glam::Vec3;
    use portalspace_kernel::{PortalSettings, Screen};

    fn pair(b_position: Vec3, recursion_limit: u32) -> (Scene, PortalId, PortalId) {
        let settings = PortalSettings {
            recursion_limit,
            ..PortalSettings::default()
        };
        let mut scene = Scene::new();
        let a = scene.add_portal(
            Portal::new("a", Transform::default(), Screen::new(2.0, 2.0)).with_settings(settings),
        );
        let b = scene.add_portal(
            Portal::new("b", Transform::from_position(b_position), Screen::new(2.0, 2.0))
                .with_settings(settings),
        );
        scene.link(a, b).unwrap();
        (scene, a, b)
    }

    fn viewer_at(position: Vec3) -> Camera {
        Camera::new(Transform::from_position(position))
    }

    #[test]
    fn unlinked_portal_is_inert() {
        let mut scene = Scene::new();
        let a = scene.add_portal(Portal::new("a", Transform::default(), Screen::new(1.0, 1.0)));
        let mut renderer = PortalRenderer::new(DebugBackend::default());
        let outcome = renderer.render(&mut scene, a, &Camera::default()).unwrap();
        assert_eq!(outcome, RenderOutcome::Inert);
        assert_eq!(renderer.backend().live_targets(), 0);
        assert!(scene.portal(a).unwrap().view_texture.is_none());
    }

    #[test]
    fn target_is_published_to_linked_screen() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 2);
        let mut renderer = PortalRenderer::new(DebugBackend::new(320, 200));
        renderer.render(&mut scene, a, &viewer_at(Vec3::new(0.0, 0.0, -5.0))).unwrap();

        let texture = scene.portal(a).unwrap().view_texture.unwrap();
        assert!(texture.matches(320, 200));
        let material = scene.portal(b).unwrap().screen.material;
        assert_eq!(material.main_tex, Some(texture.handle));
        assert!(material.display_mask);
        // The portal's own screen is restored after capture.
        assert_eq!(scene.portal(a).unwrap().screen.shadow_casting, ShadowCasting::On);
    }

    #[test]
    fn target_recreated_on_resize() {
        let (mut scene, a, _) = pair(Vec3::new(0.0, 0.0, -10.0), 1);
        let viewer = viewer_at(Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = PortalRenderer::new(DebugBackend::new(320, 200));
        renderer.render(&mut scene, a, &viewer).unwrap();
        renderer.render(&mut scene, a, &viewer).unwrap();
        assert_eq!(renderer.backend().allocations(), 1);

        renderer.backend_mut().resize(640, 400);
        renderer.render(&mut scene, a, &viewer).unwrap();
        assert_eq!(renderer.backend().allocations(), 2);
        assert_eq!(renderer.backend().live_targets(), 1);
        assert!(scene.portal(a).unwrap().view_texture.unwrap().matches(640, 400));
    }

    #[test]
    fn failed_reallocation_unpublishes_released_target() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 1);
        let viewer = viewer_at(Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = PortalRenderer::new(DebugBackend::new(320, 200));
        renderer.render(&mut scene, a, &viewer).unwrap();
        assert!(scene.portal(b).unwrap().screen.material.main_tex.is_some());

        renderer.backend_mut().resize(640, 400);
        renderer.backend_mut().set_fail_allocations(true);
        let err = renderer.render(&mut scene, a, &viewer).unwrap_err();
        assert!(matches!(err, RenderError::TargetAllocation { .. }));

        assert_eq!(renderer.backend().live_targets(), 0);
        assert!(scene.portal(a).unwrap().view_texture.is_none());
        let material = scene.portal(b).unwrap().screen.material;
        assert_eq!(material.main_tex, None);
        assert!(!material.display_mask);

        renderer.backend_mut().set_fail_allocations(false);
        renderer.render(&mut scene, a, &viewer).unwrap();
        let texture = scene.portal(a).unwrap().view_texture.unwrap();
        assert_eq!(scene.portal(b).unwrap().screen.material.main_tex, Some(texture.handle));
    }

    #[test]
    fn zero_recursion_limit_still_draws_once() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 3);
        scene.portal_mut(a).unwrap().settings.recursion_limit = 0;
        let mut renderer = PortalRenderer::new(DebugBackend::default());

        let outcome = renderer
            .render(&mut scene, a, &viewer_at(Vec3::new(0.0, 0.0, -5.0)))
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { passes: 1 });
        assert_eq!(renderer.backend().draws().len(), 1);
        assert!(scene.portal(b).unwrap().screen.material.display_mask);
    }

    #[test]
    fn invisible_destination_is_skipped_after_target_setup() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 3);
        let mut renderer = PortalRenderer::new(DebugBackend::default());
        // Looking away from b.
        let viewer = Camera::new(Transform::from_position_rotation(
            Vec3::new(0.0, 0.0, -5.0),
            glam::Quat::from_rotation_y(std::f32::consts::PI),
        ));
        let outcome = renderer.render(&mut scene, a, &viewer).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped);
        assert!(renderer.backend().draws().is_empty());
        assert!(scene.portal(b).unwrap().screen.material.main_tex.is_some());
    }

    #[test]
    fn aligned_pair_renders_every_level_deepest_first() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 3);
        let viewer = viewer_at(Vec3::new(0.0, 0.0, -5.0));
        let mut renderer = PortalRenderer::new(DebugBackend::default());

        let outcome = renderer.render(&mut scene, a, &viewer).unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { passes: 3 });

        let draws = renderer.backend().draws();
        let depths: Vec<f32> = draws.iter().map(|d| d.camera.position().z).collect();
        for (got, want) in depths.iter().zip([25.0, 15.0, 5.0]) {
            assert!((got - want).abs() < 1e-4, "{depths:?}");
        }

        for draw in draws {
            assert!(draw.hidden_screens.contains(&a));
            assert!(draw.camera.projection_matrix() != viewer.projection_matrix());
        }
        // Placeholder until the deepest pass has landed.
        assert!(!draws[0].displaying_screens.contains(&b));
        assert!(draws[1].displaying_screens.contains(&b));
    }

    #[test]
    fn offset_pair_stops_after_first_level() {
        let (mut scene, a, _) = pair(Vec3::new(50.0, 0.0, -10.0), 5);
        let viewer = viewer_at(Vec3::new(50.0, 0.0, -5.0));
        let mut renderer = PortalRenderer::new(DebugBackend::default());

        let outcome = renderer.render(&mut scene, a, &viewer).unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { passes: 1 });
        let eye = renderer.backend().draws()[0].camera.position();
        assert!(eye.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-4));
    }

    #[test]
    fn view_poses_respect_limit() {
        for limit in 1..=6 {
            let (scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), limit);
            let poses = view_poses(
                scene.portal(a).unwrap(),
                scene.portal(b).unwrap(),
                &viewer_at(Vec3::new(0.0, 0.0, -5.0)),
            );
            assert_eq!(poses.len(), limit as usize);
        }
    }

    #[test]
    fn allocation_failure_is_reported() {
        let (mut scene, a, b) = pair(Vec3::new(0.0, 0.0, -10.0), 2);
        let mut backend = DebugBackend::default();
        backend.set_fail_allocations(true);
        let mut renderer = PortalRenderer::new(backend);

        let result = renderer.render(&mut scene, a, &viewer_at(Vec3::new(0.0, 0.0, -5.0)));
        assert!(matches!(result, Err(RenderError::TargetAllocation { .. })));
        assert!(scene.portal(a).unwrap().view_texture.is_none());
        assert!(!scene.portal(b).unwrap().screen.material.display_mask);
    }

    #[test]
    fn post_render_protects_own_screen() {
        let (mut scene, a, _) = pair(Vec3::new(0.0, 0.0, -10.0), 1);
        let viewer = viewer_at(Vec3::new(0.0, 0.0, 3.0));
        let renderer = PortalRenderer::new(DebugBackend::default());
        renderer.post_render(&mut scene, a, &viewer).unwrap();

        let screen = &scene.portal(a).unwrap().screen;
        let thickness = viewer.near_plane_corner_distance();
        assert!((screen.thickness() - thickness).abs() < 1e-6);
        assert!((screen.local.position.z + thickness * 0.5).abs() < 1e-6);
    }
}
