use std::collections::BTreeSet;
use std::fmt::Write as _;

use portalspace_common::PortalId;
use portalspace_geometry::Camera;
use portalspace_kernel::{RenderTargetHandle, Scene, ShadowCasting};

use crate::error::RenderError;

/// What the portal renderer needs from a graphics backend.
///
/// The backend reads the scene to draw it; it never mutates scene state.
pub trait RenderBackend {
    /// Current output resolution. Portal render targets are kept at this size.
    fn output_size(&self) -> (u32, u32);

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetHandle, RenderError>;

    fn release_render_target(&mut self, handle: RenderTargetHandle);

    /// Draw the scene from `camera` into `target`, using the camera's current
    /// projection (possibly oblique).
    fn render_view(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: RenderTargetHandle,
    ) -> Result<(), RenderError>;
}

/// One recorded `render_view` call.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub target: RenderTargetHandle,
    pub camera: Camera,
    /// Portals whose screens were in shadows-only mode during the draw.
    pub hidden_screens: Vec<PortalId>,
    /// Portals whose screens displayed their captured texture.
    pub displaying_screens: Vec<PortalId>,
}

/// Backend that records calls instead of drawing. Used by tests and the CLI.
#[derive(Debug)]
pub struct DebugBackend {
    size: (u32, u32),
    next_handle: u64,
    live: BTreeSet<RenderTargetHandle>,
    draws: Vec<DrawCall>,
    allocations: usize,
    fail_allocations: bool,
}

impl DebugBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_handle: 1,
            live: BTreeSet::new(),
            draws: Vec::new(),
            allocations: 0,
            fail_allocations: false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Make every subsequent `create_render_target` call fail.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn draws_into(&self, target: RenderTargetHandle) -> usize {
        self.draws.iter().filter(|d| d.target == target).count()
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn live_targets(&self) -> usize {
        self.live.len()
    }

    /// Total successful allocations since creation.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Human-readable dump of the recorded draws.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Debug backend ({}x{}) targets={} draws={} ===",
            self.size.0,
            self.size.1,
            self.live.len(),
            self.draws.len()
        );
        for (i, draw) in self.draws.iter().enumerate() {
            let p = draw.camera.position();
            let d = draw.camera.view_direction();
            let _ = writeln!(
                out,
                "  #{i} target={} eye=({:.2}, {:.2}, {:.2}) dir=({:.2}, {:.2}, {:.2})",
                draw.target.0,
                p.x,
                p.y,
                p.z,
                d.x,
                d.y,
                d.z
            );
        }
        out
    }
}

impl Default for DebugBackend {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl RenderBackend for DebugBackend {
    fn output_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<RenderTargetHandle, RenderError> {
        if self.fail_allocations || width == 0 || height == 0 {
            return Err(RenderError::TargetAllocation {
                width,
                height,
                reason: "debug backend refused allocation".into(),
            });
        }
        let handle = RenderTargetHandle(self.next_handle);
        self.next_handle += 1;
        self.allocations += 1;
        self.live.insert(handle);
        Ok(handle)
    }

    fn release_render_target(&mut self, handle: RenderTargetHandle) {
        self.live.remove(&handle);
    }

    fn render_view(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: RenderTargetHandle,
    ) -> Result<(), RenderError> {
        if !self.live.contains(&target) {
            return Err(RenderError::Draw(format!(
                "render target {} is not allocated",
                target.0
            )));
        }
        let hidden_screens = scene
            .portals()
            .values()
            .filter(|p| p.screen.shadow_casting == ShadowCasting::ShadowsOnly)
            .map(|p| p.id())
            .collect();
        let displaying_screens = scene
            .portals()
            .values()
            .filter(|p| p.screen.material.display_mask)
            .map(|p| p.id())
            .collect();
        self.draws.push(DrawCall {
            target,
            camera: *camera,
            hidden_screens,
            displaying_screens,
        });
        Ok(())
    }
}
