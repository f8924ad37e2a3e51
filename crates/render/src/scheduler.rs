use std::collections::BTreeMap;

use portalspace_common::PortalId;
use portalspace_geometry::Camera;
use portalspace_kernel::{Crossing, Scene};

use crate::backend::RenderBackend;
use crate::error::RenderError;
use crate::renderer::{PortalRenderer, RenderOutcome};

/// Everything that happened in one deferred portal pass.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    /// Teleports detected since the previous pass.
    pub crossings: Vec<Crossing>,
    pub outcomes: BTreeMap<PortalId, RenderOutcome>,
    /// Portals whose phases failed this frame. Other portals still rendered.
    pub failures: Vec<(PortalId, RenderError)>,
}

impl FrameReport {
    /// Total virtual camera draws across all portals.
    pub fn passes(&self) -> usize {
        self.outcomes
            .values()
            .map(|o| match o {
                RenderOutcome::Rendered { passes } => *passes,
                _ => 0,
            })
            .sum()
    }

    pub fn rendered_portals(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, RenderOutcome::Rendered { .. }))
            .count()
    }
}

/// Runs crossing detection and the deferred portal pass at most once per
/// frame.
///
/// Any number of `request_render` calls within a frame collapse into a
/// single pass; `end_of_frame` runs it and clears the request.
pub struct FrameScheduler<B> {
    renderer: PortalRenderer<B>,
    pending: bool,
    frame: u64,
    crossings: Vec<Crossing>,
}

impl<B: RenderBackend> FrameScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            renderer: PortalRenderer::new(backend),
            pending: false,
            frame: 0,
            crossings: Vec::new(),
        }
    }

    pub fn renderer(&self) -> &PortalRenderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut PortalRenderer<B> {
        &mut self.renderer
    }

    pub fn backend(&self) -> &B {
        self.renderer.backend()
    }

    /// Number of completed passes.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Ask for a portal pass at the end of this frame. Returns `false` if one
    /// was already scheduled.
    pub fn request_render(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Per-frame update after scene logic: crossing detection for every
    /// tracked traveller, then a render request. Returns the crossing count.
    pub fn late_update(&mut self, scene: &mut Scene) -> usize {
        let crossings = scene.handle_all_travellers();
        let count = crossings.len();
        self.crossings.extend(crossings);
        self.request_render();
        count
    }

    /// Run the scheduled pass, if any.
    ///
    /// Every portal's pre-render runs before any portal renders, and every
    /// render finishes before any post-render. Capturing one portal rewrites
    /// slice offsets of the linked portal's travellers, so post-render must
    /// see all captures done.
    pub fn end_of_frame(&mut self, scene: &mut Scene, viewer: &Camera) -> Option<FrameReport> {
        if !self.pending {
            return None;
        }
        let _span = tracing::info_span!("portal_frame", frame = self.frame).entered();

        let mut report = FrameReport {
            frame: self.frame,
            crossings: std::mem::take(&mut self.crossings),
            ..FrameReport::default()
        };
        let ids = scene.portal_ids();

        for &id in &ids {
            if let Err(e) = self.renderer.pre_render(scene, id, viewer) {
                tracing::error!(portal = %id, error = %e, "pre-render failed");
                report.failures.push((id, e));
            }
        }

        for &id in &ids {
            match self.renderer.render(scene, id, viewer) {
                Ok(outcome) => {
                    report.outcomes.insert(id, outcome);
                }
                Err(e) => {
                    tracing::error!(portal = %id, error = %e, "portal render failed");
                    report.failures.push((id, e));
                }
            }
        }

        for &id in &ids {
            if let Err(e) = self.renderer.post_render(scene, id, viewer) {
                tracing::error!(portal = %id, error = %e, "post-render failed");
                report.failures.push((id, e));
            }
        }

        self.pending = false;
        self.frame += 1;
        tracing::debug!(
            frame = report.frame,
            passes = report.passes(),
            crossings = report.crossings.len(),
            failures = report.failures.len(),
            "portal pass complete"
        );
        Some(report)
    }

    /// `late_update` followed by `end_of_frame`.
    pub fn step(&mut self, scene: &mut Scene, viewer: &Camera) -> Option<FrameReport> {
        self.late_update(scene);
        self.end_of_frame(scene, viewer)
    }
}
