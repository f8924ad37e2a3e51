//! Threshold tracking: which travellers each portal is watching.

use portalspace_common::{EntityId, PortalId};

use crate::error::SceneError;
use crate::scene::{Scene, SceneEvent};

impl Scene {
    /// Overlap-enter signal from `portal`'s threshold volume.
    ///
    /// Returns `Ok(false)` when the traveller is already tracked by this portal
    /// or `traveller` is not a traveller at all. If another portal is still
    /// tracking it, tracking moves here.
    pub fn on_threshold_enter(
        &mut self,
        portal: PortalId,
        traveller: EntityId,
    ) -> Result<bool, SceneError> {
        let tracked = self
            .portal(portal)
            .ok_or(SceneError::UnknownPortal(portal))?
            .is_tracking(traveller);
        if tracked {
            tracing::debug!(portal = %portal, traveller = %traveller, "already tracked");
            return Ok(false);
        }
        let Some(previous) = self.traveller(traveller).map(|t| t.tracked_by) else {
            tracing::debug!(portal = %portal, entity = %traveller, "overlap from non-traveller ignored");
            return Ok(false);
        };

        if let Some(from) = previous {
            tracing::warn!(
                from = %from,
                to = %portal,
                traveller = %traveller,
                "traveller entered a second threshold, transferring tracking"
            );
            self.stop_tracking(from, traveller);
            self.events.push(SceneEvent::TrackingTransferred {
                from,
                to: portal,
                traveller,
            });
        }

        self.begin_tracking(portal, traveller);
        Ok(true)
    }

    /// Overlap-exit signal from `portal`'s threshold volume. Returns whether
    /// the traveller was being tracked.
    pub fn on_threshold_exit(
        &mut self,
        portal: PortalId,
        traveller: EntityId,
    ) -> Result<bool, SceneError> {
        let tracked = self
            .portal(portal)
            .ok_or(SceneError::UnknownPortal(portal))?
            .is_tracking(traveller);
        if !tracked {
            return Ok(false);
        }

        if let Some(t) = self.traveller_mut(traveller) {
            t.exit_threshold();
        }
        self.stop_tracking(portal, traveller);
        tracing::debug!(portal = %portal, traveller = %traveller, "left threshold");
        self.events.push(SceneEvent::ThresholdExited { portal, traveller });
        Ok(true)
    }

    /// Run the enter hook, capture the crossing baseline and add to the set.
    /// Both ids must exist.
    pub(crate) fn begin_tracking(&mut self, portal: PortalId, traveller: EntityId) {
        let Some(portal_position) = self.portal(portal).map(|p| p.position()) else {
            return;
        };
        let Some(t) = self.traveller_mut(traveller) else {
            return;
        };

        let clone_created = t.enter_threshold();
        t.previous_offset_from_portal = t.reference_point() - portal_position;
        t.tracked_by = Some(portal);

        if let Some(p) = self.portal_mut(portal) {
            p.tracked.push(traveller);
            tracing::debug!(portal = %portal, traveller = %traveller, count = p.tracked.len(), "tracking traveller");
        }
        if clone_created {
            self.events.push(SceneEvent::CloneCreated { traveller });
        }
        self.events.push(SceneEvent::ThresholdEntered { portal, traveller });
    }

    pub(crate) fn stop_tracking(&mut self, portal: PortalId, traveller: EntityId) {
        if let Some(p) = self.portal_mut(portal) {
            p.tracked.retain(|t| *t != traveller);
        }
        if let Some(t) = self.traveller_mut(traveller) {
            if t.tracked_by == Some(portal) {
                t.tracked_by = None;
            }
        }
    }
}
