use glam::Vec3;
use portalspace_common::{EntityId, PortalId, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SceneError;
use crate::portal::Portal;
use crate::traveller::Traveller;

/// An event record produced by every mutation of portal or traveller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    PortalAdded { portal: PortalId },
    /// Both portals now reference each other.
    PortalsLinked { a: PortalId, b: PortalId },
    /// `portal` lost its partner because `former` was linked elsewhere or unlinked.
    PortalUnlinked { portal: PortalId, former: PortalId },
    TravellerAdded { traveller: EntityId },
    /// Traveller removed from the scene; its clone is dropped with it.
    TravellerRemoved { traveller: EntityId },
    ThresholdEntered { portal: PortalId, traveller: EntityId },
    ThresholdExited { portal: PortalId, traveller: EntityId },
    /// An enter signal from `to` arrived while `from` was still tracking.
    TrackingTransferred {
        from: PortalId,
        to: PortalId,
        traveller: EntityId,
    },
    CloneCreated { traveller: EntityId },
    Teleported {
        traveller: EntityId,
        from: PortalId,
        to: PortalId,
        before: Transform,
        after: Transform,
    },
}

/// Authoritative portal and traveller state.
///
/// Uses BTreeMap so every per-frame pass visits portals in a fixed order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    portals: BTreeMap<PortalId, Portal>,
    travellers: BTreeMap<EntityId, Traveller>,
    pub(crate) events: Vec<SceneEvent>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a portal and return its id. The portal starts unlinked.
    pub fn add_portal(&mut self, portal: Portal) -> PortalId {
        let id = portal.id();
        self.portals.insert(id, portal);
        self.events.push(SceneEvent::PortalAdded { portal: id });
        id
    }

    /// Insert a traveller and return its id.
    pub fn add_traveller(&mut self, traveller: Traveller) -> EntityId {
        let id = traveller.id();
        self.travellers.insert(id, traveller);
        self.events.push(SceneEvent::TravellerAdded { traveller: id });
        id
    }

    /// Remove a traveller, dropping its clone and any tracking entry.
    pub fn remove_traveller(&mut self, id: EntityId) -> Option<Traveller> {
        let traveller = self.travellers.remove(&id)?;
        if let Some(portal) = traveller.tracked_by.and_then(|p| self.portals.get_mut(&p)) {
            portal.tracked.retain(|t| *t != id);
        }
        self.events.push(SceneEvent::TravellerRemoved { traveller: id });
        Some(traveller)
    }

    /// Link two portals to each other, breaking any previous links either had.
    pub fn link(&mut self, a: PortalId, b: PortalId) -> Result<(), SceneError> {
        if a == b {
            return Err(SceneError::SelfLink(a));
        }
        for id in [a, b] {
            if !self.portals.contains_key(&id) {
                return Err(SceneError::UnknownPortal(id));
            }
        }

        for (id, partner) in [(a, b), (b, a)] {
            if let Some(previous) = self.portal(id).and_then(Portal::linked) {
                if previous != partner {
                    self.unlink(id);
                }
            }
        }

        if let Some(portal) = self.portals.get_mut(&a) {
            portal.linked = Some(b);
        }
        if let Some(portal) = self.portals.get_mut(&b) {
            portal.linked = Some(a);
        }
        tracing::info!(a = %a, b = %b, "portals linked");
        self.events.push(SceneEvent::PortalsLinked { a, b });
        Ok(())
    }

    /// Break the link of `id` and of its partner. Returns the former partner.
    pub fn unlink(&mut self, id: PortalId) -> Option<PortalId> {
        let former = self.portals.get_mut(&id)?.linked.take()?;
        if let Some(partner) = self.portals.get_mut(&former) {
            partner.linked = None;
        }
        tracing::debug!(portal = %id, former = %former, "portal unlinked");
        self.events.push(SceneEvent::PortalUnlinked { portal: id, former });
        self.events.push(SceneEvent::PortalUnlinked {
            portal: former,
            former: id,
        });
        Some(former)
    }

    /// Look up a portal by id.
    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(&id)
    }

    /// Mutable portal lookup.
    pub fn portal_mut(&mut self, id: PortalId) -> Option<&mut Portal> {
        self.portals.get_mut(&id)
    }

    /// First portal with the given name.
    pub fn portal_by_name(&self, name: &str) -> Option<&Portal> {
        self.portals.values().find(|p| p.name == name)
    }

    /// Look up a traveller by id.
    pub fn traveller(&self, id: EntityId) -> Option<&Traveller> {
        self.travellers.get(&id)
    }

    /// Mutable traveller lookup.
    pub fn traveller_mut(&mut self, id: EntityId) -> Option<&mut Traveller> {
        self.travellers.get_mut(&id)
    }

    /// Move a traveller by `delta`, as game logic would between frames.
    /// Returns the new position.
    pub fn translate_traveller(&mut self, id: EntityId, delta: Vec3) -> Result<Vec3, SceneError> {
        let traveller = self
            .travellers
            .get_mut(&id)
            .ok_or(SceneError::UnknownTraveller(id))?;
        traveller.transform.position += delta;
        Ok(traveller.transform.position)
    }

    /// First traveller with the given name.
    pub fn traveller_by_name(&self, name: &str) -> Option<&Traveller> {
        self.travellers.values().find(|t| t.name == name)
    }

    /// All portals, ordered by id.
    pub fn portals(&self) -> &BTreeMap<PortalId, Portal> {
        &self.portals
    }

    /// All travellers, ordered by id.
    pub fn travellers(&self) -> &BTreeMap<EntityId, Traveller> {
        &self.travellers
    }

    /// Portal ids in processing order.
    pub fn portal_ids(&self) -> Vec<PortalId> {
        self.portals.keys().copied().collect()
    }

    /// Number of portals.
    pub fn portal_count(&self) -> usize {
        self.portals.len()
    }

    /// Number of travellers.
    pub fn traveller_count(&self) -> usize {
        self.travellers.len()
    }

    /// The linked partner of `id`, if both exist.
    pub fn linked_portal(&self, id: PortalId) -> Option<&Portal> {
        self.portal(id)?.linked().and_then(|l| self.portal(l))
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }
}
