use portalspace_common::{EntityId, PortalId};
use portalspace_kernel::Scene;

/// Scene inspector for developer tooling.
///
/// Read-only queries over portals, tracked travellers and their clones.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &Scene) -> SceneSummary {
        let portals = scene.portals();
        let linked = portals.values().filter(|p| p.linked().is_some()).count();
        let clones: Vec<bool> = scene
            .travellers()
            .values()
            .filter_map(|t| t.graphics_clone().map(|c| c.active))
            .collect();
        SceneSummary {
            portal_count: portals.len(),
            linked_pairs: linked / 2,
            traveller_count: scene.traveller_count(),
            tracked_count: portals.values().map(|p| p.tracked_travellers().len()).sum(),
            clone_count: clones.len(),
            active_clones: clones.iter().filter(|active| **active).count(),
            pending_events: scene.events().len(),
        }
    }

    pub fn inspect_portal(scene: &Scene, id: PortalId) -> Option<PortalInfo> {
        let portal = scene.portal(id)?;
        Some(PortalInfo {
            id,
            name: portal.name.clone(),
            position: portal.position().to_array(),
            forward: portal.forward().to_array(),
            linked: scene.linked_portal(id).map(|l| l.name.clone()),
            tracked: portal
                .tracked_travellers()
                .iter()
                .filter_map(|t| scene.traveller(*t).map(|t| t.name.clone()))
                .collect(),
            recursion_limit: portal.settings.recursion_limit,
            view_texture: portal.view_texture.map(|t| (t.width, t.height)),
            display_mask: portal.screen.material.display_mask,
            screen_thickness: portal.screen.thickness(),
        })
    }

    pub fn inspect_traveller(scene: &Scene, id: EntityId) -> Option<TravellerInfo> {
        let traveller = scene.traveller(id)?;
        Some(TravellerInfo {
            id,
            name: traveller.name.clone(),
            position: traveller.transform.position.to_array(),
            tracked_by: traveller
                .tracked_by()
                .and_then(|p| scene.portal(p))
                .map(|p| p.name.clone()),
            clone_active: traveller.graphics_clone().map(|c| c.active),
            material_count: traveller.graphics.as_ref().map_or(0, |g| g.materials.len()),
        })
    }

    /// Portal ids in processing order.
    pub fn list_portals(scene: &Scene) -> Vec<PortalId> {
        scene.portal_ids()
    }

    pub fn list_travellers(scene: &Scene) -> Vec<EntityId> {
        scene.travellers().keys().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub portal_count: usize,
    pub linked_pairs: usize,
    pub traveller_count: usize,
    pub tracked_count: usize,
    pub clone_count: usize,
    pub active_clones: usize,
    pub pending_events: usize,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene: portals={} pairs={} travellers={} tracked={} clones={} (active {}) pending_events={}",
            self.portal_count,
            self.linked_pairs,
            self.traveller_count,
            self.tracked_count,
            self.clone_count,
            self.active_clones,
            self.pending_events
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortalInfo {
    pub id: PortalId,
    pub name: String,
    pub position: [f32; 3],
    pub forward: [f32; 3],
    pub linked: Option<String>,
    /// Names of tracked travellers, in entry order.
    pub tracked: Vec<String>,
    pub recursion_limit: u32,
    pub view_texture: Option<(u32, u32)>,
    pub display_mask: bool,
    pub screen_thickness: f32,
}

impl std::fmt::Display for PortalInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Portal [{}] '{}' pos=({:.2}, {:.2}, {:.2}) fwd=({:.2}, {:.2}, {:.2}) -> {} tracked=[{}] limit={}",
            self.id,
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
            self.forward[0],
            self.forward[1],
            self.forward[2],
            self.linked.as_deref().unwrap_or("(unlinked)"),
            self.tracked.join(", "),
            self.recursion_limit,
        )?;
        if let Some((w, h)) = self.view_texture {
            write!(f, " texture={w}x{h}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TravellerInfo {
    pub id: EntityId,
    pub name: String,
    pub position: [f32; 3],
    pub tracked_by: Option<String>,
    /// `None` until the first threshold entry creates a clone.
    pub clone_active: Option<bool>,
    pub material_count: usize,
}

impl std::fmt::Display for TravellerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clone = match self.clone_active {
            None => "none",
            Some(true) => "active",
            Some(false) => "hidden",
        };
        write!(
            f,
            "Traveller [{}] '{}' pos=({:.2}, {:.2}, {:.2}) portal={} clone={} materials={}",
            self.id,
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
            self.tracked_by.as_deref().unwrap_or("-"),
            clone,
            self.material_count
        )
    }
}
