//! Portal settings and serde scene descriptions.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use glam::{EulerRot, Quat, Vec2, Vec3};
use portalspace_common::{PortalId, Transform};
use portalspace_geometry::Camera;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::material::MaterialInstance;
use crate::portal::{Portal, Screen};
use crate::scene::Scene;
use crate::traveller::{GraphicsObject, Traveller};

/// Per-portal tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    /// Maximum number of nested views rendered through the portal pair.
    pub recursion_limit: u32,
    /// Pushes the oblique near plane slightly past the portal surface.
    pub near_clip_offset: f32,
    /// Below this camera-space distance the oblique projection is not used.
    pub near_clip_limit: f32,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            recursion_limit: 5,
            near_clip_offset: 0.05,
            near_clip_limit: 0.2,
        }
    }
}

impl PortalSettings {
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.recursion_limit == 0 {
            return Err(SceneError::InvalidSettings(
                "recursion_limit must be at least 1".into(),
            ));
        }
        if !(self.near_clip_offset >= 0.0) {
            return Err(SceneError::InvalidSettings(format!(
                "near_clip_offset must be non-negative, got {}",
                self.near_clip_offset
            )));
        }
        if !(self.near_clip_limit >= 0.0) {
            return Err(SceneError::InvalidSettings(format!(
                "near_clip_limit must be non-negative, got {}",
                self.near_clip_limit
            )));
        }
        Ok(())
    }
}

/// Rotation from Euler angles in degrees, applied Z, then X, then Y.
pub(crate) fn euler_degrees(angles: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        angles.y.to_radians(),
        angles.x.to_radians(),
        angles.z.to_radians(),
    )
}

fn default_screen_size() -> Vec2 {
    Vec2::new(1.0, 2.0)
}

fn default_material_count() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalDescription {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    /// Screen width and height.
    #[serde(default = "default_screen_size")]
    pub screen: Vec2,
    /// Name of the partner portal. Only one side of a pair needs to set it.
    #[serde(default)]
    pub linked: Option<String>,
    #[serde(default)]
    pub settings: PortalSettings,
}

impl PortalDescription {
    pub fn transform(&self) -> Transform {
        Transform::from_position_rotation(self.position, euler_degrees(self.rotation))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsDescription {
    /// Number of material instances on the object.
    #[serde(default = "default_material_count")]
    pub materials: usize,
    /// Position of the graphics object relative to the traveller.
    #[serde(default)]
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravellerDescription {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    /// Local offset of the crossing reference point.
    #[serde(default)]
    pub crossing_reference: Option<Vec3>,
    #[serde(default)]
    pub graphics: Option<GraphicsDescription>,
    /// World-space velocity in units per second, used by simulations.
    #[serde(default)]
    pub velocity: Vec3,
}

impl TravellerDescription {
    pub fn build(&self) -> Traveller {
        let transform =
            Transform::from_position_rotation(self.position, euler_degrees(self.rotation));
        let mut traveller = Traveller::new(self.name.clone(), transform);
        if let Some(offset) = self.crossing_reference {
            traveller = traveller.with_crossing_reference(Transform::from_position(offset));
        }
        if let Some(graphics) = &self.graphics {
            let materials = (0..graphics.materials)
                .map(|i| MaterialInstance::new(format!("{}/{i}", self.name)))
                .collect();
            let mut object = GraphicsObject::new(materials);
            object.local.position = graphics.offset;
            traveller = traveller.with_graphics(object);
        }
        traveller
    }
}

/// The external viewing camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerDescription {
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ViewerDescription {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            fov_degrees: 60.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl ViewerDescription {
    pub fn camera(&self) -> Camera {
        let mut camera = Camera::new(Transform::from_position_rotation(
            self.position,
            euler_degrees(self.rotation),
        ));
        camera.fov = self.fov_degrees.to_radians();
        camera.aspect = self.aspect;
        camera.near = self.near;
        camera.far = self.far;
        camera
    }
}

fn default_resolution() -> [u32; 2] {
    [1920, 1080]
}

/// A complete scene: portals, travellers, the viewer and output resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub viewer: ViewerDescription,
    #[serde(default)]
    pub portals: Vec<PortalDescription>,
    #[serde(default)]
    pub travellers: Vec<TravellerDescription>,
}

impl SceneDescription {
    pub fn from_yaml_str(text: &str) -> Result<Self, SceneError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a description, choosing the format from the file extension
    /// (`.yaml`, `.yml` or `.json`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => {
                let file = std::fs::File::open(path)?;
                Ok(serde_yaml::from_reader(file)?)
            }
            "json" => {
                let file = std::fs::File::open(path)?;
                Ok(serde_json::from_reader(file)?)
            }
            _ => Err(SceneError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Check names, links and settings without building a scene.
    pub fn validate(&self) -> Result<(), SceneError> {
        let mut names = BTreeSet::new();
        for portal in &self.portals {
            portal.settings.validate()?;
            if !names.insert(portal.name.as_str()) {
                return Err(SceneError::DuplicateName(portal.name.clone()));
            }
        }
        let mut traveller_names = BTreeSet::new();
        for traveller in &self.travellers {
            if !traveller_names.insert(traveller.name.as_str()) {
                return Err(SceneError::DuplicateName(traveller.name.clone()));
            }
        }

        let links: BTreeMap<&str, Option<&str>> = self
            .portals
            .iter()
            .map(|p| (p.name.as_str(), p.linked.as_deref()))
            .collect();
        // Partner each portal ends up with once its link is applied.
        let mut claimed: BTreeMap<&str, &str> = BTreeMap::new();
        for (&name, &target) in &links {
            let Some(target) = target else {
                continue;
            };
            if target == name {
                return Err(SceneError::InvalidSettings(format!(
                    "portal '{name}' is linked to itself"
                )));
            }
            let Some(&back) = links.get(target) else {
                return Err(SceneError::UnknownLinkTarget {
                    portal: name.into(),
                    target: target.into(),
                });
            };
            if let Some(other) = back {
                if other != name {
                    return Err(SceneError::ConflictingLink {
                        portal: name.into(),
                        target: target.into(),
                        other: other.into(),
                    });
                }
            }
            for (end, partner) in [(target, name), (name, target)] {
                match claimed.get(end).copied() {
                    Some(other) if other != partner => {
                        return Err(SceneError::ConflictingLink {
                            portal: partner.into(),
                            target: end.into(),
                            other: other.into(),
                        });
                    }
                    _ => {
                        claimed.insert(end, partner);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Scene {
    /// Build a scene from a description. Links are made through
    /// [`Scene::link`], so a one-sided `linked` entry produces a symmetric pair.
    pub fn from_description(description: &SceneDescription) -> Result<Self, SceneError> {
        description.validate()?;

        let mut scene = Scene::new();
        let mut ids: BTreeMap<&str, PortalId> = BTreeMap::new();
        for portal in &description.portals {
            let screen = Screen::new(portal.screen.x, portal.screen.y);
            let id = scene.add_portal(
                Portal::new(portal.name.clone(), portal.transform(), screen)
                    .with_settings(portal.settings),
            );
            ids.insert(portal.name.as_str(), id);
        }

        for portal in &description.portals {
            let (Some(&a), Some(target)) = (ids.get(portal.name.as_str()), portal.linked.as_deref())
            else {
                continue;
            };
            let Some(&b) = ids.get(target) else {
                continue;
            };
            if scene.portal(a).and_then(Portal::linked) != Some(b) {
                scene.link(a, b)?;
            }
        }
        for portal in scene.portals().values() {
            if portal.linked().is_none() {
                tracing::warn!(portal = %portal.id(), name = %portal.name, "portal has no linked partner");
            }
        }

        for traveller in &description.travellers {
            scene.add_traveller(traveller.build());
        }

        tracing::info!(
            portals = scene.portal_count(),
            travellers = scene.traveller_count(),
            "scene built"
        );
        Ok(scene)
    }
}
