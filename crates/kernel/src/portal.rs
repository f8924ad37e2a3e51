use glam::Vec3;
use portalspace_common::{EntityId, PortalId, Transform};
use portalspace_geometry::{Aabb, Camera, ClipPlaneSolver, Side, Surface, side_of_plane};
use serde::{Deserialize, Serialize};

use crate::config::PortalSettings;
use crate::material::{RenderTargetHandle, ScreenMaterial};

/// Shadow/geometry casting mode of a portal screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowCasting {
    /// Drawn normally.
    #[default]
    On,
    /// Invisible to cameras, still casts shadows. Used while capturing through
    /// the portal so the virtual camera sees past its own screen.
    ShadowsOnly,
}

/// Off-screen render target owned by one portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub handle: RenderTargetHandle,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    /// Whether the target was allocated at this size.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// The planar screen mesh of a portal, positioned relative to the portal.
///
/// `local.scale` holds width, height and thickness. The thickness is rewritten
/// every frame by [`Portal::protect_screen_from_clipping`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub local: Transform,
    pub mesh_bounds: Aabb,
    pub material: ScreenMaterial,
    pub shadow_casting: ShadowCasting,
}

impl Screen {
    /// Unit quad mesh scaled to `width` by `height`.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            local: Transform {
                scale: Vec3::new(width, height, 0.01),
                ..Transform::default()
            },
            mesh_bounds: Aabb::unit(),
            material: ScreenMaterial::default(),
            shadow_casting: ShadowCasting::On,
        }
    }

    /// Current screen depth along the portal forward axis.
    pub fn thickness(&self) -> f32 {
        self.local.scale.z
    }
}

/// A planar, rectangular portal with exactly one optional linked partner.
#[derive(Debug, Clone)]
pub struct Portal {
    id: PortalId,
    pub name: String,
    pub transform: Transform,
    pub screen: Screen,
    /// Virtual camera used only for capturing the view through this portal.
    pub camera: Camera,
    pub settings: PortalSettings,
    pub view_texture: Option<RenderTarget>,
    pub(crate) linked: Option<PortalId>,
    pub(crate) tracked: Vec<EntityId>,
}

impl Portal {
    /// New unlinked portal with default settings.
    pub fn new(name: impl Into<String>, transform: Transform, screen: Screen) -> Self {
        Self {
            id: PortalId::new(),
            name: name.into(),
            transform,
            screen,
            camera: Camera::default(),
            settings: PortalSettings::default(),
            view_texture: None,
            linked: None,
            tracked: Vec::new(),
        }
    }

    /// Replace the settings wholesale. Values are not validated here; a zero
    /// recursion limit is treated as one by the renderer.
    pub fn with_settings(mut self, settings: PortalSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Stable identifier.
    pub fn id(&self) -> PortalId {
        self.id
    }

    /// The partner portal, if linked.
    pub fn linked(&self) -> Option<PortalId> {
        self.linked
    }

    /// Travellers inside this portal's threshold, in entry order.
    pub fn tracked_travellers(&self) -> &[EntityId] {
        &self.tracked
    }

    /// Whether `traveller` is tracked by this portal.
    pub fn is_tracking(&self, traveller: EntityId) -> bool {
        self.tracked.contains(&traveller)
    }

    /// World position of the portal plane origin.
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Portal plane normal in world space.
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Side of the portal plane `point` lies on.
    pub fn side_of(&self, point: Vec3) -> Side {
        side_of_plane(point, self.transform.position, self.forward())
    }

    /// Whether both points lie on the same side of the portal plane.
    pub fn same_side(&self, a: Vec3, b: Vec3) -> bool {
        self.side_of(a) == self.side_of(b)
    }

    /// World transform of the screen mesh.
    pub fn screen_transform(&self) -> Transform {
        self.transform.mul_transform(&self.screen.local)
    }

    /// Screen mesh bounds with their world transform.
    pub fn screen_surface(&self) -> Surface {
        Surface {
            local_bounds: self.screen.mesh_bounds,
            local_to_world: self.transform.local_to_world() * self.screen.local.local_to_world(),
        }
    }

    /// Near-clip solver configured from this portal's settings.
    pub fn clip_solver(&self) -> ClipPlaneSolver {
        ClipPlaneSolver::new(self.settings.near_clip_offset, self.settings.near_clip_limit)
    }

    /// Give the screen enough depth that `viewer`'s near plane cannot poke
    /// through it from `view_point`, and push it away from the viewing side.
    /// Returns the thickness applied.
    pub fn protect_screen_from_clipping(&mut self, view_point: Vec3, viewer: &Camera) -> f32 {
        let thickness = viewer.near_plane_corner_distance();

        let facing_same_dir = self.forward().dot(self.transform.position - view_point) > 0.0;
        let shift = if facing_same_dir { 0.5 } else { -0.5 };
        self.screen.local.scale.z = thickness;
        self.screen.local.position = Vec3::Z * thickness * shift;

        thickness
    }
}
