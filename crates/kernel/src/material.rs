use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Uniform names shared with the slicing shader.
pub const SLICE_CENTRE: &str = "sliceCentre";
pub const SLICE_NORMAL: &str = "sliceNormal";
pub const SLICE_OFFSET_DST: &str = "sliceOffsetDst";

/// Uniform names shared with the portal screen shader.
pub const MAIN_TEX: &str = "_MainTex";
pub const DISPLAY_MASK: &str = "displayMask";

/// Backend-issued handle of an off-screen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTargetHandle(pub u64);

/// Slice plane uniforms: geometry on the negative side of the plane through
/// `centre` (shifted by `offset_dst` along `normal`) is discarded.
///
/// A zero normal disables slicing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceParams {
    pub centre: Vec3,
    pub normal: Vec3,
    pub offset_dst: f32,
}

impl Default for SliceParams {
    fn default() -> Self {
        Self {
            centre: Vec3::ZERO,
            normal: Vec3::ZERO,
            offset_dst: 0.0,
        }
    }
}

/// Per-object material instance carrying slice uniforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialInstance {
    pub name: String,
    slice: SliceParams,
    /// Number of uniform writes since creation.
    revision: u64,
}

impl MaterialInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slice: SliceParams::default(),
            revision: 0,
        }
    }

    pub fn slice(&self) -> SliceParams {
        self.slice
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_slice_centre(&mut self, centre: Vec3) {
        self.slice.centre = centre;
        self.revision += 1;
    }

    pub fn set_slice_normal(&mut self, normal: Vec3) {
        self.slice.normal = normal;
        self.revision += 1;
    }

    pub fn set_slice_offset_dst(&mut self, dst: f32) {
        self.slice.offset_dst = dst;
        self.revision += 1;
    }

    pub fn set_slice(&mut self, slice: SliceParams) {
        self.set_slice_centre(slice.centre);
        self.set_slice_normal(slice.normal);
        self.set_slice_offset_dst(slice.offset_dst);
    }
}

/// Material of a portal screen: the captured view and whether to show it.
///
/// With `display_mask` off the shader draws a placeholder colour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenMaterial {
    pub main_tex: Option<RenderTargetHandle>,
    pub display_mask: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_material_has_slicing_disabled() {
        let m = MaterialInstance::new("body");
        assert_eq!(m.slice().normal, Vec3::ZERO);
        assert_eq!(m.revision(), 0);
    }

    #[test]
    fn writes_bump_revision() {
        let mut m = MaterialInstance::new("body");
        m.set_slice(SliceParams {
            centre: Vec3::ONE,
            normal: Vec3::Z,
            offset_dst: -0.5,
        });
        assert_eq!(m.revision(), 3);
        assert_eq!(m.slice().offset_dst, -0.5);
        m.set_slice_offset_dst(1000.0);
        assert_eq!(m.revision(), 4);
    }

    #[test]
    fn screen_material_starts_masked() {
        let s = ScreenMaterial::default();
        assert!(!s.display_mask);
        assert!(s.main_tex.is_none());
    }
}
