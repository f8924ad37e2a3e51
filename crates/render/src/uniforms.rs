use bytemuck::{Pod, Zeroable};
use portalspace_kernel::{ScreenMaterial, SliceParams};

/// GPU layout of the slice plane uniforms (`sliceCentre`, `sliceNormal`,
/// `sliceOffsetDst`), padded to 16-byte rows.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SliceUniforms {
    pub centre: [f32; 3],
    pub offset_dst: f32,
    pub normal: [f32; 3],
    pub _pad: f32,
}

impl From<SliceParams> for SliceUniforms {
    fn from(p: SliceParams) -> Self {
        Self {
            centre: p.centre.to_array(),
            offset_dst: p.offset_dst,
            normal: p.normal.to_array(),
            _pad: 0.0,
        }
    }
}

impl SliceUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// GPU layout of a portal screen's `displayMask` flag.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct ScreenUniforms {
    pub display_mask: u32,
    pub _pad: [u32; 3],
}

impl From<&ScreenMaterial> for ScreenUniforms {
    fn from(m: &ScreenMaterial) -> Self {
        Self {
            display_mask: u32::from(m.display_mask),
            _pad: [0; 3],
        }
    }
}
