//! Portal kernel: authoritative portal and traveller state.
//!
//! # Invariants
//! - Portal links are symmetric: `link(a, b)` is the only way to set one.
//! - A traveller is tracked by at most one portal. A crossing removes it from
//!   the source portal and adds it to the destination in the same call.
//! - A traveller's clone is created once and only shown or hidden afterwards;
//!   it is dropped together with the traveller.
//! - Every state change appends a [`SceneEvent`].

mod config;
mod crossing;
mod error;
mod material;
mod portal;
mod scene;
mod slice;
mod tracker;
mod traveller;

pub use config::{
    GraphicsDescription, PortalDescription, PortalSettings, SceneDescription,
    TravellerDescription, ViewerDescription,
};
pub use crossing::Crossing;
pub use error::SceneError;
pub use material::{
    DISPLAY_MASK, MAIN_TEX, MaterialInstance, RenderTargetHandle, SLICE_CENTRE, SLICE_NORMAL,
    SLICE_OFFSET_DST, ScreenMaterial, SliceParams,
};
pub use portal::{Portal, RenderTarget, Screen, ShadowCasting};
pub use scene::{Scene, SceneEvent};
pub use slice::{HIDE_DST, SHOW_DST};
pub use traveller::{GraphicsClone, GraphicsObject, Traveller};

pub fn crate_info() -> &'static str {
    "portalspace-kernel v0.1.0"
}
