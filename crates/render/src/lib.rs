//! Portal rendering: recursive virtual-camera capture through linked
//! portals, behind a backend-agnostic trait.
//!
//! # Invariants
//! - A portal issues at most `recursion_limit` draws per frame.
//! - Capture runs deepest level first; the linked screen shows a placeholder
//!   until the deepest pass has landed.
//! - All pre-render work for all portals finishes before any portal renders.
//! - The deferred pass runs at most once per frame.

mod backend;
mod error;
mod renderer;
mod scheduler;
mod uniforms;

pub use backend::{DebugBackend, DrawCall, RenderBackend};
pub use error::RenderError;
pub use renderer::{PortalRenderer, RenderOutcome, view_poses};
pub use scheduler::{FrameReport, FrameScheduler};
pub use uniforms::{ScreenUniforms, SliceUniforms};

pub fn crate_info() -> &'static str {
    "portalspace-render v0.1.0"
}
