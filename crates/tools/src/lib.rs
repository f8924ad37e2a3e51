//! Developer tooling: read-only inspection of portal scenes.
//!
//! # Invariants
//! - Tools never mutate scene state.

mod inspector;

pub use inspector::{PortalInfo, SceneInspector, SceneSummary, TravellerInfo};

pub fn crate_info() -> &'static str {
    "portalspace-tools v0.1.0"
}
