//! Shared identifiers and spatial types used by every portalspace crate.

mod types;

pub use types::{EntityId, PortalId, Transform};
