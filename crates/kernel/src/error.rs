use portalspace_common::{EntityId, PortalId};

/// Errors from scene construction and portal/traveller operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("portal {0} not found")]
    UnknownPortal(PortalId),
    #[error("traveller {0} not found")]
    UnknownTraveller(EntityId),
    #[error("portal {0} cannot be linked to itself")]
    SelfLink(PortalId),
    #[error("invalid portal settings: {0}")]
    InvalidSettings(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("portal '{portal}' links to unknown portal '{target}'")]
    UnknownLinkTarget { portal: String, target: String },
    #[error("portal '{portal}' links to '{target}', but '{target}' links to '{other}'")]
    ConflictingLink {
        portal: String,
        target: String,
        other: String,
    },
    #[error("unsupported scene file extension: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
