use portalspace_common::PortalId;
use portalspace_kernel::SceneError;

/// Errors raised while rendering portal views.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to allocate {width}x{height} render target: {reason}")]
    TargetAllocation {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("portal {0} not found")]
    UnknownPortal(PortalId),
    #[error(transparent)]
    Scene(#[from] SceneError),
}
