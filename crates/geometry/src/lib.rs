//! Geometry helpers shared by portal traversal and portal rendering.
//!
//! # Invariants
//! - Every function here is pure: no scene state is read or written.
//! - Projections follow the right-handed, `[0, 1]` depth convention of
//!   `glam::Mat4::perspective_rh`.

mod bounds;
mod camera;
mod clip;
mod plane;

pub use bounds::{Aabb, Frustum, ScreenRect, Surface, bounds_overlap_in_frustum, visible_from_camera};
pub use camera::Camera;
pub use clip::{ClipPlaneSolver, ClipSolution, oblique_projection};
pub use plane::{Side, same_side, side_of_plane};
