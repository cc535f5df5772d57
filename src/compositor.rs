//! Contract to the surface primitive
//!
//! The generic `wl_surface` machinery (buffer management, double-buffered
//! state, roles) lives in the embedding compositor. The shell only needs
//! the few queries below, plus the commit and destruction notifications
//! routed into [`surface_commit`](crate::shell::surface_commit) and
//! [`base_surface_destroyed`](crate::shell::base_surface_destroyed).

use crate::protocol::{ClientId, SurfaceId};
use crate::utils::{Logical, Point, Size};

/// The role string assigned to toplevel surfaces
pub const XDG_TOPLEVEL_ROLE: &str = "xdg_toplevel";

/// The role string assigned to popup surfaces
pub const XDG_POPUP_ROLE: &str = "xdg_popup";

/// The surface already has a role and cannot be given another one
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("surface already has a role")]
pub struct AlreadyHasRole;

/// Access to the compositor's surface primitive
pub trait CompositorHandler {
    /// Does the surface currently have a committed buffer?
    fn surface_has_buffer(&mut self, surface: SurfaceId) -> bool;

    /// Dimensions of the surface's current buffer, in logical coordinates
    ///
    /// `(0, 0)` if no buffer was committed yet.
    fn surface_size(&mut self, surface: SurfaceId) -> Size<i32, Logical>;

    /// Does the surface's input region accept input at this surface-local point?
    fn surface_accepts_input(&mut self, surface: SurfaceId, point: Point<f64, Logical>) -> bool;

    /// The client owning the surface, if it is still alive
    fn surface_client(&mut self, surface: SurfaceId) -> Option<ClientId>;

    /// Assign a role to the surface
    ///
    /// A surface can hold at most one role over its lifetime, a second
    /// assignment fails even with an equal role string.
    fn give_role(&mut self, surface: SurfaceId, role: &'static str) -> Result<(), AlreadyHasRole>;
}
