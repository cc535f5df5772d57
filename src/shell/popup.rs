use crate::protocol::{SeatId, SurfaceId};
use crate::utils::{Logical, Point, Rectangle};

use super::surface::Role;
use super::{XdgShellHandler, XdgShellState};

/// Role data of a popup surface
#[derive(Debug)]
pub(crate) struct XdgPopup {
    /// The surface this popup was created over
    pub(crate) parent: SurfaceId,
    /// Placement computed from the positioner, relative to the parent's
    /// window geometry
    pub(crate) geometry: Rectangle<i32, Logical>,
    /// The popup received its first commit and is mapped
    pub(crate) committed: bool,
    /// The seat holding this popup's grab, if any
    pub(crate) seat: Option<SeatId>,
}

impl<D: XdgShellHandler> XdgShellState<D> {
    /// The parent surface of a popup
    pub fn popup_parent(&self, surface: SurfaceId) -> Option<SurfaceId> {
        match self.surfaces.get(&surface).map(|entry| &entry.role) {
            Some(Role::Popup(popup)) => Some(popup.parent),
            _ => None,
        }
    }

    /// The placement of a popup relative to its parent's window geometry
    pub fn popup_geometry(&self, surface: SurfaceId) -> Option<Rectangle<i32, Logical>> {
        match self.surfaces.get(&surface).map(|entry| &entry.role) {
            Some(Role::Popup(popup)) => Some(popup.geometry),
            _ => None,
        }
    }

    /// Position of a popup's surface relative to its parent's surface
    ///
    /// Window geometries on both sides are already factored in, the
    /// result can be used directly for rendering and input routing.
    pub fn popup_position(&self, surface: SurfaceId) -> Option<Point<f64, Logical>> {
        let entry = self.surfaces.get(&surface)?;
        let Role::Popup(popup) = &entry.role else {
            return None;
        };
        let parent = self.surfaces.get(&popup.parent)?;

        Some(
            (parent.geometry.loc + popup.geometry.loc - entry.geometry.loc)
                .to_f64(),
        )
    }
}

/// Find the topmost popup of a surface tree at the given position
///
/// `position` is in the coordinate space of `surface`. Descends into
/// nested popups (they stack above their parents), hit-testing against
/// each popup's input region. Returns the popup together with the
/// position of its surface origin relative to `surface`.
pub fn popup_at<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    position: Point<f64, Logical>,
) -> Option<(SurfaceId, Point<f64, Logical>)> {
    let (children, surface_geometry) = {
        let entry = data.xdg_shell_state().surfaces.get(&surface)?;
        (entry.popups.clone(), entry.geometry)
    };

    for child in children {
        let (child_geometry, popup_geometry) = {
            let shell = data.xdg_shell_state();
            let Some(entry) = shell.surfaces.get(&child) else {
                continue;
            };
            let Role::Popup(popup) = &entry.role else {
                continue;
            };
            (entry.geometry, popup.geometry)
        };

        let popup_loc = (surface_geometry.loc + popup_geometry.loc).to_f64();
        let child_loc = child_geometry.loc.to_f64();

        // nested popups stack above this one, check them first
        let local = Point::from((
            position.x - popup_loc.x + child_loc.x,
            position.y - popup_loc.y + child_loc.y,
        ));
        if let Some((found, at)) = popup_at(data, child, local) {
            return Some((
                found,
                Point::from((at.x + popup_loc.x - child_loc.x, at.y + popup_loc.y - child_loc.y)),
            ));
        }

        let size = popup_geometry.size.to_f64();
        if position.x > popup_loc.x
            && position.x < popup_loc.x + size.w
            && position.y > popup_loc.y
            && position.y < popup_loc.y + size.h
            && data.surface_accepts_input(child, local)
        {
            return Some((
                child,
                Point::from((popup_loc.x - child_loc.x, popup_loc.y - child_loc.y)),
            ));
        }
    }

    None
}
