//! Entry points for the wire dispatcher
//!
//! One function per protocol interface, taking the compositor state and
//! the parsed request. A returned [`ProtocolError`] means the client
//! violated the protocol; the dispatcher posts the code on the offending
//! resource and disconnects the client. The handler has already
//! discarded any other effect of the violating request.

use tracing::debug;

use crate::compositor::{XDG_POPUP_ROLE, XDG_TOPLEVEL_ROLE};
use crate::protocol::{
    xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base, ClientId, PositionerId,
    ProtocolError, SeatId, SurfaceId,
};
use crate::utils::{Rectangle, Serial};

use super::grab::popup_grab;
use super::popup::XdgPopup;
use super::positioner::PositionerState;
use super::surface::{destroy_surface, Role, XdgSurface};
use super::toplevel::{ToplevelState, XdgToplevel};
use super::{ShellClient, XdgShellHandler};

/// Register a client that bound the `xdg_wm_base` global
pub fn client_connected<D: XdgShellHandler>(data: &mut D, client: ClientId) {
    data.xdg_shell_state()
        .clients
        .entry(client)
        .or_insert_with(ShellClient::default);
}

/// Tear down everything a disconnected client left behind
///
/// Destroys all of the client's surfaces and disarms its ping timer.
pub fn client_disconnected<D: XdgShellHandler>(data: &mut D, client: ClientId) {
    let surfaces = data
        .xdg_shell_state()
        .clients
        .get(&client)
        .map(|state| state.surfaces.clone())
        .unwrap_or_default();
    for surface in surfaces {
        // errors are moot, the connection is going away
        let _ = destroy_surface(data, surface);
    }

    let shell = data.xdg_shell_state();
    if let Some(state) = shell.clients.remove(&client) {
        if let Some(token) = state.ping_timer {
            shell.loop_handle.remove(token);
        }
    }
}

/// Handle a request on the `xdg_wm_base` interface
pub fn wm_base_request<D: XdgShellHandler>(
    data: &mut D,
    client: ClientId,
    request: xdg_wm_base::Request,
) -> Result<(), ProtocolError> {
    match request {
        xdg_wm_base::Request::Destroy => {
            client_disconnected(data, client);
            Ok(())
        }
        xdg_wm_base::Request::CreatePositioner { id } => {
            data.xdg_shell_state()
                .positioners
                .insert(id, PositionerState::default());
            Ok(())
        }
        xdg_wm_base::Request::GetXdgSurface { surface } => get_xdg_surface(data, client, surface),
        xdg_wm_base::Request::Pong { serial } => {
            data.xdg_shell_state().pong(client, serial);
            Ok(())
        }
    }
}

fn get_xdg_surface<D: XdgShellHandler>(
    data: &mut D,
    client: ClientId,
    surface: SurfaceId,
) -> Result<(), ProtocolError> {
    if data.surface_has_buffer(surface) {
        return Err(ProtocolError::surface(
            xdg_surface::Error::UnconfiguredBuffer,
            "xdg_surface must not have a buffer at creation",
        ));
    }

    let shell = data.xdg_shell_state();
    if shell.surfaces.contains_key(&surface) {
        return Err(ProtocolError::surface(
            xdg_surface::Error::AlreadyConstructed,
            "wl_surface already has an xdg_surface",
        ));
    }

    shell
        .clients
        .entry(client)
        .or_insert_with(ShellClient::default)
        .surfaces
        .push(surface);
    shell.surfaces.insert(surface, XdgSurface::new(client));
    debug!(surface = surface.0, "new xdg_surface");
    Ok(())
}

/// Handle a request on an `xdg_positioner` object
pub fn positioner_request<D: XdgShellHandler>(
    data: &mut D,
    positioner: PositionerId,
    request: xdg_positioner::Request,
) -> Result<(), ProtocolError> {
    let shell = data.xdg_shell_state();
    match request {
        xdg_positioner::Request::Destroy => {
            shell.positioners.remove(&positioner);
            Ok(())
        }
        request => {
            let Some(state) = shell.positioners.get_mut(&positioner) else {
                return Ok(());
            };
            match request {
                xdg_positioner::Request::SetSize { width, height } => {
                    state.set_size(width, height)
                }
                xdg_positioner::Request::SetAnchorRect {
                    x,
                    y,
                    width,
                    height,
                } => state.set_anchor_rect(x, y, width, height),
                xdg_positioner::Request::SetAnchor { anchor } => state.set_anchor(anchor),
                xdg_positioner::Request::SetGravity { gravity } => state.set_gravity(gravity),
                xdg_positioner::Request::SetConstraintAdjustment {
                    constraint_adjustment,
                } => {
                    state.set_constraint_adjustment(constraint_adjustment);
                    Ok(())
                }
                xdg_positioner::Request::SetOffset { x, y } => {
                    state.set_offset(x, y);
                    Ok(())
                }
                xdg_positioner::Request::Destroy => unreachable!(),
            }
        }
    }
}

/// Handle a request on an `xdg_surface` object
pub fn xdg_surface_request<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    request: xdg_surface::Request,
) -> Result<(), ProtocolError> {
    match request {
        xdg_surface::Request::Destroy => destroy_surface(data, surface),
        xdg_surface::Request::GetToplevel => get_toplevel(data, surface),
        xdg_surface::Request::GetPopup { parent, positioner } => {
            get_popup(data, surface, parent, positioner)
        }
        xdg_surface::Request::SetWindowGeometry {
            x,
            y,
            width,
            height,
        } => {
            let shell = data.xdg_shell_state();
            let Some(entry) = shell.surfaces.get_mut(&surface) else {
                return Ok(());
            };
            if entry.role.is_none() {
                return Err(ProtocolError::surface(
                    xdg_surface::Error::NotConstructed,
                    "xdg_surface must have a role",
                ));
            }
            entry.next_geometry = Some(Rectangle::new((x, y).into(), (width, height).into()));
            Ok(())
        }
        xdg_surface::Request::AckConfigure { serial } => {
            data.xdg_shell_state().ack_configure(surface, serial)
        }
    }
}

fn get_toplevel<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
) -> Result<(), ProtocolError> {
    {
        let shell = data.xdg_shell_state();
        let Some(entry) = shell.surfaces.get(&surface) else {
            return Ok(());
        };
        if !entry.role.is_none() {
            return Err(ProtocolError::wm_base(
                xdg_wm_base::Error::Role,
                "Surface already has a role.",
            ));
        }
    }

    if data.give_role(surface, XDG_TOPLEVEL_ROLE).is_err() {
        return Err(ProtocolError::wm_base(
            xdg_wm_base::Error::Role,
            "Surface already has a role.",
        ));
    }

    if let Some(entry) = data.xdg_shell_state().surfaces.get_mut(&surface) {
        entry.role = Role::Toplevel(XdgToplevel::default());
    }
    Ok(())
}

fn get_popup<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    parent: SurfaceId,
    positioner: PositionerId,
) -> Result<(), ProtocolError> {
    let positioner_state = {
        let shell = data.xdg_shell_state();
        shell.positioners.get(&positioner).copied()
    };
    let positioner_state = positioner_state.filter(|state| state.is_complete());
    let Some(positioner_state) = positioner_state else {
        return Err(ProtocolError::wm_base(
            xdg_wm_base::Error::InvalidPositioner,
            "positioner object is not complete",
        ));
    };

    {
        let shell = data.xdg_shell_state();
        let Some(entry) = shell.surfaces.get(&surface) else {
            return Ok(());
        };
        if !entry.role.is_none() {
            return Err(ProtocolError::wm_base(
                xdg_wm_base::Error::Role,
                "Surface already has a role.",
            ));
        }
        if !shell.surfaces.contains_key(&parent) {
            return Err(ProtocolError::wm_base(
                xdg_wm_base::Error::InvalidPopupParent,
                "parent is not an xdg_surface",
            ));
        }
    }

    if data.give_role(surface, XDG_POPUP_ROLE).is_err() {
        return Err(ProtocolError::wm_base(
            xdg_wm_base::Error::Role,
            "Surface already has a role.",
        ));
    }

    let geometry = positioner_state.get_geometry();
    let geometry = data.constrain_popup_geometry(surface, &positioner_state, geometry);

    let shell = data.xdg_shell_state();
    if let Some(entry) = shell.surfaces.get_mut(&surface) {
        entry.role = Role::Popup(XdgPopup {
            parent,
            geometry,
            committed: false,
            seat: None,
        });
    }
    if let Some(parent_entry) = shell.surfaces.get_mut(&parent) {
        parent_entry.popups.insert(0, surface);
    }

    data.new_popup(surface);
    Ok(())
}

/// Handle a request on an `xdg_toplevel` object
pub fn toplevel_request<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    request: xdg_toplevel::Request,
) -> Result<(), ProtocolError> {
    match request {
        xdg_toplevel::Request::Destroy => return destroy_surface(data, surface),
        xdg_toplevel::Request::SetParent { parent } => {
            with_toplevel(data, surface, |state| state.parent = parent);
        }
        xdg_toplevel::Request::SetTitle { title } => {
            if let Some(entry) = data.xdg_shell_state().surfaces.get_mut(&surface) {
                entry.title = Some(title);
            }
        }
        xdg_toplevel::Request::SetAppId { app_id } => {
            if let Some(entry) = data.xdg_shell_state().surfaces.get_mut(&surface) {
                entry.app_id = Some(app_id);
            }
        }
        xdg_toplevel::Request::ShowWindowMenu { seat, serial, x, y } => {
            if validated_grab_request(data, surface, seat, serial)? {
                data.request_show_window_menu(surface, seat, serial, (x, y).into());
            }
        }
        xdg_toplevel::Request::Move { seat, serial } => {
            if validated_grab_request(data, surface, seat, serial)? {
                data.request_move(surface, seat, serial);
            }
        }
        xdg_toplevel::Request::Resize {
            seat,
            serial,
            edges,
        } => match xdg_toplevel::ResizeEdge::from_raw(edges) {
            Some(edges) => {
                if validated_grab_request(data, surface, seat, serial)? {
                    data.request_resize(surface, seat, serial, edges);
                }
            }
            None => debug!(edges, "ignoring resize with invalid edges"),
        },
        xdg_toplevel::Request::SetMaxSize { width, height } => {
            with_toplevel(data, surface, |state| {
                state.max_size = (width, height).into()
            });
        }
        xdg_toplevel::Request::SetMinSize { width, height } => {
            with_toplevel(data, surface, |state| {
                state.min_size = (width, height).into()
            });
        }
        xdg_toplevel::Request::SetMaximized => {
            if with_toplevel(data, surface, |state| state.maximized = true) {
                data.request_maximize(surface);
            }
        }
        xdg_toplevel::Request::UnsetMaximized => {
            if with_toplevel(data, surface, |state| state.maximized = false) {
                data.request_maximize(surface);
            }
        }
        xdg_toplevel::Request::SetFullscreen { output } => {
            if with_toplevel(data, surface, |state| state.fullscreen = true) {
                data.request_fullscreen(surface, true, output);
            }
        }
        xdg_toplevel::Request::UnsetFullscreen => {
            if with_toplevel(data, surface, |state| state.fullscreen = false) {
                data.request_fullscreen(surface, false, None);
            }
        }
        xdg_toplevel::Request::SetMinimized => {
            data.request_minimize(surface);
        }
    }
    Ok(())
}

/// Handle a request on an `xdg_popup` object
pub fn popup_request<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    request: xdg_popup::Request,
) -> Result<(), ProtocolError> {
    match request {
        xdg_popup::Request::Destroy => destroy_surface(data, surface),
        xdg_popup::Request::Grab { seat, serial } => popup_grab(data, surface, seat, serial),
    }
}

/// Mutate the client-side pending (`next`) state of a toplevel
///
/// Returns whether the surface exists and carries the toplevel role.
fn with_toplevel<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    f: impl FnOnce(&mut ToplevelState),
) -> bool {
    match data
        .xdg_shell_state()
        .surfaces
        .get_mut(&surface)
        .map(|entry| &mut entry.role)
    {
        Some(Role::Toplevel(toplevel)) => {
            f(&mut toplevel.next);
            true
        }
        _ => false,
    }
}

/// Common validation of move, resize and window-menu requests
///
/// The surface must have been configured; a stale input serial is not an
/// error, the request is logged and dropped.
fn validated_grab_request<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    seat: SeatId,
    serial: Serial,
) -> Result<bool, ProtocolError> {
    let configured = match data.xdg_shell_state().surfaces.get(&surface) {
        Some(entry) => entry.configured,
        None => return Ok(false),
    };
    if !configured {
        return Err(ProtocolError::surface(
            xdg_surface::Error::NotConstructed,
            "surface has not been configured yet",
        ));
    }

    if !data.validate_grab_serial(seat, serial) {
        debug!(serial = u32::from(serial), "invalid serial for grab");
        return Ok(false);
    }

    Ok(true)
}
