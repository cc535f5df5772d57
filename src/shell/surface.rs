use std::collections::VecDeque;
use std::fmt;

use calloop::Idle;
use tracing::debug;

use crate::protocol::{xdg_surface, xdg_wm_base, ClientId, ProtocolError, SurfaceId};
use crate::utils::{Logical, Rectangle, Serial, Size};

use super::popup::XdgPopup;
use super::toplevel::{configure_states, ToplevelState, XdgToplevel};
use super::{XdgShellHandler, XdgShellState};

/// A configure message for toplevel surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToplevelConfigure {
    /// Serial of the configure event
    pub serial: Serial,
    /// The state associated with this configure
    pub state: ToplevelState,
}

/// A configure message for popup surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupConfigure {
    /// Serial of the configure event
    pub serial: Serial,
    /// The placement of the popup relative to its parent's window geometry
    pub geometry: Rectangle<i32, Logical>,
}

/// A configure waiting to be acknowledged by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Configure {
    /// A toplevel configure
    Toplevel(ToplevelConfigure),
    /// A popup configure
    Popup(PopupConfigure),
}

impl Configure {
    /// Serial of the configure event
    pub fn serial(&self) -> Serial {
        match self {
            Configure::Toplevel(configure) => configure.serial,
            Configure::Popup(configure) => configure.serial,
        }
    }
}

/// The role of an xdg surface
///
/// A surface gets a role assigned exactly once. The role data lives
/// inline, it is dropped together with the surface.
#[derive(Debug, Default)]
pub(crate) enum Role {
    /// No role was assigned yet
    #[default]
    None,
    /// The surface is a toplevel window
    Toplevel(XdgToplevel),
    /// The surface is a popup
    Popup(XdgPopup),
}

impl Role {
    pub(crate) fn is_none(&self) -> bool {
        matches!(self, Role::None)
    }
}

/// Per-surface bookkeeping of the shell
pub(crate) struct XdgSurface {
    /// The client owning this surface
    pub(crate) client: ClientId,
    /// The window geometry taken by the last commit
    pub(crate) geometry: Rectangle<i32, Logical>,
    /// Geometry from `set_window_geometry`, waiting for a commit
    pub(crate) next_geometry: Option<Rectangle<i32, Logical>>,
    /// Dimensions of the underlying surface, refreshed on every commit
    pub(crate) current_size: Size<i32, Logical>,
    /// Did the client acknowledge a configure at least once?
    pub(crate) configured: bool,
    /// Was the new-surface signal emitted for this surface?
    pub(crate) added: bool,
    /// Serial of the last acknowledged configure
    pub(crate) configure_serial: Option<Serial>,
    /// Configures sent but not yet acknowledged, oldest first
    pub(crate) pending_configures: VecDeque<Configure>,
    /// The idle task that will send the next configure
    pub(crate) configure_idle: Option<Idle<'static>>,
    /// Serial reserved for the scheduled configure
    pub(crate) configure_next_serial: Option<Serial>,
    /// Title set by the client
    pub(crate) title: Option<String>,
    /// Application id set by the client
    pub(crate) app_id: Option<String>,
    /// Child popups, most recently created first
    pub(crate) popups: Vec<SurfaceId>,
    /// The role and its data
    pub(crate) role: Role,
}

impl XdgSurface {
    pub(crate) fn new(client: ClientId) -> Self {
        XdgSurface {
            client,
            geometry: Rectangle::zero(),
            next_geometry: None,
            current_size: Size::default(),
            configured: false,
            added: false,
            configure_serial: None,
            pending_configures: VecDeque::new(),
            configure_idle: None,
            configure_next_serial: None,
            title: None,
            app_id: None,
            popups: Vec::new(),
            role: Role::None,
        }
    }
}

impl fmt::Debug for XdgSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XdgSurface")
            .field("client", &self.client)
            .field("geometry", &self.geometry)
            .field("configured", &self.configured)
            .field("added", &self.added)
            .field("pending_configures", &self.pending_configures)
            .field("configure_scheduled", &self.configure_idle.is_some())
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

enum Outgoing {
    Toplevel {
        size: Size<i32, Logical>,
        states: Vec<crate::protocol::xdg_toplevel::State>,
    },
    Popup {
        geometry: Rectangle<i32, Logical>,
    },
}

impl<D: XdgShellHandler> XdgShellState<D> {
    /// Schedule a configure for the surface, if one is needed
    ///
    /// Multiple state changes within one event-loop turn coalesce into a
    /// single configure: the actual send happens from an idle task. The
    /// returned serial is the one the configure will carry, `None` means
    /// the pending state needs no configure (and a previously scheduled
    /// one may have been cancelled).
    pub(crate) fn schedule_configure(&mut self, surface: SurfaceId) -> Option<Serial> {
        let pending_same = match self.surfaces.get(&surface).map(|entry| &entry.role) {
            Some(Role::Toplevel(_)) => self.toplevel_pending_same(surface),
            Some(Role::Popup(_)) => false,
            _ => return None,
        };

        let loop_handle = self.loop_handle.clone();
        let entry = self.surfaces.get_mut(&surface)?;

        if entry.configure_idle.is_some() {
            if !pending_same {
                // a configure is already on its way
                return entry.configure_next_serial;
            }

            // the scheduled configure is not necessary anymore
            if let Some(idle) = entry.configure_idle.take() {
                idle.cancel();
            }
            entry.configure_next_serial = None;
            None
        } else {
            if pending_same {
                return None;
            }

            let serial = self.serials.next_serial();
            entry.configure_next_serial = Some(serial);
            entry.configure_idle = Some(loop_handle.insert_idle(move |data: &mut D| {
                data.xdg_shell_state().send_configure(surface);
            }));
            Some(serial)
        }
    }

    /// Send the scheduled configure, from the idle task
    fn send_configure(&mut self, surface: SurfaceId) {
        let Some(entry) = self.surfaces.get_mut(&surface) else {
            return;
        };
        entry.configure_idle = None;
        let Some(serial) = entry.configure_next_serial.take() else {
            return;
        };
        debug_assert!(entry
            .pending_configures
            .back()
            .map_or(true, |configure| configure.serial() < serial));

        let outgoing = match &entry.role {
            Role::Toplevel(toplevel) => {
                let state = toplevel.pending.clone();
                let states = configure_states(&state);
                let mut size = state.size;
                if size.w == 0 || size.h == 0 {
                    size = entry.geometry.size;
                }
                entry
                    .pending_configures
                    .push_back(Configure::Toplevel(ToplevelConfigure { serial, state }));
                Outgoing::Toplevel { size, states }
            }
            Role::Popup(popup) => {
                let geometry = popup.geometry;
                entry
                    .pending_configures
                    .push_back(Configure::Popup(PopupConfigure { serial, geometry }));
                Outgoing::Popup { geometry }
            }
            Role::None => return,
        };

        match outgoing {
            Outgoing::Toplevel { size, states } => {
                self.transport.send_toplevel_configure(surface, size, states)
            }
            Outgoing::Popup { geometry } => self.transport.send_popup_configure(surface, geometry),
        }
        self.transport.send_surface_configure(surface, serial);
    }

    /// Handle `xdg_surface.ack_configure`
    ///
    /// Acknowledging a serial implicitly acknowledges every older entry
    /// in the queue; acknowledging a serial that was never sent is a
    /// protocol error.
    pub(crate) fn ack_configure(
        &mut self,
        surface: SurfaceId,
        serial: Serial,
    ) -> Result<(), ProtocolError> {
        let Some(entry) = self.surfaces.get_mut(&surface) else {
            return Ok(());
        };

        if entry.role.is_none() {
            return Err(ProtocolError::surface(
                xdg_surface::Error::NotConstructed,
                "xdg_surface must have a role",
            ));
        }

        let mut found = None;
        while let Some(configure) = entry.pending_configures.front() {
            if configure.serial() < serial {
                // implicitly acknowledged
                entry.pending_configures.pop_front();
            } else if configure.serial() == serial {
                found = entry.pending_configures.pop_front();
                break;
            } else {
                break;
            }
        }

        let Some(configure) = found else {
            return Err(ProtocolError::wm_base(
                xdg_wm_base::Error::InvalidSurfaceState,
                format!("wrong configure serial: {}", u32::from(serial)),
            ));
        };

        if let (Role::Toplevel(toplevel), Configure::Toplevel(configure)) =
            (&mut entry.role, configure)
        {
            toplevel.next = configure.state;
            // a pending size of 0 now stands for "whatever the client chose"
            toplevel.pending.size = Size::default();
        }

        entry.configured = true;
        entry.configure_serial = Some(serial);
        Ok(())
    }
}

/// Notify the shell of a commit on the underlying surface
///
/// To be called by the surface primitive whenever a surface carrying an
/// xdg role commits. Drives the initial configure, moves acknowledged
/// state to current, and fires the new-surface signal once the first
/// acknowledged configure is committed.
pub fn surface_commit<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
) -> Result<(), ProtocolError> {
    if !data.xdg_shell_state().surfaces.contains_key(&surface) {
        return Ok(());
    }

    let has_buffer = data.surface_has_buffer(surface);
    let current_size = data.surface_size(surface);

    let shell = data.xdg_shell_state();
    let Some(entry) = shell.surfaces.get_mut(&surface) else {
        return Ok(());
    };
    entry.current_size = current_size;

    if has_buffer && !entry.configured {
        return Err(ProtocolError::surface(
            xdg_surface::Error::UnconfiguredBuffer,
            "xdg_surface has never been configured",
        ));
    }

    if let Some(next) = entry.next_geometry.take() {
        entry.geometry = next;
    }

    let mut schedule = false;
    match &mut entry.role {
        Role::None => {
            return Err(ProtocolError::surface(
                xdg_surface::Error::NotConstructed,
                "xdg_surface must have a role",
            ));
        }
        Role::Toplevel(toplevel) => {
            if !has_buffer && !toplevel.added {
                // the first commit answers with a configure, whatever the
                // pending state looks like
                toplevel.added = true;
                schedule = true;
            } else if has_buffer {
                toplevel.current = toplevel.next.clone();
            }
        }
        Role::Popup(popup) => {
            if !popup.committed {
                popup.committed = true;
                schedule = true;
            }
        }
    }

    let newly_added = entry.configured && !entry.added;
    if newly_added {
        entry.added = true;
    }

    if schedule {
        shell.schedule_configure(surface);
    }

    if newly_added {
        data.new_surface(surface);
    }

    Ok(())
}

/// Notify the shell that the underlying surface was destroyed
///
/// Destroys the xdg surface built on top of it, as if the client had
/// issued the destroy request.
pub fn base_surface_destroyed<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
) -> Result<(), ProtocolError> {
    destroy_surface(data, surface)
}

/// Tear down a surface and its role
///
/// Emits the destroy signal first, then cancels the armed idle task,
/// drains the configure queue and unlinks the surface everywhere. A
/// grabbed popup destroyed out of stacking order still goes away, but
/// the client gets `NOT_THE_TOPMOST_POPUP`.
pub(crate) fn destroy_surface<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
) -> Result<(), ProtocolError> {
    if !data.xdg_shell_state().surfaces.contains_key(&surface) {
        return Ok(());
    }
    data.surface_destroyed(surface);

    let shell = data.xdg_shell_state();
    let Some(mut entry) = shell.surfaces.remove(&surface) else {
        // a destroy listener beat us to it
        return Ok(());
    };
    debug!(surface = surface.0, "destroying xdg_surface");

    if let Some(idle) = entry.configure_idle.take() {
        idle.cancel();
    }

    if let Some(client) = shell.clients.get_mut(&entry.client) {
        client.surfaces.retain(|s| *s != surface);
    }

    let mut result = Ok(());
    let mut end_grabs = None;

    if let Role::Popup(popup) = &entry.role {
        if let Some(parent) = shell.surfaces.get_mut(&popup.parent) {
            parent.popups.retain(|s| *s != surface);
        }

        if let Some(seat) = popup.seat {
            if let Some(chain) = shell.popup_grab_mut(seat) {
                if chain.topmost() != Some(surface) {
                    result = Err(ProtocolError::wm_base(
                        xdg_wm_base::Error::NotTheTopmostPopup,
                        "xdg_popup was destroyed while it was not the topmost popup",
                    ));
                }

                chain.popups.retain(|s| *s != surface);

                if chain.popups.is_empty() {
                    let pointer = std::mem::replace(&mut chain.pointer_grabbed, false);
                    let keyboard = std::mem::replace(&mut chain.keyboard_grabbed, false);
                    end_grabs = Some((seat, pointer, keyboard));
                }
            }
        }
    }

    if let Some((seat, pointer, keyboard)) = end_grabs {
        if pointer {
            data.end_pointer_grab(seat);
        }
        if keyboard {
            data.end_keyboard_grab(seat);
        }
    }

    result
}
