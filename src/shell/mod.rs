//! The xdg-shell state machine
//!
//! [`XdgShellState`] tracks every client, surface and popup grab known to
//! the `xdg_wm_base` global. The embedding compositor implements
//! [`XdgShellHandler`] (plus the [`CompositorHandler`] and [`SeatHandler`]
//! contracts) on its state type and routes wire requests into the
//! dispatch functions of this module; the shell answers through the
//! [`ShellTransport`] it was created with and through the handler's
//! signal methods.
//!
//! Configures are never sent inline: state changes reserve a serial and
//! arm an idle task on the event loop, so several changes within one
//! event-loop turn collapse into a single configure event.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use tracing::warn;

use crate::compositor::CompositorHandler;
use crate::protocol::{
    ClientId, OutputId, PositionerId, SeatId, ShellTransport, SurfaceId,
};
use crate::protocol::xdg_toplevel::ResizeEdge;
use crate::seat::SeatHandler;
use crate::utils::{Logical, Point, Rectangle, Serial, SerialCounter};

mod grab;
mod handlers;
mod popup;
mod positioner;
mod surface;
mod toplevel;

#[cfg(test)]
mod tests;

pub use grab::{PopupKeyboardGrab, PopupPointerGrab};
pub use handlers::{
    client_connected, client_disconnected, popup_request, positioner_request, toplevel_request,
    wm_base_request, xdg_surface_request,
};
pub use popup::popup_at;
pub use positioner::PositionerState;
pub use surface::{
    base_surface_destroyed, surface_commit, Configure, PopupConfigure, ToplevelConfigure,
};
pub use toplevel::ToplevelState;

use grab::PopupGrab;
use surface::XdgSurface;

/// Handler trait for the xdg-shell
///
/// Implemented by the compositor state; the non-required methods are the
/// upward signals of the shell and default to doing nothing.
#[allow(unused_variables)]
pub trait XdgShellHandler: CompositorHandler + SeatHandler + Sized + 'static {
    /// [`XdgShellState`] getter
    fn xdg_shell_state(&mut self) -> &mut XdgShellState<Self>;

    /// A surface finished its initial commit-configure-ack-commit dance
    /// and is ready to be mapped
    fn new_surface(&mut self, surface: SurfaceId);

    /// A new popup was created over a parent surface
    ///
    /// Placement is available through
    /// [`popup_geometry`](XdgShellState::popup_geometry); the popup is
    /// not mapped before its first commit.
    fn new_popup(&mut self, popup: SurfaceId) {}

    /// A surface is going away; its state is still readable
    fn surface_destroyed(&mut self, surface: SurfaceId) {}

    /// The owning client failed to answer a ping within the timeout
    ///
    /// Emitted once per surface of the client. The compositor may want
    /// to mark the surfaces unresponsive or disconnect the client.
    fn ping_timeout(&mut self, surface: SurfaceId) {}

    /// The client asked to change the maximized state
    ///
    /// The requested value sits in the client-pending state; answer by
    /// calling [`toplevel_set_maximized`](XdgShellState::toplevel_set_maximized).
    fn request_maximize(&mut self, surface: SurfaceId) {}

    /// The client asked to change the fullscreen state
    fn request_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool, output: Option<OutputId>) {
    }

    /// The client asked to be minimized
    fn request_minimize(&mut self, surface: SurfaceId) {}

    /// The client started an interactive move with a validated serial
    fn request_move(&mut self, surface: SurfaceId, seat: SeatId, serial: Serial) {}

    /// The client started an interactive resize with a validated serial
    fn request_resize(&mut self, surface: SurfaceId, seat: SeatId, serial: Serial, edges: ResizeEdge) {
    }

    /// The client asked for the window menu at the given location
    fn request_show_window_menu(
        &mut self,
        surface: SurfaceId,
        seat: SeatId,
        serial: Serial,
        location: Point<i32, Logical>,
    ) {
    }

    /// Hook for popup placement policy
    ///
    /// Called when a popup is created, with the unconstrained geometry
    /// computed from the positioner. Compositors that honor
    /// `constraint_adjustment` return an adjusted rectangle here; the
    /// default keeps the geometry as computed.
    fn constrain_popup_geometry(
        &mut self,
        popup: SurfaceId,
        positioner: &PositionerState,
        geometry: Rectangle<i32, Logical>,
    ) -> Rectangle<i32, Logical> {
        geometry
    }
}

/// Per-client state of the shell global
#[derive(Debug, Default)]
pub(crate) struct ShellClient {
    /// Surfaces owned by this client, in creation order
    pub(crate) surfaces: Vec<SurfaceId>,
    /// Serial of the outstanding ping, if any
    pub(crate) ping_serial: Option<Serial>,
    /// Timer waiting for the pong
    pub(crate) ping_timer: Option<RegistrationToken>,
}

/// State of the `xdg_wm_base` global
pub struct XdgShellState<D> {
    pub(crate) loop_handle: LoopHandle<'static, D>,
    pub(crate) transport: Box<dyn ShellTransport>,
    pub(crate) serials: SerialCounter,
    pub(crate) ping_timeout: Duration,
    pub(crate) clients: HashMap<ClientId, ShellClient>,
    pub(crate) surfaces: HashMap<SurfaceId, XdgSurface>,
    pub(crate) positioners: HashMap<PositionerId, PositionerState>,
    pub(crate) popup_grabs: Vec<PopupGrab>,
}

impl<D> fmt::Debug for XdgShellState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XdgShellState")
            .field("ping_timeout", &self.ping_timeout)
            .field("clients", &self.clients)
            .field("surfaces", &self.surfaces)
            .field("positioners", &self.positioners)
            .field("popup_grabs", &self.popup_grabs)
            .finish_non_exhaustive()
    }
}

impl<D: XdgShellHandler> XdgShellState<D> {
    /// Create the shell state
    ///
    /// `transport` is the outbound half of the wire dispatcher. The loop
    /// handle is used for deferred configures and ping timers.
    pub fn new(loop_handle: LoopHandle<'static, D>, transport: Box<dyn ShellTransport>) -> Self {
        XdgShellState {
            loop_handle,
            transport,
            serials: SerialCounter::new(),
            ping_timeout: Duration::from_millis(10_000),
            clients: HashMap::new(),
            surfaces: HashMap::new(),
            positioners: HashMap::new(),
            popup_grabs: Vec::new(),
        }
    }

    /// Change the ping timeout, 10 seconds by default
    pub fn set_ping_timeout(&mut self, timeout: Duration) {
        self.ping_timeout = timeout;
    }

    /// Ping the client owning this surface
    ///
    /// No-op while a ping is already outstanding. If no pong with the
    /// matching serial arrives within the timeout,
    /// [`XdgShellHandler::ping_timeout`] fires for every surface of the
    /// client.
    pub fn ping(&mut self, surface: SurfaceId) {
        let Some(client_id) = self.surfaces.get(&surface).map(|entry| entry.client) else {
            return;
        };
        match self.clients.get(&client_id) {
            Some(client) if client.ping_serial.is_some() => return, // already pinged
            Some(_) => {}
            None => return,
        }

        let serial = self.serials.next_serial();
        let token = self
            .loop_handle
            .insert_source(
                Timer::from_duration(self.ping_timeout),
                move |_, _, data: &mut D| {
                    ping_timeout_fired(data, client_id);
                    TimeoutAction::Drop
                },
            )
            .ok();

        if let Some(client) = self.clients.get_mut(&client_id) {
            client.ping_serial = Some(serial);
            client.ping_timer = token;
        }
        self.transport.send_ping(client_id, serial);
    }

    pub(crate) fn pong(&mut self, client: ClientId, serial: Serial) {
        let token = {
            let Some(state) = self.clients.get_mut(&client) else {
                return;
            };
            if state.ping_serial != Some(serial) {
                // a stale or bogus pong, ignore it
                return;
            }
            state.ping_serial = None;
            state.ping_timer.take()
        };
        if let Some(token) = token {
            self.loop_handle.remove(token);
        }
    }

    /// The window geometry taken by the last commit
    pub fn window_geometry(&self, surface: SurfaceId) -> Option<Rectangle<i32, Logical>> {
        self.surfaces.get(&surface).map(|entry| entry.geometry)
    }

    /// Title set by the client, if any
    pub fn title(&self, surface: SurfaceId) -> Option<&str> {
        self.surfaces.get(&surface)?.title.as_deref()
    }

    /// Application id set by the client, if any
    pub fn app_id(&self, surface: SurfaceId) -> Option<&str> {
        self.surfaces.get(&surface)?.app_id.as_deref()
    }

    /// Did the client acknowledge a configure at least once?
    pub fn is_configured(&self, surface: SurfaceId) -> bool {
        self.surfaces
            .get(&surface)
            .map(|entry| entry.configured)
            .unwrap_or(false)
    }

    /// Serial of the last acknowledged configure
    pub fn configure_serial(&self, surface: SurfaceId) -> Option<Serial> {
        self.surfaces.get(&surface)?.configure_serial
    }
}

fn ping_timeout_fired<D: XdgShellHandler>(data: &mut D, client: ClientId) {
    let surfaces = {
        let shell = data.xdg_shell_state();
        let Some(state) = shell.clients.get_mut(&client) else {
            return;
        };
        state.ping_serial = None;
        state.ping_timer = None;
        state.surfaces.clone()
    };

    warn!(client = client.0, "client did not respond to ping in time");

    for surface in surfaces {
        // a listener may destroy surfaces while we iterate
        if data.xdg_shell_state().surfaces.contains_key(&surface) {
            data.ping_timeout(surface);
        }
    }
}
