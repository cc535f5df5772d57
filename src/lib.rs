#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! Server-side handling of the `xdg_shell` protocol
//!
//! This crate implements the state machine behind the `xdg_wm_base`
//! global of a Wayland compositor: role assignment for toplevels and
//! popups, the configure/ack/commit handshake with serial tracking and
//! idle-coalesced configure events, popup placement via positioners,
//! nested popup grabs, and client liveness pings.
//!
//! It deliberately does not speak the wire itself. The embedding
//! compositor keeps ownership of message parsing, the `wl_surface`
//! primitive, seats and the event loop, and connects them through the
//! crate's contracts:
//!
//! - parsed requests go into the dispatch functions of [`shell`]
//!   ([`shell::wm_base_request`] and friends);
//! - outbound events leave through [`protocol::ShellTransport`];
//! - surface and seat queries are answered by implementing
//!   [`compositor::CompositorHandler`] and [`seat::SeatHandler`];
//! - commit and destruction notifications of the underlying surfaces are
//!   routed into [`shell::surface_commit`] and
//!   [`shell::base_surface_destroyed`];
//! - the compositor's window management listens on the signal methods of
//!   [`shell::XdgShellHandler`].
//!
//! Configure events are coalesced: compositor-side state changes reserve
//! a serial and arm an idle task on the [`calloop`] event loop, so any
//! number of changes within one event-loop turn produce a single
//! configure.
//!
//! # Example
//!
//! ```no_run
//! use calloop::EventLoop;
//! use xdg_shell_server::protocol::{xdg_toplevel, ClientId, ShellTransport, SurfaceId};
//! use xdg_shell_server::shell::{XdgShellHandler, XdgShellState};
//! # use xdg_shell_server::compositor::{AlreadyHasRole, CompositorHandler};
//! # use xdg_shell_server::protocol::SeatId;
//! # use xdg_shell_server::seat::{
//! #     Axis, ButtonState, KeyState, KeyboardGrab, ModifiersState, PointerGrab, SeatHandler,
//! # };
//! # use xdg_shell_server::utils::{Logical, Point, Rectangle, Serial, Size};
//!
//! struct State {
//!     shell: XdgShellState<State>,
//! }
//!
//! // The outbound half of your wire dispatcher.
//! struct Connection;
//!
//! impl ShellTransport for Connection {
//!     fn send_ping(&mut self, client: ClientId, serial: Serial) {
//!         // serialize xdg_wm_base.ping onto the client's connection
//!     }
//!     # fn send_surface_configure(&mut self, surface: SurfaceId, serial: Serial) {}
//!     # fn send_toplevel_configure(
//!     #     &mut self,
//!     #     surface: SurfaceId,
//!     #     size: Size<i32, Logical>,
//!     #     states: Vec<xdg_toplevel::State>,
//!     # ) {}
//!     # fn send_close(&mut self, surface: SurfaceId) {}
//!     # fn send_popup_configure(&mut self, surface: SurfaceId, geometry: Rectangle<i32, Logical>) {}
//!     # fn send_popup_done(&mut self, surface: SurfaceId) {}
//! }
//!
//! impl XdgShellHandler for State {
//!     fn xdg_shell_state(&mut self) -> &mut XdgShellState<Self> {
//!         &mut self.shell
//!     }
//!
//!     fn new_surface(&mut self, surface: SurfaceId) {
//!         // the surface is ready to be mapped; suggest a size
//!         let _ = self.shell.toplevel_set_size(surface, (800, 600).into());
//!     }
//! }
//! #
//! # impl CompositorHandler for State {
//! #     fn surface_has_buffer(&mut self, _: SurfaceId) -> bool { unimplemented!() }
//! #     fn surface_size(&mut self, _: SurfaceId) -> Size<i32, Logical> { unimplemented!() }
//! #     fn surface_accepts_input(&mut self, _: SurfaceId, _: Point<f64, Logical>) -> bool {
//! #         unimplemented!()
//! #     }
//! #     fn surface_client(&mut self, _: SurfaceId) -> Option<ClientId> { unimplemented!() }
//! #     fn give_role(&mut self, _: SurfaceId, _: &'static str) -> Result<(), AlreadyHasRole> {
//! #         unimplemented!()
//! #     }
//! # }
//! #
//! # impl SeatHandler for State {
//! #     fn validate_grab_serial(&mut self, _: SeatId, _: Serial) -> bool { unimplemented!() }
//! #     fn pointer_enter(&mut self, _: SeatId, _: SurfaceId, _: Point<f64, Logical>) {
//! #         unimplemented!()
//! #     }
//! #     fn pointer_clear_focus(&mut self, _: SeatId) { unimplemented!() }
//! #     fn pointer_send_motion(&mut self, _: SeatId, _: u32, _: Point<f64, Logical>) {
//! #         unimplemented!()
//! #     }
//! #     fn pointer_send_button(
//! #         &mut self,
//! #         _: SeatId,
//! #         _: u32,
//! #         _: u32,
//! #         _: ButtonState,
//! #     ) -> Option<Serial> {
//! #         unimplemented!()
//! #     }
//! #     fn pointer_send_axis(&mut self, _: SeatId, _: u32, _: Axis, _: f64) { unimplemented!() }
//! #     fn keyboard_send_key(&mut self, _: SeatId, _: u32, _: u32, _: KeyState) { unimplemented!() }
//! #     fn keyboard_send_modifiers(&mut self, _: SeatId, _: ModifiersState) { unimplemented!() }
//! #     fn start_pointer_grab(&mut self, _: SeatId, _: Box<dyn PointerGrab<Self>>) {
//! #         unimplemented!()
//! #     }
//! #     fn start_keyboard_grab(&mut self, _: SeatId, _: Box<dyn KeyboardGrab<Self>>) {
//! #         unimplemented!()
//! #     }
//! #     fn end_pointer_grab(&mut self, _: SeatId) { unimplemented!() }
//! #     fn end_keyboard_grab(&mut self, _: SeatId) { unimplemented!() }
//! # }
//!
//! let mut event_loop = EventLoop::<State>::try_new().unwrap();
//! let shell = XdgShellState::new(event_loop.handle(), Box::new(Connection));
//! let mut state = State { shell };
//!
//! // feed parsed requests into xdg_shell_server::shell::wm_base_request(...)
//! // and run the event loop as usual
//! # let _ = &mut state;
//! ```

pub mod compositor;
pub mod protocol;
pub mod seat;
pub mod shell;
pub mod utils;
