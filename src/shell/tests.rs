use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use calloop::EventLoop;

use crate::compositor::{AlreadyHasRole, CompositorHandler};
use crate::protocol::{
    xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base, ClientId, OutputId,
    PositionerId, ProtocolError, SeatId, ShellTransport, SurfaceId,
};
use crate::seat::{
    Axis, ButtonState, KeyState, KeyboardGrab, ModifiersState, PointerGrab, SeatHandler,
};
use crate::utils::{Logical, Point, Rectangle, Serial, Size};

use super::{
    base_surface_destroyed, client_disconnected, popup_at, popup_request, positioner_request,
    surface_commit, toplevel_request, wm_base_request, xdg_surface_request, XdgShellHandler,
    XdgShellState,
};

const CLIENT: ClientId = ClientId(1);
const OTHER_CLIENT: ClientId = ClientId(2);
const SEAT: SeatId = SeatId(1);

/// Everything the shell pushed onto the wire
#[derive(Debug, Clone, PartialEq)]
enum Tx {
    Ping {
        client: ClientId,
        serial: Serial,
    },
    SurfaceConfigure {
        surface: SurfaceId,
        serial: Serial,
    },
    ToplevelConfigure {
        surface: SurfaceId,
        size: Size<i32, Logical>,
        states: Vec<xdg_toplevel::State>,
    },
    Close {
        surface: SurfaceId,
    },
    PopupConfigure {
        surface: SurfaceId,
        geometry: Rectangle<i32, Logical>,
    },
    PopupDone {
        surface: SurfaceId,
    },
}

struct Recorder(Rc<RefCell<Vec<Tx>>>);

impl ShellTransport for Recorder {
    fn send_ping(&mut self, client: ClientId, serial: Serial) {
        self.0.borrow_mut().push(Tx::Ping { client, serial });
    }

    fn send_surface_configure(&mut self, surface: SurfaceId, serial: Serial) {
        self.0
            .borrow_mut()
            .push(Tx::SurfaceConfigure { surface, serial });
    }

    fn send_toplevel_configure(
        &mut self,
        surface: SurfaceId,
        size: Size<i32, Logical>,
        states: Vec<xdg_toplevel::State>,
    ) {
        self.0.borrow_mut().push(Tx::ToplevelConfigure {
            surface,
            size,
            states,
        });
    }

    fn send_close(&mut self, surface: SurfaceId) {
        self.0.borrow_mut().push(Tx::Close { surface });
    }

    fn send_popup_configure(&mut self, surface: SurfaceId, geometry: Rectangle<i32, Logical>) {
        self.0
            .borrow_mut()
            .push(Tx::PopupConfigure { surface, geometry });
    }

    fn send_popup_done(&mut self, surface: SurfaceId) {
        self.0.borrow_mut().push(Tx::PopupDone { surface });
    }
}

/// Signals the shell raised towards the compositor
#[derive(Debug, Clone, PartialEq)]
enum Signal {
    NewSurface(SurfaceId),
    NewPopup(SurfaceId),
    Destroyed(SurfaceId),
    PingTimeout(SurfaceId),
    Maximize(SurfaceId),
    Fullscreen(SurfaceId, bool, Option<OutputId>),
    Minimize(SurfaceId),
    Move(SurfaceId, SeatId, Serial),
    Resize(SurfaceId, SeatId, Serial, xdg_toplevel::ResizeEdge),
    WindowMenu(SurfaceId, SeatId, Serial, Point<i32, Logical>),
}

struct TestState {
    shell: XdgShellState<TestState>,
    sent: Rc<RefCell<Vec<Tx>>>,
    signals: Vec<Signal>,

    // surface primitive
    buffers: HashSet<SurfaceId>,
    sizes: HashMap<SurfaceId, Size<i32, Logical>>,
    roles: HashMap<SurfaceId, &'static str>,
    owners: HashMap<SurfaceId, ClientId>,

    // seat
    serial_valid: bool,
    button_serial: Option<Serial>,
    pointer_focus: Option<SurfaceId>,
    pointer_grab: Option<Box<dyn PointerGrab<TestState>>>,
    keyboard_grab: Option<Box<dyn KeyboardGrab<TestState>>>,
}

impl CompositorHandler for TestState {
    fn surface_has_buffer(&mut self, surface: SurfaceId) -> bool {
        self.buffers.contains(&surface)
    }

    fn surface_size(&mut self, surface: SurfaceId) -> Size<i32, Logical> {
        self.sizes.get(&surface).copied().unwrap_or_default()
    }

    fn surface_accepts_input(&mut self, _surface: SurfaceId, _point: Point<f64, Logical>) -> bool {
        true
    }

    fn surface_client(&mut self, surface: SurfaceId) -> Option<ClientId> {
        self.owners.get(&surface).copied()
    }

    fn give_role(&mut self, surface: SurfaceId, role: &'static str) -> Result<(), AlreadyHasRole> {
        if self.roles.contains_key(&surface) {
            return Err(AlreadyHasRole);
        }
        self.roles.insert(surface, role);
        Ok(())
    }
}

impl SeatHandler for TestState {
    fn validate_grab_serial(&mut self, _seat: SeatId, _serial: Serial) -> bool {
        self.serial_valid
    }

    fn pointer_enter(&mut self, _seat: SeatId, surface: SurfaceId, _location: Point<f64, Logical>) {
        self.pointer_focus = Some(surface);
    }

    fn pointer_clear_focus(&mut self, _seat: SeatId) {
        self.pointer_focus = None;
    }

    fn pointer_send_motion(&mut self, _seat: SeatId, _time: u32, _location: Point<f64, Logical>) {}

    fn pointer_send_button(
        &mut self,
        _seat: SeatId,
        _time: u32,
        _button: u32,
        _state: ButtonState,
    ) -> Option<Serial> {
        self.button_serial
    }

    fn pointer_send_axis(&mut self, _seat: SeatId, _time: u32, _axis: Axis, _value: f64) {}

    fn keyboard_send_key(&mut self, _seat: SeatId, _time: u32, _key: u32, _state: KeyState) {}

    fn keyboard_send_modifiers(&mut self, _seat: SeatId, _modifiers: ModifiersState) {}

    fn start_pointer_grab(&mut self, _seat: SeatId, grab: Box<dyn PointerGrab<Self>>) {
        self.pointer_grab = Some(grab);
    }

    fn start_keyboard_grab(&mut self, _seat: SeatId, grab: Box<dyn KeyboardGrab<Self>>) {
        self.keyboard_grab = Some(grab);
    }

    fn end_pointer_grab(&mut self, _seat: SeatId) {
        self.pointer_grab = None;
    }

    fn end_keyboard_grab(&mut self, _seat: SeatId) {
        self.keyboard_grab = None;
    }
}

impl XdgShellHandler for TestState {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState<Self> {
        &mut self.shell
    }

    fn new_surface(&mut self, surface: SurfaceId) {
        self.signals.push(Signal::NewSurface(surface));
    }

    fn new_popup(&mut self, popup: SurfaceId) {
        self.signals.push(Signal::NewPopup(popup));
    }

    fn surface_destroyed(&mut self, surface: SurfaceId) {
        self.signals.push(Signal::Destroyed(surface));
    }

    fn ping_timeout(&mut self, surface: SurfaceId) {
        self.signals.push(Signal::PingTimeout(surface));
    }

    fn request_maximize(&mut self, surface: SurfaceId) {
        self.signals.push(Signal::Maximize(surface));
    }

    fn request_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool, output: Option<OutputId>) {
        self.signals
            .push(Signal::Fullscreen(surface, fullscreen, output));
    }

    fn request_minimize(&mut self, surface: SurfaceId) {
        self.signals.push(Signal::Minimize(surface));
    }

    fn request_move(&mut self, surface: SurfaceId, seat: SeatId, serial: Serial) {
        self.signals.push(Signal::Move(surface, seat, serial));
    }

    fn request_resize(
        &mut self,
        surface: SurfaceId,
        seat: SeatId,
        serial: Serial,
        edges: xdg_toplevel::ResizeEdge,
    ) {
        self.signals
            .push(Signal::Resize(surface, seat, serial, edges));
    }

    fn request_show_window_menu(
        &mut self,
        surface: SurfaceId,
        seat: SeatId,
        serial: Serial,
        location: Point<i32, Logical>,
    ) {
        self.signals
            .push(Signal::WindowMenu(surface, seat, serial, location));
    }
}

type Loop = EventLoop<'static, TestState>;

fn test_state(event_loop: &Loop) -> TestState {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let shell = XdgShellState::new(event_loop.handle(), Box::new(Recorder(sent.clone())));
    TestState {
        shell,
        sent,
        signals: Vec::new(),
        buffers: HashSet::new(),
        sizes: HashMap::new(),
        roles: HashMap::new(),
        owners: HashMap::new(),
        serial_valid: true,
        button_serial: Some(Serial::from(777)),
        pointer_focus: None,
        pointer_grab: None,
        keyboard_grab: None,
    }
}

fn dispatch(event_loop: &mut Loop, state: &mut TestState) {
    event_loop
        .dispatch(Some(Duration::ZERO), state)
        .expect("event loop dispatch failed");
}

fn drain(state: &TestState) -> Vec<Tx> {
    state.sent.borrow_mut().drain(..).collect()
}

fn sent_configure_serial(sent: &[Tx]) -> Serial {
    sent.iter()
        .rev()
        .find_map(|tx| match tx {
            Tx::SurfaceConfigure { serial, .. } => Some(*serial),
            _ => None,
        })
        .expect("no xdg_surface.configure was sent")
}

fn create_toplevel(state: &mut TestState, id: u32) -> SurfaceId {
    let surface = SurfaceId(id);
    state.owners.insert(surface, CLIENT);
    wm_base_request(state, CLIENT, xdg_wm_base::Request::GetXdgSurface { surface }).unwrap();
    xdg_surface_request(state, surface, xdg_surface::Request::GetToplevel).unwrap();
    surface
}

fn create_popup(state: &mut TestState, id: u32, parent: SurfaceId) -> SurfaceId {
    let surface = SurfaceId(id);
    let positioner = PositionerId(id);
    state.owners.insert(surface, CLIENT);
    wm_base_request(
        state,
        CLIENT,
        xdg_wm_base::Request::CreatePositioner { id: positioner },
    )
    .unwrap();
    positioner_request(
        state,
        positioner,
        xdg_positioner::Request::SetSize {
            width: 10,
            height: 10,
        },
    )
    .unwrap();
    positioner_request(
        state,
        positioner,
        xdg_positioner::Request::SetAnchorRect {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        },
    )
    .unwrap();
    wm_base_request(state, CLIENT, xdg_wm_base::Request::GetXdgSurface { surface }).unwrap();
    xdg_surface_request(
        state,
        surface,
        xdg_surface::Request::GetPopup { parent, positioner },
    )
    .unwrap();
    surface
}

/// Run the initial commit-configure-ack-commit sequence
fn map_surface(event_loop: &mut Loop, state: &mut TestState, surface: SurfaceId) {
    surface_commit(state, surface).unwrap();
    dispatch(event_loop, state);
    let serial = sent_configure_serial(&drain(state));
    xdg_surface_request(state, surface, xdg_surface::Request::AckConfigure { serial }).unwrap();
    state.buffers.insert(surface);
    surface_commit(state, surface).unwrap();
}

fn mapped_toplevel(event_loop: &mut Loop, state: &mut TestState, id: u32) -> SurfaceId {
    let surface = create_toplevel(state, id);
    map_surface(event_loop, state, surface);
    state.signals.clear();
    surface
}

#[test]
fn initial_commit_answers_with_empty_configure() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = create_toplevel(&mut state, 1);
    surface_commit(&mut state, surface).unwrap();

    // nothing goes out before the idle task runs
    assert!(drain(&state).is_empty());

    dispatch(&mut event_loop, &mut state);
    let sent = drain(&state);
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[0],
        Tx::ToplevelConfigure {
            surface,
            size: Size::default(),
            states: Vec::new(),
        }
    );
    let serial = sent_configure_serial(&sent);
    assert_eq!(sent[1], Tx::SurfaceConfigure { surface, serial });

    // not configured yet, so the surface was not announced
    assert!(state.signals.is_empty());

    // further buffer-less commits stay quiet
    surface_commit(&mut state, surface).unwrap();
    dispatch(&mut event_loop, &mut state);
    assert!(drain(&state).is_empty());
}

#[test]
fn ack_and_commit_make_state_current() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = create_toplevel(&mut state, 1);
    surface_commit(&mut state, surface).unwrap();
    dispatch(&mut event_loop, &mut state);
    let serial = sent_configure_serial(&drain(&state));
    xdg_surface_request(&mut state, surface, xdg_surface::Request::AckConfigure { serial })
        .unwrap();

    let serial = state
        .shell
        .toplevel_set_size(surface, (800, 600).into())
        .expect("a configure must be scheduled");
    dispatch(&mut event_loop, &mut state);
    let sent = drain(&state);
    assert_eq!(
        sent[0],
        Tx::ToplevelConfigure {
            surface,
            size: (800, 600).into(),
            states: Vec::new(),
        }
    );
    assert_eq!(sent[1], Tx::SurfaceConfigure { surface, serial });

    xdg_surface_request(&mut state, surface, xdg_surface::Request::AckConfigure { serial })
        .unwrap();
    state.buffers.insert(surface);
    state.sizes.insert(surface, (800, 600).into());
    surface_commit(&mut state, surface).unwrap();

    let current = state.shell.toplevel_state(surface).unwrap();
    assert_eq!(current.size, Size::from((800, 600)));

    // announced exactly once
    assert_eq!(
        state
            .signals
            .iter()
            .filter(|signal| **signal == Signal::NewSurface(surface))
            .count(),
        1
    );
    surface_commit(&mut state, surface).unwrap();
    assert_eq!(
        state
            .signals
            .iter()
            .filter(|signal| **signal == Signal::NewSurface(surface))
            .count(),
        1
    );
}

#[test]
fn state_changes_in_one_turn_coalesce() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    let first = state.shell.toplevel_set_activated(surface, true);
    let second = state.shell.toplevel_set_maximized(surface, true);
    let third = state.shell.toplevel_set_size(surface, (1024, 768).into());

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(first, third);

    dispatch(&mut event_loop, &mut state);
    let sent = drain(&state);
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[0],
        Tx::ToplevelConfigure {
            surface,
            size: (1024, 768).into(),
            states: vec![
                xdg_toplevel::State::Maximized,
                xdg_toplevel::State::Activated,
            ],
        }
    );
}

#[test]
fn reverting_pending_state_cancels_the_configure() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    assert!(state.shell.toplevel_set_activated(surface, true).is_some());
    assert!(state.shell.toplevel_set_activated(surface, false).is_none());

    dispatch(&mut event_loop, &mut state);
    assert!(drain(&state).is_empty());
}

#[test]
fn unchanged_pending_state_schedules_nothing() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    // zero size means "client picks", equal to everything
    assert!(state.shell.toplevel_set_size(surface, (0, 0).into()).is_none());

    // a queued configure is the comparison point, not the current state
    assert!(state.shell.toplevel_set_size(surface, (300, 300).into()).is_some());
    dispatch(&mut event_loop, &mut state);
    drain(&state);
    assert!(state.shell.toplevel_set_size(surface, (300, 300).into()).is_none());
    dispatch(&mut event_loop, &mut state);
    assert!(drain(&state).is_empty());
}

#[test]
fn ack_discards_the_queue_prefix() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    let first = state.shell.toplevel_set_size(surface, (300, 300).into()).unwrap();
    dispatch(&mut event_loop, &mut state);
    let second = state.shell.toplevel_set_size(surface, (400, 400).into()).unwrap();
    dispatch(&mut event_loop, &mut state);
    let third = state.shell.toplevel_set_size(surface, (500, 500).into()).unwrap();
    dispatch(&mut event_loop, &mut state);
    drain(&state);
    assert!(first < second && second < third);

    // acks the middle entry, dropping the first
    xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::AckConfigure { serial: second },
    )
    .unwrap();
    assert_eq!(state.shell.configure_serial(surface), Some(second));

    // the first serial is gone now
    let stale = xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::AckConfigure { serial: first },
    );
    assert!(matches!(
        stale,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::InvalidSurfaceState,
            ..
        })
    ));

    // the newest one is still pending
    xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::AckConfigure { serial: third },
    )
    .unwrap();
}

#[test]
fn unknown_ack_serial_is_a_protocol_error() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    let result = xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::AckConfigure {
            serial: Serial::from(0xdead_beef),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::InvalidSurfaceState,
            ..
        })
    ));
}

#[test]
fn buffer_before_configure_is_fatal() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    // buffer attached before the first configure was acked
    let surface = create_toplevel(&mut state, 1);
    state.buffers.insert(surface);
    let result = surface_commit(&mut state, surface);
    assert!(matches!(
        result,
        Err(ProtocolError::Surface {
            code: xdg_surface::Error::UnconfiguredBuffer,
            ..
        })
    ));
}

#[test]
fn surface_with_buffer_cannot_become_xdg_surface() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = SurfaceId(1);
    state.buffers.insert(surface);
    let result = wm_base_request(
        &mut state,
        CLIENT,
        xdg_wm_base::Request::GetXdgSurface { surface },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::Surface {
            code: xdg_surface::Error::UnconfiguredBuffer,
            ..
        })
    ));
}

#[test]
fn a_role_is_assigned_only_once() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = create_toplevel(&mut state, 1);
    let result = xdg_surface_request(&mut state, surface, xdg_surface::Request::GetToplevel);
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::Role,
            ..
        })
    ));

    let popup = create_popup(&mut state, 2, surface);
    let result = xdg_surface_request(
        &mut state,
        popup,
        xdg_surface::Request::GetPopup {
            parent: surface,
            positioner: PositionerId(2),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::Role,
            ..
        })
    ));
}

#[test]
fn window_geometry_is_double_buffered() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::SetWindowGeometry {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        },
    )
    .unwrap();

    // nothing moves until the commit
    assert_eq!(state.shell.window_geometry(surface), Some(Rectangle::zero()));

    surface_commit(&mut state, surface).unwrap();
    assert_eq!(
        state.shell.window_geometry(surface),
        Some(Rectangle::new((10, 20).into(), (300, 200).into()))
    );
}

#[test]
fn window_geometry_requires_a_role() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = SurfaceId(1);
    state.owners.insert(surface, CLIENT);
    wm_base_request(&mut state, CLIENT, xdg_wm_base::Request::GetXdgSurface { surface }).unwrap();

    let result = xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::SetWindowGeometry {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::Surface {
            code: xdg_surface::Error::NotConstructed,
            ..
        })
    ));
}

#[test]
fn popup_maps_with_positioner_geometry() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    assert!(state.signals.contains(&Signal::NewPopup(popup)));
    assert_eq!(state.shell.popup_parent(popup), Some(toplevel));

    surface_commit(&mut state, popup).unwrap();
    dispatch(&mut event_loop, &mut state);
    let sent = drain(&state);
    let geometry = Rectangle::new((45, 45).into(), (10, 10).into());
    assert_eq!(sent[0], Tx::PopupConfigure { surface: popup, geometry });
    assert_eq!(state.shell.popup_geometry(popup), Some(geometry));

    let serial = sent_configure_serial(&sent);
    xdg_surface_request(&mut state, popup, xdg_surface::Request::AckConfigure { serial }).unwrap();
    state.buffers.insert(popup);
    surface_commit(&mut state, popup).unwrap();
    assert!(state.signals.contains(&Signal::NewSurface(popup)));
}

#[test]
fn incomplete_positioner_is_rejected_at_popup_creation() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = create_toplevel(&mut state, 1);
    let surface = SurfaceId(2);
    let positioner = PositionerId(2);
    state.owners.insert(surface, CLIENT);
    wm_base_request(
        &mut state,
        CLIENT,
        xdg_wm_base::Request::CreatePositioner { id: positioner },
    )
    .unwrap();
    wm_base_request(&mut state, CLIENT, xdg_wm_base::Request::GetXdgSurface { surface }).unwrap();

    let result = xdg_surface_request(
        &mut state,
        surface,
        xdg_surface::Request::GetPopup {
            parent: toplevel,
            positioner,
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::InvalidPositioner,
            ..
        })
    ));
}

#[test]
fn nested_grabs_enforce_stacking_order() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);

    let first = create_popup(&mut state, 2, toplevel);
    popup_request(
        &mut state,
        first,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    )
    .unwrap();
    assert!(state.pointer_grab.is_some());
    assert!(state.keyboard_grab.is_some());
    map_surface(&mut event_loop, &mut state, first);

    let second = create_popup(&mut state, 3, first);
    popup_request(
        &mut state,
        second,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(11),
        },
    )
    .unwrap();
    map_surface(&mut event_loop, &mut state, second);

    // a popup whose parent is not the topmost popup cannot grab
    let third = create_popup(&mut state, 4, toplevel);
    let result = popup_request(
        &mut state,
        third,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(12),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::NotTheTopmostPopup,
            ..
        })
    ));

    // destroying the bottom of the chain first is an error, but it
    // still goes away
    let result = popup_request(&mut state, first, xdg_popup::Request::Destroy);
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::NotTheTopmostPopup,
            ..
        })
    ));
    assert_eq!(state.shell.popup_parent(first), None);

    // topmost destruction is clean
    popup_request(&mut state, second, xdg_popup::Request::Destroy).unwrap();
    assert!(state.pointer_grab.is_none());
    assert!(state.keyboard_grab.is_none());
}

#[test]
fn grab_refused_once_the_popup_is_mapped() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    map_surface(&mut event_loop, &mut state, popup);

    let result = popup_request(
        &mut state,
        popup,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::Popup {
            code: xdg_popup::Error::InvalidGrab,
            ..
        })
    ));
}

#[test]
fn grab_requires_a_toplevel_under_an_empty_chain() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let parent_popup = create_popup(&mut state, 2, toplevel);
    map_surface(&mut event_loop, &mut state, parent_popup);

    // parent is a popup, but nothing grabbed it
    let child = create_popup(&mut state, 3, parent_popup);
    let result = popup_request(
        &mut state,
        child,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::WmBase {
            code: xdg_wm_base::Error::NotTheTopmostPopup,
            ..
        })
    ));
}

#[test]
fn cancelled_grab_dismisses_the_whole_chain() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let first = create_popup(&mut state, 2, toplevel);
    popup_request(
        &mut state,
        first,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    )
    .unwrap();
    map_surface(&mut event_loop, &mut state, first);
    let second = create_popup(&mut state, 3, first);
    popup_request(
        &mut state,
        second,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(11),
        },
    )
    .unwrap();
    map_surface(&mut event_loop, &mut state, second);
    drain(&state);

    let mut grab = state.pointer_grab.take().unwrap();
    grab.cancel(&mut state);

    // topmost popup is dismissed first
    let sent = drain(&state);
    assert_eq!(
        sent,
        vec![
            Tx::PopupDone { surface: second },
            Tx::PopupDone { surface: first },
        ]
    );
    assert!(state.keyboard_grab.is_none());

    // the client destroys them in stacking order without errors
    popup_request(&mut state, second, xdg_popup::Request::Destroy).unwrap();
    popup_request(&mut state, first, xdg_popup::Request::Destroy).unwrap();
}

#[test]
fn button_without_focused_client_ends_the_grab() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    popup_request(
        &mut state,
        popup,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    )
    .unwrap();
    map_surface(&mut event_loop, &mut state, popup);
    drain(&state);

    let mut grab = state.pointer_grab.take().unwrap();

    // focused client present, the grab stays
    grab.button(&mut state, 1000, 0x110, ButtonState::Pressed);
    assert!(drain(&state).is_empty());

    // no focused client, the chain is dismissed
    state.button_serial = None;
    grab.button(&mut state, 1001, 0x110, ButtonState::Pressed);
    assert_eq!(drain(&state), vec![Tx::PopupDone { surface: popup }]);
}

#[test]
fn grab_enter_is_limited_to_the_grabbing_client() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    popup_request(
        &mut state,
        popup,
        xdg_popup::Request::Grab {
            seat: SEAT,
            serial: Serial::from(10),
        },
    )
    .unwrap();
    map_surface(&mut event_loop, &mut state, popup);

    let mut grab = state.pointer_grab.take().unwrap();

    grab.enter(&mut state, popup, (1.0, 1.0).into());
    assert_eq!(state.pointer_focus, Some(popup));

    // a surface of another client clears the focus instead
    let foreign = SurfaceId(99);
    state.owners.insert(foreign, OTHER_CLIENT);
    grab.enter(&mut state, foreign, (1.0, 1.0).into());
    assert_eq!(state.pointer_focus, None);
}

#[test]
fn move_request_needs_a_configured_surface_and_fresh_serial() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let unconfigured = create_toplevel(&mut state, 1);
    let result = toplevel_request(
        &mut state,
        unconfigured,
        xdg_toplevel::Request::Move {
            seat: SEAT,
            serial: Serial::from(5),
        },
    );
    assert!(matches!(
        result,
        Err(ProtocolError::Surface {
            code: xdg_surface::Error::NotConstructed,
            ..
        })
    ));

    let surface = mapped_toplevel(&mut event_loop, &mut state, 2);

    // a stale serial is dropped, not fatal
    state.serial_valid = false;
    toplevel_request(
        &mut state,
        surface,
        xdg_toplevel::Request::Move {
            seat: SEAT,
            serial: Serial::from(5),
        },
    )
    .unwrap();
    assert!(state.signals.is_empty());

    state.serial_valid = true;
    toplevel_request(
        &mut state,
        surface,
        xdg_toplevel::Request::Move {
            seat: SEAT,
            serial: Serial::from(6),
        },
    )
    .unwrap();
    assert_eq!(
        state.signals,
        vec![Signal::Move(surface, SEAT, Serial::from(6))]
    );
}

#[test]
fn state_requests_update_next_and_signal_the_compositor() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);

    toplevel_request(&mut state, surface, xdg_toplevel::Request::SetMaximized).unwrap();
    toplevel_request(
        &mut state,
        surface,
        xdg_toplevel::Request::SetFullscreen {
            output: Some(OutputId(7)),
        },
    )
    .unwrap();
    toplevel_request(&mut state, surface, xdg_toplevel::Request::SetMinimized).unwrap();

    assert_eq!(
        state.signals,
        vec![
            Signal::Maximize(surface),
            Signal::Fullscreen(surface, true, Some(OutputId(7))),
            Signal::Minimize(surface),
        ]
    );

    // the compositor answers through the pending state
    state.shell.toplevel_set_maximized(surface, true).unwrap();
    dispatch(&mut event_loop, &mut state);
    let sent = drain(&state);
    assert!(matches!(
        &sent[0],
        Tx::ToplevelConfigure { states, .. }
            if states.contains(&xdg_toplevel::State::Maximized)
    ));
}

#[test]
fn close_reaches_only_toplevels() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    drain(&state);

    state.shell.toplevel_send_close(toplevel);
    state.shell.toplevel_send_close(popup);
    assert_eq!(drain(&state), vec![Tx::Close { surface: toplevel }]);
}

#[test]
fn titles_and_app_ids_stick_to_the_surface() {
    let event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = create_toplevel(&mut state, 1);
    toplevel_request(
        &mut state,
        surface,
        xdg_toplevel::Request::SetTitle {
            title: "weston-terminal".into(),
        },
    )
    .unwrap();
    toplevel_request(
        &mut state,
        surface,
        xdg_toplevel::Request::SetAppId {
            app_id: "org.freedesktop.weston.terminal".into(),
        },
    )
    .unwrap();

    assert_eq!(state.shell.title(surface), Some("weston-terminal"));
    assert_eq!(
        state.shell.app_id(surface),
        Some("org.freedesktop.weston.terminal")
    );
}

#[test]
fn ping_is_answered_by_matching_pong() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    state.shell.set_ping_timeout(Duration::from_millis(5));

    let surface = create_toplevel(&mut state, 1);
    state.shell.ping(surface);
    let sent = drain(&state);
    let serial = match sent.as_slice() {
        [Tx::Ping { client, serial }] => {
            assert_eq!(*client, CLIENT);
            *serial
        }
        other => panic!("expected a single ping, got {other:?}"),
    };

    // a second ping while one is outstanding is a no-op
    state.shell.ping(surface);
    assert!(drain(&state).is_empty());

    // a mismatched pong is ignored
    wm_base_request(
        &mut state,
        CLIENT,
        xdg_wm_base::Request::Pong {
            serial: Serial::from(u32::from(serial).wrapping_add(17)),
        },
    )
    .unwrap();
    wm_base_request(&mut state, CLIENT, xdg_wm_base::Request::Pong { serial }).unwrap();

    // timer disarmed, waiting past the timeout fires nothing
    std::thread::sleep(Duration::from_millis(10));
    dispatch(&mut event_loop, &mut state);
    assert!(state.signals.is_empty());

    // and the client can be pinged again
    state.shell.ping(surface);
    assert_eq!(drain(&state).len(), 1);
}

#[test]
fn missed_ping_times_out_every_surface_of_the_client() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);
    state.shell.set_ping_timeout(Duration::from_millis(5));

    let first = create_toplevel(&mut state, 1);
    let second = create_toplevel(&mut state, 2);
    state.shell.ping(first);
    drain(&state);

    event_loop
        .dispatch(Some(Duration::from_millis(100)), &mut state)
        .unwrap();

    assert!(state.signals.contains(&Signal::PingTimeout(first)));
    assert!(state.signals.contains(&Signal::PingTimeout(second)));

    // the timeout cleared the outstanding serial, pinging works again
    state.shell.ping(first);
    assert_eq!(drain(&state).len(), 1);
}

#[test]
fn base_surface_destruction_tears_the_xdg_surface_down() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let surface = mapped_toplevel(&mut event_loop, &mut state, 1);
    base_surface_destroyed(&mut state, surface).unwrap();

    assert_eq!(state.signals, vec![Signal::Destroyed(surface)]);
    assert_eq!(state.shell.window_geometry(surface), None);

    // a pending configure dies with the surface
    let other = create_toplevel(&mut state, 2);
    surface_commit(&mut state, other).unwrap();
    base_surface_destroyed(&mut state, other).unwrap();
    dispatch(&mut event_loop, &mut state);
    assert!(drain(&state).is_empty());
}

#[test]
fn client_teardown_destroys_all_surfaces() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    map_surface(&mut event_loop, &mut state, popup);
    state.signals.clear();

    client_disconnected(&mut state, CLIENT);

    assert!(state.signals.contains(&Signal::Destroyed(toplevel)));
    assert!(state.signals.contains(&Signal::Destroyed(popup)));
    assert_eq!(state.shell.window_geometry(toplevel), None);
    assert_eq!(state.shell.window_geometry(popup), None);
}

#[test]
fn popup_at_finds_the_topmost_popup() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    let popup = create_popup(&mut state, 2, toplevel);
    map_surface(&mut event_loop, &mut state, popup);

    // the popup covers (45, 45)..(55, 55) in the toplevel's space
    let hit = popup_at(&mut state, toplevel, (50.0, 50.0).into());
    assert_eq!(hit, Some((popup, Point::from((45.0, 45.0)))));

    let miss = popup_at(&mut state, toplevel, (10.0, 10.0).into());
    assert_eq!(miss, None);
}

#[test]
fn popup_position_accounts_for_window_geometries() {
    let mut event_loop = Loop::try_new().unwrap();
    let mut state = test_state(&event_loop);

    let toplevel = mapped_toplevel(&mut event_loop, &mut state, 1);
    xdg_surface_request(
        &mut state,
        toplevel,
        xdg_surface::Request::SetWindowGeometry {
            x: 7,
            y: 3,
            width: 100,
            height: 100,
        },
    )
    .unwrap();
    surface_commit(&mut state, toplevel).unwrap();

    let popup = create_popup(&mut state, 2, toplevel);
    map_surface(&mut event_loop, &mut state, popup);

    // parent geometry offset + popup placement, in parent surface coords
    assert_eq!(
        state.shell.popup_position(popup),
        Some(Point::from((52.0, 48.0)))
    );
}
