use crate::protocol::{xdg_popup, xdg_wm_base, ClientId, ProtocolError, SeatId, SurfaceId};
use crate::seat::{Axis, ButtonState, KeyState, KeyboardGrab, ModifiersState, PointerGrab};
use crate::utils::{Logical, Point, Serial};

use super::surface::Role;
use super::{XdgShellHandler, XdgShellState};

/// Per-seat stack of popups holding an explicit grab
///
/// All input of the seat is redirected to the owning client while the
/// chain is non-empty; the topmost popup is the one that may be
/// destroyed or given a child next.
#[derive(Debug)]
pub(crate) struct PopupGrab {
    pub(crate) seat: SeatId,
    /// The client the grab restricts focus to
    pub(crate) client: Option<ClientId>,
    /// Grabbed popups, the topmost last
    pub(crate) popups: Vec<SurfaceId>,
    /// Our handler sits in the seat's pointer grab slot
    pub(crate) pointer_grabbed: bool,
    /// Our handler sits in the seat's keyboard grab slot
    pub(crate) keyboard_grabbed: bool,
}

impl PopupGrab {
    fn new(seat: SeatId) -> Self {
        PopupGrab {
            seat,
            client: None,
            popups: Vec::new(),
            pointer_grabbed: false,
            keyboard_grabbed: false,
        }
    }

    pub(crate) fn topmost(&self) -> Option<SurfaceId> {
        self.popups.last().copied()
    }
}

impl<D: XdgShellHandler> XdgShellState<D> {
    pub(crate) fn popup_grab_mut(&mut self, seat: SeatId) -> Option<&mut PopupGrab> {
        self.popup_grabs.iter_mut().find(|grab| grab.seat == seat)
    }

    fn popup_grab_for_seat(&mut self, seat: SeatId) -> &mut PopupGrab {
        let index = match self.popup_grabs.iter().position(|grab| grab.seat == seat) {
            Some(index) => index,
            None => {
                self.popup_grabs.push(PopupGrab::new(seat));
                self.popup_grabs.len() - 1
            }
        };
        &mut self.popup_grabs[index]
    }
}

/// Handle `xdg_popup.grab`
///
/// The popup must not be mapped yet, and its parent must be the current
/// topmost popup of the seat's chain (or a toplevel while the chain is
/// empty). On success the popup joins the chain and the shell's grab
/// handlers take the seat's pointer and keyboard grab slots.
pub(crate) fn popup_grab<D: XdgShellHandler>(
    data: &mut D,
    surface: SurfaceId,
    seat: SeatId,
    _serial: Serial,
) -> Result<(), ProtocolError> {
    let shell = data.xdg_shell_state();
    let Some(entry) = shell.surfaces.get(&surface) else {
        return Ok(());
    };
    let client = entry.client;
    let Role::Popup(popup) = &entry.role else {
        return Ok(());
    };

    if popup.committed {
        return Err(ProtocolError::popup(
            xdg_popup::Error::InvalidGrab,
            "xdg_popup is already mapped",
        ));
    }

    let parent = popup.parent;
    let parent_is_toplevel = matches!(
        shell.surfaces.get(&parent).map(|entry| &entry.role),
        Some(Role::Toplevel(_))
    );

    let chain = shell.popup_grab_for_seat(seat);
    let topmost = chain.topmost();
    if (topmost.is_none() && !parent_is_toplevel)
        || (topmost.is_some() && topmost != Some(parent))
    {
        return Err(ProtocolError::wm_base(
            xdg_wm_base::Error::NotTheTopmostPopup,
            "xdg_popup was not created on the topmost popup",
        ));
    }

    chain.client = Some(client);
    chain.popups.push(surface);
    chain.pointer_grabbed = true;
    chain.keyboard_grabbed = true;

    if let Some(Role::Popup(popup)) = shell
        .surfaces
        .get_mut(&surface)
        .map(|entry| &mut entry.role)
    {
        popup.seat = Some(seat);
    }

    data.start_pointer_grab(seat, Box::new(PopupPointerGrab { seat }));
    data.start_keyboard_grab(seat, Box::new(PopupKeyboardGrab { seat }));
    Ok(())
}

/// Tear the chain down: dismiss every grabbed popup and release the seat
///
/// `popup_done` makes well-behaved clients destroy the popups, which
/// removes them from the chain one by one.
pub(crate) fn grab_end<D: XdgShellHandler>(data: &mut D, seat: SeatId) {
    let shell = data.xdg_shell_state();
    let Some(chain) = shell.popup_grab_mut(seat) else {
        return;
    };

    // topmost first; snapshot, listeners may mutate the chain
    let popups: Vec<_> = chain.popups.iter().rev().copied().collect();
    let pointer = std::mem::replace(&mut chain.pointer_grabbed, false);
    let keyboard = std::mem::replace(&mut chain.keyboard_grabbed, false);

    for popup in popups {
        shell.transport.send_popup_done(popup);
    }

    if pointer {
        data.end_pointer_grab(seat);
    }
    if keyboard {
        data.end_keyboard_grab(seat);
    }
}

/// The pointer half of a popup grab
///
/// Keeps pointer focus within the grabbing client, dismisses the chain
/// on a button press without a focused client.
#[derive(Debug, Clone, Copy)]
pub struct PopupPointerGrab {
    seat: SeatId,
}

impl<D: XdgShellHandler> PointerGrab<D> for PopupPointerGrab {
    fn enter(&mut self, data: &mut D, surface: SurfaceId, location: Point<f64, Logical>) {
        let owner = data.surface_client(surface);
        let grab_client = data
            .xdg_shell_state()
            .popup_grab_mut(self.seat)
            .and_then(|chain| chain.client);

        if owner.is_some() && owner == grab_client {
            data.pointer_enter(self.seat, surface, location);
        } else {
            data.pointer_clear_focus(self.seat);
        }
    }

    fn motion(&mut self, data: &mut D, time: u32, location: Point<f64, Logical>) {
        data.pointer_send_motion(self.seat, time, location);
    }

    fn button(&mut self, data: &mut D, time: u32, button: u32, state: ButtonState) {
        if data
            .pointer_send_button(self.seat, time, button, state)
            .is_none()
        {
            // no client has focus, the grab is over
            grab_end(data, self.seat);
        }
    }

    fn axis(&mut self, data: &mut D, time: u32, axis: Axis, value: f64) {
        data.pointer_send_axis(self.seat, time, axis, value);
    }

    fn cancel(&mut self, data: &mut D) {
        grab_end(data, self.seat);
    }
}

/// The keyboard half of a popup grab
#[derive(Debug, Clone, Copy)]
pub struct PopupKeyboardGrab {
    seat: SeatId,
}

impl<D: XdgShellHandler> KeyboardGrab<D> for PopupKeyboardGrab {
    fn enter(&mut self, _data: &mut D, _surface: SurfaceId) {
        // keyboard focus stays on the popup
    }

    fn key(&mut self, data: &mut D, time: u32, key: u32, state: KeyState) {
        data.keyboard_send_key(self.seat, time, key, state);
    }

    fn modifiers(&mut self, data: &mut D, modifiers: ModifiersState) {
        data.keyboard_send_modifiers(self.seat, modifiers);
    }

    fn cancel(&mut self, data: &mut D) {
        grab_end(data, self.seat);
    }
}
