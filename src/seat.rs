//! Contract to the seat subsystem
//!
//! Seats, focus bookkeeping and input serial validation belong to the
//! embedding compositor. The shell installs popup grabs into the seat's
//! single pointer/keyboard grab slots through [`SeatHandler`]; while a
//! grab is installed the seat routes its input through the corresponding
//! [`PointerGrab`]/[`KeyboardGrab`] object instead of the default path.

use crate::protocol::{SeatId, SurfaceId};
use crate::utils::{Logical, Point, Serial};

/// State of a pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    /// The button is released
    Released,
    /// The button is pressed
    Pressed,
}

/// State of a keyboard key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// The key is released
    Released,
    /// The key is pressed
    Pressed,
}

/// Orientation of a scroll axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Vertical scrolling
    Vertical,
    /// Horizontal scrolling
    Horizontal,
}

/// A keyboard modifier state, as tracked by xkb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifiersState {
    /// Depressed modifiers
    pub depressed: u32,
    /// Latched modifiers
    pub latched: u32,
    /// Locked modifiers
    pub locked: u32,
    /// Active keyboard layout group
    pub group: u32,
}

/// A grab installed into a seat's pointer grab slot
///
/// While installed, the seat calls these methods instead of its default
/// input routing. `cancel` is invoked when the seat forcibly removes the
/// grab, for example because another grab replaces it.
pub trait PointerGrab<D> {
    /// The pointer moved onto a surface
    fn enter(&mut self, data: &mut D, surface: SurfaceId, location: Point<f64, Logical>);
    /// The pointer moved within the focused surface
    fn motion(&mut self, data: &mut D, time: u32, location: Point<f64, Logical>);
    /// A button was pressed or released
    fn button(&mut self, data: &mut D, time: u32, button: u32, state: ButtonState);
    /// The pointer scrolled
    fn axis(&mut self, data: &mut D, time: u32, axis: Axis, value: f64);
    /// The grab is forcibly removed from the seat
    fn cancel(&mut self, data: &mut D);
}

/// A grab installed into a seat's keyboard grab slot
pub trait KeyboardGrab<D> {
    /// The keyboard focus would move to another surface
    fn enter(&mut self, data: &mut D, surface: SurfaceId);
    /// A key was pressed or released
    fn key(&mut self, data: &mut D, time: u32, key: u32, state: KeyState);
    /// The modifier state changed
    fn modifiers(&mut self, data: &mut D, modifiers: ModifiersState);
    /// The grab is forcibly removed from the seat
    fn cancel(&mut self, data: &mut D);
}

/// Access to the compositor's seats
///
/// The `*_send_*` methods are the seat's default event delivery, used by
/// the grab handlers to forward input they let pass through. Ending a
/// grab via `end_pointer_grab`/`end_keyboard_grab` must not invoke the
/// ending grab's `cancel`.
pub trait SeatHandler: Sized {
    /// Is this serial a valid recent input serial for a grab on this seat?
    fn validate_grab_serial(&mut self, seat: SeatId, serial: Serial) -> bool;

    /// Give a surface pointer focus
    fn pointer_enter(&mut self, seat: SeatId, surface: SurfaceId, location: Point<f64, Logical>);
    /// Clear the pointer focus
    fn pointer_clear_focus(&mut self, seat: SeatId);
    /// Send a motion event to the focused client
    fn pointer_send_motion(&mut self, seat: SeatId, time: u32, location: Point<f64, Logical>);
    /// Send a button event to the focused client
    ///
    /// Returns the serial of the sent event, or `None` if no client has
    /// pointer focus.
    fn pointer_send_button(
        &mut self,
        seat: SeatId,
        time: u32,
        button: u32,
        state: ButtonState,
    ) -> Option<Serial>;
    /// Send an axis event to the focused client
    fn pointer_send_axis(&mut self, seat: SeatId, time: u32, axis: Axis, value: f64);

    /// Send a key event to the focused client
    fn keyboard_send_key(&mut self, seat: SeatId, time: u32, key: u32, state: KeyState);
    /// Send a modifiers event to the focused client
    fn keyboard_send_modifiers(&mut self, seat: SeatId, modifiers: ModifiersState);

    /// Install a grab into the seat's pointer grab slot
    fn start_pointer_grab(&mut self, seat: SeatId, grab: Box<dyn PointerGrab<Self>>);
    /// Install a grab into the seat's keyboard grab slot
    fn start_keyboard_grab(&mut self, seat: SeatId, grab: Box<dyn KeyboardGrab<Self>>);
    /// Remove the current pointer grab, restoring default routing
    fn end_pointer_grab(&mut self, seat: SeatId);
    /// Remove the current keyboard grab, restoring default routing
    fn end_keyboard_grab(&mut self, seat: SeatId);
}
