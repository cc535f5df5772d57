use crate::protocol::{xdg_toplevel, SurfaceId};
use crate::utils::{Logical, Serial, Size};

use super::surface::{Configure, Role};
use super::{XdgShellHandler, XdgShellState};

/// A snapshot of toplevel state, as carried by a configure event
///
/// Three of these live on every toplevel surface: `pending` is the
/// compositor's in-flight intent, `next` is what the client acknowledged
/// last, and `current` is what the last buffer-carrying commit made real.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToplevelState {
    /// The surface is maximized
    pub maximized: bool,
    /// The surface is fullscreen
    pub fullscreen: bool,
    /// An interactive resize is in progress
    pub resizing: bool,
    /// The surface is activated
    pub activated: bool,
    /// The suggested size, `(0, 0)` lets the client pick
    pub size: Size<i32, Logical>,
    /// Minimum size requested by the client, 0 means unconstrained
    pub min_size: Size<i32, Logical>,
    /// Maximum size requested by the client, 0 means unconstrained
    pub max_size: Size<i32, Logical>,
    /// The parent toplevel, if any
    pub parent: Option<SurfaceId>,
}

/// Role data of a toplevel surface
#[derive(Debug, Default)]
pub(crate) struct XdgToplevel {
    pub(crate) current: ToplevelState,
    pub(crate) next: ToplevelState,
    pub(crate) pending: ToplevelState,
    /// The initial zero-dimension configure was scheduled
    pub(crate) added: bool,
}

/// Build the `states` array of a toplevel configure event
pub(crate) fn configure_states(state: &ToplevelState) -> Vec<xdg_toplevel::State> {
    let mut states = Vec::new();
    if state.maximized {
        states.push(xdg_toplevel::State::Maximized);
    }
    if state.fullscreen {
        states.push(xdg_toplevel::State::Fullscreen);
    }
    if state.resizing {
        states.push(xdg_toplevel::State::Resizing);
    }
    if state.activated {
        states.push(xdg_toplevel::State::Activated);
    }
    states
}

impl<D: XdgShellHandler> XdgShellState<D> {
    /// Is the pending state equal to the last state the client knows about?
    ///
    /// The reference is the tail of the configure queue, the last in-flight
    /// configure, and only falls back to the committed state joined with the
    /// surface's actual dimensions once the queue is empty. A pending size
    /// of `(0, 0)` always counts as equal, the client keeps choosing.
    pub(crate) fn toplevel_pending_same(&self, surface: SurfaceId) -> bool {
        let Some(entry) = self.surfaces.get(&surface) else {
            return false;
        };
        let Role::Toplevel(toplevel) = &entry.role else {
            return false;
        };

        if !entry.configured {
            return false;
        }

        let (configured_state, configured_size) = match entry.pending_configures.back() {
            Some(Configure::Toplevel(configure)) => (&configure.state, configure.state.size),
            _ => (&toplevel.current, entry.current_size),
        };

        if toplevel.pending.activated != configured_state.activated {
            return false;
        }
        if toplevel.pending.fullscreen != configured_state.fullscreen {
            return false;
        }
        if toplevel.pending.maximized != configured_state.maximized {
            return false;
        }
        if toplevel.pending.resizing != configured_state.resizing {
            return false;
        }

        if toplevel.pending.size == configured_size {
            return true;
        }

        if toplevel.pending.size == Size::default() {
            return true;
        }

        false
    }

    /// Suggest a new size for a toplevel surface
    ///
    /// `(0, 0)` lets the client decide its own dimensions. Returns the
    /// serial of the configure this change will be carried by, or `None`
    /// if no configure was needed.
    pub fn toplevel_set_size(
        &mut self,
        surface: SurfaceId,
        size: Size<i32, Logical>,
    ) -> Option<Serial> {
        self.with_toplevel_pending(surface, |pending| pending.size = size)?;
        self.schedule_configure(surface)
    }

    /// Set whether a toplevel surface is activated
    pub fn toplevel_set_activated(&mut self, surface: SurfaceId, activated: bool) -> Option<Serial> {
        self.with_toplevel_pending(surface, |pending| pending.activated = activated)?;
        self.schedule_configure(surface)
    }

    /// Set whether a toplevel surface is maximized
    pub fn toplevel_set_maximized(&mut self, surface: SurfaceId, maximized: bool) -> Option<Serial> {
        self.with_toplevel_pending(surface, |pending| pending.maximized = maximized)?;
        self.schedule_configure(surface)
    }

    /// Set whether a toplevel surface is fullscreen
    pub fn toplevel_set_fullscreen(
        &mut self,
        surface: SurfaceId,
        fullscreen: bool,
    ) -> Option<Serial> {
        self.with_toplevel_pending(surface, |pending| pending.fullscreen = fullscreen)?;
        self.schedule_configure(surface)
    }

    /// Set whether a toplevel surface is being interactively resized
    pub fn toplevel_set_resizing(&mut self, surface: SurfaceId, resizing: bool) -> Option<Serial> {
        self.with_toplevel_pending(surface, |pending| pending.resizing = resizing)?;
        self.schedule_configure(surface)
    }

    /// Ask the client to close a toplevel surface
    pub fn toplevel_send_close(&mut self, surface: SurfaceId) {
        let is_toplevel = matches!(
            self.surfaces.get(&surface).map(|entry| &entry.role),
            Some(Role::Toplevel(_))
        );
        if is_toplevel {
            self.transport.send_close(surface);
        }
    }

    /// The state the last buffer-carrying commit made current
    pub fn toplevel_state(&self, surface: SurfaceId) -> Option<&ToplevelState> {
        match self.surfaces.get(&surface).map(|entry| &entry.role) {
            Some(Role::Toplevel(toplevel)) => Some(&toplevel.current),
            _ => None,
        }
    }

    fn with_toplevel_pending(
        &mut self,
        surface: SurfaceId,
        f: impl FnOnce(&mut ToplevelState),
    ) -> Option<()> {
        match self.surfaces.get_mut(&surface).map(|entry| &mut entry.role) {
            Some(Role::Toplevel(toplevel)) => {
                f(&mut toplevel.pending);
                Some(())
            }
            _ => None,
        }
    }
}
