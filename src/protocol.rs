//! Typed view of the xdg-shell wire protocol
//!
//! The wire dispatcher owns message parsing and resource bookkeeping; this
//! module is the boundary between it and the shell. Inbound messages arrive
//! as the per-interface `Request` enums below, already parsed, carrying the
//! dispatcher-allocated object ids. Outbound messages leave through the
//! [`ShellTransport`] trait. Protocol violations are reported as
//! [`ProtocolError`]; posting the error code on the offending resource and
//! tearing the connection down is the dispatcher's job.

use crate::utils::{Logical, Rectangle, Serial, Size};

/// Identifies a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u32);

/// Identifies a `wl_surface` and the `xdg_surface` constructed over it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Identifies an `xdg_positioner` object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionerId(pub u32);

/// Identifies a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeatId(pub u32);

/// Identifies an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u32);

/// The `xdg_wm_base` interface
pub mod xdg_wm_base {
    use super::{PositionerId, SurfaceId};
    use crate::utils::Serial;

    /// Requests of the `xdg_wm_base` interface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        /// Destroy the shell object, and with it every object it created
        Destroy,
        /// Create a new positioner object
        CreatePositioner {
            /// id of the new positioner
            id: PositionerId,
        },
        /// Assign the `xdg_surface` role to a surface
        GetXdgSurface {
            /// the underlying `wl_surface`
            surface: SurfaceId,
        },
        /// Respond to a ping event
        Pong {
            /// serial of the ping event
            serial: Serial,
        },
    }

    /// Protocol error codes of `xdg_wm_base`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum Error {
        /// Given `wl_surface` has another role
        Role = 0,
        /// `xdg_wm_base` was destroyed before children
        DefunctSurfaces = 1,
        /// The client tried to map or destroy a non-topmost popup
        NotTheTopmostPopup = 2,
        /// The client specified an invalid popup parent surface
        InvalidPopupParent = 3,
        /// The client provided an invalid surface state
        InvalidSurfaceState = 4,
        /// The client provided an invalid positioner
        InvalidPositioner = 5,
    }
}

/// The `xdg_positioner` interface
#[allow(non_upper_case_globals)] // flag names follow the protocol spelling
pub mod xdg_positioner {
    use bitflags::bitflags;

    /// Requests of the `xdg_positioner` interface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        /// Destroy the positioner object
        Destroy,
        /// Set the size of the to-be-positioned rectangle
        SetSize {
            /// width of positioned rectangle
            width: i32,
            /// height of positioned rectangle
            height: i32,
        },
        /// Set the anchor rectangle within the parent surface
        SetAnchorRect {
            /// x position of anchor rectangle
            x: i32,
            /// y position of anchor rectangle
            y: i32,
            /// width of anchor rectangle
            width: i32,
            /// height of anchor rectangle
            height: i32,
        },
        /// Set anchor rectangle anchor
        SetAnchor {
            /// raw anchor value, validated by the handler
            anchor: u32,
        },
        /// Set child surface gravity
        SetGravity {
            /// raw gravity value, validated by the handler
            gravity: u32,
        },
        /// Set the adjustment to be done when constrained
        SetConstraintAdjustment {
            /// bit mask of constraint adjustments
            constraint_adjustment: u32,
        },
        /// Set surface position offset
        SetOffset {
            /// surface position x offset
            x: i32,
            /// surface position y offset
            y: i32,
        },
    }

    /// Protocol error codes of `xdg_positioner`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum Error {
        /// Invalid input provided
        InvalidInput = 0,
    }

    /// Edge or corner of the anchor rectangle the popup anchors to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(u32)]
    pub enum Anchor {
        /// Center of the anchor rectangle
        #[default]
        None = 0,
        /// Top edge
        Top = 1,
        /// Bottom edge
        Bottom = 2,
        /// Left edge
        Left = 3,
        /// Right edge
        Right = 4,
        /// Top-left corner
        TopLeft = 5,
        /// Bottom-left corner
        BottomLeft = 6,
        /// Top-right corner
        TopRight = 7,
        /// Bottom-right corner
        BottomRight = 8,
    }

    impl Anchor {
        /// Interpret a raw wire value, if it is within range
        pub fn from_raw(raw: u32) -> Option<Anchor> {
            match raw {
                0 => Some(Anchor::None),
                1 => Some(Anchor::Top),
                2 => Some(Anchor::Bottom),
                3 => Some(Anchor::Left),
                4 => Some(Anchor::Right),
                5 => Some(Anchor::TopLeft),
                6 => Some(Anchor::BottomLeft),
                7 => Some(Anchor::TopRight),
                8 => Some(Anchor::BottomRight),
                _ => None,
            }
        }
    }

    /// Direction the popup is positioned towards, relative to its anchor point
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(u32)]
    pub enum Gravity {
        /// Centered over the anchor point
        #[default]
        None = 0,
        /// Towards the top
        Top = 1,
        /// Towards the bottom
        Bottom = 2,
        /// Towards the left
        Left = 3,
        /// Towards the right
        Right = 4,
        /// Towards the top-left
        TopLeft = 5,
        /// Towards the bottom-left
        BottomLeft = 6,
        /// Towards the top-right
        TopRight = 7,
        /// Towards the bottom-right
        BottomRight = 8,
    }

    impl Gravity {
        /// Interpret a raw wire value, if it is within range
        pub fn from_raw(raw: u32) -> Option<Gravity> {
            match raw {
                0 => Some(Gravity::None),
                1 => Some(Gravity::Top),
                2 => Some(Gravity::Bottom),
                3 => Some(Gravity::Left),
                4 => Some(Gravity::Right),
                5 => Some(Gravity::TopLeft),
                6 => Some(Gravity::BottomLeft),
                7 => Some(Gravity::TopRight),
                8 => Some(Gravity::BottomRight),
                _ => None,
            }
        }
    }

    bitflags! {
        /// Adjustments the compositor may apply when the popup is constrained
        ///
        /// Opaque to this crate, surfaced to the compositor policy hook.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct ConstraintAdjustment: u32 {
            /// Move along the x axis until unconstrained
            const SlideX = 1;
            /// Move along the y axis until unconstrained
            const SlideY = 2;
            /// Invert the anchor and gravity on the x axis
            const FlipX = 4;
            /// Invert the anchor and gravity on the y axis
            const FlipY = 8;
            /// Resize along the x axis
            const ResizeX = 16;
            /// Resize along the y axis
            const ResizeY = 32;
        }
    }
}

/// The `xdg_surface` interface
pub mod xdg_surface {
    use super::{PositionerId, SurfaceId};
    use crate::utils::Serial;

    /// Requests of the `xdg_surface` interface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        /// Destroy the `xdg_surface`
        Destroy,
        /// Assign the `xdg_toplevel` role
        GetToplevel,
        /// Assign the `xdg_popup` role
        GetPopup {
            /// the parent surface
            parent: SurfaceId,
            /// positioner describing the placement
            positioner: PositionerId,
        },
        /// Set the new window geometry
        SetWindowGeometry {
            /// x position of the geometry
            x: i32,
            /// y position of the geometry
            y: i32,
            /// width of the geometry
            width: i32,
            /// height of the geometry
            height: i32,
        },
        /// Acknowledge a configure event
        AckConfigure {
            /// serial of the configure event
            serial: Serial,
        },
    }

    /// Protocol error codes of `xdg_surface`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum Error {
        /// Surface was not fully constructed
        NotConstructed = 1,
        /// Surface was already constructed
        AlreadyConstructed = 2,
        /// Attaching a buffer to an unconfigured surface
        UnconfiguredBuffer = 3,
    }
}

/// The `xdg_toplevel` interface
pub mod xdg_toplevel {
    use super::{OutputId, SeatId, SurfaceId};
    use crate::utils::Serial;

    /// Requests of the `xdg_toplevel` interface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        /// Destroy the `xdg_toplevel`
        Destroy,
        /// Set the parent of this toplevel
        SetParent {
            /// the parent toplevel surface, if any
            parent: Option<SurfaceId>,
        },
        /// Set the surface title
        SetTitle {
            /// the title in UTF-8
            title: String,
        },
        /// Set the application id
        SetAppId {
            /// the application identifier
            app_id: String,
        },
        /// Show the window menu
        ShowWindowMenu {
            /// the seat the request came from
            seat: SeatId,
            /// serial of the triggering input event
            serial: Serial,
            /// x position relative to the window geometry
            x: i32,
            /// y position relative to the window geometry
            y: i32,
        },
        /// Start an interactive move
        Move {
            /// the seat the request came from
            seat: SeatId,
            /// serial of the triggering input event
            serial: Serial,
        },
        /// Start an interactive resize
        Resize {
            /// the seat the request came from
            seat: SeatId,
            /// serial of the triggering input event
            serial: Serial,
            /// raw resize edge value, validated by the handler
            edges: u32,
        },
        /// Set the maximum size
        SetMaxSize {
            /// maximum width, 0 for unconstrained
            width: i32,
            /// maximum height, 0 for unconstrained
            height: i32,
        },
        /// Set the minimum size
        SetMinSize {
            /// minimum width, 0 for unconstrained
            width: i32,
            /// minimum height, 0 for unconstrained
            height: i32,
        },
        /// Ask to maximize the window
        SetMaximized,
        /// Ask to unmaximize the window
        UnsetMaximized,
        /// Ask to make the window fullscreen
        SetFullscreen {
            /// preferred output, if any
            output: Option<OutputId>,
        },
        /// Ask to leave fullscreen
        UnsetFullscreen,
        /// Ask to minimize the window
        SetMinimized,
    }

    /// Toplevel state advertised in a configure event
    ///
    /// The wire format is a `uint32[]` carrying these values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum State {
        /// The surface is maximized
        Maximized = 1,
        /// The surface is fullscreen
        Fullscreen = 2,
        /// The surface is being resized
        Resizing = 3,
        /// The surface is now activated
        Activated = 4,
    }

    /// Edge of the surface an interactive resize is grabbing
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(u32)]
    pub enum ResizeEdge {
        /// No edge
        #[default]
        None = 0,
        /// Top edge
        Top = 1,
        /// Bottom edge
        Bottom = 2,
        /// Left edge
        Left = 4,
        /// Top-left corner
        TopLeft = 5,
        /// Bottom-left corner
        BottomLeft = 6,
        /// Right edge
        Right = 8,
        /// Top-right corner
        TopRight = 9,
        /// Bottom-right corner
        BottomRight = 10,
    }

    impl ResizeEdge {
        /// Interpret a raw wire value, if it is within range
        pub fn from_raw(raw: u32) -> Option<ResizeEdge> {
            match raw {
                0 => Some(ResizeEdge::None),
                1 => Some(ResizeEdge::Top),
                2 => Some(ResizeEdge::Bottom),
                4 => Some(ResizeEdge::Left),
                5 => Some(ResizeEdge::TopLeft),
                6 => Some(ResizeEdge::BottomLeft),
                8 => Some(ResizeEdge::Right),
                9 => Some(ResizeEdge::TopRight),
                10 => Some(ResizeEdge::BottomRight),
                _ => None,
            }
        }
    }
}

/// The `xdg_popup` interface
pub mod xdg_popup {
    use super::SeatId;
    use crate::utils::Serial;

    /// Requests of the `xdg_popup` interface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Request {
        /// Destroy the `xdg_popup`
        Destroy,
        /// Make the popup take an explicit grab
        Grab {
            /// the seat the grab is for
            seat: SeatId,
            /// serial of the triggering input event
            serial: Serial,
        },
    }

    /// Protocol error codes of `xdg_popup`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u32)]
    pub enum Error {
        /// Tried to grab after being mapped
        InvalidGrab = 0,
    }
}

/// A fatal protocol violation by a client
///
/// The dispatcher posts the code on the offending resource and closes
/// the connection. The handler has already discarded any side effects
/// of the violating request when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// An error on the `xdg_wm_base` interface
    #[error("xdg_wm_base error {code:?}: {message}")]
    WmBase {
        /// the error code to post
        code: xdg_wm_base::Error,
        /// human readable description
        message: String,
    },
    /// An error on the `xdg_surface` interface
    #[error("xdg_surface error {code:?}: {message}")]
    Surface {
        /// the error code to post
        code: xdg_surface::Error,
        /// human readable description
        message: String,
    },
    /// An error on the `xdg_positioner` interface
    #[error("xdg_positioner error {code:?}: {message}")]
    Positioner {
        /// the error code to post
        code: xdg_positioner::Error,
        /// human readable description
        message: String,
    },
    /// An error on the `xdg_popup` interface
    #[error("xdg_popup error {code:?}: {message}")]
    Popup {
        /// the error code to post
        code: xdg_popup::Error,
        /// human readable description
        message: String,
    },
}

impl ProtocolError {
    pub(crate) fn wm_base(code: xdg_wm_base::Error, message: impl Into<String>) -> Self {
        ProtocolError::WmBase {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn surface(code: xdg_surface::Error, message: impl Into<String>) -> Self {
        ProtocolError::Surface {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn positioner(code: xdg_positioner::Error, message: impl Into<String>) -> Self {
        ProtocolError::Positioner {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn popup(code: xdg_popup::Error, message: impl Into<String>) -> Self {
        ProtocolError::Popup {
            code,
            message: message.into(),
        }
    }
}

/// Outbound half of the wire dispatcher
///
/// The shell queues events through this trait; implementations serialize
/// them onto the respective client connection. Sending never re-enters
/// the shell.
pub trait ShellTransport {
    /// Send `xdg_wm_base.ping` to a client
    fn send_ping(&mut self, client: ClientId, serial: Serial);
    /// Send `xdg_surface.configure`
    fn send_surface_configure(&mut self, surface: SurfaceId, serial: Serial);
    /// Send `xdg_toplevel.configure`
    fn send_toplevel_configure(
        &mut self,
        surface: SurfaceId,
        size: Size<i32, Logical>,
        states: Vec<xdg_toplevel::State>,
    );
    /// Send `xdg_toplevel.close`
    fn send_close(&mut self, surface: SurfaceId);
    /// Send `xdg_popup.configure`
    fn send_popup_configure(&mut self, surface: SurfaceId, geometry: Rectangle<i32, Logical>);
    /// Send `xdg_popup.popup_done`
    fn send_popup_done(&mut self, surface: SurfaceId);
}
