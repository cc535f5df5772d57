use crate::protocol::xdg_positioner::{Anchor, ConstraintAdjustment, Error, Gravity};
use crate::protocol::ProtocolError;
use crate::utils::{Logical, Point, Rectangle, Size};

/// The state of a positioner, as set by the client
///
/// A positioner accumulates placement parameters and is consumed when a
/// popup is created from it. The computed [`get_geometry`](Self::get_geometry)
/// deliberately ignores `constraint_adjustment`; resolving constraints is
/// compositor policy, hooked in through
/// [`XdgShellHandler::constrain_popup_geometry`](crate::shell::XdgShellHandler::constrain_popup_geometry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionerState {
    /// Size of the rectangle that needs to be positioned
    pub rect_size: Size<i32, Logical>,
    /// Anchor rectangle in the parent surface coordinates
    /// relative to which the surface must be positioned
    pub anchor_rect: Rectangle<i32, Logical>,
    /// Edges defining the anchor point
    pub anchor_edges: Anchor,
    /// Gravity direction for positioning the child surface
    /// relative to its anchor point
    pub gravity: Gravity,
    /// Adjustments to do if previous criteria constrain the surface
    pub constraint_adjustment: ConstraintAdjustment,
    /// Offset placement relative to the anchor point
    pub offset: Point<i32, Logical>,
}

impl Default for PositionerState {
    fn default() -> Self {
        PositionerState {
            rect_size: Default::default(),
            anchor_rect: Default::default(),
            anchor_edges: Anchor::None,
            gravity: Gravity::None,
            constraint_adjustment: ConstraintAdjustment::empty(),
            offset: Default::default(),
        }
    }
}

impl PositionerState {
    pub(crate) fn set_size(&mut self, width: i32, height: i32) -> Result<(), ProtocolError> {
        if width < 1 || height < 1 {
            return Err(ProtocolError::positioner(
                Error::InvalidInput,
                "width and height must be positive and non-zero",
            ));
        }
        self.rect_size = (width, height).into();
        Ok(())
    }

    pub(crate) fn set_anchor_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), ProtocolError> {
        if width < 1 || height < 1 {
            return Err(ProtocolError::positioner(
                Error::InvalidInput,
                "width and height must be positive and non-zero",
            ));
        }
        self.anchor_rect = Rectangle::new((x, y).into(), (width, height).into());
        Ok(())
    }

    pub(crate) fn set_anchor(&mut self, raw: u32) -> Result<(), ProtocolError> {
        let anchor = Anchor::from_raw(raw)
            .ok_or_else(|| ProtocolError::positioner(Error::InvalidInput, "invalid anchor value"))?;
        self.anchor_edges = anchor;
        Ok(())
    }

    pub(crate) fn set_gravity(&mut self, raw: u32) -> Result<(), ProtocolError> {
        let gravity = Gravity::from_raw(raw)
            .ok_or_else(|| ProtocolError::positioner(Error::InvalidInput, "invalid gravity value"))?;
        self.gravity = gravity;
        Ok(())
    }

    pub(crate) fn set_constraint_adjustment(&mut self, raw: u32) {
        self.constraint_adjustment = ConstraintAdjustment::from_bits_truncate(raw);
    }

    pub(crate) fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y).into();
    }

    /// A positioner is only usable for popup creation once both a size
    /// and an anchor rectangle were set.
    pub(crate) fn is_complete(&self) -> bool {
        self.rect_size.w != 0 && self.anchor_rect.size.w != 0
    }

    /// The point on the anchor rectangle the popup is positioned against
    ///
    /// A corner anchor pins that exact corner, an edge anchor the
    /// midpoint of the edge, and `None` the center of the rectangle.
    pub fn get_anchor_point(&self) -> Point<i32, Logical> {
        let rect = self.anchor_rect;

        let x = match self.anchor_edges {
            Anchor::Left | Anchor::TopLeft | Anchor::BottomLeft => rect.loc.x,
            Anchor::Right | Anchor::TopRight | Anchor::BottomRight => rect.loc.x + rect.size.w,
            _ => rect.loc.x + rect.size.w / 2,
        };
        let y = match self.anchor_edges {
            Anchor::Top | Anchor::TopLeft | Anchor::TopRight => rect.loc.y,
            Anchor::Bottom | Anchor::BottomLeft | Anchor::BottomRight => rect.loc.y + rect.size.h,
            _ => rect.loc.y + rect.size.h / 2,
        };

        (x, y).into()
    }

    /// Get the geometry for a popup as defined by this positioner
    ///
    /// `loc` is the position of the popup relative to the parent surface's
    /// window geometry, `size` corresponds to `xdg_positioner.set_size`.
    ///
    /// The popup sits at the offset from the anchor point and extends
    /// towards its gravity; an axis without gravity centers over the
    /// anchor point.
    pub fn get_geometry(&self) -> Rectangle<i32, Logical> {
        let size = self.rect_size;
        let mut loc = self.get_anchor_point() + self.offset;

        // per axis: gravity away from the anchor leaves the near edge in
        // place, gravity towards it puts the far edge there
        loc.x -= match self.gravity {
            Gravity::Left | Gravity::TopLeft | Gravity::BottomLeft => size.w,
            Gravity::Right | Gravity::TopRight | Gravity::BottomRight => 0,
            _ => size.w / 2,
        };
        loc.y -= match self.gravity {
            Gravity::Top | Gravity::TopLeft | Gravity::TopRight => size.h,
            Gravity::Bottom | Gravity::BottomLeft | Gravity::BottomRight => 0,
            _ => size.h / 2,
        };

        Rectangle::new(loc, size)
    }
}
