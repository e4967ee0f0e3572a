//! Element geometry and the gesture controller that edits it.
//!
//! Every canvas element owns one [`GestureController`]. The controller keeps
//! two frames: the `committed` frame that serialization reads, and a `preview`
//! frame that follows the user's finger while a drag or resize is in progress.
//!
//! ```text
//! begin_move / begin_resize   committed ──copy──► preview, preview_active = true
//! update_move / update_resize preview = committed + translation
//! commit                      committed ◄──copy── preview, preview_active = false
//! cancel                      preview   ◄──copy── committed, preview_active = false
//! ```
//!
//! Translations are measured from the start of the gesture, so each update
//! overwrites the previous one instead of accumulating.
//!
//! Resizing is opposite-edge anchored: dragging a handle moves only the edges
//! it names, and the edges across from it stay where they are.

use serde::{Deserialize, Serialize};

use crate::event::{GestureTarget, PanEvent, TouchPhase};

/// Smallest width or height the controller lets a preview shrink to.
pub const DEFAULT_MIN_EXTENT: f64 = 20.0;

/// A position in page-local coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position, growing to the right.
    pub x: f64,
    /// Vertical position, growing downwards.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in page units.
    pub width: f64,
    /// Height in page units.
    pub height: f64,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Position and size of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Frame {
    /// Create a frame from an origin and a size.
    #[must_use]
    pub const fn new(origin: Point, size: Size) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width and height.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Check whether a point lies inside the frame (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Check that every component is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Which edges of a frame a resize moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct EdgeMask {
    /// Left edge follows the pointer.
    pub left: bool,
    /// Top edge follows the pointer.
    pub top: bool,
    /// Right edge follows the pointer.
    pub right: bool,
    /// Bottom edge follows the pointer.
    pub bottom: bool,
}

impl EdgeMask {
    /// No edge moves.
    pub const NONE: Self = Self::new(false, false, false, false);
    /// Right edge only.
    pub const RIGHT: Self = Self::new(false, false, true, false);
    /// Bottom edge only.
    pub const BOTTOM: Self = Self::new(false, false, false, true);
    /// Left edge only.
    pub const LEFT: Self = Self::new(true, false, false, false);
    /// Top edge only.
    pub const TOP: Self = Self::new(false, true, false, false);
    /// Top and left edges.
    pub const TOP_LEFT: Self = Self::new(true, true, false, false);
    /// Top and right edges.
    pub const TOP_RIGHT: Self = Self::new(false, true, true, false);
    /// Bottom and left edges.
    pub const BOTTOM_LEFT: Self = Self::new(true, false, false, true);
    /// Bottom and right edges.
    pub const BOTTOM_RIGHT: Self = Self::new(false, false, true, true);

    /// Create a mask from individual edges.
    #[must_use]
    pub const fn new(left: bool, top: bool, right: bool, bottom: bool) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Check whether no edge is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.left || self.top || self.right || self.bottom)
    }

    /// Edges selected in both masks.
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self::new(
            self.left && other.left,
            self.top && other.top,
            self.right && other.right,
            self.bottom && other.bottom,
        )
    }
}

/// The eight resize handles drawn around a selected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeHandle {
    /// Middle of the right edge.
    Right,
    /// Middle of the bottom edge.
    Bottom,
    /// Middle of the left edge.
    Left,
    /// Middle of the top edge.
    Top,
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner.
    BottomRight,
}

impl ResizeHandle {
    /// All handles, in drawing order.
    pub const ALL: [Self; 8] = [
        Self::Right,
        Self::Bottom,
        Self::Left,
        Self::Top,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    /// Edges this handle drags.
    #[must_use]
    pub const fn edges(self) -> EdgeMask {
        match self {
            Self::Right => EdgeMask::RIGHT,
            Self::Bottom => EdgeMask::BOTTOM,
            Self::Left => EdgeMask::LEFT,
            Self::Top => EdgeMask::TOP,
            Self::TopLeft => EdgeMask::TOP_LEFT,
            Self::TopRight => EdgeMask::TOP_RIGHT,
            Self::BottomLeft => EdgeMask::BOTTOM_LEFT,
            Self::BottomRight => EdgeMask::BOTTOM_RIGHT,
        }
    }
}

/// The gesture currently driving the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Dragging the whole element.
    Move,
    /// Dragging one or more edges.
    Resize(EdgeMask),
}

/// Turns continuous drag input into committed element geometry.
#[derive(Debug, Clone)]
pub struct GestureController {
    committed: Frame,
    preview: Frame,
    preview_active: bool,
    interaction: Option<Interaction>,
    min_extent: f64,
}

impl GestureController {
    /// Create a controller with the given committed frame.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            committed: frame,
            preview: frame,
            preview_active: false,
            interaction: None,
            min_extent: DEFAULT_MIN_EXTENT,
        }
    }

    /// Set the smallest width/height a resize may produce.
    #[must_use]
    pub fn with_min_extent(mut self, min_extent: f64) -> Self {
        self.min_extent = min_extent.max(0.0);
        self
    }

    /// Geometry last confirmed by [`commit`](Self::commit).
    #[must_use]
    pub const fn committed(&self) -> Frame {
        self.committed
    }

    /// In-progress geometry shown while a gesture is active.
    #[must_use]
    pub const fn preview(&self) -> Frame {
        self.preview
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub const fn preview_active(&self) -> bool {
        self.preview_active
    }

    /// The gesture in progress, if any.
    #[must_use]
    pub const fn interaction(&self) -> Option<Interaction> {
        self.interaction
    }

    /// Replace the committed geometry, abandoning any gesture in progress.
    pub fn set_frame(&mut self, frame: Frame) {
        self.committed = frame;
        self.preview = frame;
        self.preview_active = false;
        self.interaction = None;
    }

    /// Start dragging the element.
    pub fn begin_move(&mut self) {
        self.begin(Interaction::Move);
    }

    /// Start dragging the given edges.
    pub fn begin_resize(&mut self, edges: EdgeMask) {
        self.begin(Interaction::Resize(edges));
    }

    fn begin(&mut self, interaction: Interaction) {
        self.preview = self.committed;
        self.preview_active = true;
        self.interaction = Some(interaction);
    }

    /// Offset the preview from the committed origin by the gesture translation.
    pub fn update_move(&mut self, dx: f64, dy: f64) {
        if self.interaction != Some(Interaction::Move) {
            tracing::trace!("update_move ignored: no move in progress");
            return;
        }
        self.preview.x = self.committed.x + dx;
        self.preview.y = self.committed.y + dy;
    }

    /// Resize the preview by the gesture translation.
    ///
    /// `edges` selects which edges follow the translation, limited to the edges
    /// the resize began with; all others stay fixed. Width and height never
    /// shrink below the configured minimum.
    pub fn update_resize(&mut self, dx: f64, dy: f64, edges: EdgeMask) {
        let Some(Interaction::Resize(started)) = self.interaction else {
            tracing::trace!("update_resize ignored: no resize in progress");
            return;
        };
        let edges = started.intersect(edges);

        let base = self.committed;
        let (x, width) = resize_axis(base.x, base.width, dx, edges.left, edges.right, self.min_extent);
        let (y, height) =
            resize_axis(base.y, base.height, dy, edges.top, edges.bottom, self.min_extent);
        self.preview = Frame {
            x,
            y,
            width,
            height,
        };
    }

    /// Make the preview the committed geometry.
    ///
    /// Returns the new committed frame, or `None` if no gesture was in progress.
    pub fn commit(&mut self) -> Option<Frame> {
        if !self.preview_active {
            return None;
        }
        self.committed = self.preview;
        self.preview_active = false;
        self.interaction = None;
        Some(self.committed)
    }

    /// Discard the gesture in progress.
    pub fn cancel(&mut self) {
        self.preview = self.committed;
        self.preview_active = false;
        self.interaction = None;
    }

    /// Feed one pan event from the platform recognizer.
    ///
    /// Returns the committed frame when the event ends a gesture.
    pub fn handle_pan(&mut self, target: GestureTarget, event: &PanEvent) -> Option<Frame> {
        let (dx, dy) = (event.translation_x, event.translation_y);
        match (event.phase, target) {
            (TouchPhase::Start, GestureTarget::Body) => {
                self.begin_move();
                None
            }
            (TouchPhase::Start, GestureTarget::Handle(handle)) => {
                self.begin_resize(handle.edges());
                None
            }
            (TouchPhase::Move, GestureTarget::Body) => {
                self.update_move(dx, dy);
                None
            }
            (TouchPhase::Move, GestureTarget::Handle(handle)) => {
                self.update_resize(dx, dy, handle.edges());
                None
            }
            (TouchPhase::End, GestureTarget::Body) => {
                self.update_move(dx, dy);
                self.commit()
            }
            (TouchPhase::End, GestureTarget::Handle(handle)) => {
                self.update_resize(dx, dy, handle.edges());
                self.commit()
            }
            (TouchPhase::Cancel, _) => {
                self.cancel();
                None
            }
        }
    }
}

/// Resize one axis. `near` is the left/top edge, `far` the right/bottom edge.
fn resize_axis(
    origin: f64,
    extent: f64,
    delta: f64,
    near: bool,
    far: bool,
    min_extent: f64,
) -> (f64, f64) {
    let mut start = origin;
    let mut end = origin + extent;
    if near {
        start += delta;
    }
    if far {
        end += delta;
    }

    if (near || far) && end - start < min_extent {
        if near && !far {
            start = end - min_extent;
        } else {
            end = start + min_extent;
        }
    }
    (start, end - start)
}
