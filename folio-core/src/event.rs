//! Gesture input delivered by the platform recognizer.

use serde::{Deserialize, Serialize};

use crate::geometry::ResizeHandle;

/// Phase of a pan gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    /// Finger down.
    Start,
    /// Finger dragging.
    Move,
    /// Finger up.
    End,
    /// Gesture interrupted (e.g. a system alert took the touch).
    Cancel,
}

/// Where on an element a pan gesture started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "handle", rename_all = "lowercase")]
pub enum GestureTarget {
    /// The element body; the gesture moves the element.
    Body,
    /// A resize handle; the gesture resizes the element.
    Handle(ResizeHandle),
}

/// One pan update. Translations are relative to where the gesture started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanEvent {
    /// Phase of this update.
    pub phase: TouchPhase,
    /// Horizontal distance since the gesture started.
    pub translation_x: f64,
    /// Vertical distance since the gesture started.
    pub translation_y: f64,
}

impl PanEvent {
    /// Create a pan event.
    #[must_use]
    pub const fn new(phase: TouchPhase, translation_x: f64, translation_y: f64) -> Self {
        Self {
            phase,
            translation_x,
            translation_y,
        }
    }

    /// Gesture began.
    #[must_use]
    pub const fn start() -> Self {
        Self::new(TouchPhase::Start, 0.0, 0.0)
    }

    /// Gesture moved to the given translation.
    #[must_use]
    pub const fn moved(translation_x: f64, translation_y: f64) -> Self {
        Self::new(TouchPhase::Move, translation_x, translation_y)
    }

    /// Gesture ended at the given translation.
    #[must_use]
    pub const fn ended(translation_x: f64, translation_y: f64) -> Self {
        Self::new(TouchPhase::End, translation_x, translation_y)
    }

    /// Gesture was interrupted.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(TouchPhase::Cancel, 0.0, 0.0)
    }
}
