//! Canvas elements - the building blocks of a page.
//!
//! A [`TextElement`] pairs a [`GestureController`] with an [`EditorBridge`];
//! an [`ImageElement`] pairs one with a source locator. Both expose the same
//! [`CanvasElementHandle`] contract so the workspace can treat them uniformly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::{EditorBridge, EditorLifecycle};
use crate::event::{GestureTarget, PanEvent};
use crate::geometry::{Frame, GestureController, Size};
use crate::message::EditorId;
use crate::schema::{ImageDoc, TextboxDoc};
use crate::{FolioError, FolioResult};

/// Unique identifier for an element, stable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier read from a stored document.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of content an element holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Rich text hosted in an embedded editor.
    Text,
    /// A bitmap.
    Image,
}

/// Serializable snapshot of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementState {
    /// A textbox with its fetched content.
    Text(TextboxDoc),
    /// An image with its source uri.
    Image(ImageDoc),
}

impl ElementState {
    /// Kind of element described.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Text(_) => ElementKind::Text,
            Self::Image(_) => ElementKind::Image,
        }
    }

    /// Identifier of the element described.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Text(doc) => &doc.id,
            Self::Image(doc) => &doc.id,
        }
    }

    /// Committed geometry.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        match self {
            Self::Text(doc) => doc.frame(),
            Self::Image(doc) => doc.frame(),
        }
    }
}

/// Contract shared by every canvas element.
#[async_trait]
pub trait CanvasElementHandle: Send + Sync {
    /// Element identifier.
    fn id(&self) -> &ElementId;

    /// Element kind.
    fn kind(&self) -> ElementKind;

    /// Geometry controller.
    fn geometry(&self) -> &GestureController;

    /// Mutable geometry controller, for driving gestures.
    fn geometry_mut(&mut self) -> &mut GestureController;

    /// Snapshot the element. Geometry always comes from the committed frame.
    ///
    /// # Errors
    ///
    /// Text elements fail when their content cannot be fetched.
    async fn state(&self) -> FolioResult<ElementState>;

    /// Apply a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::InvalidOperation`] if the snapshot is of another kind.
    fn load_state(&mut self, state: ElementState) -> FolioResult<()>;
}

/// A textbox backed by an embedded rich-text editor.
#[derive(Debug)]
pub struct TextElement {
    id: ElementId,
    geometry: GestureController,
    bridge: Arc<EditorBridge>,
}

impl TextElement {
    /// Create a text element around an existing bridge.
    #[must_use]
    pub fn new(id: ElementId, geometry: GestureController, bridge: Arc<EditorBridge>) -> Self {
        Self {
            id,
            geometry,
            bridge,
        }
    }

    /// Routing key of the embedded editor.
    #[must_use]
    pub fn editor_id(&self) -> &EditorId {
        self.bridge.editor_id()
    }

    /// The bridge to the embedded editor.
    #[must_use]
    pub fn bridge(&self) -> &Arc<EditorBridge> {
        &self.bridge
    }

    /// Lifecycle of the embedded editor.
    #[must_use]
    pub fn lifecycle(&self) -> EditorLifecycle {
        self.bridge.lifecycle()
    }

    /// Whether the embedded editor has input focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.bridge.is_focused()
    }
}

#[async_trait]
impl CanvasElementHandle for TextElement {
    fn id(&self) -> &ElementId {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Text
    }

    fn geometry(&self) -> &GestureController {
        &self.geometry
    }

    fn geometry_mut(&mut self) -> &mut GestureController {
        &mut self.geometry
    }

    async fn state(&self) -> FolioResult<ElementState> {
        let frame = self.geometry.committed();
        let content = self.bridge.get_content().await?;
        Ok(ElementState::Text(TextboxDoc::new(
            self.id.as_str(),
            frame,
            content,
        )))
    }

    fn load_state(&mut self, state: ElementState) -> FolioResult<()> {
        let doc = match state {
            ElementState::Text(doc) => doc,
            other @ ElementState::Image(_) => {
                return Err(FolioError::InvalidOperation(format!(
                    "cannot load {:?} state into text element {}",
                    other.kind(),
                    self.id
                )));
            }
        };
        let frame = doc.frame();
        self.geometry.set_frame(frame);
        self.bridge.set_size(frame.width, frame.height);
        self.bridge.set_content(doc.content);
        Ok(())
    }
}

/// A positioned bitmap.
#[derive(Debug, Clone)]
pub struct ImageElement {
    id: ElementId,
    geometry: GestureController,
    source_uri: String,
}

impl ImageElement {
    /// Create an image element.
    #[must_use]
    pub fn new(id: ElementId, geometry: GestureController, source_uri: impl Into<String>) -> Self {
        Self {
            id,
            geometry,
            source_uri: source_uri.into(),
        }
    }

    /// Locator of the bitmap.
    #[must_use]
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
}

#[async_trait]
impl CanvasElementHandle for ImageElement {
    fn id(&self) -> &ElementId {
        &self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Image
    }

    fn geometry(&self) -> &GestureController {
        &self.geometry
    }

    fn geometry_mut(&mut self) -> &mut GestureController {
        &mut self.geometry
    }

    async fn state(&self) -> FolioResult<ElementState> {
        Ok(ElementState::Image(ImageDoc::new(
            self.id.as_str(),
            self.geometry.committed(),
            self.source_uri.clone(),
        )))
    }

    fn load_state(&mut self, state: ElementState) -> FolioResult<()> {
        let doc = match state {
            ElementState::Image(doc) => doc,
            other @ ElementState::Text(_) => {
                return Err(FolioError::InvalidOperation(format!(
                    "cannot load {:?} state into image element {}",
                    other.kind(),
                    self.id
                )));
            }
        };
        self.geometry.set_frame(doc.frame());
        self.source_uri = doc.uri;
        Ok(())
    }
}

/// Any element that can sit on a page.
#[derive(Debug)]
pub enum CanvasElement {
    /// A textbox.
    Text(TextElement),
    /// An image.
    Image(ImageElement),
}

impl CanvasElement {
    fn handle(&self) -> &dyn CanvasElementHandle {
        match self {
            Self::Text(text) => text,
            Self::Image(image) => image,
        }
    }

    fn handle_mut(&mut self) -> &mut dyn CanvasElementHandle {
        match self {
            Self::Text(text) => text,
            Self::Image(image) => image,
        }
    }

    /// The text element, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    /// The image element, if this is one.
    #[must_use]
    pub fn as_image(&self) -> Option<&ImageElement> {
        match self {
            Self::Image(image) => Some(image),
            Self::Text(_) => None,
        }
    }

    /// Committed geometry.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.geometry().committed()
    }

    /// Commit the gesture in progress.
    ///
    /// Text elements pass a changed size on to their editor surface.
    pub fn commit(&mut self) -> Option<Frame> {
        let before = self.frame().size();
        let frame = self.geometry_mut().commit()?;
        self.after_commit(before, frame);
        Some(frame)
    }

    /// Feed one pan event to the element's geometry.
    pub fn handle_pan(&mut self, target: GestureTarget, event: &PanEvent) -> Option<Frame> {
        let before = self.frame().size();
        let frame = self.geometry_mut().handle_pan(target, event)?;
        self.after_commit(before, frame);
        Some(frame)
    }

    fn after_commit(&self, before: Size, frame: Frame) {
        if let Self::Text(text) = self {
            if frame.size() != before {
                text.bridge.set_size(frame.width, frame.height);
            }
        }
    }
}

#[async_trait]
impl CanvasElementHandle for CanvasElement {
    fn id(&self) -> &ElementId {
        self.handle().id()
    }

    fn kind(&self) -> ElementKind {
        self.handle().kind()
    }

    fn geometry(&self) -> &GestureController {
        self.handle().geometry()
    }

    fn geometry_mut(&mut self) -> &mut GestureController {
        self.handle_mut().geometry_mut()
    }

    async fn state(&self) -> FolioResult<ElementState> {
        self.handle().state().await
    }

    fn load_state(&mut self, state: ElementState) -> FolioResult<()> {
        self.handle_mut().load_state(state)
    }
}
