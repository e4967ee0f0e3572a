//! The workspace coordinator for one page.
//!
//! Owns the ordered element list (insertion order is z-order, later on top),
//! tracks which text element has editor focus, routes toolbar commands to it,
//! and converts the page to and from its stored document.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::{BridgeConfig, BridgeEvent, BridgeRegistry, EditorBridge};
use crate::collab::{ImagePicker, PickOutcome, SurfaceFactory};
use crate::element::{
    CanvasElement, CanvasElementHandle, ElementId, ElementKind, ElementState, ImageElement,
    TextElement,
};
use crate::event::{GestureTarget, PanEvent};
use crate::geometry::{Frame, GestureController, Point, Size, DEFAULT_MIN_EXTENT};
use crate::message::{EditorId, InboundMessage};
use crate::schema::{ImageDoc, RichText, TextboxDoc, WorkspaceDocument};
use crate::{FolioError, FolioResult};

/// Size given to new textboxes.
pub const DEFAULT_TEXT_SIZE: Size = Size::new(300.0, 400.0);

/// Natural image dimensions are divided by this before placement.
pub const DEFAULT_IMAGE_SCALE_DIVISOR: f64 = 8.0;

/// Configuration for a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Size of new textboxes.
    pub default_text_size: Size,
    /// Divisor applied to picked image dimensions.
    pub image_scale_divisor: f64,
    /// Smallest width/height a resize may produce.
    pub min_extent: f64,
    /// Configuration for each editor bridge.
    pub bridge: BridgeConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_text_size: DEFAULT_TEXT_SIZE,
            image_scale_divisor: DEFAULT_IMAGE_SCALE_DIVISOR,
            min_extent: DEFAULT_MIN_EXTENT,
            bridge: BridgeConfig::default(),
        }
    }
}

/// Whether the page is being edited or only viewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Elements can be added, moved, resized and edited.
    #[default]
    Edit,
    /// Read-only presentation; gestures are ignored.
    View,
}

/// What toolbar components need to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarState {
    /// Text element receiving formatting commands.
    pub focused: Option<ElementId>,
    /// Whether the on-screen keyboard is showing.
    pub keyboard_visible: bool,
    /// Current mode.
    pub mode: EditMode,
}

impl ToolbarState {
    /// Whether the formatting toolbar should replace the insert toolbar.
    #[must_use]
    pub fn shows_format_toolbar(&self) -> bool {
        self.mode == EditMode::Edit && self.keyboard_visible && self.focused.is_some()
    }
}

/// An element whose content could not be collected.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementFailure {
    /// Element that failed.
    pub element_id: ElementId,
    /// Why it failed.
    pub error: FolioError,
}

/// Result of collecting a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCollection {
    /// The page document. Failed textboxes carry empty content.
    pub workspace: WorkspaceDocument,
    /// Elements whose content could not be fetched.
    pub failures: Vec<ElementFailure>,
}

impl PageCollection {
    /// Whether every element was collected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Coordinator for the elements of one page.
#[derive(Debug)]
pub struct Workspace {
    elements: Vec<CanvasElement>,
    focused: Option<ElementId>,
    keyboard_visible: bool,
    mode: EditMode,
    registry: BridgeRegistry,
    surfaces: Arc<dyn SurfaceFactory>,
    config: WorkspaceConfig,
}

impl Workspace {
    /// Create an empty workspace whose editors are hosted by `surfaces`.
    #[must_use]
    pub fn new(surfaces: Arc<dyn SurfaceFactory>) -> Self {
        Self::with_config(surfaces, WorkspaceConfig::default())
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(surfaces: Arc<dyn SurfaceFactory>, config: WorkspaceConfig) -> Self {
        Self::with_registry(surfaces, config, BridgeRegistry::new())
    }

    /// Create a workspace that registers its bridges in a shared registry,
    /// so one message pump can serve several pages.
    #[must_use]
    pub fn with_registry(
        surfaces: Arc<dyn SurfaceFactory>,
        config: WorkspaceConfig,
        registry: BridgeRegistry,
    ) -> Self {
        Self {
            elements: Vec::new(),
            focused: None,
            keyboard_visible: false,
            mode: EditMode::Edit,
            registry,
            surfaces,
            config,
        }
    }

    /// Get the current configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Registry routing inbound editor messages to this page's bridges.
    #[must_use]
    pub fn registry(&self) -> BridgeRegistry {
        self.registry.clone()
    }

    // -----------------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------------

    /// Add an empty textbox with its top-left corner at `at`.
    pub fn add_text_element(&mut self, at: Point) -> ElementId {
        let id = ElementId::new();
        let frame = Frame::new(at, self.config.default_text_size);
        let element = self.spawn_text(id.clone(), frame);
        self.elements.push(CanvasElement::Text(element));
        tracing::debug!(element = %id, "Added text element");
        id
    }

    /// Add an image scaled down from its natural size.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::ImageLoad`] if the source is empty or the natural
    /// size is not a positive finite number.
    pub fn add_image_element(
        &mut self,
        source_uri: &str,
        natural_width: f64,
        natural_height: f64,
        at: Point,
    ) -> FolioResult<ElementId> {
        if source_uri.is_empty() {
            return Err(FolioError::ImageLoad("empty image source".into()));
        }
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(natural_width) || !valid(natural_height) {
            return Err(FolioError::ImageLoad(format!(
                "invalid image dimensions {natural_width}x{natural_height} for {source_uri}"
            )));
        }

        let divisor = self.config.image_scale_divisor;
        let size = Size::new(natural_width / divisor, natural_height / divisor);
        let id = ElementId::new();
        let element = ImageElement::new(id.clone(), self.controller(Frame::new(at, size)), source_uri);
        self.elements.push(CanvasElement::Image(element));
        tracing::debug!(element = %id, uri = source_uri, "Added image element");
        Ok(id)
    }

    /// Ask `picker` for an image and add it. A cancelled pick adds nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::ImageLoad`] if picking or reading the image fails.
    pub async fn add_picked_image(
        &mut self,
        picker: &dyn ImagePicker,
        at: Point,
    ) -> FolioResult<Option<ElementId>> {
        match picker.pick_image().await? {
            PickOutcome::Picked(image) => self
                .add_image_element(&image.uri, image.width, image.height, at)
                .map(Some),
            PickOutcome::Cancelled => {
                tracing::debug!("Image pick cancelled");
                Ok(None)
            }
        }
    }

    /// Remove an element. Removing an unknown id is a no-op.
    ///
    /// Returns `true` if an element was removed.
    pub fn remove_element(&mut self, id: &ElementId) -> bool {
        let Some(index) = self.elements.iter().position(|e| e.id() == id) else {
            return false;
        };
        let element = self.elements.remove(index);
        if self.focused.as_ref() == Some(id) {
            self.focused = None;
        }
        Self::teardown(&self.registry, &element);
        tracing::debug!(element = %id, "Removed element");
        true
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        for element in self.elements.drain(..) {
            Self::teardown(&self.registry, &element);
        }
        self.focused = None;
    }

    /// Get an element by ID.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&CanvasElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    /// Get a mutable reference to an element by ID.
    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut CanvasElement> {
        self.elements.iter_mut().find(|e| e.id() == id)
    }

    /// All elements, bottom to top.
    pub fn elements(&self) -> impl Iterator<Item = &CanvasElement> {
        self.elements.iter()
    }

    /// Get the number of elements on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the page is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Find the topmost element whose committed frame contains `point`.
    #[must_use]
    pub fn element_at(&self, point: Point) -> Option<&ElementId> {
        self.elements
            .iter()
            .rev()
            .find(|e| e.frame().contains(point))
            .map(CanvasElementHandle::id)
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Feed a pan gesture to an element.
    ///
    /// Ignored in view mode or for unknown ids. Returns the committed frame
    /// when the event ends the gesture.
    pub fn handle_pan(
        &mut self,
        id: &ElementId,
        target: GestureTarget,
        event: &PanEvent,
    ) -> Option<Frame> {
        if self.mode == EditMode::View {
            return None;
        }
        self.element_mut(id)?.handle_pan(target, event)
    }

    // -----------------------------------------------------------------------
    // Focus and toolbar
    // -----------------------------------------------------------------------

    /// Record which text element receives toolbar commands.
    ///
    /// Ids that do not name a text element on this page clear the focus.
    pub fn set_focus(&mut self, id: Option<&ElementId>) {
        self.focused = id.and_then(|id| {
            let element = self.element(id)?;
            (element.kind() == ElementKind::Text).then(|| id.clone())
        });
        if id.is_some() && self.focused.is_none() {
            tracing::debug!("Focus request ignored: not a text element on this page");
        }
    }

    /// Text element currently receiving toolbar commands.
    #[must_use]
    pub fn focused(&self) -> Option<&ElementId> {
        self.focused.as_ref()
    }

    /// Record keyboard visibility. Hiding the keyboard clears focus.
    pub fn set_keyboard_visible(&mut self, visible: bool) {
        self.keyboard_visible = visible;
        if !visible {
            self.focused = None;
        }
    }

    /// Switch between editing and viewing.
    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
        if mode == EditMode::View {
            self.focused = None;
            for element in &mut self.elements {
                element.geometry_mut().cancel();
            }
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> EditMode {
        self.mode
    }

    /// Snapshot for toolbar rendering.
    #[must_use]
    pub fn toolbar_state(&self) -> ToolbarState {
        ToolbarState {
            focused: self.focused.clone(),
            keyboard_visible: self.keyboard_visible,
            mode: self.mode,
        }
    }

    /// Forward a formatting command to the focused editor. No-op without focus.
    pub fn execute_toolbar_command(&self, command: &str, value: Option<&str>) {
        let Some(text) = self
            .focused
            .as_ref()
            .and_then(|id| self.element(id))
            .and_then(CanvasElement::as_text)
        else {
            tracing::trace!(command, "Toolbar command ignored: no focused editor");
            return;
        };
        text.bridge().execute_command(command, value);
    }

    // -----------------------------------------------------------------------
    // Inbound editor messages
    // -----------------------------------------------------------------------

    /// Route a message from an editor surface and apply focus changes.
    pub fn handle_inbound(&mut self, message: InboundMessage) -> Option<BridgeEvent> {
        let (editor_id, event) = self.registry.dispatch(message)?;
        self.apply_event(&editor_id, event);
        Some(event)
    }

    /// Parse and route a raw message. Malformed input is logged and dropped.
    pub fn handle_inbound_raw(&mut self, raw: &str) -> Option<BridgeEvent> {
        let (editor_id, event) = self.registry.dispatch_raw(raw)?;
        self.apply_event(&editor_id, event);
        Some(event)
    }

    fn apply_event(&mut self, editor_id: &EditorId, event: BridgeEvent) {
        let Some(id) = self
            .elements
            .iter()
            .filter_map(CanvasElement::as_text)
            .find(|t| t.editor_id() == editor_id)
            .map(|t| t.id().clone())
        else {
            return;
        };

        match event {
            BridgeEvent::FocusChanged(true) => self.focused = Some(id),
            BridgeEvent::FocusChanged(false) => {
                if self.focused.as_ref() == Some(&id) {
                    self.focused = None;
                }
            }
            BridgeEvent::Ready => tracing::debug!(element = %id, "Editor ready"),
        }
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Collect every element concurrently into a page document.
    ///
    /// A textbox whose content cannot be fetched is written with empty content
    /// and reported in [`PageCollection::failures`]; it never aborts the rest.
    pub async fn collect_page_data(&self) -> PageCollection {
        let results = join_all(
            self.elements
                .iter()
                .map(|element| async move { (element, element.state().await) }),
        )
        .await;

        let mut workspace = WorkspaceDocument::default();
        let mut failures = Vec::new();
        for (element, result) in results {
            match result {
                Ok(ElementState::Text(doc)) => workspace.textboxes.push(doc),
                Ok(ElementState::Image(doc)) => workspace.images.push(doc),
                Err(error) => {
                    tracing::warn!(element = %element.id(), "Content collection failed: {error}");
                    workspace.textboxes.push(TextboxDoc::new(
                        element.id().as_str(),
                        element.frame(),
                        RichText::default(),
                    ));
                    failures.push(ElementFailure {
                        element_id: element.id().clone(),
                        error,
                    });
                }
            }
        }

        PageCollection {
            workspace,
            failures,
        }
    }

    /// Replace the page contents with a stored document.
    ///
    /// Textboxes are created first, then images, each in list order.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Serialization`] if the document has duplicate ids
    /// or non-finite geometry; the page is left empty.
    pub fn load_page_data(&mut self, doc: &WorkspaceDocument) -> FolioResult<()> {
        self.clear();
        if let Err(e) = doc.validate() {
            tracing::warn!("Rejected page document: {e}");
            return Err(e);
        }

        for textbox in &doc.textboxes {
            let id = ElementId::from_raw(textbox.id.as_str());
            let mut element = self.spawn_text(id, textbox.frame());
            element.load_state(ElementState::Text(textbox.clone()))?;
            self.elements.push(CanvasElement::Text(element));
        }
        for image in &doc.images {
            self.elements.push(CanvasElement::Image(self.image_from_doc(image)));
        }

        tracing::debug!(elements = self.elements.len(), "Loaded page document");
        Ok(())
    }

    /// Editor ids are minted per element instance. Pages sharing a registry may
    /// reuse element ids.
    fn spawn_text(&self, id: ElementId, frame: Frame) -> TextElement {
        let editor_id = EditorId::new(format!("{id}:{}", Uuid::new_v4()));
        let sink = self.surfaces.open(&editor_id);
        let bridge = Arc::new(EditorBridge::new(editor_id, sink, self.config.bridge.clone()));
        self.registry.insert(bridge.clone());
        bridge.attach();
        TextElement::new(id, self.controller(frame), bridge)
    }

    fn image_from_doc(&self, doc: &ImageDoc) -> ImageElement {
        ImageElement::new(
            ElementId::from_raw(doc.id.as_str()),
            self.controller(doc.frame()),
            doc.uri.as_str(),
        )
    }

    fn controller(&self, frame: Frame) -> GestureController {
        GestureController::new(frame).with_min_extent(self.config.min_extent)
    }

    fn teardown(registry: &BridgeRegistry, element: &CanvasElement) {
        if let Some(text) = element.as_text() {
            registry.remove(text.editor_id());
            text.bridge().dispose();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.clear();
    }
}
