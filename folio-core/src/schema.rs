//! Persisted document shape shared with the storage backend.
//!
//! ```text
//! Portfolio := { id, title, pages: Page[] }
//! Page      := { id, title, workspace: { textboxes: TextboxDoc[], images: ImageDoc[] } }
//! ```
//!
//! Documents produced by older app builds and by the generation assistant are
//! not always complete, so most fields fall back to defaults when absent.

use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{Frame, Point, Size};
use crate::{FolioError, FolioResult};

/// Title given to portfolios that were never named.
pub const UNTITLED_PORTFOLIO: &str = "Untitled Portfolio";

/// Serialized rich-text document held by a textbox.
///
/// Always written as `{ "content": "<markup>" }`. When reading, a string that
/// itself contains that JSON object, or a bare markup string, is accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RichText {
    /// Editor markup.
    pub content: String,
}

impl RichText {
    /// Wrap editor markup.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Check whether the document has no markup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Markup converted to plain text.
    #[must_use]
    pub fn plain_text(&self) -> String {
        crate::text::markup_to_plain_text(&self.content)
    }

    fn from_stored_text(text: String) -> Self {
        #[derive(Deserialize)]
        struct Wrapped {
            content: String,
        }

        match serde_json::from_str::<Wrapped>(&text) {
            Ok(wrapped) => Self::new(wrapped.content),
            Err(_) => Self::new(text),
        }
    }
}

impl<'de> Deserialize<'de> for RichText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Object {
                #[serde(default)]
                content: Option<String>,
            },
            Text(String),
        }

        Ok(match Stored::deserialize(deserializer)? {
            Stored::Object { content } => Self::new(content.unwrap_or_default()),
            Stored::Text(text) => Self::from_stored_text(text),
        })
    }
}

/// A textbox as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextboxDoc {
    /// Element identifier.
    pub id: String,
    /// Left edge.
    #[serde(default = "defaults::origin")]
    pub x: f64,
    /// Top edge.
    #[serde(default = "defaults::origin")]
    pub y: f64,
    /// Width.
    #[serde(default = "defaults::text_width")]
    pub width: f64,
    /// Height.
    #[serde(default = "defaults::text_height")]
    pub height: f64,
    /// Rich-text content.
    #[serde(default)]
    pub content: RichText,
}

impl TextboxDoc {
    /// Build a textbox document from geometry and content.
    #[must_use]
    pub fn new(id: impl Into<String>, frame: Frame, content: RichText) -> Self {
        Self {
            id: id.into(),
            x: frame.x,
            y: frame.y,
            width: frame.width,
            height: frame.height,
            content,
        }
    }

    /// Stored geometry.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        Frame::new(Point::new(self.x, self.y), Size::new(self.width, self.height))
    }
}

/// An image as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDoc {
    /// Element identifier.
    pub id: String,
    /// Left edge.
    #[serde(default = "defaults::origin")]
    pub x: f64,
    /// Top edge.
    #[serde(default = "defaults::origin")]
    pub y: f64,
    /// Width.
    #[serde(default = "defaults::image_extent")]
    pub width: f64,
    /// Height.
    #[serde(default = "defaults::image_extent")]
    pub height: f64,
    /// Local or remote locator of the bitmap.
    #[serde(default)]
    pub uri: String,
}

impl ImageDoc {
    /// Build an image document from geometry and a source locator.
    #[must_use]
    pub fn new(id: impl Into<String>, frame: Frame, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: frame.x,
            y: frame.y,
            width: frame.width,
            height: frame.height,
            uri: uri.into(),
        }
    }

    /// Stored geometry.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        Frame::new(Point::new(self.x, self.y), Size::new(self.width, self.height))
    }

    /// Whether the uri points at a remote resource rather than a local file.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}

/// Every element of one page, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    /// Textboxes in z-order.
    #[serde(default)]
    pub textboxes: Vec<TextboxDoc>,
    /// Images in z-order.
    #[serde(default)]
    pub images: Vec<ImageDoc>,
}

impl WorkspaceDocument {
    /// Total number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.textboxes.len() + self.images.len()
    }

    /// Check whether the page has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    /// Check ids are unique and geometry is finite.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Serialization`] naming the first offending element.
    pub fn validate(&self) -> FolioResult<()> {
        let mut seen = std::collections::HashSet::new();
        let entries = self
            .textboxes
            .iter()
            .map(|t| (t.id.as_str(), t.frame()))
            .chain(self.images.iter().map(|i| (i.id.as_str(), i.frame())));

        for (id, frame) in entries {
            if id.is_empty() {
                return Err(FolioError::Serialization("element with empty id".into()));
            }
            if !seen.insert(id) {
                return Err(FolioError::Serialization(format!(
                    "duplicate element id: {id}"
                )));
            }
            if !frame.is_finite() {
                return Err(FolioError::Serialization(format!(
                    "non-finite geometry on element {id}"
                )));
            }
        }
        Ok(())
    }
}

/// One page of a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    /// Page identifier.
    #[serde(default)]
    pub id: String,
    /// Human label, unique within the portfolio.
    #[serde(default)]
    pub title: String,
    /// Page contents.
    #[serde(default)]
    pub workspace: WorkspaceDocument,
}

impl PageDocument {
    /// Create a page with no elements.
    #[must_use]
    pub fn empty(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            workspace: WorkspaceDocument::default(),
        }
    }
}

/// The unit persisted by the storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    /// Portfolio identifier. Empty for freshly generated portfolios.
    #[serde(default)]
    pub id: String,
    /// Portfolio title.
    #[serde(default = "defaults::portfolio_title")]
    pub title: String,
    /// Pages in display order.
    #[serde(default)]
    pub pages: Vec<PageDocument>,
}

impl PortfolioDocument {
    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> FolioResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> FolioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a portfolio from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Serialization`] if the JSON is malformed.
    pub fn from_json(json: &str) -> FolioResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of elements across all pages.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.pages.iter().map(|p| p.workspace.element_count()).sum()
    }
}

mod defaults {
    pub(super) const fn origin() -> f64 {
        50.0
    }

    pub(super) const fn text_width() -> f64 {
        300.0
    }

    pub(super) const fn text_height() -> f64 {
        400.0
    }

    pub(super) const fn image_extent() -> f64 {
        200.0
    }

    pub(super) fn portfolio_title() -> String {
        super::UNTITLED_PORTFOLIO.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_text_reads_object() {
        let text: RichText = serde_json::from_str(r#"{"content":"<p>Hi</p>"}"#).unwrap();
        assert_eq!(text.content, "<p>Hi</p>");
    }

    #[test]
    fn test_rich_text_reads_stringified_object() {
        let text: RichText =
            serde_json::from_str(r#""{\"content\":\"<p>Hi</p>\"}""#).unwrap();
        assert_eq!(text.content, "<p>Hi</p>");
    }

    #[test]
    fn test_rich_text_reads_bare_markup() {
        let text: RichText = serde_json::from_str(r#""<p>Hi</p>""#).unwrap();
        assert_eq!(text.content, "<p>Hi</p>");
    }

    #[test]
    fn test_rich_text_written_as_object() {
        let json = serde_json::to_value(RichText::new("<b>x</b>")).unwrap();
        assert_eq!(json, serde_json::json!({ "content": "<b>x</b>" }));
    }

    #[test]
    fn test_generated_portfolio_fills_defaults() {
        let doc = PortfolioDocument::from_json(
            r#"{
                "pages": [{
                    "title": "About",
                    "workspace": {
                        "textboxes": [{ "id": "t1", "content": { "content": "<p>Me</p>" } }],
                        "images": [{ "id": "i1", "uri": "fetchImage('mountains')" }]
                    }
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.title, UNTITLED_PORTFOLIO);
        assert!(doc.id.is_empty());
        let page = &doc.pages[0];
        assert!(page.id.is_empty());
        let textbox = &page.workspace.textboxes[0];
        assert_eq!(textbox.frame(), Frame::new(Point::new(50.0, 50.0), Size::new(300.0, 400.0)));
        assert!((page.workspace.images[0].width - 200.0).abs() < f64::EPSILON);
        assert_eq!(doc.element_count(), 2);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let frame = Frame::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let workspace = WorkspaceDocument {
            textboxes: vec![TextboxDoc::new("a", frame, RichText::default())],
            images: vec![ImageDoc::new("a", frame, "file:///x.png")],
        };
        assert!(matches!(
            workspace.validate(),
            Err(FolioError::Serialization(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_geometry() {
        let frame = Frame::new(Point::new(f64::NAN, 0.0), Size::new(10.0, 10.0));
        let workspace = WorkspaceDocument {
            textboxes: vec![TextboxDoc::new("a", frame, RichText::default())],
            images: Vec::new(),
        };
        assert!(workspace.validate().is_err());
    }

    #[test]
    fn test_image_remote_detection() {
        let frame = Frame::default();
        assert!(ImageDoc::new("i", frame, "https://cdn/x.png").is_remote());
        assert!(!ImageDoc::new("i", frame, "file:///tmp/x.png").is_remote());
    }
}
