//! # Portfolio Perfecto Core
//!
//! Freeform page model for building portfolios: positioned textboxes and
//! images that can be moved and resized, rich text hosted in embedded editors
//! reached over an asynchronous message bridge, and a JSON document format
//! for saving and restoring pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              PortfolioSession               │
//! ├─────────────────────────────────────────────┤
//! │  Workspace (per page)                       │
//! │  - Elements in z-order                      │
//! │  - Focus and toolbar routing                │
//! │  - collect / load page documents            │
//! ├──────────────────────┬──────────────────────┤
//! │  GestureController   │  EditorBridge        │
//! │  - committed frame   │  - correlated calls  │
//! │  - move / resize     │  - bounded timeout   │
//! │    preview           │  - ready queue       │
//! └──────────────────────┴──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod collab;
pub mod element;
pub mod error;
pub mod event;
pub mod geometry;
pub mod message;
pub mod portfolio;
pub mod schema;
pub mod store;
pub mod surface;
pub mod text;
pub mod workspace;

pub use bridge::{BridgeConfig, BridgeEvent, BridgeRegistry, EditorBridge, EditorLifecycle};
pub use collab::{
    ImagePicker, ImageSearch, ImageUploader, Navigator, PickOutcome, PickedImage,
    PortfolioRepository, SurfaceFactory,
};
pub use element::{CanvasElement, CanvasElementHandle, ElementId, ElementKind, ElementState};
pub use error::{FolioError, FolioResult};
pub use event::{GestureTarget, PanEvent, TouchPhase};
pub use geometry::{EdgeMask, Frame, GestureController, Point, ResizeHandle, Size};
pub use message::{CorrelationId, EditorId, InboundMessage, OutboundMessage};
pub use portfolio::{Page, PortfolioCollection, PortfolioSession};
pub use schema::{ImageDoc, PageDocument, PortfolioDocument, RichText, TextboxDoc, WorkspaceDocument};
pub use store::PortfolioStore;
pub use surface::HeadlessHost;
pub use workspace::{EditMode, PageCollection, ToolbarState, Workspace, WorkspaceConfig};

/// Portfolio Perfecto core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
