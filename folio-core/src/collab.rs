//! Interfaces to the collaborators the workspace depends on.
//!
//! Storage, image picking, image search, navigation and the hosting of editor
//! surfaces all live outside this crate. Each is reached through one narrow
//! trait so hosts can plug in their own backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bridge::SurfaceSink;
use crate::message::EditorId;
use crate::schema::PortfolioDocument;
use crate::FolioResult;

/// Opens the embedded editor surface for each new text element.
pub trait SurfaceFactory: Send + Sync + std::fmt::Debug {
    /// Return the outbound channel to the surface hosting `editor_id`.
    fn open(&self, editor_id: &EditorId) -> Arc<dyn SurfaceSink>;
}

/// An image chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickedImage {
    /// Local locator of the bitmap.
    pub uri: String,
    /// Natural width in pixels.
    pub width: f64,
    /// Natural height in pixels.
    pub height: f64,
}

/// Result of asking the user for an image.
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    /// The user chose an image.
    Picked(PickedImage),
    /// The user dismissed the picker.
    Cancelled,
}

/// Lets the user choose an image from their library.
#[async_trait]
pub trait ImagePicker: Send + Sync {
    /// Show the picker.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::ImageLoad`](crate::FolioError::ImageLoad) if the
    /// chosen image cannot be read.
    async fn pick_image(&self) -> FolioResult<PickOutcome>;
}

/// Remote table store holding portfolios.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    /// Fetch a portfolio by id.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`](crate::FolioError::Persistence) on failure.
    async fn load_portfolio(&self, id: &str) -> FolioResult<PortfolioDocument>;

    /// Store a portfolio and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`](crate::FolioError::Persistence) on failure.
    async fn save_portfolio(&self, portfolio: &PortfolioDocument) -> FolioResult<String>;
}

/// Blob storage for images.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload a local image and return its public url.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`](crate::FolioError::Persistence) on failure.
    async fn upload_image(&self, local_uri: &str) -> FolioResult<String>;
}

/// Finds an image url for a free-text query.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Look up an image. `None` when nothing matched or the service failed.
    async fn find_image(&self, query: &str) -> Option<String>;
}

/// Screen navigation. One-way from the workspace's point of view.
pub trait Navigator: Send + Sync {
    /// Show `screen` with `params`.
    fn navigate(&self, screen: &str, params: serde_json::Value);
}
