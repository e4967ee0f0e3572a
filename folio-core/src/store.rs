//! Portfolio storage.
//!
//! Provides a thread-safe [`PortfolioStore`] that keeps portfolios in memory
//! and, when given a data directory, mirrors each one to `<id>.json` and keeps
//! uploaded images under `images/`. It implements the repository and uploader
//! collaborators so a session can be saved and reloaded without a network.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::collab::{ImageUploader, PortfolioRepository};
use crate::schema::PortfolioDocument;
use crate::{FolioError, FolioResult};

/// Subdirectory of the data directory holding uploaded images.
pub const IMAGES_DIR: &str = "images";

const FILE_SCHEME: &str = "file://";

/// Thread-safe portfolio storage.
///
/// # Example
///
/// ```
/// use folio_core::schema::PortfolioDocument;
/// use folio_core::store::PortfolioStore;
///
/// let store = PortfolioStore::new();
/// let doc = PortfolioDocument::from_json(r#"{"title":"Mine","pages":[]}"#).unwrap();
/// let id = store.insert(doc).unwrap();
/// assert_eq!(store.get(&id).unwrap().title, "Mine");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PortfolioStore {
    portfolios: Arc<RwLock<HashMap<String, PortfolioDocument>>>,
    /// Optional data directory for filesystem persistence.
    data_dir: Option<PathBuf>,
}

impl PortfolioStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store persisting to `data_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`] if the directories cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> FolioResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join(IMAGES_DIR))?;
        Ok(Self {
            portfolios: Arc::default(),
            data_dir: Some(data_dir),
        })
    }

    /// The data directory, if persistence is enabled.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Get a portfolio held in memory.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<PortfolioDocument> {
        let portfolios = self
            .portfolios
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        portfolios.get(id).cloned()
    }

    /// Store a portfolio, assigning an id if it has none. Returns the id.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`] if the file cannot be written.
    pub fn insert(&self, mut doc: PortfolioDocument) -> FolioResult<String> {
        if doc.id.is_empty() {
            doc.id = Uuid::new_v4().to_string();
        }
        let id = doc.id.clone();
        self.persist(&doc)?;
        let mut portfolios = self
            .portfolios
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        portfolios.insert(id.clone(), doc);
        Ok(id)
    }

    /// Delete a portfolio from memory and disk. Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> bool {
        let in_memory = self
            .portfolios
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();

        let on_disk = match self.portfolio_path(id) {
            Some(path) if path.exists() => match std::fs::remove_file(&path) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to delete portfolio file {}: {e}", path.display());
                    false
                }
            },
            _ => false,
        };
        in_memory || on_disk
    }

    /// Ids of every stored portfolio, in memory or on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Persistence`] if the data directory cannot be read.
    pub fn ids(&self) -> FolioResult<Vec<String>> {
        let mut ids: BTreeSet<String> = self
            .portfolios
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();

        if let Some(ref data_dir) = self.data_dir {
            for entry in std::fs::read_dir(data_dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.insert(stem.to_string());
                    }
                }
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Read a portfolio from its file into memory.
    ///
    /// # Errors
    ///
    /// - [`FolioError::Persistence`] if there is no data directory or the file
    ///   cannot be read.
    /// - [`FolioError::Serialization`] if the file is not a portfolio.
    pub fn load_from_disk(&self, id: &str) -> FolioResult<PortfolioDocument> {
        let path = self
            .portfolio_path(id)
            .ok_or_else(|| FolioError::Persistence("no data directory configured".into()))?;
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            FolioError::Persistence(format!("portfolio {id} ({}): {e}", path.display()))
        })?;
        let doc = PortfolioDocument::from_json(&contents)?;

        let mut portfolios = self
            .portfolios
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        portfolios.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn portfolio_path(&self, id: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", sanitize_filename(id))))
    }

    fn persist(&self, doc: &PortfolioDocument) -> FolioResult<()> {
        let Some(path) = self.portfolio_path(&doc.id) else {
            return Ok(());
        };
        std::fs::write(&path, doc.to_json_pretty()?).map_err(|e| {
            FolioError::Persistence(format!("failed to write {}: {e}", path.display()))
        })?;
        tracing::debug!(portfolio = %doc.id, path = %path.display(), "Persisted portfolio");
        Ok(())
    }

    fn copy_image(&self, local_uri: &str) -> FolioResult<String> {
        let images_dir = self
            .data_dir
            .as_ref()
            .map(|dir| dir.join(IMAGES_DIR))
            .ok_or_else(|| FolioError::Persistence("no data directory configured".into()))?;
        let source = Path::new(local_uri.strip_prefix(FILE_SCHEME).unwrap_or(local_uri));

        if source.parent() == Some(images_dir.as_path()) {
            return Ok(local_uri.to_string());
        }
        if !source.is_file() {
            return Err(FolioError::Persistence(format!(
                "image not found: {}",
                source.display()
            )));
        }

        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), sanitize_filename(ext)),
            None => Uuid::new_v4().to_string(),
        };
        let dest = images_dir.join(file_name);
        std::fs::copy(source, &dest).map_err(|e| {
            FolioError::Persistence(format!("failed to copy {}: {e}", source.display()))
        })?;
        Ok(format!("{FILE_SCHEME}{}", dest.display()))
    }
}

#[async_trait]
impl PortfolioRepository for PortfolioStore {
    async fn load_portfolio(&self, id: &str) -> FolioResult<PortfolioDocument> {
        if let Some(doc) = self.get(id) {
            return Ok(doc);
        }
        if self.data_dir.is_some() {
            return self.load_from_disk(id);
        }
        Err(FolioError::Persistence(format!("portfolio not found: {id}")))
    }

    async fn save_portfolio(&self, portfolio: &PortfolioDocument) -> FolioResult<String> {
        self.insert(portfolio.clone())
    }
}

#[async_trait]
impl ImageUploader for PortfolioStore {
    async fn upload_image(&self, local_uri: &str) -> FolioResult<String> {
        self.copy_image(local_uri)
    }
}

fn sanitize_filename(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Frame, Point, Size};
    use crate::schema::{ImageDoc, PageDocument};

    fn portfolio(id: &str) -> PortfolioDocument {
        let mut page = PageDocument::empty("p1", "Page 1");
        page.workspace.images.push(ImageDoc::new(
            "i1",
            Frame::new(Point::new(1.0, 2.0), Size::new(3.0, 4.0)),
            "https://example.com/a.png",
        ));
        PortfolioDocument {
            id: id.to_string(),
            title: "Test".to_string(),
            pages: vec![page],
        }
    }

    #[test]
    fn test_insert_assigns_id() {
        let store = PortfolioStore::new();
        let id = store.insert(portfolio("")).expect("insert");
        assert!(!id.is_empty());
        assert_eq!(store.get(&id).expect("stored").id, id);
    }

    #[test]
    fn test_remove() {
        let store = PortfolioStore::new();
        store.insert(portfolio("a")).expect("insert");
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.get("a").is_none());
    }

    #[tokio::test]
    async fn test_load_missing_in_memory_fails() {
        let store = PortfolioStore::new();
        let result = store.load_portfolio("nope").await;
        assert!(matches!(result, Err(FolioError::Persistence(_))));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abc-123_x"), "abc-123_x");
        assert_eq!(sanitize_filename("../etc/passwd"), "___etc_passwd");
    }

    // -----------------------------------------------------------------------
    // Persistence tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        store.insert(portfolio("saved")).expect("insert");
        assert!(dir.path().join("saved.json").exists());

        let fresh = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        assert!(fresh.get("saved").is_none());
        let doc = fresh.load_from_disk("saved").expect("load");
        assert_eq!(doc, portfolio("saved"));
        assert!(fresh.get("saved").is_some());
    }

    #[tokio::test]
    async fn test_repository_reads_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        PortfolioStore::with_data_dir(dir.path())
            .expect("create store")
            .insert(portfolio("p"))
            .expect("insert");

        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        let doc = store.load_portfolio("p").await.expect("load");
        assert_eq!(doc.pages.len(), 1);

        let missing = store.load_portfolio("missing").await;
        assert!(matches!(missing, Err(FolioError::Persistence(_))));
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("bad.json"), "{ not json").expect("write");
        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        assert!(matches!(
            store.load_from_disk("bad"),
            Err(FolioError::Serialization(_))
        ));
    }

    #[test]
    fn test_ids_merges_memory_and_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        PortfolioStore::with_data_dir(dir.path())
            .expect("create store")
            .insert(portfolio("on-disk"))
            .expect("insert");

        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        store.insert(portfolio("another")).expect("insert");
        assert_eq!(
            store.ids().expect("ids"),
            vec!["another".to_string(), "on-disk".to_string()]
        );
    }

    #[test]
    fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        store.insert(portfolio("gone")).expect("insert");
        assert!(store.remove("gone"));
        assert!(!dir.path().join("gone.json").exists());
    }

    #[tokio::test]
    async fn test_upload_copies_into_images_dir() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg bytes").expect("write");

        let store = PortfolioStore::with_data_dir(dir.path().join("data")).expect("create store");
        let url = store
            .upload_image(&format!("file://{}", source.display()))
            .await
            .expect("upload");

        let copied = PathBuf::from(url.strip_prefix("file://").expect("file url"));
        assert_eq!(copied.parent(), Some(dir.path().join("data").join(IMAGES_DIR).as_path()));
        assert_eq!(copied.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(std::fs::read(&copied).expect("read"), b"jpeg bytes");

        // Already uploaded images are not copied again.
        let again = store.upload_image(&url).await.expect("upload");
        assert_eq!(again, url);
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = PortfolioStore::with_data_dir(dir.path()).expect("create store");
        let result = store.upload_image("/does/not/exist.png").await;
        assert!(matches!(result, Err(FolioError::Persistence(_))));

        let in_memory = PortfolioStore::new();
        assert!(in_memory.upload_image("/tmp/x.png").await.is_err());
    }
}
