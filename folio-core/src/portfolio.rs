//! A portfolio open for editing or viewing.
//!
//! [`PortfolioSession`] owns one [`Workspace`] per page. All workspaces share a
//! single [`BridgeRegistry`], so one host message pump serves every page.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use crate::bridge::BridgeRegistry;
use crate::collab::{ImageSearch, ImageUploader, Navigator, PortfolioRepository, SurfaceFactory};
use crate::schema::{PageDocument, PortfolioDocument, WorkspaceDocument, UNTITLED_PORTFOLIO};
use crate::workspace::{EditMode, ElementFailure, Workspace, WorkspaceConfig};
use crate::{FolioError, FolioResult};

/// Screen shown after a successful save.
pub const OVERVIEW_SCREEN: &str = "Overview";

const PAGE_TITLE_PREFIX: &str = "Page ";
const FETCH_IMAGE_PREFIX: &str = "fetchImage(";

/// One page of an open portfolio.
#[derive(Debug)]
pub struct Page {
    id: String,
    title: String,
    workspace: Workspace,
}

impl Page {
    /// Page identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Page title. Unique within the portfolio.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The page's workspace.
    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Mutable access to the page's workspace.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }
}

/// Result of collecting every page.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioCollection {
    /// The collected portfolio.
    pub document: PortfolioDocument,
    /// Elements whose content could not be fetched, across all pages.
    pub failures: Vec<ElementFailure>,
}

/// An open portfolio.
#[derive(Debug)]
pub struct PortfolioSession {
    id: String,
    title: String,
    pages: Vec<Page>,
    mode: EditMode,
    surfaces: Arc<dyn SurfaceFactory>,
    registry: BridgeRegistry,
    config: WorkspaceConfig,
}

impl PortfolioSession {
    /// Start a new portfolio with a single empty page.
    #[must_use]
    pub fn create(surfaces: Arc<dyn SurfaceFactory>, config: WorkspaceConfig) -> Self {
        let mut session = Self::empty(
            Uuid::new_v4().to_string(),
            UNTITLED_PORTFOLIO.to_string(),
            EditMode::Edit,
            surfaces,
            config,
        );
        session.push_page(Uuid::new_v4().to_string(), next_page_title(&[]));
        session
    }

    /// Open a stored portfolio.
    ///
    /// A page whose workspace is rejected opens empty. A page whose title is
    /// empty or repeats an earlier one is renamed `Page N`. In edit mode a
    /// portfolio without pages gets a first page.
    #[must_use]
    pub fn open(
        doc: &PortfolioDocument,
        mode: EditMode,
        surfaces: Arc<dyn SurfaceFactory>,
        config: WorkspaceConfig,
    ) -> Self {
        let mut session = Self::empty(
            id_or_new(&doc.id),
            doc.title.clone(),
            mode,
            surfaces,
            config,
        );

        let mut titles: Vec<String> = doc.pages.iter().map(|p| p.title.clone()).collect();
        for (index, page_doc) in doc.pages.iter().enumerate() {
            let title = if page_doc.title.trim().is_empty()
                || session.pages.iter().any(|p| p.title == page_doc.title)
            {
                let existing: Vec<&str> = titles.iter().map(String::as_str).collect();
                let renamed = next_page_title(&existing);
                tracing::warn!(
                    page = %page_doc.id,
                    from = %page_doc.title,
                    to = %renamed,
                    "Renamed page with duplicate title"
                );
                titles[index].clone_from(&renamed);
                renamed
            } else {
                page_doc.title.clone()
            };
            let page = session.push_page(id_or_new(&page_doc.id), title);
            if let Err(e) = page.workspace.load_page_data(&page_doc.workspace) {
                tracing::warn!(page = %page_doc.id, "Page opened empty: {e}");
            }
        }

        if session.pages.is_empty() && mode == EditMode::Edit {
            session.push_page(Uuid::new_v4().to_string(), next_page_title(&[]));
        }

        tracing::debug!(portfolio = %session.id, pages = session.pages.len(), "Opened portfolio");
        session
    }

    /// Fetch a portfolio from `repository` and open it.
    ///
    /// When `search` is given, generated `fetchImage(query)` image sources are
    /// resolved first.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn load(
        repository: &dyn PortfolioRepository,
        id: &str,
        search: Option<&dyn ImageSearch>,
        mode: EditMode,
        surfaces: Arc<dyn SurfaceFactory>,
        config: WorkspaceConfig,
    ) -> FolioResult<Self> {
        let mut doc = repository.load_portfolio(id).await?;
        if let Some(search) = search {
            resolve_generated_images(&mut doc, search).await;
        }
        Ok(Self::open(&doc, mode, surfaces, config))
    }

    fn empty(
        id: String,
        title: String,
        mode: EditMode,
        surfaces: Arc<dyn SurfaceFactory>,
        config: WorkspaceConfig,
    ) -> Self {
        Self {
            id,
            title,
            pages: Vec::new(),
            mode,
            surfaces,
            registry: BridgeRegistry::new(),
            config,
        }
    }

    fn push_page(&mut self, id: String, title: String) -> &mut Page {
        let mut workspace = Workspace::with_registry(
            Arc::clone(&self.surfaces),
            self.config.clone(),
            self.registry.clone(),
        );
        workspace.set_mode(self.mode);
        self.pages.push(Page {
            id,
            title,
            workspace,
        });
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Portfolio identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Portfolio title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Rename the portfolio.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switch every page between editing and viewing.
    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
        for page in &mut self.pages {
            page.workspace.set_mode(mode);
        }
    }

    /// Registry shared by every page's editor bridges.
    #[must_use]
    pub fn registry(&self) -> BridgeRegistry {
        self.registry.clone()
    }

    /// Pages in order.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Get a page by id.
    #[must_use]
    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Get a mutable page by id.
    pub fn page_mut(&mut self, id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    /// Append an empty page titled `Page N` and navigate to it.
    ///
    /// Returns the new page id.
    pub fn add_page(&mut self, navigator: &dyn Navigator) -> String {
        let titles: Vec<&str> = self.pages.iter().map(Page::title).collect();
        let title = next_page_title(&titles);
        let id = Uuid::new_v4().to_string();
        self.push_page(id.clone(), title.clone());
        tracing::debug!(page = %id, %title, "Added page");
        navigator.navigate(&title, json!({ "pageId": id }));
        id
    }

    /// Remove a page. Returns `false` if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::InvalidOperation`] when removing the last page in
    /// edit mode.
    pub fn remove_page(&mut self, id: &str) -> FolioResult<bool> {
        let Some(index) = self.pages.iter().position(|p| p.id == id) else {
            return Ok(false);
        };
        if self.mode == EditMode::Edit && self.pages.len() == 1 {
            return Err(FolioError::InvalidOperation(
                "a portfolio needs at least one page while editing".into(),
            ));
        }
        self.pages.remove(index);
        tracing::debug!(page = %id, "Removed page");
        Ok(true)
    }

    /// Collect every page concurrently.
    pub async fn collect(&self) -> PortfolioCollection {
        let collected = join_all(self.pages.iter().map(|page| async move {
            (page, page.workspace.collect_page_data().await)
        }))
        .await;

        let mut pages = Vec::with_capacity(collected.len());
        let mut failures = Vec::new();
        for (page, collection) in collected {
            failures.extend(collection.failures);
            pages.push(PageDocument {
                id: page.id.clone(),
                title: page.title.clone(),
                workspace: collection.workspace,
            });
        }

        PortfolioCollection {
            document: PortfolioDocument {
                id: self.id.clone(),
                title: self.title.clone(),
                pages,
            },
            failures,
        }
    }

    /// Plain text of every textbox, pages in order, separated by spaces.
    pub async fn gather_text(&self) -> String {
        let collection = self.collect().await;
        gather_text(&collection.document)
    }

    /// Collect, upload local images, store the portfolio and show the overview.
    ///
    /// A failed image upload keeps the local uri. Returns the stored id.
    ///
    /// # Errors
    ///
    /// Propagates repository errors; nothing is navigated on failure.
    pub async fn save(
        &mut self,
        repository: &dyn PortfolioRepository,
        uploader: &dyn ImageUploader,
        navigator: &dyn Navigator,
    ) -> FolioResult<String> {
        let PortfolioCollection {
            mut document,
            failures,
        } = self.collect().await;
        if !failures.is_empty() {
            tracing::warn!(count = failures.len(), "Saving with uncollected textboxes");
        }

        upload_local_images(&mut document, uploader).await;

        let id = repository.save_portfolio(&document).await?;
        tracing::info!(portfolio = %id, "Portfolio saved");
        self.id.clone_from(&id);
        navigator.navigate(OVERVIEW_SCREEN, json!({ "portfolioId": id }));
        Ok(id)
    }
}

fn id_or_new(id: &str) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id.to_string()
    }
}

/// Title for a new page: one past the largest `Page <n>` title.
#[must_use]
pub fn next_page_title(existing: &[&str]) -> String {
    let last = existing
        .iter()
        .filter_map(|title| title.strip_prefix(PAGE_TITLE_PREFIX))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{PAGE_TITLE_PREFIX}{}", last.saturating_add(1))
}

/// Plain text of every textbox in a document.
#[must_use]
pub fn gather_text(doc: &PortfolioDocument) -> String {
    doc.pages
        .iter()
        .map(|page| page_text(&page.workspace))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn page_text(workspace: &WorkspaceDocument) -> String {
    workspace
        .textboxes
        .iter()
        .map(|t| t.content.plain_text())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upload every image with a local uri, rewriting it to the returned url.
///
/// Unresolved `fetchImage(query)` sources are left as they are.
pub async fn upload_local_images(doc: &mut PortfolioDocument, uploader: &dyn ImageUploader) {
    for image in doc
        .pages
        .iter_mut()
        .flat_map(|p| p.workspace.images.iter_mut())
        .filter(|i| !i.is_remote() && !i.uri.is_empty() && fetch_image_query(&i.uri).is_none())
    {
        let uploaded = uploader.upload_image(&image.uri).await;
        match uploaded {
            Ok(url) => {
                tracing::debug!(image = %image.id, %url, "Uploaded image");
                image.uri = url;
            }
            Err(e) => tracing::warn!(image = %image.id, "Image upload failed, keeping local uri: {e}"),
        }
    }
}

/// Query of a generated `fetchImage(query)` image source.
#[must_use]
pub fn fetch_image_query(uri: &str) -> Option<&str> {
    let query = uri.trim().strip_prefix(FETCH_IMAGE_PREFIX)?.strip_suffix(')')?;
    let query = query.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!query.is_empty()).then_some(query)
}

/// Replace `fetchImage(query)` image sources with search results.
///
/// Unresolved queries leave the uri empty.
pub async fn resolve_generated_images(doc: &mut PortfolioDocument, search: &dyn ImageSearch) {
    for image in doc
        .pages
        .iter_mut()
        .flat_map(|p| p.workspace.images.iter_mut())
    {
        let Some(query) = fetch_image_query(&image.uri).map(str::to_string) else {
            continue;
        };
        match search.find_image(&query).await {
            Some(url) => image.uri = url,
            None => {
                tracing::warn!(image = %image.id, %query, "No image found for query");
                image.uri.clear();
            }
        }
    }
}
