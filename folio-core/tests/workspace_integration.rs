//! Workspace Integration Tests
//!
//! Drives workspaces and portfolio sessions through the headless editor host:
//! - Toolbar routing to the focused editor
//! - Collection with hung editors
//! - Save and reload through the portfolio store
//! - Page management

use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_core::bridge::BridgeConfig;
use folio_core::collab::{ImageSearch, ImageUploader, Navigator};
use folio_core::surface::ExecutedCommand;
use folio_core::{
    CanvasElement, EditMode, EditorId, ElementId, FolioError, FolioResult, Frame, GestureTarget,
    HeadlessHost, PanEvent, Point, PortfolioDocument, PortfolioRepository, PortfolioSession,
    PortfolioStore, ResizeHandle, RichText, Size, Workspace, WorkspaceConfig,
};

/// Records every navigation.
#[derive(Debug, Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingNavigator {
    fn screens(&self) -> Vec<String> {
        self.visits
            .lock()
            .expect("lock")
            .iter()
            .map(|(screen, _)| screen.clone())
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, screen: &str, params: serde_json::Value) {
        self.visits
            .lock()
            .expect("lock")
            .push((screen.to_string(), params));
    }
}

/// Uploader that fails for every image.
struct BrokenUploader;

#[async_trait::async_trait]
impl ImageUploader for BrokenUploader {
    async fn upload_image(&self, _local_uri: &str) -> FolioResult<String> {
        Err(FolioError::Persistence("bucket unavailable".into()))
    }
}

/// Uploader that records every uri it is asked to upload.
#[derive(Debug, Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ImageUploader for RecordingUploader {
    async fn upload_image(&self, local_uri: &str) -> FolioResult<String> {
        let mut uploads = self.uploads.lock().expect("lock");
        uploads.push(local_uri.to_string());
        Ok(format!("https://bucket.example/{}", uploads.len()))
    }
}

/// Image search knowing a single query.
struct OneImageSearch;

#[async_trait::async_trait]
impl ImageSearch for OneImageSearch {
    async fn find_image(&self, query: &str) -> Option<String> {
        (query == "sunset").then(|| "https://images.example/sunset.jpg".to_string())
    }
}

fn short_timeout() -> WorkspaceConfig {
    WorkspaceConfig {
        bridge: BridgeConfig {
            response_timeout: Duration::from_millis(200),
            ..BridgeConfig::default()
        },
        ..WorkspaceConfig::default()
    }
}

fn editor_of(ws: &Workspace, id: &ElementId) -> EditorId {
    ws.element(id)
        .and_then(CanvasElement::as_text)
        .expect("text element")
        .editor_id()
        .clone()
}

/// Yield until the host pump has drained its queue.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Workspace scenarios
// ============================================================================

#[tokio::test]
async fn test_toolbar_command_routes_to_focused_editor() {
    let host = Arc::new(HeadlessHost::new());
    let mut ws = Workspace::new(host.clone());
    let pump = host.serve(ws.registry()).expect("serve");

    let t1 = ws.add_text_element(Point::new(50.0, 50.0));
    let t2 = ws.add_text_element(Point::new(400.0, 50.0));
    ws.set_keyboard_visible(true);
    ws.set_focus(Some(&t1));
    ws.execute_toolbar_command("bold", Some("on"));
    settle().await;

    let commands = host.commands(&editor_of(&ws, &t1));
    assert_eq!(
        commands,
        vec![ExecutedCommand {
            command: "bold".into(),
            value: Some("on".into()),
        }]
    );
    assert!(host.commands(&editor_of(&ws, &t2)).is_empty());

    ws.set_focus(Some(&t2));
    ws.execute_toolbar_command("JustifyCenter", None);
    settle().await;
    assert_eq!(host.commands(&editor_of(&ws, &t1)).len(), 1);
    assert_eq!(host.commands(&editor_of(&ws, &t2))[0].command, "JustifyCenter");
    pump.abort();
}

#[tokio::test(start_paused = true)]
async fn test_collect_with_hung_editor_finishes_within_timeout() {
    let host = Arc::new(HeadlessHost::new());
    let mut ws = Workspace::with_config(host.clone(), short_timeout());
    let pump = host.serve(ws.registry()).expect("serve");

    let ok = ws.add_text_element(Point::new(0.0, 0.0));
    let hung = ws.add_text_element(Point::new(400.0, 0.0));
    host.mute(&editor_of(&ws, &hung));
    ws.element(&ok)
        .and_then(CanvasElement::as_text)
        .expect("text")
        .bridge()
        .set_content(RichText::new("<p>kept</p>"));

    let started = tokio::time::Instant::now();
    let collected = ws.collect_page_data().await;
    assert!(started.elapsed() <= Duration::from_millis(250));

    assert_eq!(collected.workspace.textboxes.len(), 2);
    let kept = collected
        .workspace
        .textboxes
        .iter()
        .find(|t| t.id == ok.as_str())
        .expect("collected");
    assert_eq!(kept.content, RichText::new("<p>kept</p>"));

    let failed = collected
        .workspace
        .textboxes
        .iter()
        .find(|t| t.id == hung.as_str())
        .expect("placeholder");
    assert!(failed.content.is_empty());

    assert_eq!(collected.failures.len(), 1);
    assert_eq!(collected.failures[0].element_id, hung);
    assert!(matches!(
        collected.failures[0].error,
        FolioError::BridgeTimeout { .. }
    ));
    pump.abort();
}

#[tokio::test]
async fn test_collect_then_load_round_trips() {
    let host = Arc::new(HeadlessHost::new());
    let mut ws = Workspace::new(host.clone());
    let pump = host.serve(ws.registry()).expect("serve");

    let text = ws.add_text_element(Point::new(10.0, 20.0));
    ws.element(&text)
        .and_then(CanvasElement::as_text)
        .expect("text")
        .bridge()
        .set_content(RichText::new("<h1>Title</h1><p>Body</p>"));
    let image = ws
        .add_image_element("file:///photos/a.jpg", 1600.0, 800.0, Point::new(5.0, 5.0))
        .expect("image");

    // Resize the textbox from its bottom-right handle.
    ws.handle_pan(&text, GestureTarget::Handle(ResizeHandle::BottomRight), &PanEvent::start());
    ws.handle_pan(
        &text,
        GestureTarget::Handle(ResizeHandle::BottomRight),
        &PanEvent::ended(-100.0, 50.0),
    )
    .expect("committed");

    let first = ws.collect_page_data().await;
    assert!(first.is_complete());

    let host2 = Arc::new(HeadlessHost::new());
    let mut reloaded = Workspace::new(host2.clone());
    let pump2 = host2.serve(reloaded.registry()).expect("serve");
    reloaded
        .load_page_data(&first.workspace)
        .expect("valid document");
    let second = reloaded.collect_page_data().await;
    assert_eq!(second.workspace, first.workspace);

    let frame = reloaded.element(&text).expect("text").frame();
    assert_eq!(frame, Frame::new(Point::new(10.0, 20.0), Size::new(200.0, 450.0)));
    assert_eq!(host2.size(&editor_of(&reloaded, &text)), Some(Size::new(200.0, 450.0)));

    let image_frame = reloaded.element(&image).expect("image").frame();
    assert_eq!(image_frame.size(), Size::new(200.0, 100.0));

    pump.abort();
    pump2.abort();
}

#[tokio::test]
async fn test_removed_element_is_not_collected() {
    let host = Arc::new(HeadlessHost::new());
    let mut ws = Workspace::new(host.clone());
    let pump = host.serve(ws.registry()).expect("serve");

    let a = ws.add_text_element(Point::default());
    ws.add_image_element("file:///x.png", 80.0, 80.0, Point::default())
        .expect("image");
    assert!(ws.remove_element(&a));
    assert!(!ws.remove_element(&a));

    let collected = ws.collect_page_data().await;
    assert!(collected.workspace.textboxes.is_empty());
    assert_eq!(collected.workspace.images.len(), 1);
    pump.abort();
}

// ============================================================================
// Portfolio sessions
// ============================================================================

#[tokio::test]
async fn test_new_portfolio_has_one_page() {
    let host = Arc::new(HeadlessHost::new());
    let session = PortfolioSession::create(host, WorkspaceConfig::default());
    assert_eq!(session.title(), "Untitled Portfolio");
    assert_eq!(session.pages().len(), 1);
    assert_eq!(session.pages()[0].title(), "Page 1");
}

#[tokio::test]
async fn test_page_management() {
    let host = Arc::new(HeadlessHost::new());
    let navigator = RecordingNavigator::default();
    let mut session = PortfolioSession::create(host, WorkspaceConfig::default());

    let first = session.pages()[0].id().to_string();
    let second = session.add_page(&navigator);
    let third = session.add_page(&navigator);
    assert_eq!(session.page(&third).expect("page").title(), "Page 3");
    assert_eq!(navigator.screens(), vec!["Page 2", "Page 3"]);

    assert!(session.remove_page(&second).expect("removable"));
    let fourth = session.add_page(&navigator);
    assert_eq!(session.page(&fourth).expect("page").title(), "Page 4");

    assert!(session.remove_page(&third).expect("removable"));
    assert!(session.remove_page(&fourth).expect("removable"));
    assert!(matches!(
        session.remove_page(&first),
        Err(FolioError::InvalidOperation(_))
    ));
    assert!(!session.remove_page("unknown").expect("unknown id"));
}

#[tokio::test]
async fn test_save_and_reload_portfolio() {
    let data = tempfile::tempdir().expect("create temp dir");
    let store = PortfolioStore::with_data_dir(data.path().join("store")).expect("store");
    let photo = data.path().join("photo.png");
    std::fs::write(&photo, b"png").expect("write");

    let host = Arc::new(HeadlessHost::new());
    let navigator = RecordingNavigator::default();
    let mut session = PortfolioSession::create(host.clone(), WorkspaceConfig::default());
    let pump = host.serve(session.registry()).expect("serve");

    let page_id = session.pages()[0].id().to_string();
    let ws = session
        .page_mut(&page_id)
        .expect("page")
        .workspace_mut();
    let text = ws.add_text_element(Point::default());
    ws.element(&text)
        .and_then(CanvasElement::as_text)
        .expect("text")
        .bridge()
        .set_content(RichText::new("<p>Hello&nbsp;world</p>"));
    ws.add_image_element(
        &format!("file://{}", photo.display()),
        800.0,
        800.0,
        Point::default(),
    )
    .expect("image");

    let id = session
        .save(&store, &store, &navigator)
        .await
        .expect("saved");
    assert_eq!(id, session.id());
    assert_eq!(navigator.screens(), vec!["Overview"]);
    assert_eq!(session.gather_text().await, "Hello world");
    pump.abort();

    let saved = store.load_portfolio(&id).await.expect("stored");
    let uri = &saved.pages[0].workspace.images[0].uri;
    assert!(uri.starts_with("file://"));
    assert!(uri.contains("images"));

    let host2 = Arc::new(HeadlessHost::new());
    let reopened = PortfolioSession::load(
        &store,
        &id,
        None,
        EditMode::View,
        host2.clone(),
        WorkspaceConfig::default(),
    )
    .await
    .expect("loaded");
    let pump2 = host2.serve(reopened.registry()).expect("serve");
    let collected = reopened.collect().await;
    assert_eq!(collected.document, saved);
    pump2.abort();
}

#[tokio::test]
async fn test_failed_upload_keeps_local_uri() {
    let store = PortfolioStore::new();
    let host = Arc::new(HeadlessHost::new());
    let navigator = RecordingNavigator::default();
    let mut session = PortfolioSession::create(host.clone(), WorkspaceConfig::default());
    let pump = host.serve(session.registry()).expect("serve");

    let page_id = session.pages()[0].id().to_string();
    session
        .page_mut(&page_id)
        .expect("page")
        .workspace_mut()
        .add_image_element("file:///local/cat.jpg", 160.0, 160.0, Point::default())
        .expect("image");

    let id = session
        .save(&store, &BrokenUploader, &navigator)
        .await
        .expect("saved despite upload failure");
    let saved = store.get(&id).expect("stored");
    assert_eq!(saved.pages[0].workspace.images[0].uri, "file:///local/cat.jpg");
    pump.abort();
}

#[tokio::test]
async fn test_invalid_page_opens_empty() {
    let doc = PortfolioDocument::from_json(
        r#"{
            "id": "p",
            "title": "Mixed",
            "pages": [
                { "id": "good", "title": "Page 1", "workspace": {
                    "textboxes": [{ "id": "t", "content": "{\"content\":\"<p>x</p>\"}" }]
                } },
                { "id": "bad", "title": "Page 2", "workspace": {
                    "images": [
                        { "id": "dup", "uri": "https://x/1.png" },
                        { "id": "dup", "uri": "https://x/2.png" }
                    ]
                } }
            ]
        }"#,
    )
    .expect("parses");

    let host = Arc::new(HeadlessHost::new());
    let session = PortfolioSession::open(&doc, EditMode::Edit, host, WorkspaceConfig::default());
    assert_eq!(session.page("good").expect("page").workspace().len(), 1);
    assert!(session.page("bad").expect("page").workspace().is_empty());
}

#[tokio::test]
async fn test_generated_images_are_resolved_on_load() {
    let store = PortfolioStore::new();
    let doc = PortfolioDocument::from_json(
        r#"{ "title": "Generated", "pages": [ { "id": "p1", "title": "Page 1", "workspace": {
            "images": [
                { "id": "a", "uri": "fetchImage(sunset)" },
                { "id": "b", "uri": "fetchImage(unknown thing)" }
            ]
        } } ] }"#,
    )
    .expect("parses");
    let id = store.insert(doc).expect("insert");

    let host = Arc::new(HeadlessHost::new());
    let session = PortfolioSession::load(
        &store,
        &id,
        Some(&OneImageSearch),
        EditMode::View,
        host,
        WorkspaceConfig::default(),
    )
    .await
    .expect("loaded");

    let collected = session.collect().await;
    let images = &collected.document.pages[0].workspace.images;
    assert_eq!(images[0].uri, "https://images.example/sunset.jpg");
    assert!(images[1].uri.is_empty());
}

#[tokio::test]
async fn test_load_missing_portfolio_propagates() {
    let store = PortfolioStore::new();
    let result = PortfolioSession::load(
        &store,
        "missing",
        None,
        EditMode::Edit,
        Arc::new(HeadlessHost::new()),
        WorkspaceConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(FolioError::Persistence(_))));
}

#[tokio::test]
async fn test_pages_reusing_element_ids_keep_their_content() {
    let doc = PortfolioDocument::from_json(
        r#"{ "id": "p", "title": "Reused", "pages": [
            { "id": "a", "title": "Page 1", "workspace": {
                "textboxes": [{ "id": "t1", "content": "<p>First</p>" }]
            } },
            { "id": "b", "title": "Page 2", "workspace": {
                "textboxes": [{ "id": "t1", "content": "<p>Second</p>" }]
            } }
        ] }"#,
    )
    .expect("parses");

    let host = Arc::new(HeadlessHost::new());
    let session = PortfolioSession::open(&doc, EditMode::Edit, host.clone(), short_timeout());
    let pump = host.serve(session.registry()).expect("serve");

    let collected = session.collect().await;
    assert!(collected.failures.is_empty());
    assert_eq!(host.editor_count(), 2);
    let content: Vec<&str> = collected
        .document
        .pages
        .iter()
        .map(|p| p.workspace.textboxes[0].content.content.as_str())
        .collect();
    assert_eq!(content, vec!["<p>First</p>", "<p>Second</p>"]);
    assert_eq!(collected.document.pages[1].workspace.textboxes[0].id, "t1");
    pump.abort();
}

#[tokio::test]
async fn test_open_renames_repeated_and_empty_page_titles() {
    let doc = PortfolioDocument::from_json(
        r#"{ "id": "p", "title": "Titles", "pages": [
            { "id": "a", "title": "Page 1" },
            { "id": "b", "title": "Page 1" },
            { "id": "c", "title": "" },
            { "id": "d", "title": "Page 2" }
        ] }"#,
    )
    .expect("parses");

    let host = Arc::new(HeadlessHost::new());
    let session = PortfolioSession::open(&doc, EditMode::Edit, host, WorkspaceConfig::default());
    let titles: Vec<&str> = session.pages().iter().map(|p| p.title()).collect();
    assert_eq!(titles, vec!["Page 1", "Page 3", "Page 4", "Page 2"]);
}

#[tokio::test]
async fn test_save_skips_unresolved_generated_images() {
    let store = PortfolioStore::new();
    let host = Arc::new(HeadlessHost::new());
    let navigator = RecordingNavigator::default();
    let uploader = RecordingUploader::default();
    let doc = PortfolioDocument::from_json(
        r#"{ "title": "Generated", "pages": [ { "id": "p1", "title": "Page 1", "workspace": {
            "images": [
                { "id": "a", "uri": "fetchImage(sunset)" },
                { "id": "b", "uri": "/local/cat.jpg" }
            ]
        } } ] }"#,
    )
    .expect("parses");
    let mut session =
        PortfolioSession::open(&doc, EditMode::Edit, host.clone(), WorkspaceConfig::default());
    let pump = host.serve(session.registry()).expect("serve");

    let id = session
        .save(&store, &uploader, &navigator)
        .await
        .expect("saved");
    assert_eq!(*uploader.uploads.lock().expect("lock"), vec!["/local/cat.jpg"]);
    let saved = store.get(&id).expect("stored");
    assert_eq!(saved.pages[0].workspace.images[0].uri, "fetchImage(sunset)");
    assert_eq!(saved.pages[0].workspace.images[1].uri, "https://bucket.example/1");
    pump.abort();
}
