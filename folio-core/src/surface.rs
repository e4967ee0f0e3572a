//! In-process editor host.
//!
//! [`HeadlessHost`] stands in for the embedded editor surfaces when there is no
//! UI: it reports every surface ready as soon as it is loaded, keeps each
//! editor's content, and answers `getContent` from it. Replies travel back
//! through a [`BridgeRegistry`] from a spawned message pump, so bridges see the
//! same asynchronous request/reply flow as with a real surface.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::{BridgeRegistry, SinkError, SurfaceSink};
use crate::collab::SurfaceFactory;
use crate::geometry::Size;
use crate::message::{EditorId, InboundMessage, OutboundMessage};
use crate::schema::RichText;
use crate::{FolioError, FolioResult};

/// A formatting command an editor received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// Command name.
    pub command: String,
    /// Command argument.
    pub value: Option<String>,
}

#[derive(Debug)]
enum HostCommand {
    Load(EditorId),
    Message(OutboundMessage),
}

#[derive(Debug)]
struct HostSink {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl SurfaceSink for HostSink {
    fn load(&self, editor_id: &EditorId) -> Result<(), SinkError> {
        self.tx
            .send(HostCommand::Load(editor_id.clone()))
            .map_err(|_| SinkError::Closed)
    }

    fn post(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        self.tx
            .send(HostCommand::Message(message.clone()))
            .map_err(|_| SinkError::Closed)
    }
}

#[derive(Debug, Default)]
struct EditorRecord {
    content: RichText,
    size: Option<Size>,
    commands: Vec<ExecutedCommand>,
}

#[derive(Debug, Default)]
struct HostState {
    editors: HashMap<EditorId, EditorRecord>,
    muted: HashSet<EditorId>,
}

/// Headless implementation of the editor surfaces.
#[derive(Debug)]
pub struct HeadlessHost {
    tx: mpsc::UnboundedSender<HostCommand>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<HostCommand>>>,
    state: Arc<Mutex<HostState>>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    /// Create a host. Nothing is answered until [`serve`](Self::serve) runs.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            state: Arc::default(),
        }
    }

    /// Spawn the message pump delivering replies through `registry`.
    ///
    /// Must be called from within a tokio runtime. The host holds a sender of
    /// its own, so the pump runs until the returned handle is aborted or the
    /// host and every sink it opened are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::InvalidOperation`] if the host is already serving.
    pub fn serve(&self, registry: BridgeRegistry) -> FolioResult<JoinHandle<()>> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| FolioError::InvalidOperation("headless host already serving".into()))?;
        let state = Arc::clone(&self.state);

        Ok(tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                if let Some(reply) = handle_command(&state, command) {
                    registry.dispatch(reply);
                }
            }
            tracing::debug!("Headless host stopped");
        }))
    }

    /// Stop answering `getContent` for an editor, as if its surface hung.
    pub fn mute(&self, editor_id: &EditorId) {
        self.lock().muted.insert(editor_id.clone());
    }

    /// Current content of an editor.
    #[must_use]
    pub fn content(&self, editor_id: &EditorId) -> Option<RichText> {
        self.lock().editors.get(editor_id).map(|e| e.content.clone())
    }

    /// Last size reported to an editor.
    #[must_use]
    pub fn size(&self, editor_id: &EditorId) -> Option<Size> {
        self.lock().editors.get(editor_id).and_then(|e| e.size)
    }

    /// Formatting commands an editor received, oldest first.
    #[must_use]
    pub fn commands(&self, editor_id: &EditorId) -> Vec<ExecutedCommand> {
        self.lock()
            .editors
            .get(editor_id)
            .map(|e| e.commands.clone())
            .unwrap_or_default()
    }

    /// Number of editors that have been loaded.
    #[must_use]
    pub fn editor_count(&self) -> usize {
        self.lock().editors.len()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SurfaceFactory for HeadlessHost {
    fn open(&self, _editor_id: &EditorId) -> Arc<dyn SurfaceSink> {
        Arc::new(HostSink {
            tx: self.tx.clone(),
        })
    }
}

fn handle_command(state: &Mutex<HostState>, command: HostCommand) -> Option<InboundMessage> {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    match command {
        HostCommand::Load(editor_id) => {
            state.editors.entry(editor_id.clone()).or_default();
            tracing::trace!(editor = %editor_id, "Surface loaded");
            Some(InboundMessage::Ready { editor_id })
        }
        HostCommand::Message(message) => {
            let muted = state.muted.contains(message.editor_id());
            let record = state.editors.entry(message.editor_id().clone()).or_default();
            match message {
                OutboundMessage::ExecCommand { command, value, .. } => {
                    record.commands.push(ExecutedCommand { command, value });
                    None
                }
                OutboundMessage::SetContent { content, .. } => {
                    record.content = content;
                    None
                }
                OutboundMessage::SetSize { width, height, .. } => {
                    record.size = Some(Size::new(width, height));
                    None
                }
                OutboundMessage::GetContent {
                    editor_id,
                    correlation_id,
                } => (!muted).then(|| InboundMessage::ContentResult {
                    editor_id,
                    correlation_id,
                    payload: record.content.clone(),
                }),
            }
        }
    }
}
