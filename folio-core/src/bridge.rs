//! Request/response bridge to an embedded rich-text editor.
//!
//! The editor lives in an isolated surface that can only be reached by posting
//! messages. [`EditorBridge`] layers correlated calls on top of that channel:
//!
//! ```text
//! get_content()                          surface
//!   │ pending[id] = oneshot                 │
//!   ├── { kind: getContent, id } ─────────► │
//!   │                                       │
//!   │ ◄──────── { kind: contentResult, id } ┤
//!   └ pending.remove(id).send(payload)
//! ```
//!
//! Messages posted before the surface reports `ready` are queued and flushed
//! in order once it does. Every `get_content` call is bounded by
//! [`BridgeConfig::response_timeout`], so a surface that never answers cannot
//! stall the caller.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::message::{CorrelationId, EditorId, InboundMessage, OutboundMessage};
use crate::schema::RichText;
use crate::{FolioError, FolioResult};

/// Default bound on how long `get_content` waits for a reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of messages held while waiting for `ready`.
pub const DEFAULT_MAX_QUEUED: usize = 256;

/// Errors raised by a [`SurfaceSink`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The surface is gone.
    #[error("editor surface channel closed")]
    Closed,
    /// The message could not be encoded for the channel.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Outbound half of the channel to an editor surface.
pub trait SurfaceSink: Send + Sync + std::fmt::Debug {
    /// Ask the host to load the editor surface for `editor_id`.
    ///
    /// Called once when the bridge is attached. Hosts that load surfaces on
    /// their own can ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the host is gone.
    fn load(&self, editor_id: &EditorId) -> Result<(), SinkError> {
        let _ = editor_id;
        Ok(())
    }

    /// Deliver one message to the surface. Must not block.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered.
    fn post(&self, message: &OutboundMessage) -> Result<(), SinkError>;
}

impl SurfaceSink for mpsc::UnboundedSender<OutboundMessage> {
    fn post(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        self.send(message.clone()).map_err(|_| SinkError::Closed)
    }
}

impl SurfaceSink for mpsc::UnboundedSender<String> {
    fn post(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        let json = message
            .to_json()
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        self.send(json).map_err(|_| SinkError::Closed)
    }
}

/// Configuration for an editor bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long `get_content` waits before failing with a timeout.
    pub response_timeout: Duration,
    /// Maximum messages queued before the surface is ready (oldest dropped).
    pub max_queued: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_queued: DEFAULT_MAX_QUEUED,
        }
    }
}

/// Lifecycle of the editor behind a bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorLifecycle {
    /// Bridge created, surface not requested yet.
    #[default]
    Uninitialized,
    /// Surface is loading.
    Initializing,
    /// Surface accepts commands.
    Ready,
    /// Element removed; the bridge rejects all calls.
    Destroyed,
}

/// Unsolicited events surfaced to the owner of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The editor became ready.
    Ready,
    /// The editor gained (`true`) or lost (`false`) input focus.
    FocusChanged(bool),
}

type PendingCall = oneshot::Sender<FolioResult<RichText>>;

#[derive(Debug, Default)]
struct BridgeInner {
    lifecycle: EditorLifecycle,
    focused: bool,
    queued: VecDeque<OutboundMessage>,
    pending: HashMap<CorrelationId, PendingCall>,
}

/// Correlated request/response access to one embedded editor.
#[derive(Debug)]
pub struct EditorBridge {
    editor_id: EditorId,
    sink: Arc<dyn SurfaceSink>,
    config: BridgeConfig,
    inner: Mutex<BridgeInner>,
}

impl EditorBridge {
    /// Create a bridge for `editor_id` that posts through `sink`.
    #[must_use]
    pub fn new(editor_id: EditorId, sink: Arc<dyn SurfaceSink>, config: BridgeConfig) -> Self {
        Self {
            editor_id,
            sink,
            config,
            inner: Mutex::new(BridgeInner::default()),
        }
    }

    /// Editor this bridge addresses.
    #[must_use]
    pub fn editor_id(&self) -> &EditorId {
        &self.editor_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> EditorLifecycle {
        self.lock().lifecycle
    }

    /// Whether the editor currently has input focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.lock().focused
    }

    /// Number of `get_content` calls awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of messages waiting for the surface to become ready.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.lock().queued.len()
    }

    /// Request the editor surface. Moves `Uninitialized` to `Initializing`.
    pub fn attach(&self) {
        let mut inner = self.lock();
        if inner.lifecycle != EditorLifecycle::Uninitialized {
            return;
        }
        inner.lifecycle = EditorLifecycle::Initializing;
        drop(inner);

        tracing::debug!(editor = %self.editor_id, "Loading editor surface");
        if let Err(e) = self.sink.load(&self.editor_id) {
            tracing::warn!(editor = %self.editor_id, "Failed to load editor surface: {e}");
        }
    }

    /// Apply a formatting command. Fire-and-forget.
    pub fn execute_command(&self, command: &str, value: Option<&str>) {
        self.send(OutboundMessage::ExecCommand {
            editor_id: self.editor_id.clone(),
            command: command.to_string(),
            value: value.map(str::to_string),
        });
    }

    /// Replace the editor content. Fire-and-forget.
    pub fn set_content(&self, content: RichText) {
        self.send(OutboundMessage::SetContent {
            editor_id: self.editor_id.clone(),
            content,
        });
    }

    /// Tell the surface its new pixel bounds. Fire-and-forget.
    pub fn set_size(&self, width: f64, height: f64) {
        self.send(OutboundMessage::SetSize {
            editor_id: self.editor_id.clone(),
            width,
            height,
        });
    }

    /// Fetch the serialized editor content.
    ///
    /// # Errors
    ///
    /// - [`FolioError::BridgeTimeout`] if no reply arrives within the configured bound.
    /// - [`FolioError::BridgeDisposed`] if the bridge is, or becomes, disposed.
    /// - [`FolioError::BridgeRemote`] if the editor answers with an error.
    pub async fn get_content(&self) -> FolioResult<RichText> {
        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();

        {
            let mut inner = self.lock();
            if inner.lifecycle == EditorLifecycle::Destroyed {
                return Err(self.disposed());
            }
            inner.pending.insert(correlation_id, tx);
            let request = OutboundMessage::GetContent {
                editor_id: self.editor_id.clone(),
                correlation_id,
            };
            if let Err(e) = self.dispatch(&mut inner, request) {
                inner.pending.remove(&correlation_id);
                tracing::warn!(editor = %self.editor_id, "getContent not delivered: {e}");
                return Err(self.disposed());
            }
        }

        match tokio::time::timeout(self.config.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.disposed()),
            Err(_) => {
                self.lock().pending.remove(&correlation_id);
                tracing::warn!(
                    editor = %self.editor_id,
                    %correlation_id,
                    "getContent timed out after {:?}",
                    self.config.response_timeout
                );
                Err(FolioError::BridgeTimeout {
                    editor_id: self.editor_id.to_string(),
                    timeout: self.config.response_timeout,
                })
            }
        }
    }

    /// Handle one message from the surface.
    ///
    /// Replies are routed to their pending call by correlation id; lifecycle
    /// messages are returned as events. Stray replies are logged and dropped.
    pub fn handle_message(&self, message: InboundMessage) -> Option<BridgeEvent> {
        if message.editor_id() != &self.editor_id {
            tracing::warn!(
                editor = %self.editor_id,
                "Dropping message addressed to {}",
                message.editor_id()
            );
            return None;
        }

        let mut inner = self.lock();
        if inner.lifecycle == EditorLifecycle::Destroyed {
            tracing::debug!(editor = %self.editor_id, "Dropping message for disposed editor");
            return None;
        }

        match message {
            InboundMessage::Ready { .. } => {
                inner.lifecycle = EditorLifecycle::Ready;
                self.flush(&mut inner);
                Some(BridgeEvent::Ready)
            }
            InboundMessage::Focus { .. } => {
                inner.focused = true;
                Some(BridgeEvent::FocusChanged(true))
            }
            InboundMessage::Blur { .. } => {
                inner.focused = false;
                Some(BridgeEvent::FocusChanged(false))
            }
            InboundMessage::ContentResult {
                correlation_id,
                payload,
                ..
            } => {
                if let Some(call) = inner.pending.remove(&correlation_id) {
                    let _ = call.send(Ok(payload));
                } else {
                    tracing::warn!(
                        editor = %self.editor_id,
                        %correlation_id,
                        "Dropping contentResult with unknown correlation id"
                    );
                }
                None
            }
            InboundMessage::Error {
                correlation_id,
                payload,
                ..
            } => {
                let message = payload.unwrap_or_else(|| "Unknown error".to_string());
                match correlation_id.and_then(|id| inner.pending.remove(&id)) {
                    Some(call) => {
                        let _ = call.send(Err(FolioError::BridgeRemote {
                            editor_id: self.editor_id.to_string(),
                            message,
                        }));
                    }
                    None => {
                        tracing::warn!(editor = %self.editor_id, "Editor error: {message}");
                    }
                }
                None
            }
        }
    }

    /// Tear the bridge down, rejecting every pending call.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if inner.lifecycle == EditorLifecycle::Destroyed {
            return;
        }
        inner.lifecycle = EditorLifecycle::Destroyed;
        inner.focused = false;
        inner.queued.clear();
        let pending = inner.pending.len();
        for (_, call) in inner.pending.drain() {
            let _ = call.send(Err(self.disposed()));
        }
        tracing::debug!(editor = %self.editor_id, pending, "Editor bridge disposed");
    }

    fn send(&self, message: OutboundMessage) {
        let mut inner = self.lock();
        if let Err(e) = self.dispatch(&mut inner, message) {
            tracing::warn!(editor = %self.editor_id, "Message not delivered: {e}");
        }
    }

    /// Post now if ready, queue if still loading, drop if disposed.
    fn dispatch(&self, inner: &mut BridgeInner, message: OutboundMessage) -> Result<(), SinkError> {
        match inner.lifecycle {
            EditorLifecycle::Ready => self.sink.post(&message),
            EditorLifecycle::Uninitialized | EditorLifecycle::Initializing => {
                if inner.queued.len() >= self.config.max_queued {
                    inner.queued.pop_front();
                    tracing::warn!(
                        editor = %self.editor_id,
                        "Pre-ready queue full, dropped oldest message"
                    );
                }
                inner.queued.push_back(message);
                Ok(())
            }
            EditorLifecycle::Destroyed => Err(SinkError::Closed),
        }
    }

    fn flush(&self, inner: &mut BridgeInner) {
        let queued = std::mem::take(&mut inner.queued);
        if !queued.is_empty() {
            tracing::debug!(editor = %self.editor_id, count = queued.len(), "Flushing queued messages");
        }
        for message in queued {
            if let Err(e) = self.sink.post(&message) {
                tracing::warn!(editor = %self.editor_id, "Queued message not delivered: {e}");
            }
        }
    }

    fn disposed(&self) -> FolioError {
        FolioError::BridgeDisposed(self.editor_id.to_string())
    }

    fn lock(&self) -> MutexGuard<'_, BridgeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared lookup from editor id to bridge, used to route inbound messages.
///
/// Cheap to clone; a host's message pump can hold a clone and deliver replies
/// while the workspace is awaiting a collection.
#[derive(Debug, Clone, Default)]
pub struct BridgeRegistry {
    bridges: Arc<RwLock<HashMap<EditorId, Arc<EditorBridge>>>>,
}

impl BridgeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bridge under its editor id, replacing any previous one.
    pub fn insert(&self, bridge: Arc<EditorBridge>) {
        let mut bridges = self
            .bridges
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        bridges.insert(bridge.editor_id().clone(), bridge);
    }

    /// Unregister a bridge.
    pub fn remove(&self, editor_id: &EditorId) -> Option<Arc<EditorBridge>> {
        let mut bridges = self
            .bridges
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        bridges.remove(editor_id)
    }

    /// Look up a bridge.
    #[must_use]
    pub fn get(&self, editor_id: &EditorId) -> Option<Arc<EditorBridge>> {
        let bridges = self.bridges.read().unwrap_or_else(PoisonError::into_inner);
        bridges.get(editor_id).cloned()
    }

    /// Number of registered bridges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bridges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether no bridge is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a parsed message to its bridge.
    pub fn dispatch(&self, message: InboundMessage) -> Option<(EditorId, BridgeEvent)> {
        let editor_id = message.editor_id().clone();
        let Some(bridge) = self.get(&editor_id) else {
            tracing::warn!(editor = %editor_id, "Dropping message for unknown editor");
            return None;
        };
        bridge
            .handle_message(message)
            .map(|event| (editor_id, event))
    }

    /// Parse and route a raw message. Malformed input is logged and dropped.
    pub fn dispatch_raw(&self, raw: &str) -> Option<(EditorId, BridgeEvent)> {
        match InboundMessage::parse(raw) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                tracing::warn!("Dropping malformed editor message: {e}");
                None
            }
        }
    }
}
