//! Interactive surfaces bound to operations.
//!
//! Every active operation gets exactly one surface: a [`TextMutator`] for the
//! text modes, a [`ListPanel`] or a [`ConversationPanel`] for the modes that
//! occupy a view slot. All of them implement [`LabView`].

mod conversation;
mod list;
mod text;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use vaultlab_types::{ActiveOperation, InvocationResponse, OperationMode, SurfaceId, Turn};

use crate::host::{Editor, HostError};

pub use conversation::ConversationPanel;
pub use list::{CLEAR_ACTION, CLOSE_ACTION, ClickOutcome, ListPanel};
pub use text::TextMutator;

/// Capability set shared by every surface variant.
pub trait LabView: Send {
    fn view_type(&self) -> &str;

    fn display_text(&self) -> &str;

    fn icon(&self) -> &str;

    /// Called when the surface is placed in a slot.
    fn load(&mut self, _active_document: Option<&str>) {}

    fn render(&self) -> RenderedView;

    /// Apply a successful response.
    fn set_data(&mut self, response: &InvocationResponse) -> Result<(), HostError>;
}

/// Identity and chrome shared by all variants.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMeta {
    pub id: SurfaceId,
    pub title: String,
    pub icon: String,
}

impl SurfaceMeta {
    pub fn for_operation(operation: &ActiveOperation) -> Self {
        Self {
            id: operation.surface_id(),
            title: operation.label().to_string(),
            icon: operation.config.icon_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    pub path: String,
    pub name: String,
    pub info: Option<String>,
    /// The item points at the focused document.
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewBody {
    Items(Vec<RenderedItem>),
    Text(String),
    Transcript(Vec<Turn>),
    Empty,
}

/// Snapshot of what a surface shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedView {
    pub view_type: String,
    pub title: String,
    pub icon: String,
    pub header: Option<String>,
    pub body: ViewBody,
    /// Header menu entries.
    pub actions: Vec<&'static str>,
}

impl RenderedView {
    pub fn items(&self) -> &[RenderedItem] {
        match &self.body {
            ViewBody::Items(items) => items,
            _ => &[],
        }
    }
}

impl fmt::Display for RenderedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.icon, self.title)?;
        if let Some(header) = &self.header {
            writeln!(f, "{header}")?;
        }
        match &self.body {
            ViewBody::Items(items) => {
                for item in items {
                    let marker = if item.current { ">" } else { "-" };
                    write!(f, "{marker} {} ({})", item.name, item.path)?;
                    if let Some(info) = &item.info {
                        write!(f, "  {info}")?;
                    }
                    writeln!(f)?;
                }
            }
            ViewBody::Text(text) => writeln!(f, "{text}")?,
            ViewBody::Transcript(turns) => {
                for turn in turns {
                    let speaker = match turn.speaker {
                        vaultlab_types::Speaker::User => "you",
                        vaultlab_types::Speaker::Remote => "lab",
                    };
                    writeln!(f, "{} {speaker}: {}", turn.at.format("%H:%M:%S"), turn.text)?;
                }
            }
            ViewBody::Empty => {}
        }
        if !self.actions.is_empty() {
            writeln!(f, "({})", self.actions.join(" | "))?;
        }
        Ok(())
    }
}

pub enum Surface {
    Text(TextMutator),
    List(ListPanel),
    Conversation(ConversationPanel),
}

impl Surface {
    pub fn as_view(&self) -> &dyn LabView {
        match self {
            Surface::Text(surface) => surface,
            Surface::List(surface) => surface,
            Surface::Conversation(surface) => surface,
        }
    }

    pub fn as_view_mut(&mut self) -> &mut dyn LabView {
        match self {
            Surface::Text(surface) => surface,
            Surface::List(surface) => surface,
            Surface::Conversation(surface) => surface,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListPanel> {
        match self {
            Surface::List(panel) => Some(panel),
            _ => None,
        }
    }

    pub fn as_conversation_mut(&mut self) -> Option<&mut ConversationPanel> {
        match self {
            Surface::Conversation(panel) => Some(panel),
            _ => None,
        }
    }
}

/// Shared reference to one live surface.
///
/// The `attached` flag is cleared when the surface's reconciliation pass is
/// torn down; responses arriving afterwards are discarded.
#[derive(Clone)]
pub struct SurfaceHandle {
    id: SurfaceId,
    operation: ActiveOperation,
    surface: Arc<Mutex<Surface>>,
    attached: Arc<AtomicBool>,
}

impl SurfaceHandle {
    pub fn new(operation: ActiveOperation, surface: Surface) -> Self {
        Self {
            id: operation.surface_id(),
            operation,
            surface: Arc::new(Mutex::new(surface)),
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &SurfaceId {
        &self.id
    }

    pub fn operation(&self) -> &ActiveOperation {
        &self.operation
    }

    pub fn mode(&self) -> OperationMode {
        self.operation.mode()
    }

    /// Whether the surface lives in a view slot.
    pub fn requires_slot(&self) -> bool {
        self.operation.mode().requires_surface()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn mark_detached(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub async fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().await
    }

    pub async fn render(&self) -> RenderedView {
        self.surface.lock().await.as_view().render()
    }
}

impl fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Builds the surface variant an operation's mode calls for.
#[derive(Clone)]
pub struct SurfaceFactory {
    editor: Arc<dyn Editor>,
}

impl SurfaceFactory {
    pub fn new(editor: Arc<dyn Editor>) -> Self {
        Self { editor }
    }

    pub fn create(&self, operation: &ActiveOperation) -> SurfaceHandle {
        let meta = SurfaceMeta::for_operation(operation);
        let surface = match operation.mode() {
            OperationMode::InsertText | OperationMode::ReplaceText => {
                Surface::Text(TextMutator::new(meta, operation.mode(), Arc::clone(&self.editor)))
            }
            OperationMode::Panel => Surface::List(ListPanel::new(meta)),
            OperationMode::Conversation => Surface::Conversation(ConversationPanel::new(meta)),
        };
        SurfaceHandle::new(operation.clone(), surface)
    }
}
