//! Collaborators provided by the editing application.
//!
//! The engine never reaches into the host directly: the active document,
//! the vault's file set, view slots and user notices all come through these
//! traits. [`memory`] holds in-process implementations.

pub mod memory;

use std::sync::Arc;

use thiserror::Error;
use vaultlab_types::{Region, SurfaceId};

use crate::surface::RenderedView;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no active document")]
    NoActiveDocument,

    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("slot error for {slot}: {message}")]
    Slot { slot: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    pub fn slot(slot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Slot {
            slot: slot.into(),
            message: message.into(),
        }
    }
}

/// Read access to the editing context plus the two text mutations.
pub trait Editor: Send + Sync {
    /// Vault-relative path of the focused document.
    fn active_document(&self) -> Option<String>;

    fn selection(&self) -> Option<String>;

    fn insert_at_cursor(&self, text: &str) -> Result<(), HostError>;

    fn replace_selection(&self, text: &str) -> Result<(), HostError>;
}

/// The document collection the editor works on.
pub trait Vault: Send + Sync {
    /// Absolute path of the vault root.
    fn root(&self) -> &str;

    /// Whether a vault-relative path resolves to a document.
    fn contains(&self, path: &str) -> bool;

    /// Open a document in the most recent pane, or in a new split.
    fn open(&self, path: &str, split: bool) -> Result<(), HostError>;
}

/// View-slot container of the host layout.
pub trait SlotHost: Send + Sync {
    fn attach(&self, slot: &SurfaceId, region: Region, title: &str) -> Result<(), HostError>;

    fn detach(&self, slot: &str);

    /// Identities of every slot currently placed, ours or not.
    fn active_slots(&self) -> Vec<String>;

    fn reveal(&self, slot: &SurfaceId) -> Result<(), HostError>;

    /// Replace what the slot shows.
    fn present(&self, slot: &SurfaceId, view: &RenderedView);
}

pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

/// Focus moved to another document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusEvent {
    pub path: String,
}

/// Bundle of host collaborators handed to the engine.
#[derive(Clone)]
pub struct Host {
    pub editor: Arc<dyn Editor>,
    pub vault: Arc<dyn Vault>,
    pub slots: Arc<dyn SlotHost>,
    pub notifier: Arc<dyn Notifier>,
}

impl Host {
    pub fn new(
        editor: Arc<dyn Editor>,
        vault: Arc<dyn Vault>,
        slots: Arc<dyn SlotHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            editor,
            vault,
            slots,
            notifier,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("vault_root", &self.vault.root()).finish_non_exhaustive()
    }
}
