//! Filesystem-backed host for running operations outside an editor.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};
use vaultlab_engine::host::memory::MemorySlots;
use vaultlab_engine::{Editor, HostError, Notifier, RenderedView, SlotHost, Vault};
use vaultlab_types::{Region, SurfaceId};

/// A notes folder on disk.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    root_display: String,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        let root_display = root.to_string_lossy().into_owned();
        Self { root, root_display }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Vault for FsVault {
    fn root(&self) -> &str {
        &self.root_display
    }

    fn contains(&self, path: &str) -> bool {
        !path.is_empty() && self.resolve(path).is_file()
    }

    fn open(&self, path: &str, split: bool) -> Result<(), HostError> {
        if !self.contains(path) {
            return Err(HostError::DocumentNotFound { path: path.to_string() });
        }
        let target = if split { "new split" } else { "recent pane" };
        println!("open {} ({target})", self.resolve(path).display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Cursor {
    selection: Option<String>,
}

/// Editor whose active document is one file in the vault.
///
/// The cursor sits at the end of the file; the selection is given up front.
#[derive(Debug)]
pub struct FileEditor {
    vault_root: PathBuf,
    document: Option<String>,
    cursor: Mutex<Cursor>,
}

impl FileEditor {
    pub fn new(vault_root: impl Into<PathBuf>, document: Option<String>, selection: Option<String>) -> Self {
        Self {
            vault_root: vault_root.into(),
            document,
            cursor: Mutex::new(Cursor { selection }),
        }
    }

    fn document_path(&self) -> Result<PathBuf, HostError> {
        let document = self.document.as_deref().ok_or(HostError::NoActiveDocument)?;
        Ok(self.vault_root.join(document))
    }
}

fn read_or_empty(path: &Path) -> Result<String, HostError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err.into()),
    }
}

impl Editor for FileEditor {
    fn active_document(&self) -> Option<String> {
        self.document.clone()
    }

    fn selection(&self) -> Option<String> {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .selection
            .clone()
    }

    fn insert_at_cursor(&self, text: &str) -> Result<(), HostError> {
        let path = self.document_path()?;
        let mut content = read_or_empty(&path)?;
        content.push_str(text);
        fs::write(&path, content)?;
        info!(path = %path.display(), "inserted text");
        Ok(())
    }

    fn replace_selection(&self, text: &str) -> Result<(), HostError> {
        let path = self.document_path()?;
        let content = read_or_empty(&path)?;
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = match cursor.selection.as_deref() {
            Some(selection) if !selection.is_empty() && content.contains(selection) => {
                content.replacen(selection, text, 1)
            }
            _ => format!("{content}{text}"),
        };
        fs::write(&path, updated)?;
        cursor.selection = Some(text.to_string());
        info!(path = %path.display(), "replaced selection");
        Ok(())
    }
}

/// Slots kept in memory; every presented view is printed.
#[derive(Debug, Default)]
pub struct TerminalSlots {
    inner: MemorySlots,
}

impl TerminalSlots {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotHost for TerminalSlots {
    fn attach(&self, slot: &SurfaceId, region: Region, title: &str) -> Result<(), HostError> {
        debug!(surface = %slot, %region, "attach");
        self.inner.attach(slot, region, title)
    }

    fn detach(&self, slot: &str) {
        self.inner.detach(slot)
    }

    fn active_slots(&self) -> Vec<String> {
        self.inner.active_slots()
    }

    fn reveal(&self, slot: &SurfaceId) -> Result<(), HostError> {
        self.inner.reveal(slot)
    }

    fn present(&self, slot: &SurfaceId, view: &RenderedView) {
        if self.inner.view(slot.as_str()).as_ref() == Some(view) {
            return;
        }
        self.inner.present(slot, view);
        if !matches!(view.body, vaultlab_engine::ViewBody::Empty) {
            print!("{view}");
        }
    }
}

#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}
