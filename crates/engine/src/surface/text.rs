use std::sync::Arc;

use tracing::{debug, info};
use vaultlab_types::{InvocationResponse, OperationMode};

use super::{LabView, RenderedView, SurfaceMeta, ViewBody};
use crate::host::{Editor, HostError};

/// Stateless surface that writes `contents` into the active document.
pub struct TextMutator {
    meta: SurfaceMeta,
    mode: OperationMode,
    editor: Arc<dyn Editor>,
}

impl TextMutator {
    pub fn new(meta: SurfaceMeta, mode: OperationMode, editor: Arc<dyn Editor>) -> Self {
        Self { meta, mode, editor }
    }
}

impl LabView for TextMutator {
    fn view_type(&self) -> &str {
        self.meta.id.as_str()
    }

    fn display_text(&self) -> &str {
        &self.meta.title
    }

    fn icon(&self) -> &str {
        &self.meta.icon
    }

    fn render(&self) -> RenderedView {
        RenderedView {
            view_type: self.meta.id.to_string(),
            title: self.meta.title.clone(),
            icon: self.meta.icon.clone(),
            header: None,
            body: ViewBody::Empty,
            actions: Vec::new(),
        }
    }

    fn set_data(&mut self, response: &InvocationResponse) -> Result<(), HostError> {
        let Some(contents) = response.contents_text() else {
            debug!(surface = %self.meta.id, "response has no text contents; nothing to apply");
            return Ok(());
        };
        if self.editor.active_document().is_none() {
            info!(surface = %self.meta.id, "no active document; response not applied");
            return Ok(());
        }
        match self.mode {
            OperationMode::ReplaceText => self.editor.replace_selection(contents),
            _ => self.editor.insert_at_cursor(contents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryEditor;
    use serde_json::json;
    use vaultlab_types::{ActiveOperation, OperationConfig, OperationId};

    fn mutator(mode: OperationMode, editor: Arc<MemoryEditor>) -> TextMutator {
        let operation = ActiveOperation::new(OperationId::from("op"), OperationConfig::new("Op", mode).activated());
        TextMutator::new(SurfaceMeta::for_operation(&operation), mode, editor)
    }

    #[test]
    fn inserts_or_replaces_by_mode() {
        let editor = Arc::new(MemoryEditor::with_document("notes/a.md", "hello world"));
        editor.select("world");
        let mut replace = mutator(OperationMode::ReplaceText, editor.clone());
        replace
            .set_data(&InvocationResponse::from_value(json!({"contents": "WORLD"})))
            .unwrap();
        assert_eq!(editor.text(), "hello WORLD");

        let mut insert = mutator(OperationMode::InsertText, editor.clone());
        insert.set_data(&InvocationResponse::from_value(json!({"contents": "!"}))).unwrap();
        assert_eq!(editor.text(), "hello WORLD!");
    }

    #[test]
    fn missing_document_or_contents_is_a_no_op() {
        let editor = Arc::new(MemoryEditor::new());
        let mut insert = mutator(OperationMode::InsertText, editor.clone());
        insert.set_data(&InvocationResponse::from_value(json!({"contents": "x"}))).unwrap();
        assert_eq!(editor.mutation_count(), 0);

        let editor = Arc::new(MemoryEditor::with_document("a.md", ""));
        let mut insert = mutator(OperationMode::InsertText, editor.clone());
        insert.set_data(&InvocationResponse::from_value(json!({"label": "x"}))).unwrap();
        assert_eq!(editor.mutation_count(), 0);
    }
}
