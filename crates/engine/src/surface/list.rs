use std::collections::HashSet;

use serde_json::Value;
use vaultlab_types::{Contents, InvocationResponse, Item};
use vaultlab_util::strip_vault_prefix;

use super::{LabView, RenderedItem, RenderedView, SurfaceMeta, ViewBody};
use crate::host::{HostError, Vault};

pub const CLEAR_ACTION: &str = "Clear list";
pub const CLOSE_ACTION: &str = "Close";

/// Result of clicking a list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Opened { path: String },
    /// The path no longer resolves; its items were dropped.
    Removed { path: String },
}

/// Panel showing an optional label above items, text or JSON.
pub struct ListPanel {
    meta: SurfaceMeta,
    label: Option<String>,
    contents: Contents,
    active_document: Option<String>,
}

impl ListPanel {
    pub fn new(meta: SurfaceMeta) -> Self {
        Self {
            meta,
            label: None,
            contents: Contents::Empty,
            active_document: None,
        }
    }

    pub fn items(&self) -> &[Item] {
        match &self.contents {
            Contents::Items(items) => items,
            _ => &[],
        }
    }

    pub fn set_active_document(&mut self, path: Option<&str>) {
        self.active_document = path.map(str::to_string);
    }

    pub fn clear(&mut self) {
        self.contents = Contents::Items(Vec::new());
    }

    /// Open the clicked item, or drop it when it no longer resolves.
    ///
    /// Paths compare vault-relative, so `/vault/a.md` and `a.md` name the
    /// same item. After a removal no two items share a path.
    pub fn click(&mut self, path: &str, split: bool, vault: &dyn Vault) -> Result<ClickOutcome, HostError> {
        let relative = strip_vault_prefix(path, vault.root());
        if vault.contains(&relative) {
            vault.open(&relative, split)?;
            return Ok(ClickOutcome::Opened { path: relative });
        }

        if let Contents::Items(items) = &mut self.contents {
            let root = vault.root();
            let mut seen = HashSet::new();
            items.retain(|item| {
                let normalized = strip_vault_prefix(&item.path, root);
                normalized != relative && seen.insert(normalized)
            });
        }
        Ok(ClickOutcome::Removed { path: relative })
    }

    fn is_current(&self, item: &Item) -> bool {
        let Some(active) = self.active_document.as_deref() else {
            return false;
        };
        item.path == active || item.path.ends_with(&format!("/{active}"))
    }
}

fn info_text(info: &Value) -> String {
    match info {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl LabView for ListPanel {
    fn view_type(&self) -> &str {
        self.meta.id.as_str()
    }

    fn display_text(&self) -> &str {
        &self.meta.title
    }

    fn icon(&self) -> &str {
        &self.meta.icon
    }

    fn load(&mut self, active_document: Option<&str>) {
        self.set_active_document(active_document);
    }

    fn render(&self) -> RenderedView {
        let body = match &self.contents {
            Contents::Items(items) => ViewBody::Items(
                items
                    .iter()
                    .map(|item| RenderedItem {
                        path: item.path.clone(),
                        name: item.display_name().to_string(),
                        info: item.info.as_ref().map(info_text),
                        current: self.is_current(item),
                    })
                    .collect(),
            ),
            Contents::Text(text) => ViewBody::Text(text.clone()),
            Contents::Json(value) => {
                ViewBody::Text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
            }
            Contents::Empty => ViewBody::Empty,
        };
        RenderedView {
            view_type: self.meta.id.to_string(),
            title: self.meta.title.clone(),
            icon: self.meta.icon.clone(),
            header: Some(self.label.clone().unwrap_or_else(|| self.meta.title.clone())),
            body,
            actions: vec![CLEAR_ACTION, CLOSE_ACTION],
        }
    }

    fn set_data(&mut self, response: &InvocationResponse) -> Result<(), HostError> {
        self.label = response.label().map(str::to_string);
        self.contents = response.panel_contents();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryVault;
    use serde_json::json;
    use vaultlab_types::{ActiveOperation, OperationConfig, OperationId, OperationMode};

    fn panel() -> ListPanel {
        let operation = ActiveOperation::new(
            OperationId::from("similar"),
            OperationConfig::new("Similar notes", OperationMode::Panel).activated(),
        );
        ListPanel::new(SurfaceMeta::for_operation(&operation))
    }

    fn with_items(paths: &[&str]) -> ListPanel {
        let mut panel = panel();
        let items: Vec<_> = paths.iter().map(|path| json!({"path": path, "name": path})).collect();
        panel
            .set_data(&InvocationResponse::from_value(json!({"contents": items})))
            .unwrap();
        panel
    }

    #[test]
    fn missing_target_is_removed() {
        let vault = MemoryVault::new("/vault", ["b.md"]);
        let mut panel = with_items(&["a.md", "b.md"]);

        let outcome = panel.click("a.md", false, &vault).unwrap();
        assert_eq!(outcome, ClickOutcome::Removed { path: "a.md".into() });
        let remaining: Vec<_> = panel.items().iter().map(|item| item.path.as_str()).collect();
        assert_eq!(remaining, ["b.md"]);
        assert!(vault.opened().is_empty());
    }

    #[test]
    fn absolute_paths_resolve_inside_vault() {
        let vault = MemoryVault::new("/vault", ["notes/a.md"]);
        let mut panel = with_items(&["/vault/notes/a.md"]);
        let outcome = panel.click("/vault/notes/a.md", true, &vault).unwrap();
        assert_eq!(outcome, ClickOutcome::Opened { path: "notes/a.md".into() });
        assert_eq!(vault.opened(), vec![("notes/a.md".to_string(), true)]);
        assert_eq!(panel.items().len(), 1);
    }

    #[test]
    fn removal_leaves_unique_paths() {
        let vault = MemoryVault::new("/vault", Vec::<String>::new());
        let mut panel = with_items(&["gone.md", "c.md", "gone.md", "c.md"]);
        panel.click("gone.md", false, &vault).unwrap();
        let remaining: Vec<_> = panel.items().iter().map(|item| item.path.as_str()).collect();
        assert_eq!(remaining, ["c.md"]);
    }

    #[test]
    fn removal_matches_absolute_and_relative_paths() {
        let vault = MemoryVault::new("/vault", ["notes/b.md"]);
        let mut panel = with_items(&["/vault/gone.md", "notes/b.md", "gone.md", "/vault/notes/b.md"]);

        let outcome = panel.click("gone.md", false, &vault).unwrap();
        assert_eq!(outcome, ClickOutcome::Removed { path: "gone.md".into() });
        let remaining: Vec<_> = panel.items().iter().map(|item| item.path.as_str()).collect();
        assert_eq!(remaining, ["notes/b.md"]);

        let mut panel = with_items(&["gone.md", "notes/b.md"]);
        panel.click("/vault/gone.md", false, &vault).unwrap();
        let remaining: Vec<_> = panel.items().iter().map(|item| item.path.as_str()).collect();
        assert_eq!(remaining, ["notes/b.md"]);
    }

    #[test]
    fn renders_label_text_json_and_current_item() {
        let mut panel = with_items(&["notes/a.md", "notes/b.md"]);
        panel.load(Some("notes/b.md"));
        let view = panel.render();
        assert_eq!(view.header.as_deref(), Some("Similar notes"));
        assert!(!view.items()[0].current);
        assert!(view.items()[1].current);
        assert_eq!(view.actions, vec![CLEAR_ACTION, CLOSE_ACTION]);

        panel
            .set_data(&InvocationResponse::from_value(json!({"contents": "no matches", "label": "Scores"})))
            .unwrap();
        let view = panel.render();
        assert_eq!(view.header.as_deref(), Some("Scores"));
        assert_eq!(view.body, ViewBody::Text("no matches".into()));

        panel
            .set_data(&InvocationResponse::from_value(json!({"contents": {"score": 1}})))
            .unwrap();
        assert_eq!(panel.render().body, ViewBody::Text("{\n  \"score\": 1\n}".into()));

        panel.clear();
        assert_eq!(panel.render().body, ViewBody::Items(Vec::new()));
    }
}
