//! Wire types exchanged with a remote operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::surface::Item;

/// Editing context posted to a remote operation.
///
/// Built fresh for every invocation and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Absolute path of the vault root.
    pub vault_path: String,

    /// Vault-relative path of the active document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_path: Option<String>,

    /// Selected text, or the submitted line for conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Free-form auxiliary data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RequestContext {
    pub fn new(vault_path: impl Into<String>) -> Self {
        Self {
            vault_path: vault_path.into(),
            ..Default::default()
        }
    }

    pub fn with_note_path(mut self, note_path: Option<String>) -> Self {
        self.note_path = note_path.filter(|path| !path.is_empty());
        self
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text.filter(|text| !text.is_empty());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Shape of the `contents` field of a response, as a panel consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Contents {
    Items(Vec<Item>),
    Text(String),
    Json(Value),
    Empty,
}

/// Parsed JSON body returned by a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    raw: Value,
}

impl InvocationResponse {
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The `contents` field, ignoring an explicit null.
    pub fn contents(&self) -> Option<&Value> {
        self.raw.get("contents").filter(|value| !value.is_null())
    }

    pub fn contents_text(&self) -> Option<&str> {
        self.contents().and_then(Value::as_str)
    }

    pub fn label(&self) -> Option<&str> {
        self.raw.get("label").and_then(Value::as_str)
    }

    /// Classify `contents` for panel rendering.
    ///
    /// Array elements that are not items are dropped.
    pub fn panel_contents(&self) -> Contents {
        match self.contents() {
            None => Contents::Empty,
            Some(Value::String(text)) => Contents::Text(text.clone()),
            Some(Value::Array(values)) => Contents::Items(
                values
                    .iter()
                    .filter_map(|value| serde_json::from_value::<Item>(value.clone()).ok())
                    .collect(),
            ),
            Some(other) => Contents::Json(other.clone()),
        }
    }

    /// Whether the remote flagged the call as failed.
    pub fn has_errors(&self) -> bool {
        self.raw.get("errors").is_some_and(is_truthy)
    }

    /// Message describing a failed call.
    pub fn error_message(&self) -> String {
        if let Some(message) = self.raw.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        match self.raw.get("errors") {
            Some(Value::Array(errors)) => errors
                .iter()
                .map(|error| error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            Some(Value::String(error)) => error.clone(),
            _ => "remote operation failed".to_string(),
        }
    }
}

/// Loose truthiness used by remote scripts for the `errors` flag.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
