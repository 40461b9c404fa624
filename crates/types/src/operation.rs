//! Operation identity and the durable per-operation configuration record.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::surface::SurfaceId;

/// Icon used when an operation does not configure one.
pub const DEFAULT_ICON: &str = "lab";

/// Stable key of a remote operation.
///
/// Derived from the trailing path segment of the URL the remote reports
/// (`http://127.0.0.1:5000/scripts/hello_world` becomes `hello_world`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id from a remote-reported URL or bare script name.
    ///
    /// Returns `None` when the trailing segment is empty.
    pub fn from_url(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        let segment = match trimmed.rfind('/') {
            Some(index) => &trimmed[index + 1..],
            None => trimmed,
        };
        if segment.is_empty() {
            return None;
        }
        Some(Self(segment.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for OperationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How the result of an operation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    /// Insert `contents` at the cursor of the active document.
    #[default]
    InsertText,
    /// Replace the current selection with `contents`.
    ReplaceText,
    /// Show items or text in a persistent list panel.
    Panel,
    /// Chat-like transcript panel.
    Conversation,
}

impl OperationMode {
    pub const ALL: [OperationMode; 4] = [
        OperationMode::InsertText,
        OperationMode::ReplaceText,
        OperationMode::Panel,
        OperationMode::Conversation,
    ];

    /// Whether the mode needs a persistent view slot.
    pub fn requires_surface(&self) -> bool {
        matches!(self, OperationMode::Panel | OperationMode::Conversation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::InsertText => "insert-text",
            OperationMode::ReplaceText => "replace-text",
            OperationMode::Panel => "panel",
            OperationMode::Conversation => "conversation",
        }
    }

    /// Human readable description, as shown in the settings surface.
    pub fn description(&self) -> &'static str {
        match self {
            OperationMode::InsertText => "insert text",
            OperationMode::ReplaceText => "replace selected text",
            OperationMode::Panel => "items or text in a panel",
            OperationMode::Conversation => "conversation in a panel",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode '{0}' (expected insert-text, replace-text, panel or conversation)")]
pub struct ParseModeError(pub String);

impl FromStr for OperationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

/// Side of the host layout a panel is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Left,
    #[default]
    Right,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Left => f.write_str("left"),
            Region::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown region '{0}' (expected left or right)")]
pub struct ParseRegionError(pub String);

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "left" => Ok(Region::Left),
            "right" => Ok(Region::Right),
            other => Err(ParseRegionError(other.to_string())),
        }
    }
}

/// User-editable configuration of one operation.
///
/// Keys this build does not know about are kept in `extra` and written back
/// untouched, so config written by another build survives a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationConfig {
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub mode: OperationMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Fire the operation whenever the focused document changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke_on_focus: Option<bool>,

    /// Preferred placement for panel surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl OperationConfig {
    pub fn new(label: impl Into<String>, mode: OperationMode) -> Self {
        Self {
            active: false,
            label: label.into(),
            mode,
            icon: None,
            invoke_on_focus: None,
            region: None,
            extra: IndexMap::new(),
        }
    }

    /// Record synthesized for an operation the user has never configured.
    ///
    /// Newly discovered operations stay inert until explicitly activated.
    pub fn discovered(id: &OperationId) -> Self {
        Self::new(id.as_str(), OperationMode::InsertText)
    }

    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn with_focus_trigger(mut self, enabled: bool) -> Self {
        self.invoke_on_focus = Some(enabled);
        self
    }

    pub fn invokes_on_focus(&self) -> bool {
        self.invoke_on_focus.unwrap_or(false)
    }

    /// Label to display, falling back to the operation id when blank.
    pub fn display_label<'a>(&'a self, id: &'a OperationId) -> &'a str {
        if self.label.trim().is_empty() { id.as_str() } else { &self.label }
    }

    pub fn icon_or_default(&self) -> &str {
        self.icon.as_deref().unwrap_or(DEFAULT_ICON)
    }

    pub fn region_or_default(&self) -> Region {
        self.region.unwrap_or_default()
    }
}

/// Operation that is both served by the remote and enabled by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOperation {
    pub id: OperationId,
    pub config: OperationConfig,
}

impl ActiveOperation {
    pub fn new(id: OperationId, config: OperationConfig) -> Self {
        Self { id, config }
    }

    pub fn surface_id(&self) -> SurfaceId {
        SurfaceId::for_operation(&self.id)
    }

    pub fn label(&self) -> &str {
        self.config.display_label(&self.id)
    }

    pub fn mode(&self) -> OperationMode {
        self.config.mode
    }
}
