//! Surface identity and per-surface view-model types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::OperationId;

/// Prefix reserved for every slot and command created by vaultlab.
pub const SURFACE_PREFIX: &str = "vaultlab_";

/// Slot identity of the surface bound to an operation.
///
/// A pure function of the operation id, so the same operation maps to the
/// same slot across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn for_operation(id: &OperationId) -> Self {
        Self(format!("{SURFACE_PREFIX}{id}"))
    }

    /// Whether a host slot identity belongs to vaultlab.
    pub fn has_reserved_prefix(slot: &str) -> bool {
        slot.starts_with(SURFACE_PREFIX)
    }

    pub fn operation_id(&self) -> OperationId {
        OperationId::new(self.0.strip_prefix(SURFACE_PREFIX).unwrap_or(&self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for SurfaceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// One entry of a list panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub path: String,

    #[serde(default, alias = "basename")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

impl Item {
    /// Name to show, falling back to the last path segment.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Remote,
}

/// One appended line of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn remote(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Remote,
            text: text.into(),
            at: Utc::now(),
        }
    }
}
