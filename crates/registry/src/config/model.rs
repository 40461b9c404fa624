use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use vaultlab_types::{OperationConfig, OperationId, OperationMode};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

const SERVER_URL_KEY: &str = "server_url";
const DEBUG_KEY: &str = "debug";
const COMMANDS_KEY: &str = "commands";

/// Verbosity of request and teardown logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[default]
    Verbose,
    Off,
}

impl DebugLevel {
    pub fn is_verbose(&self) -> bool {
        matches!(self, DebugLevel::Verbose)
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugLevel::Verbose => f.write_str("verbose"),
            DebugLevel::Off => f.write_str("off"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown debug level '{0}' (expected verbose or off)")]
pub struct ParseDebugLevelError(pub String);

impl FromStr for DebugLevel {
    type Err = ParseDebugLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "verbose" => Ok(DebugLevel::Verbose),
            "off" => Ok(DebugLevel::Off),
            other => Err(ParseDebugLevelError(other.to_string())),
        }
    }
}

/// The whole persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSettings {
    pub server_url: String,

    #[serde(default)]
    pub debug: DebugLevel,

    #[serde(default)]
    pub commands: IndexMap<OperationId, OperationConfig>,

    /// Command records this build cannot read, written back verbatim.
    /// Their operations stay inactive.
    #[serde(skip)]
    pub unreadable: IndexMap<OperationId, Value>,

    /// Top-level keys written by other builds.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for LabSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            debug: DebugLevel::default(),
            commands: seed_commands(),
            unreadable: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }
}

/// Placeholder operations for a first run against the sample server.
fn seed_commands() -> IndexMap<OperationId, OperationConfig> {
    let mut commands = IndexMap::new();
    commands.insert(
        OperationId::from("hello_world"),
        OperationConfig::new("Hello world", OperationMode::InsertText).activated(),
    );
    commands.insert(
        OperationId::from("to_upper_case"),
        OperationConfig::new("Convert to upper case", OperationMode::ReplaceText).activated(),
    );
    commands.insert(
        OperationId::from("random_similarity"),
        OperationConfig::new("Random score similarity", OperationMode::Panel)
            .activated()
            .with_focus_trigger(true),
    );
    commands
}

impl LabSettings {
    /// Overlay stored data on the defaults.
    ///
    /// The merge is shallow: each stored top-level field replaces the default
    /// wholesale, so a stored `commands` map drops the seed set entirely.
    pub fn from_stored(stored: Option<Value>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        let Some(stored) = stored else {
            return Ok(settings);
        };
        let Value::Object(fields) = stored else {
            return Err(ConfigError::invalid("settings must be a JSON object"));
        };

        for (key, value) in fields {
            match key.as_str() {
                SERVER_URL_KEY => settings.server_url = serde_json::from_value(value)?,
                DEBUG_KEY => settings.debug = serde_json::from_value(value)?,
                COMMANDS_KEY => (settings.commands, settings.unreadable) = parse_commands(value)?,
                _ => {
                    settings.extra.insert(key, value);
                }
            }
        }
        Ok(settings)
    }

    pub fn to_value(&self) -> Result<Value, ConfigError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(Value::Object(commands)) = value.get_mut(COMMANDS_KEY) {
            for (id, raw) in &self.unreadable {
                if !commands.contains_key(id.as_str()) {
                    commands.insert(id.to_string(), raw.clone());
                }
            }
        }
        Ok(value)
    }

    pub fn command(&self, id: &OperationId) -> Option<&OperationConfig> {
        self.commands.get(id)
    }

    /// Stored config for `id`, inserting the discovered defaults first if the
    /// user never configured it.
    ///
    /// Editing an unreadable record replaces it.
    pub fn command_mut(&mut self, id: &OperationId) -> &mut OperationConfig {
        if self.unreadable.shift_remove(id).is_some() {
            warn!(operation = %id, "replacing unreadable command record");
        }
        self.commands
            .entry(id.clone())
            .or_insert_with(|| OperationConfig::discovered(id))
    }
}

/// Split a stored `commands` map into readable configs and raw records.
fn parse_commands(
    value: Value,
) -> Result<(IndexMap<OperationId, OperationConfig>, IndexMap<OperationId, Value>), ConfigError> {
    let Value::Object(records) = value else {
        return Err(ConfigError::invalid("commands must be a JSON object"));
    };
    let mut commands = IndexMap::new();
    let mut unreadable = IndexMap::new();
    for (id, raw) in records {
        let id = OperationId::from(id);
        match serde_json::from_value::<OperationConfig>(raw.clone()) {
            Ok(config) => {
                commands.insert(id, config);
            }
            Err(err) => {
                warn!(operation = %id, error = %err, "unreadable command record; operation stays inactive");
                unreadable.insert(id, raw);
            }
        }
    }
    Ok((commands, unreadable))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_run_uses_seed_commands() {
        let settings = LabSettings::from_stored(None).unwrap();
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
        assert_eq!(settings.debug, DebugLevel::Verbose);
        let ids: Vec<_> = settings.commands.keys().map(OperationId::as_str).collect();
        assert_eq!(ids, ["hello_world", "to_upper_case", "random_similarity"]);
        let panel = settings.command(&OperationId::from("random_similarity")).unwrap();
        assert!(panel.active && panel.invokes_on_focus());
    }

    #[test]
    fn stored_fields_replace_defaults_wholesale() {
        let stored = json!({
            "server_url": "http://lab.local:8000",
            "commands": {"echo": {"active": true, "label": "Echo", "mode": "conversation"}},
            "theme": "dark"
        });
        let settings = LabSettings::from_stored(Some(stored)).unwrap();
        assert_eq!(settings.server_url, "http://lab.local:8000");
        assert_eq!(settings.debug, DebugLevel::Verbose);
        assert_eq!(settings.commands.len(), 1);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn complete_document_round_trips_unchanged() {
        let stored = json!({
            "server_url": "http://localhost:5000",
            "debug": "off",
            "commands": {
                "hello_world": {"active": true, "label": "Hello", "mode": "insert-text", "icon": "star"},
                "retired": {"active": false, "label": "Old", "mode": "panel", "futureFlag": [1, 2]}
            },
            "layoutVersion": 3
        });
        let settings = LabSettings::from_stored(Some(stored.clone())).unwrap();
        assert_eq!(settings.to_value().unwrap(), stored);
    }

    #[test]
    fn unknown_mode_keeps_the_record_and_the_rest_loads() {
        let stored = json!({
            "server_url": "http://localhost:5000",
            "debug": "verbose",
            "commands": {
                "graph": {"active": true, "label": "Graph", "mode": "graph"},
                "echo": {"active": true, "label": "Echo", "mode": "panel"}
            }
        });
        let settings = LabSettings::from_stored(Some(stored.clone())).unwrap();
        let ids: Vec<_> = settings.commands.keys().map(OperationId::as_str).collect();
        assert_eq!(ids, ["echo"]);
        assert!(settings.unreadable.contains_key("graph"));
        assert_eq!(settings.to_value().unwrap(), stored);

        assert!(matches!(LabSettings::from_stored(Some(json!([1]))), Err(ConfigError::Invalid { .. })));
        assert!(matches!(
            LabSettings::from_stored(Some(json!({"commands": []}))),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn editing_an_unreadable_record_replaces_it() {
        let stored = json!({"commands": {"graph": {"active": true, "label": "Graph", "mode": "graph"}}});
        let mut settings = LabSettings::from_stored(Some(stored)).unwrap();
        let id = OperationId::from("graph");
        settings.command_mut(&id).active = true;
        assert!(settings.unreadable.is_empty());
        assert_eq!(settings.to_value().unwrap()["commands"]["graph"]["mode"], json!("insert-text"));
    }

    #[test]
    fn command_mut_inserts_discovered_defaults() {
        let mut settings = LabSettings::from_stored(Some(json!({"commands": {}}))).unwrap();
        let id = OperationId::from("random");
        settings.command_mut(&id).active = true;
        let config = settings.command(&id).unwrap();
        assert!(config.active);
        assert_eq!(config.label, "random");
        assert_eq!(config.mode, OperationMode::InsertText);
    }
}
