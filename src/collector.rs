//! Request-phase collection of items that declare a GlotPress server.
//!
//! The host body is loosely typed: list fields may arrive as JSON-encoded
//! strings (form bodies) or as inline objects, and `locale`/`translations`
//! may sit at the top level or inside the item-list field. Both shapes are
//! accepted. Malformed input never fails the request; it only shrinks the
//! collected set.

use crate::item::{PackageKind, UpdateableItem, HEADER_API_PATH, HEADER_API_URI};
use crate::session::SessionState;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Strategy for one kind of update-check batch.
pub trait ItemCollector: Send + Sync {
    fn kind(&self) -> PackageKind;

    /// Host update-check endpoint this collector listens to.
    fn endpoint(&self) -> &str;

    /// Build the session for a matching request body.
    fn collect(&self, body: &Value) -> SessionState;

    /// Whether a request/response URL belongs to this collector's endpoint.
    fn matches(&self, url: &str) -> bool {
        !url.is_empty() && url::Url::parse(url).is_ok() && url.contains(self.endpoint())
    }

    fn slug_for<'a>(&self, key: &'a str) -> &'a str {
        self.kind().slug_for(key)
    }
}

/// Collects plugins whose headers already carry the GlotPress fields.
#[derive(Debug, Clone)]
pub struct PluginCollector {
    endpoint: String,
}

impl PluginCollector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl ItemCollector for PluginCollector {
    fn kind(&self) -> PackageKind {
        PackageKind::Plugin
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn collect(&self, body: &Value) -> SessionState {
        let mut state = SessionState::new();
        let Some(decoded) = body.get("plugins").map(decode_field) else {
            return state;
        };
        let Some(plugins) = item_map(&decoded, "plugins") else {
            return state;
        };

        read_locale_and_translations(&mut state, body, &decoded);

        for (key, info) in plugins {
            let Some(fields) = info.as_object() else {
                continue;
            };
            let item = UpdateableItem::new(key.as_str(), fields.clone());
            if !item.has_translation_service() {
                continue;
            }
            state.insert(self.slug_for(key), item);
        }

        debug!(
            "Collected {} of {} plugins with a GlotPress API",
            state.len(),
            plugins.len()
        );
        state
    }
}

/// A theme as reported by the host's theme registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledTheme {
    pub stylesheet: String,
    pub headers: HashMap<String, String>,
}

impl InstalledTheme {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Host capability listing installed themes with their parsed headers.
pub trait ThemeRegistry: Send + Sync {
    fn installed_themes(&self) -> Vec<InstalledTheme>;
}

/// Fixed theme list, for tests and the command-line runner.
#[derive(Debug, Clone, Default)]
pub struct StaticThemeRegistry {
    themes: Vec<InstalledTheme>,
}

impl StaticThemeRegistry {
    pub fn new(themes: Vec<InstalledTheme>) -> Self {
        Self { themes }
    }

    /// Build from `{stylesheet: {header: value}}`. Non-string header values
    /// are ignored.
    pub fn from_value(value: &Value) -> Self {
        let themes = value
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(stylesheet, headers)| InstalledTheme {
                        stylesheet: stylesheet.clone(),
                        headers: headers
                            .as_object()
                            .map(|h| {
                                h.iter()
                                    .filter_map(|(k, v)| {
                                        v.as_str().map(|s| (k.clone(), s.to_string()))
                                    })
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { themes }
    }
}

impl ThemeRegistry for StaticThemeRegistry {
    fn installed_themes(&self) -> Vec<InstalledTheme> {
        self.themes.clone()
    }
}

/// Collects themes. The batch doesn't carry GlotPress headers for themes,
/// so they come from the registry and are merged into each batch record.
#[derive(Clone)]
pub struct ThemeCollector {
    endpoint: String,
    registry: Arc<dyn ThemeRegistry>,
}

impl std::fmt::Debug for ThemeCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeCollector")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ThemeCollector {
    pub fn new(endpoint: impl Into<String>, registry: Arc<dyn ThemeRegistry>) -> Self {
        Self {
            endpoint: endpoint.into(),
            registry,
        }
    }

    /// Installed themes declaring a GlotPress URI, keyed by stylesheet,
    /// with their (uri, path) pair.
    fn marked_themes(&self) -> HashMap<String, (String, String)> {
        self.registry
            .installed_themes()
            .into_iter()
            .filter_map(|theme| {
                let uri = theme.header(HEADER_API_URI)?.to_string();
                let path = theme.header(HEADER_API_PATH).unwrap_or_default().to_string();
                Some((theme.stylesheet, (uri, path)))
            })
            .collect()
    }
}

impl ItemCollector for ThemeCollector {
    fn kind(&self) -> PackageKind {
        PackageKind::Theme
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn collect(&self, body: &Value) -> SessionState {
        let mut state = SessionState::new();
        let Some(decoded) = body.get("themes").map(decode_field) else {
            return state;
        };
        let Some(themes) = item_map(&decoded, "themes") else {
            return state;
        };

        read_locale_and_translations(&mut state, body, &decoded);

        let marked = self.marked_themes();
        if marked.is_empty() {
            debug!("No installed theme declares a GlotPress API");
            return state;
        }

        for (key, info) in themes {
            let Some(fields) = info.as_object() else {
                continue;
            };
            let Some((uri, path)) = marked.get(key) else {
                continue;
            };

            let mut fields = fields.clone();
            fields.insert(HEADER_API_URI.to_string(), Value::String(uri.clone()));
            fields.insert(HEADER_API_PATH.to_string(), Value::String(path.clone()));

            let item = UpdateableItem::new(key.as_str(), fields);
            if !item.has_translation_service() {
                continue;
            }
            state.insert(self.slug_for(key), item);
        }

        debug!(
            "Collected {} of {} themes with a GlotPress API",
            state.len(),
            themes.len()
        );
        state
    }
}

/// Decode a body field that may be a JSON-encoded string. A string that is
/// not JSON is kept as a plain string.
fn decode_field(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

/// The `{key: record}` map: nested under `field` when present, else the
/// decoded value itself.
fn item_map<'a>(decoded: &'a Value, field: &str) -> Option<&'a Map<String, Value>> {
    let map = match decoded.get(field) {
        Some(nested) => nested.as_object()?,
        None => decoded.as_object()?,
    };
    (!map.is_empty()).then_some(map)
}

/// Top-level field first, then the one nested in the item-list value.
fn lookup(body: &Value, decoded: &Value, field: &str) -> Option<Value> {
    body.get(field)
        .or_else(|| decoded.get(field))
        .map(decode_field)
}

fn read_locale_and_translations(state: &mut SessionState, body: &Value, decoded: &Value) {
    state.locales = match lookup(body, decoded, "locale") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    };

    state.translations = match lookup(body, decoded, "translations") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
}
