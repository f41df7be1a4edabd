//! Two-phase update-check enrichment.
//!
//! `on_outbound_request` runs when the host sends its update-check batch and
//! returns the cycle's [`SessionState`]. `on_inbound_response` receives that
//! state together with the host's response and appends translation entries.
//! The updater itself keeps no per-cycle state, so one instance can serve
//! any number of cycles.

use crate::client::TranslationClient;
use crate::collector::{ItemCollector, PluginCollector, ThemeCollector, ThemeRegistry};
use crate::config::Config;
use crate::formatter::{ResponseFormatter, TranslationUpdateEntry};
use crate::session::SessionState;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type PluginsUpdater = Updater<PluginCollector>;
pub type ThemesUpdater = Updater<ThemeCollector>;

#[derive(Debug, Clone)]
pub struct Updater<C: ItemCollector> {
    collector: C,
    client: TranslationClient,
    formatter: ResponseFormatter,
}

impl PluginsUpdater {
    pub fn plugins(config: &Config) -> Result<Self> {
        Ok(Self::new(
            PluginCollector::new(config.plugins_api_url.clone()),
            TranslationClient::new(config)?,
        ))
    }
}

impl ThemesUpdater {
    pub fn themes(config: &Config, registry: Arc<dyn ThemeRegistry>) -> Result<Self> {
        Ok(Self::new(
            ThemeCollector::new(config.themes_api_url.clone(), registry),
            TranslationClient::new(config)?,
        ))
    }
}

impl<C: ItemCollector> Updater<C> {
    pub fn new(collector: C, client: TranslationClient) -> Self {
        let formatter = ResponseFormatter::new(collector.kind());
        Self {
            collector,
            client,
            formatter,
        }
    }

    /// Request phase. The request itself is never modified; a non-matching
    /// URL or malformed body yields an empty session.
    pub fn on_outbound_request(&self, url: &str, body: &Value) -> SessionState {
        if !self.collector.matches(url) {
            return SessionState::new();
        }

        let session = self.collector.collect(body);
        debug!(
            "Collected {} {}(s) for translation checks, locales {:?}",
            session.len(),
            self.collector.kind().as_str(),
            session.locales
        );
        session
    }

    /// Response phase. Consumes the session and returns the response body
    /// with translation entries appended. Host fields are never touched.
    pub async fn on_inbound_response(
        &self,
        url: &str,
        session: SessionState,
        mut body: Value,
    ) -> Value {
        if !self.collector.matches(url) || session.is_empty() || !accepts_entries(&body) {
            return body;
        }

        let entries = self.enrich(&session).await;
        append_entries(&mut body, &entries);
        body
    }

    /// Response phase on the raw body. When nothing is appended the original
    /// text is returned as is.
    pub async fn on_inbound_response_text(
        &self,
        url: &str,
        session: SessionState,
        body: &str,
    ) -> String {
        if !self.collector.matches(url) || session.is_empty() {
            return body.to_string();
        }

        let mut value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Leaving undecodable update-check response untouched: {}", e);
                return body.to_string();
            }
        };
        if !accepts_entries(&value) {
            return body.to_string();
        }

        let entries = self.enrich(&session).await;
        if entries.is_empty() {
            return body.to_string();
        }

        append_entries(&mut value, &entries);
        value.to_string()
    }

    /// Query every collected item in order and format the results. Items
    /// that fail are skipped.
    pub async fn enrich(&self, session: &SessionState) -> Vec<TranslationUpdateEntry> {
        let kind = self.collector.kind().as_str();
        info!("Checking {} {}(s) for translation updates", session.len(), kind);

        let mut entries = Vec::new();
        for (slug, item) in session.items() {
            let (Some(uri), Some(path)) = (item.service_uri(), item.service_path()) else {
                continue;
            };

            let text_domain = item.text_domain(slug);
            let known = session.known_translations(&text_domain);

            let Some(updates) = self
                .client
                .check_for_updates(uri, path, &session.locales, &known)
                .await
            else {
                continue;
            };

            let formatted = self.formatter.format(slug, &text_domain, item, &updates);
            debug!("{} {}: {} translation update(s)", kind, slug, formatted.len());
            entries.extend(formatted);
        }

        info!("Found {} translation update(s) for {}s", entries.len(), kind);
        entries
    }
}

/// The body is an object whose `translations` field is absent or a list.
fn accepts_entries(body: &Value) -> bool {
    match body.as_object() {
        Some(map) => match map.get("translations") {
            None | Some(Value::Array(_)) => true,
            Some(other) => {
                warn!(
                    "Update-check response has a non-list 'translations' field ({}), leaving it untouched",
                    json_kind(other)
                );
                false
            }
        },
        None => {
            warn!(
                "Update-check response is not an object ({}), leaving it untouched",
                json_kind(body)
            );
            false
        }
    }
}

fn append_entries(body: &mut Value, entries: &[TranslationUpdateEntry]) {
    if entries.is_empty() {
        return;
    }
    let Some(map) = body.as_object_mut() else {
        return;
    };

    let list = map
        .entry("translations")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = list {
        list.extend(
            entries
                .iter()
                .filter_map(|entry| serde_json::to_value(entry).ok()),
        );
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
