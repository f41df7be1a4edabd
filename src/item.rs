//! Batch items and the header fields this crate reads from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const HEADER_API_URI: &str = "GlotPress API URI";
pub const HEADER_API_PATH: &str = "GlotPress API Path";
pub const HEADER_TEXT_DOMAIN: &str = "Text Domain";
pub const HEADER_TEXT_DOMAIN_LEGACY: &str = "TextDomain";
pub const HEADER_VERSION: &str = "Version";

/// Package headers the host must parse so that batch items carry them.
pub const EXTRA_HEADERS: [&str; 2] = [HEADER_API_URI, HEADER_API_PATH];

/// Register the GlotPress headers with a host header map (name -> label).
pub fn register_extra_headers(headers: &mut HashMap<String, String>) {
    for header in EXTRA_HEADERS {
        headers.insert(header.to_string(), header.to_string());
    }
}

/// Which kind of package a batch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Plugin,
    Theme,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Plugin => "plugin",
            PackageKind::Theme => "theme",
        }
    }

    /// Slug for a batch key. Plugin keys look like `slug/entry-file.php`,
    /// theme keys are the slug already.
    pub fn slug_for<'a>(&self, key: &'a str) -> &'a str {
        match self {
            PackageKind::Plugin => key.split('/').next().unwrap_or(key),
            PackageKind::Theme => key,
        }
    }
}

/// One package from an update-check batch that declares a translation server.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateableItem {
    /// Batch identifier, e.g. `my-plugin/my-plugin.php` or `twentytwenty`
    pub key: String,
    /// Raw header record as the host sent it
    pub fields: Map<String, Value>,
}

impl UpdateableItem {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Non-empty string value of a header field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn service_uri(&self) -> Option<&str> {
        self.field(HEADER_API_URI)
    }

    pub fn service_path(&self) -> Option<&str> {
        self.field(HEADER_API_PATH)
    }

    /// Version from the batch record. Numbers are accepted as some hosts
    /// send `"Version": 2` for themes.
    pub fn version(&self) -> String {
        match self.fields.get(HEADER_VERSION) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// Both translation-service fields are present and non-empty.
    pub fn has_translation_service(&self) -> bool {
        self.service_uri().is_some() && self.service_path().is_some()
    }

    pub fn text_domain(&self, slug: &str) -> String {
        text_domain(&self.fields, slug)
    }
}

/// `Text Domain`, then the legacy `TextDomain`, then the slug.
pub fn text_domain(fields: &Map<String, Value>, slug: &str) -> String {
    [HEADER_TEXT_DOMAIN, HEADER_TEXT_DOMAIN_LEGACY]
        .iter()
        .filter_map(|name| fields.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(slug)
        .to_string()
}
