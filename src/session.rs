use crate::item::UpdateableItem;
use serde_json::{Map, Value};

/// Scratch state for one update-check cycle.
///
/// Filled by the request phase and moved into the response phase, which
/// consumes it. Never shared between cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    items: Vec<(String, UpdateableItem)>,
    /// Locales the host asked updates for
    pub locales: Vec<String>,
    /// Known translations keyed by text domain
    pub translations: Map<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item under its slug. A later item with the same slug replaces
    /// the earlier one but keeps its position.
    pub fn insert(&mut self, slug: impl Into<String>, item: UpdateableItem) {
        let slug = slug.into();
        match self.items.iter_mut().find(|(s, _)| *s == slug) {
            Some(entry) => entry.1 = item,
            None => self.items.push((slug, item)),
        }
    }

    /// Items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &UpdateableItem)> {
        self.items.iter().map(|(slug, item)| (slug.as_str(), item))
    }

    pub fn get(&self, slug: &str) -> Option<&UpdateableItem> {
        self.items
            .iter()
            .find(|(s, _)| s == slug)
            .map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Known translations for a text domain, or an empty object.
    pub fn known_translations(&self, text_domain: &str) -> Value {
        self.translations
            .get(text_domain)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}
