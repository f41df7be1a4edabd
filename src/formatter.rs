//! Shapes GlotPress results into host `translations` entries.

use crate::client::LanguageUpdate;
use crate::item::{PackageKind, UpdateableItem};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::{form_urlencoded, Url};

/// Query parameter every package URL carries.
pub const TEXTDOMAIN_PARAM: &str = "textdomain";

/// One entry of the host response's `translations` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUpdateEntry {
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub slug: String,
    pub language: String,
    pub version: String,
    pub updated: String,
    pub package: String,
    /// Translation packages are always eligible, whatever the host policy.
    pub autoupdate: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseFormatter {
    kind: PackageKind,
}

impl ResponseFormatter {
    pub fn new(kind: PackageKind) -> Self {
        Self { kind }
    }

    /// One entry per language descriptor, in the order the server sent them.
    pub fn format(
        &self,
        slug: &str,
        text_domain: &str,
        item: &UpdateableItem,
        updates: &[LanguageUpdate],
    ) -> Vec<TranslationUpdateEntry> {
        let version = item.version();

        updates
            .iter()
            .filter_map(|update| {
                let package = match with_text_domain(&update.package, text_domain) {
                    Ok(package) => package,
                    Err(e) => {
                        warn!(
                            "Dropping {} translation for {}: invalid package URL '{}' ({})",
                            update.language, slug, update.package, e
                        );
                        return None;
                    }
                };

                Some(TranslationUpdateEntry {
                    kind: self.kind,
                    slug: slug.to_string(),
                    language: update.language.clone(),
                    version: version.clone(),
                    updated: update.updated.clone(),
                    package,
                    autoupdate: true,
                })
            })
            .collect()
    }
}

/// Set `textdomain` on a package URL, replacing any existing value. The
/// other query segments are kept byte for byte, in order.
pub fn with_text_domain(package: &str, text_domain: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(package)?;

    let mut segments: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .next()
                .map_or(true, |(key, _)| key != TEXTDOMAIN_PARAM)
        })
        .map(str::to_string)
        .collect();

    let encoded: String = form_urlencoded::byte_serialize(text_domain.as_bytes()).collect();
    segments.push(format!("{}={}", TEXTDOMAIN_PARAM, encoded));

    url.set_query(Some(&segments.join("&")));
    Ok(url.to_string())
}
