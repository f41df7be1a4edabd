//! Translation updates from custom GlotPress instances, merged into the
//! host's plugin and theme update checks.
//!
//! # Architecture
//!
//! - `collector`: request-phase extraction of items that declare a GlotPress API
//! - `session`: per-cycle state handed from the request to the response phase
//! - `client`: one update-check query per item against its GlotPress server
//! - `formatter`: shapes results into host `translations` entries
//! - `updater`: the two-phase pipeline tying the above together
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let updater = PluginsUpdater::plugins(&config)?;
//!
//! let session = updater.on_outbound_request(&url, &request_body);
//! // ... host performs its own request ...
//! let body = updater.on_inbound_response(&url, session, response_body).await;
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod item;
pub mod session;
pub mod updater;

pub use client::{EndpointOverride, LanguageUpdate, TranslationClient};
pub use collector::{
    InstalledTheme, ItemCollector, PluginCollector, StaticThemeRegistry, ThemeCollector,
    ThemeRegistry,
};
pub use config::{Config, DevOverrides};
pub use error::QueryError;
pub use formatter::{ResponseFormatter, TranslationUpdateEntry};
pub use item::{text_domain, PackageKind, UpdateableItem};
pub use session::SessionState;
pub use updater::{PluginsUpdater, ThemesUpdater, Updater};
