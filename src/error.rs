use thiserror::Error;

/// Why a translation server produced no updates for an item.
///
/// None of these reach the host: the updater logs them and moves on to the
/// next item.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid GlotPress API URI: '{0}'")]
    InvalidServiceUri(String),

    #[error("Refusing to contact local destination {0} (enable dev overrides to allow)")]
    LocalDestination(String),

    #[error("Update-check endpoint rejected by override for '{0}'")]
    EndpointRejected(String),

    #[error("Failed to send update-check request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GlotPress API error from {url} ({status}): {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("GlotPress API at {url} returned no translations")]
    EmptyResponse { url: String },

    #[error("Failed to parse GlotPress API response from {url}: {message}; body: {body}")]
    MalformedResponse {
        url: String,
        message: String,
        body: String,
    },
}

impl QueryError {
    /// True when the failure happened before any network call was made.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidServiceUri(_)
                | QueryError::LocalDestination(_)
                | QueryError::EndpointRejected(_)
        )
    }
}
