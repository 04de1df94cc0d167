//! Data-layer error taxonomy.
//!
//! Providers and the cache never swallow errors: a failed fetch propagates to
//! every caller and nothing is written to the cache. The aggregated provider
//! is the only component allowed to catch; it catches the primary error to
//! try fallbacks, and re-surfaces it as the cause when every fallback fails.

use thiserror::Error;

use super::provider::Capability;

#[derive(Debug, Error)]
pub enum DataError {
    /// The active provider does not implement this capability.
    #[error("capability '{capability}' not supported by provider '{provider}'")]
    NotSupported {
        capability: Capability,
        provider: &'static str,
    },

    /// Primary and all fallback tool servers failed. The primary error is
    /// preserved as the cause.
    #[error("all providers failed for capability '{capability}'")]
    ProviderUnavailable {
        capability: Capability,
        #[source]
        source: Box<DataError>,
    },

    /// Transport-level failure talking to an upstream provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream returned a payload we could not map into our data model.
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    /// A configured tool server is not running or not connected.
    #[error("tool server '{0}' is not connected")]
    ServerUnavailable(String),

    /// Upstream cancellation propagated through the data layer.
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Transport(err.to_string())
    }
}

impl DataError {
    /// Short machine-usable tag for API error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            DataError::NotSupported { .. } => "not_supported",
            DataError::ProviderUnavailable { .. } => "provider_unavailable",
            DataError::Transport(_) => "transport_error",
            DataError::Parse { .. } => "parse_error",
            DataError::ServerUnavailable(_) => "server_unavailable",
            DataError::Cancelled => "cancelled",
        }
    }
}
