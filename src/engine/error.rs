//! Engine error taxonomy. Stages never catch; errors flow up through the
//! facade and terminate the request.

use thiserror::Error;

use crate::data::DataError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// MarketInputs carried NaN/Inf or violated a structural invariant.
    #[error("invalid market inputs: {0}")]
    InvalidInputs(String),

    /// Lookup by name failed; the message lists valid alternatives.
    #[error("unknown {kind} '{name}'. Available: {available:?}")]
    UnknownName {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    /// Data-layer failure while collecting inputs.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl EngineError {
    pub fn unknown_name(kind: &'static str, name: &str, available: Vec<String>) -> Self {
        EngineError::UnknownName {
            kind,
            name: name.to_string(),
            available,
        }
    }

    /// Short machine-usable tag for API error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            EngineError::InvalidInputs(_) => "invalid_inputs",
            EngineError::UnknownName { .. } => "unknown_name",
            EngineError::Data(e) => e.tag(),
        }
    }
}
