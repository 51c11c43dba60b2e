//! Typed error hierarchy for the record gateway.
//!
//! Every gateway operation returns `GatewayError`; the API layer maps it onto
//! the response envelope through [`GatewayError::status_code`]. Only three
//! codes are distinguished on the wire: 400, 404 and 500.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed required input.
    #[error("{0}")]
    BadRequest(String),

    #[error("{record_type} {id} not found")]
    NotFound { record_type: String, id: String },

    #[error("Record type {0} not found")]
    UnknownRecordType(String),

    /// Document-level validation failed on the save path.
    #[error("{0}")]
    Validation(String),

    #[error("Cannot delete {record_type} {id} because it is linked with {linked_type} {linked_name}")]
    LinkExists {
        record_type: String,
        id: String,
        linked_type: String,
        linked_name: String,
    },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(record_type: &str, id: &str) -> Self {
        Self::NotFound {
            record_type: record_type.to_string(),
            id: id.to_string(),
        }
    }

    /// HTTP-style status code carried in the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::UnknownRecordType(_)
            | Self::LinkExists { .. }
            | Self::LockPoisoned
            | Self::Json(_)
            | Self::Store(_) => 500,
        }
    }

    /// Read paths do not check existence up front; a store-level miss is
    /// reported as a generic fault rather than a 404.
    pub fn into_fault(self) -> Self {
        match self {
            Self::NotFound { .. } => Self::Store(anyhow::anyhow!(self.to_string())),
            other => other,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
