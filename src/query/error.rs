//! Error taxonomy of the synchronization engine.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the catalog engine.
///
/// `Clone` so that one failed request can be stored in its cache entry and
/// handed to every caller waiting on that key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[allow(clippy::ref_option)]
fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Transport error ({status}): {message}"),
        None => format!("Transport error: {message}"),
    }
}

impl CatalogError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::NotFound(_) => Some(404),
            Self::Validation(_) => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        Self::Transport {
            status,
            message: err.to_string(),
        }
    }
}
