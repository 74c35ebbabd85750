//! Domain events for the catalog.
//!
//! These events are published through the injected notifier so the
//! presentation layer can show confirmations and failures without the
//! synchronization engine knowing how they are displayed.

use serde::Serialize;

use crate::domain::BookId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    BookDeleted {
        id: BookId,
    },
    BookDeleteFailed {
        id: BookId,
        message: String,
    },

    BookSaved {
        id: BookId,
        title: String,
    },

    Error {
        message: String,
    },
    Info {
        message: String,
    },
}

impl NotificationEvent {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::BookDeleteFailed { .. } | Self::Error { .. })
    }

    /// Human readable line for toast-style display.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::BookDeleted { id } => format!("Book {id} deleted successfully!"),
            Self::BookDeleteFailed { id, message } => {
                format!("Error deleting book {id}: {message}")
            }
            Self::BookSaved { id, title } => format!("Saved '{title}' (ID: {id})"),
            Self::Error { message } | Self::Info { message } => message.clone(),
        }
    }
}
