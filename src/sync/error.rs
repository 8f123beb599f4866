use thiserror::Error;

use crate::sync::domain::order_key::SectionKey;
use crate::sync::types::{RecordId, RecordKind};

/// Errors raised while reconciling records into a sectioned list.
///
/// Every variant is raised before the store is touched, so a failed
/// reconciliation never leaves a partially applied edit behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The caller's section bookkeeping is out of date.
    #[error("record {id} not found in section {section}")]
    StaleSection { id: RecordId, section: SectionKey },

    #[error("record {id} not found")]
    UnknownRecord { id: RecordId },

    #[error("record {id} already exists")]
    DuplicateRecord { id: RecordId },

    #[error("record {id} is a {found} record, list holds {expected}")]
    KindMismatch {
        id: RecordId,
        expected: RecordKind,
        found: RecordKind,
    },

    #[error("data service: {0}")]
    Service(#[from] ServiceError),
}

impl SyncError {
    /// Title and body of the alert shown to the user.
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            SyncError::Service(err) => err.user_message(),
            other => (
                "Unable to Reload List",
                format!("The list could not be updated and was left unchanged.\n\n{other}"),
            ),
        }
    }
}

/// Failures reported by a data service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unable to fetch data: {0}")]
    Fetch(String),

    #[error("unable to save {id}: {reason}")]
    Write { id: RecordId, reason: String },

    #[error("unable to delete {id}: {reason}")]
    Delete { id: RecordId, reason: String },

    #[error("data service is not running")]
    Disconnected,
}

const CONNECTION_HINT: &str =
    "Please ensure that there is an internet connection or try restarting the app.";

impl ServiceError {
    pub fn user_message(&self) -> (&'static str, String) {
        let title = match self {
            ServiceError::Fetch(_) | ServiceError::Disconnected => "Unable to Fetch Data",
            ServiceError::Write { .. } => "Unable to Save Record",
            ServiceError::Delete { .. } => "Unable to Delete Record",
        };
        (title, format!("{CONNECTION_HINT}\n\n{self}"))
    }
}

/// Why a field could not be used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefect {
    Absent,
    Unparseable,
}

/// A required ordering field was absent or unparseable.
///
/// Never propagated: derivation substitutes a sentinel and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} record {id}: field `{field}` is {defect:?}")]
pub struct MissingFieldError {
    pub kind: RecordKind,
    pub id: RecordId,
    pub field: &'static str,
    pub defect: FieldDefect,
}
