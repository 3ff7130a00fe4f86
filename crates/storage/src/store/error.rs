#![forbid(unsafe_code)]

use relcon_core::ConfigError;
use relcon_core::model::LabelError;
use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[source] rusqlite::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid tag label: {0}")]
    InvalidLabel(#[from] LabelError),
    #[error("unknown entity")]
    UnknownEntity,
    #[error("unknown slot {slot}")]
    UnknownSlot { slot: String },
    #[error("unknown tag")]
    UnknownTag,
    #[error("slot {slot} is full (capacity={capacity}, current={current_count})")]
    CapacityExceeded {
        slot: String,
        capacity: u32,
        current_count: u32,
    },
    #[error("transaction conflict: {0}")]
    Conflict(#[source] rusqlite::Error),
}

/// Caller-facing classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CapacityExceeded,
    Conflict,
    StoreUnavailable,
    InvalidInput,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownEntity | Self::UnknownSlot { .. } | Self::UnknownTag => {
                ErrorKind::NotFound
            }
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Sql(err) if is_constraint_violation(err) => ErrorKind::InvalidInput,
            Self::Io(_) | Self::Sql(_) => ErrorKind::StoreUnavailable,
            Self::Config(_) | Self::InvalidInput(_) | Self::InvalidLabel(_) => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// Whether the same call may succeed later without the caller changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::CapacityExceeded | ErrorKind::StoreUnavailable
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_lock_contention(&value) {
            return Self::Conflict(value);
        }
        Self::Sql(value)
    }
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => matches!(
            code.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

// Constraint and trigger aborts (`RAISE(ABORT, ..)`) fail the same way on every retry.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("FOREIGN KEY constraint failed")
                })
        }
        _ => false,
    }
}
