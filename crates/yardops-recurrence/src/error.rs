use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur within the recurrence engine.
#[derive(Debug, Error)]
pub enum RecurrenceError {
    /// Malformed caller input; nothing was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// No routing record with the given ID exists in the store.
    #[error("Routing record not found: {id}")]
    RoutingNotFound { id: String },

    /// The series has no base job (or no jobs at all).
    #[error("Series not found: {series_id}")]
    SeriesNotFound { series_id: String },

    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store-side failure that is not a SQLite error (poisoned lock, bad row).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A second occurrence was about to land on an occupied series date.
    #[error("Series {series_id} already has an occurrence on {date}")]
    Consistency { series_id: String, date: NaiveDate },
}

/// Coarse classification handed to callers for user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    ConsistencyViolation,
}

impl RecurrenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecurrenceError::Validation(_) => ErrorKind::Validation,
            RecurrenceError::JobNotFound { .. }
            | RecurrenceError::RoutingNotFound { .. }
            | RecurrenceError::SeriesNotFound { .. } => ErrorKind::NotFound,
            RecurrenceError::Database(_) | RecurrenceError::Persistence(_) => {
                ErrorKind::Persistence
            }
            RecurrenceError::Consistency { .. } => ErrorKind::ConsistencyViolation,
        }
    }

    /// Short error code string surfaced next to the message.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Persistence => "PERSISTENCE_ERROR",
            ErrorKind::ConsistencyViolation => "CONSISTENCY_VIOLATION",
        }
    }
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_share_a_code() {
        let errs = [
            RecurrenceError::JobNotFound { id: "J-1".into() },
            RecurrenceError::RoutingNotFound { id: "R-1".into() },
            RecurrenceError::SeriesNotFound {
                series_id: "s".into(),
            },
        ];
        for e in errs {
            assert_eq!(e.kind(), ErrorKind::NotFound);
            assert_eq!(e.code(), "NOT_FOUND");
        }
    }

    #[test]
    fn sqlite_errors_are_persistence_failures() {
        let e = RecurrenceError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(e.code(), "PERSISTENCE_ERROR");
    }

    #[test]
    fn consistency_message_names_the_date() {
        let e = RecurrenceError::Consistency {
            series_id: "s1".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        };
        assert_eq!(e.kind(), ErrorKind::ConsistencyViolation);
        assert!(e.to_string().contains("2024-01-08"));
    }
}
