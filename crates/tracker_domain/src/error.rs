use thiserror::Error;

/// Validation and lookup failures raised by the domain layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid date `{input}`, expected YYYY-MM-DD")]
    InvalidDate {
        input: String,
        #[source]
        source: Option<chrono::ParseError>,
    },
    #[error("invalid time of day `{0}`, expected e.g. `07:30 AM` or `19:30`")]
    InvalidTimeOfDay(String),
    #[error("unknown time zone `{0}`")]
    UnknownTimeZone(String),
    #[error("priority must be between 1 and 5, got {0}")]
    InvalidPriority(i64),
    #[error("unknown priority label `{0}`")]
    InvalidPriorityLabel(String),
    #[error("repeat cadence must be between 1 and 36500 days, got {0}")]
    InvalidCadence(i64),
    #[error("{kind} `{id}`: {reason}")]
    InvalidEntity {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
}

impl DomainError {
    pub(crate) fn invalid(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
