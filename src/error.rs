//! Error types.
//!
//! Configuration errors surface synchronously to whoever mutates a pattern,
//! response or journal setting. Non-matches are never errors.

/// A stub definition or setting is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Only one type of match may be specified (already have {existing}, cannot add {attempted})")]
    MultipleMatchTypes {
        existing: &'static str,
        attempted: &'static str,
    },
    #[error("One match type must be specified")]
    NoMatchType,
    #[error("URL and URL pattern may not be set simultaneously")]
    UrlAndUrlPattern,
    #[error("Body was already set, can not be set again")]
    BodyAlreadySet,
    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("Invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("Journal capacity cannot be negative (got {0})")]
    NegativeJournalCapacity(i32),
}

/// Returned by journal queries while the journal capacity is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("The request journal is disabled")]
pub struct JournalDisabledError;
