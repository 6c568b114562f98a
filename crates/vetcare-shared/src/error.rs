use thiserror::Error;

/// Malformed or out-of-range input. The message names the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} is out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },

    #[error("{field} is not valid")]
    Malformed { field: &'static str },

    #[error("past date: appointment must start in the future")]
    PastDate,

    #[error("{0}")]
    Rule(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Malformed session token")]
    Malformed,

    #[error("Invalid session token signature")]
    BadSignature,

    #[error("Session token expired")]
    Expired,

    #[error("Invalid signing key")]
    InvalidKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Stored password hash is malformed")]
    MalformedHash,
}
