use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    InvalidTransition(String),
    AlreadyClaimed(String),
    Conflict(String),
    Persistence(String),
}

impl AppError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_transition<M: Into<String>>(message: M) -> Self {
        Self::InvalidTransition(message.into())
    }

    pub fn already_claimed<M: Into<String>>(message: M) -> Self {
        Self::AlreadyClaimed(message.into())
    }

    pub fn conflict<M: Into<String>>(message: M) -> Self {
        Self::Conflict(message.into())
    }

    pub fn persistence<M: Into<String>>(message: M) -> Self {
        Self::Persistence(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::AlreadyClaimed(_) => "already_claimed",
            Self::Conflict(_) => "conflict",
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message) => message,
            Self::NotFound(message) => message,
            Self::InvalidTransition(message) => message,
            Self::AlreadyClaimed(message) => message,
            Self::Conflict(message) => message,
            Self::Persistence(message) => message,
        }
    }

    /// Only persistence failures are worth retrying; every other variant
    /// reports a decision that will not change on a replay of the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}
