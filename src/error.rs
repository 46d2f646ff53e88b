use serde::Serialize;

use crate::llm::LlmError;

/// Errors surfaced to the UI layer.
///
/// The `Display` text is what the user sees, so each message says what to
/// do next rather than what went wrong internally.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("This identity is already claimed. Try logging in instead.")]
    IdentityAlreadyExists,
    #[error("Identity not found. Sign up first.")]
    IdentityNotFound,
    #[error("Access denied. Incorrect password for this identity.")]
    InvalidCredentials,
    #[error("Local storage is unavailable: {0}")]
    StorageUnavailable(String),
    #[error("{0}")]
    Relay(String),
    #[error("Chat {0} no longer exists.")]
    SessionNotFound(String),
    #[error("Log in to continue.")]
    NotLoggedIn,
    #[error("Still waiting on the previous reply.")]
    Busy,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Stable code for the frontend to branch on.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::IdentityAlreadyExists => "IDENTITY_EXISTS",
            AppError::IdentityNotFound => "IDENTITY_NOT_FOUND",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::Relay(_) => "RELAY",
            AppError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            AppError::NotLoggedIn => "NOT_LOGGED_IN",
            AppError::Busy => "BUSY",
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageUnavailable(format!("corrupt record: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Relay(err.to_string())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
