// Error types for authentication

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication check failed: {0}")]
    CheckFailed(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Empty token")]
    EmptyToken,

    #[error("Token storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
