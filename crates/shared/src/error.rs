use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure class returned by the voting backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendErrorCode {
    CodeExpired,
    AlreadyVoted,
    AlreadyVotedBlacklist,
    /// The call never produced a usable backend answer.
    RpcError,
    #[default]
    #[serde(other)]
    Unclassified,
}

impl BackendErrorCode {
    pub fn is_already_voted(self) -> bool {
        matches!(
            self,
            BackendErrorCode::AlreadyVoted | BackendErrorCode::AlreadyVotedBlacklist
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {}", message.as_deref().unwrap_or("no message"))]
pub struct BackendError {
    pub code: BackendErrorCode,
    pub message: Option<String>,
}

impl BackendError {
    pub fn new(code: BackendErrorCode, message: Option<String>) -> Self {
        Self { code, message }
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self {
            code: BackendErrorCode::RpcError,
            message: Some(message.into()),
        }
    }

    /// The backend-supplied text, or `fallback` when none was given.
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
