//! # Errors
//!
//! [`VoxError`] is the error surfaced by the CLI. Each variant maps to a
//! process exit code so agents driving `vox` from a shell can branch on it
//! without parsing stderr:
//!
//! | code | meaning |
//! |------|---------|
//! | 1 | any other failure (I/O, parse, transport) |
//! | 3 | a named contact or conversation does not exist |
//! | 4 | no identity yet, `vox init` has not been run |

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxError {
    #[error("Not initialized. Run 'vox init' first.")]
    NotInitialized(PathBuf),

    #[error("Contact '{0}' not found")]
    ContactNotFound(String),

    #[error("Conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The homeserver answered with a non-success status.
    #[error("Transport error: HTTP {status}: {detail}")]
    Homeserver {
        status: u16,
        errcode: Option<String>,
        detail: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoxError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VoxError::NotInitialized(_) => 4,
            VoxError::ContactNotFound(_) | VoxError::ConversationNotFound(_) => 3,
            VoxError::Transport(_) | VoxError::Homeserver { .. } | VoxError::Other(_) => 1,
        }
    }

    /// Whether the message should be prefixed with `Error:` when printed.
    ///
    /// Expected conditions (missing identity, unknown names) read better
    /// without it.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            VoxError::Transport(_) | VoxError::Homeserver { .. } | VoxError::Other(_)
        )
    }

    /// Whether the homeserver rejected the request with Matrix `errcode`.
    pub fn is_matrix_error(&self, errcode: &str) -> bool {
        matches!(self, VoxError::Homeserver { errcode: Some(code), .. } if code == errcode)
    }
}

impl From<reqwest::Error> for VoxError {
    fn from(err: reqwest::Error) -> Self {
        VoxError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VoxError>;
