use super::ToolError;
use thiserror::Error;

const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_NO_SUCH_PATH: i32 = 10;
const FX_FILE_ALREADY_EXISTS: i32 = 11;

/// Failure of a single remote filesystem call, keyed by the path it touched.
#[derive(Debug, Error)]
pub enum RemoteFsError {
    #[error("remote path not found: {path}")]
    NotFound { path: String },
    #[error("remote path already exists: {path}")]
    AlreadyExists { path: String },
    #[error("permission denied on remote path: {path}")]
    PermissionDenied { path: String },
    #[error("remote path is not a directory: {path}")]
    NotADirectory { path: String },
    #[error("remote {op} failed for {path}: {message}")]
    Failed {
        op: &'static str,
        path: String,
        message: String,
    },
    #[error("failed to read local file {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteFsError {
    pub fn failed(op: &'static str, path: &str, message: impl Into<String>) -> Self {
        RemoteFsError::Failed {
            op,
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Classifies an SFTP status code returned by libssh2.
    pub fn from_ssh(op: &'static str, path: &str, err: &ssh2::Error) -> Self {
        let path = path.to_string();
        match err.code() {
            ssh2::ErrorCode::SFTP(FX_NO_SUCH_FILE) | ssh2::ErrorCode::SFTP(FX_NO_SUCH_PATH) => {
                RemoteFsError::NotFound { path }
            }
            ssh2::ErrorCode::SFTP(FX_PERMISSION_DENIED) => RemoteFsError::PermissionDenied { path },
            ssh2::ErrorCode::SFTP(FX_FILE_ALREADY_EXISTS) => RemoteFsError::AlreadyExists { path },
            _ => RemoteFsError::Failed {
                op,
                path,
                message: err.message().to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteFsError::NotFound { .. })
    }
}

impl From<RemoteFsError> for ToolError {
    fn from(err: RemoteFsError) -> Self {
        let message = err.to_string();
        match err {
            RemoteFsError::NotFound { .. } => ToolError::not_found(message),
            RemoteFsError::PermissionDenied { .. } => ToolError::denied(message),
            RemoteFsError::AlreadyExists { .. } | RemoteFsError::NotADirectory { .. } => {
                ToolError::conflict(message)
            }
            RemoteFsError::Failed { .. } | RemoteFsError::LocalIo { .. } => {
                ToolError::internal(message)
            }
        }
    }
}
