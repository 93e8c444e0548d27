//! Error types shared by the session controller, dispatcher and agents.

use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;
use tower_lsp::jsonrpc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The peer sent no workspace folder list at all.
    #[error("initialize request carries no workspace folders")]
    MissingWorkspaceFolders,

    #[error("expected exactly one workspace folder, got {0}")]
    WorkspaceFolderCount(usize),

    #[error("workspace folder URI is not a local file URI: {0}")]
    WorkspaceUri(String),

    #[error("cannot stat workspace root {path:?}: {source}")]
    WorkspaceRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session is already initialized")]
    AlreadyInitialized,

    #[error("session is not initialized")]
    NotInitialized,

    #[error("failed to start {agent} agent on {path:?}: {message}")]
    Agent {
        agent: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("document URI is not a local file URI: {0}")]
    InvalidDocumentUri(String),

    #[error("failed to read document {path:?}: {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} is out of range for a document of {len} lines")]
    LineOutOfRange { line: usize, len: usize },

    #[error("cannot express {0:?} as a file URI")]
    TargetPath(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error aborts the initialize handshake.
    pub fn is_fatal_initialization(&self) -> bool {
        matches!(
            self,
            Error::MissingWorkspaceFolders
                | Error::WorkspaceFolderCount(_)
                | Error::WorkspaceUri(_)
                | Error::WorkspaceRoot { .. }
                | Error::AlreadyInitialized
                | Error::Agent { .. }
        )
    }

    /// Convert to the JSON-RPC error reported back to the peer.
    ///
    /// Handshake failures carry `InitializeError { retry: false }` as their data.
    pub fn to_rpc_error(&self) -> jsonrpc::Error {
        let code = match self {
            Error::AlreadyInitialized => jsonrpc::ErrorCode::InvalidRequest,
            Error::NotInitialized => jsonrpc::ErrorCode::ServerError(-32002),
            Error::MissingWorkspaceFolders
            | Error::WorkspaceFolderCount(_)
            | Error::WorkspaceUri(_)
            | Error::WorkspaceRoot { .. }
            | Error::InvalidDocumentUri(_)
            | Error::LineOutOfRange { .. } => jsonrpc::ErrorCode::InvalidParams,
            Error::Agent { .. }
            | Error::ReadDocument { .. }
            | Error::TargetPath(_)
            | Error::Config(_) => jsonrpc::ErrorCode::InternalError,
        };
        jsonrpc::Error {
            code,
            message: self.to_string().into(),
            data: self
                .is_fatal_initialization()
                .then(|| json!({ "retry": false })),
        }
    }
}

impl From<Error> for jsonrpc::Error {
    fn from(err: Error) -> Self {
        err.to_rpc_error()
    }
}
