//! UI side of the bridge

use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::host::Envelope;
use super::{BridgeRequest, BridgeResponse};
use crate::config::Theme;
use crate::storage::{FileFilter, Storage};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge host is not running")]
    Closed,

    /// The host reported a failure
    #[error("{0}")]
    Host(String),

    #[error("unexpected response to {request}: {response:?}")]
    Unexpected {
        request: &'static str,
        response: BridgeResponse,
    },
}

/// Cloneable handle for sending requests to a `BridgeHost`
#[derive(Debug, Clone)]
pub struct BridgeClient {
    requests: mpsc::Sender<Envelope>,
}

impl BridgeClient {
    pub(crate) fn new(requests: mpsc::Sender<Envelope>) -> Self {
        Self { requests }
    }

    /// Send request and wait for response
    pub async fn request(&self, request: BridgeRequest) -> Result<BridgeResponse, BridgeError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .await
            .map_err(|_| BridgeError::Closed)?;
        response.await.map_err(|_| BridgeError::Closed)
    }

    /// Same as `request`, for threads outside the async runtime
    pub fn blocking_request(&self, request: BridgeRequest) -> Result<BridgeResponse, BridgeError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .blocking_send(Envelope { request, reply })
            .map_err(|_| BridgeError::Closed)?;
        response.blocking_recv().map_err(|_| BridgeError::Closed)
    }

    /// Directory completion; failures yield no candidates
    pub async fn search_directories(&self, input: &str, current_file: Option<&Path>) -> Vec<String> {
        let request = BridgeRequest::SearchDirectories {
            input: input.to_string(),
            current_file: current_file.map(|p| p.to_string_lossy().into_owned()),
        };
        match self.request(request).await {
            Ok(BridgeResponse::Directories(found)) => found,
            Ok(other) => {
                warn!(error = %unexpected("SearchDirectories", other), "directory search failed");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "directory search failed");
                Vec::new()
            }
        }
    }

    /// Ask the user a yes/no question; failures count as "no"
    pub async fn confirm(&self, message: &str) -> bool {
        match self
            .request(BridgeRequest::ShowConfirmDialog(message.to_string()))
            .await
        {
            Ok(BridgeResponse::Confirmed(answer)) => answer,
            Ok(other) => {
                warn!(error = %unexpected("ShowConfirmDialog", other), "confirmation failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "confirmation failed");
                false
            }
        }
    }

    pub async fn set_title(&self, title: &str) -> Result<(), BridgeError> {
        self.expect_ready(BridgeRequest::SetTitle(title.to_string())).await
    }

    pub async fn theme(&self) -> Result<Theme, BridgeError> {
        match self.request(BridgeRequest::GetTheme).await? {
            BridgeResponse::Theme(theme) => Ok(theme),
            other => Err(unexpected("GetTheme", other)),
        }
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), BridgeError> {
        self.expect_ready(BridgeRequest::SetTheme(theme)).await
    }

    /// Only a host built on preset dialogs accepts answers
    #[cfg(test)]
    pub async fn queue_answer(&self, answer: crate::storage::DialogAnswer) -> Result<(), BridgeError> {
        self.expect_ready(BridgeRequest::QueueDialogAnswer(answer)).await
    }

    /// Health check
    pub async fn ping(&self) -> Result<(), BridgeError> {
        match self.request(BridgeRequest::Ping).await? {
            BridgeResponse::Pong => Ok(()),
            other => Err(unexpected("Ping", other)),
        }
    }

    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.expect_ready(BridgeRequest::Shutdown).await
    }

    async fn expect_ready(&self, request: BridgeRequest) -> Result<(), BridgeError> {
        let name = request.name();
        match self.request(request).await? {
            BridgeResponse::Ready => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }

    async fn dialog(&self, request: BridgeRequest) -> Option<PathBuf> {
        let name = request.name();
        match self.request(request).await {
            Ok(BridgeResponse::Path(path)) => Some(path),
            Ok(BridgeResponse::Cancelled) => None,
            Ok(other) => {
                warn!(error = %unexpected(name, other), "dialog failed");
                None
            }
            Err(e) => {
                warn!(request = name, error = %e, "dialog failed");
                None
            }
        }
    }
}

fn unexpected(request: &'static str, response: BridgeResponse) -> BridgeError {
    match response {
        BridgeResponse::Error(message) => BridgeError::Host(message),
        response => BridgeError::Unexpected { request, response },
    }
}

/// The host always filters for `.wsb` files, so `filter` is not sent
impl Storage for BridgeClient {
    async fn open_file_dialog(&self, _filter: &FileFilter) -> Option<PathBuf> {
        self.dialog(BridgeRequest::OpenFileDialog).await
    }

    async fn save_file_dialog(&self, _filter: &FileFilter, default_name: &str) -> Option<PathBuf> {
        self.dialog(BridgeRequest::SaveFileDialog {
            default_name: default_name.to_string(),
        })
        .await
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        match self.request(BridgeRequest::ReadFile(path.to_path_buf())).await {
            Ok(BridgeResponse::Content(text)) => Ok(text),
            Ok(other) => Err(io::Error::other(unexpected("ReadFile", other))),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let request = BridgeRequest::WriteFile {
            path: path.to_path_buf(),
            content: contents.to_string(),
        };
        match self.request(request).await {
            Ok(BridgeResponse::Ready) => Ok(()),
            Ok(other) => Err(io::Error::other(unexpected("WriteFile", other))),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    async fn pick_directory(&self, hint: Option<&Path>) -> Option<PathBuf> {
        self.dialog(BridgeRequest::SelectFolder(hint.map(Path::to_path_buf)))
            .await
    }
}
