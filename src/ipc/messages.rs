//! Bridge message types for UI ↔ host communication

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Theme;
use crate::storage::DialogAnswer;

/// Requests sent from the UI side to the host
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Ask for a `.wsb` file and return its path and contents
    LoadWsb,

    /// Read a known file (drag-and-drop)
    LoadWsbFromPath(PathBuf),

    /// Write `content` to `path`, asking for a destination when `path` is absent
    SaveWsb {
        content: String,
        path: Option<PathBuf>,
    },

    /// Always ask for the destination, then write `content`
    SaveWsbAs(String),

    /// Folder picker starting near `default_path`
    SelectFolder(Option<PathBuf>),

    /// Directory completion candidates
    SearchDirectories {
        input: String,
        current_file: Option<String>,
    },

    /// Discard-changes style question; answered with `Confirmed`
    ShowConfirmDialog(String),

    SetTitle(String),

    GetTheme,

    SetTheme(Theme),

    /// Open dialog only, no read
    OpenFileDialog,

    /// Save dialog only, no write
    SaveFileDialog { default_name: String },

    ReadFile(PathBuf),

    WriteFile { path: PathBuf, content: String },

    /// Supply the answer for the next dialog the host would show
    QueueDialogAnswer(DialogAnswer),

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the host to the UI side
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BridgeResponse {
    /// File chosen and read (response to LoadWsb)
    File { path: PathBuf, content: String },

    /// File contents (response to LoadWsbFromPath / ReadFile)
    Content(String),

    /// Where a document was written
    Saved(PathBuf),

    /// A dialog result (file or folder)
    Path(PathBuf),

    /// The user dismissed a dialog
    Cancelled,

    Directories(Vec<String>),

    Confirmed(bool),

    Theme(Theme),

    /// Health check response
    Pong,

    /// Acknowledgment that request was processed
    Ready,

    /// Error occurred
    Error(String),
}

impl BridgeRequest {
    /// Variant name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            BridgeRequest::LoadWsb => "LoadWsb",
            BridgeRequest::LoadWsbFromPath(_) => "LoadWsbFromPath",
            BridgeRequest::SaveWsb { .. } => "SaveWsb",
            BridgeRequest::SaveWsbAs(_) => "SaveWsbAs",
            BridgeRequest::SelectFolder(_) => "SelectFolder",
            BridgeRequest::SearchDirectories { .. } => "SearchDirectories",
            BridgeRequest::ShowConfirmDialog(_) => "ShowConfirmDialog",
            BridgeRequest::SetTitle(_) => "SetTitle",
            BridgeRequest::GetTheme => "GetTheme",
            BridgeRequest::SetTheme(_) => "SetTheme",
            BridgeRequest::OpenFileDialog => "OpenFileDialog",
            BridgeRequest::SaveFileDialog { .. } => "SaveFileDialog",
            BridgeRequest::ReadFile(_) => "ReadFile",
            BridgeRequest::WriteFile { .. } => "WriteFile",
            BridgeRequest::QueueDialogAnswer(_) => "QueueDialogAnswer",
            BridgeRequest::Ping => "Ping",
            BridgeRequest::Shutdown => "Shutdown",
        }
    }
}
