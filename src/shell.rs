//! File menu, drag-and-drop and close handling for the editor window
//!
//! `FileOperations` sits between the window and the document manager. It
//! asks before unsaved changes are thrown away and keeps the one status
//! line the window shows.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::app::{DISPLAY_NAME, UNTITLED};
use crate::constants::messages::{DISCARD_CHANGES, DROP_WRONG_TYPE};
use crate::document::{DocumentManager, Outcome};
use crate::format::Format;
use crate::ipc::BridgeClient;
use crate::storage::FileFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    New,
    Open,
    Save,
    SaveAs,
}

/// Status line; success and error are never shown together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success(String),
    Error(String),
}

pub struct FileOperations<F> {
    manager: DocumentManager<F, BridgeClient>,
    status: Option<Status>,
}

impl<F: Format> FileOperations<F> {
    pub fn new(manager: DocumentManager<F, BridgeClient>) -> Self {
        Self {
            manager,
            status: None,
        }
    }

    pub fn manager(&self) -> &DocumentManager<F, BridgeClient> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut DocumentManager<F, BridgeClient> {
        &mut self.manager
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Hand the status line to the caller, leaving it empty
    pub fn take_status(&mut self) -> Option<Status> {
        self.status.take()
    }

    /// `<file name or Untitled>[*] - WSB Editor`
    pub fn window_title(&self) -> String {
        let name = self
            .manager
            .current_path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED.to_string());
        let marker = if self.manager.is_modified() { "*" } else { "" };
        format!("{name}{marker} - {DISPLAY_NAME}")
    }

    /// Push the current title to the window
    pub async fn sync_title(&self) {
        let title = self.window_title();
        if let Err(e) = self.manager.storage().set_title(&title).await {
            warn!(error = %e, "failed to update window title");
        }
    }

    pub async fn handle_menu(&mut self, action: MenuAction) {
        debug!(action = ?action, "menu action");
        match action {
            MenuAction::New => {
                if self.confirm_unsaved_changes().await {
                    self.manager.new_document();
                    self.status = None;
                }
            }
            MenuAction::Open => {
                if self.confirm_unsaved_changes().await {
                    let outcome = self.manager.open_document().await;
                    self.report(outcome);
                }
            }
            MenuAction::Save => self.save(None).await,
            MenuAction::SaveAs => {
                let outcome = self.manager.save_document_as().await;
                self.report(outcome);
            }
        }
        self.sync_title().await;
    }

    /// Save to `preferred`, falling back to the current path and then a dialog
    pub async fn save(&mut self, preferred: Option<PathBuf>) {
        let outcome = self.manager.save_document(preferred).await;
        self.report(outcome);
    }

    /// A file dropped on the window; only `.wsb` files are accepted
    pub async fn handle_drop(&mut self, path: &Path) {
        if !FileFilter::WSB.matches(path) {
            debug!(path = %path.display(), "rejected dropped file");
            self.status = Some(Status::Error(DROP_WRONG_TYPE.to_string()));
            return;
        }
        self.open_path(path).await;
    }

    /// Load a file named explicitly, whatever its extension
    pub async fn open_path(&mut self, path: &Path) {
        if !self.confirm_unsaved_changes().await {
            return;
        }
        let outcome = self.manager.load_from_path(path).await;
        self.report(outcome);
        self.sync_title().await;
    }

    /// Whether the window may close now
    pub async fn request_close(&self) -> bool {
        self.confirm_unsaved_changes().await
    }

    async fn confirm_unsaved_changes(&self) -> bool {
        if !self.manager.is_modified() {
            return true;
        }
        self.manager.storage().confirm(DISCARD_CHANGES).await
    }

    fn report(&mut self, outcome: Outcome) {
        self.status = match outcome.message() {
            Some(message) if outcome.is_success() => Some(Status::Success(message)),
            Some(message) => Some(Status::Error(message)),
            None => None,
        };
    }
}
