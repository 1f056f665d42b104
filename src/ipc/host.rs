//! Privileged side of the bridge
//!
//! Owns everything that touches the machine: file dialogs, disk access,
//! the directory resolver and the preference file. Requests are served one
//! at a time in arrival order.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{BridgeRequest, BridgeResponse};
use crate::config::PreferenceStore;
use crate::constants::messages::DISCARD_DETAIL;
use crate::constants::wsb::DEFAULT_FILE_NAME;
use crate::resolver::{HostFilesystem, PathResolver};
use crate::storage::{Dialogs, DiskStorage, FileFilter, Storage};

/// A request paired with the channel its answer goes back on
#[derive(Debug)]
pub(crate) struct Envelope {
    pub request: BridgeRequest,
    pub reply: oneshot::Sender<BridgeResponse>,
}

pub struct BridgeHost<D> {
    storage: DiskStorage<D>,
    resolver: PathResolver<HostFilesystem>,
    preferences: PreferenceStore,
    title: String,
    requests: mpsc::Receiver<Envelope>,
}

impl<D: Dialogs> BridgeHost<D> {
    pub(crate) fn new(
        storage: DiskStorage<D>,
        resolver: PathResolver<HostFilesystem>,
        preferences: PreferenceStore,
        requests: mpsc::Receiver<Envelope>,
    ) -> Self {
        Self {
            storage,
            resolver,
            preferences,
            title: String::new(),
            requests,
        }
    }

    /// Last title set by the UI side
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Serve requests until `Shutdown` arrives or every client is dropped
    pub async fn run(mut self) -> Self {
        info!("bridge host started");
        while let Some(Envelope { request, reply }) = self.requests.recv().await {
            let name = request.name();
            let shutdown = matches!(request, BridgeRequest::Shutdown);
            debug!(request = name, "handling bridge request");

            let response = self.handle(request).await;
            if reply.send(response).is_err() {
                debug!(request = name, "requester went away before the response");
            }
            if shutdown {
                self.stop();
                break;
            }
        }
        info!("bridge host stopped");
        self
    }

    /// Refuse new requests and drop the queued ones so their senders see `Closed`
    fn stop(&mut self) {
        self.requests.close();
        let mut dropped = 0usize;
        while let Ok(Envelope { request, .. }) = self.requests.try_recv() {
            debug!(request = request.name(), "dropping request queued after shutdown");
            dropped += 1;
        }
        if dropped > 0 {
            info!(dropped, "discarded requests queued behind shutdown");
        }
    }

    async fn handle(&mut self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::LoadWsb => {
                let Some(path) = self.storage.open_file_dialog(&FileFilter::WSB).await else {
                    return BridgeResponse::Cancelled;
                };
                match self.storage.read_file(&path).await {
                    Ok(content) => BridgeResponse::File { path, content },
                    Err(e) => failure(format!("Failed to load {}: {e}", path.display())),
                }
            }
            BridgeRequest::LoadWsbFromPath(path) | BridgeRequest::ReadFile(path) => {
                match self.storage.read_file(&path).await {
                    Ok(content) => BridgeResponse::Content(content),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read file");
                        failure(e.to_string())
                    }
                }
            }
            BridgeRequest::SaveWsb { content, path } => {
                let target = match path {
                    Some(path) => path,
                    None => match self.save_dialog(DEFAULT_FILE_NAME).await {
                        Some(path) => path,
                        None => return BridgeResponse::Cancelled,
                    },
                };
                self.write(target, &content).await
            }
            BridgeRequest::SaveWsbAs(content) => match self.save_dialog(DEFAULT_FILE_NAME).await {
                Some(target) => self.write(target, &content).await,
                None => BridgeResponse::Cancelled,
            },
            BridgeRequest::SelectFolder(hint) => {
                dialog_result(self.storage.pick_directory(hint.as_deref()).await)
            }
            BridgeRequest::SearchDirectories {
                input,
                current_file,
            } => BridgeResponse::Directories(self.search(input, current_file).await),
            BridgeRequest::ShowConfirmDialog(message) => {
                BridgeResponse::Confirmed(self.storage.dialogs().confirm(&message, DISCARD_DETAIL))
            }
            BridgeRequest::SetTitle(title) => {
                info!(title = %title, "window title changed");
                self.title = title;
                BridgeResponse::Ready
            }
            BridgeRequest::GetTheme => BridgeResponse::Theme(self.preferences.theme()),
            BridgeRequest::SetTheme(theme) => match self.preferences.set_theme(theme) {
                Ok(()) => {
                    info!(theme = %theme, "theme changed");
                    BridgeResponse::Ready
                }
                Err(e) => failure(format!("{e:#}")),
            },
            BridgeRequest::OpenFileDialog => {
                dialog_result(self.storage.open_file_dialog(&FileFilter::WSB).await)
            }
            BridgeRequest::SaveFileDialog { default_name } => {
                dialog_result(self.save_dialog(&default_name).await)
            }
            BridgeRequest::WriteFile { path, content } => match self.write(path, &content).await {
                BridgeResponse::Saved(_) => BridgeResponse::Ready,
                other => other,
            },
            BridgeRequest::QueueDialogAnswer(answer) => {
                if self.storage.dialogs().queue_answer(answer) {
                    BridgeResponse::Ready
                } else {
                    failure("this host shows its own dialogs".to_string())
                }
            }
            BridgeRequest::Ping => BridgeResponse::Pong,
            BridgeRequest::Shutdown => {
                info!("shutdown requested");
                BridgeResponse::Ready
            }
        }
    }

    async fn save_dialog(&self, default_name: &str) -> Option<PathBuf> {
        self.storage
            .save_file_dialog(&FileFilter::WSB, default_name)
            .await
    }

    async fn write(&self, target: PathBuf, content: &str) -> BridgeResponse {
        match self.storage.write_file(&target, content).await {
            Ok(()) => BridgeResponse::Saved(target),
            Err(e) => {
                warn!(path = %target.display(), error = %e, "failed to write file");
                failure(e.to_string())
            }
        }
    }

    /// The resolver blocks on the filesystem, so it runs off the host task
    async fn search(&self, input: String, current_file: Option<String>) -> Vec<String> {
        let resolver = self.resolver.clone();
        let task =
            tokio::task::spawn_blocking(move || resolver.resolve(&input, current_file.as_deref()));
        match task.await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "directory search task failed");
                Vec::new()
            }
        }
    }
}

fn dialog_result(path: Option<PathBuf>) -> BridgeResponse {
    match path {
        Some(path) => BridgeResponse::Path(path),
        None => BridgeResponse::Cancelled,
    }
}

fn failure(message: String) -> BridgeResponse {
    BridgeResponse::Error(message)
}
