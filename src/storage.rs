//! Storage collaborator: file contents plus the dialogs that choose files
//!
//! `Storage` is what the document manager talks to. `DiskStorage` backs it
//! with tokio file I/O and delegates every prompt to a `Dialogs`
//! implementation supplied by whoever owns the user interaction.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::wsb;

/// Dialog file-type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

impl FileFilter {
    pub const WSB: FileFilter = FileFilter {
        name: wsb::FILTER_NAME,
        extensions: &[wsb::EXTENSION],
    };

    /// Case-insensitive extension check
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// File access and destination prompts used by the document manager
///
/// Dialog methods return `None` when the user cancels.
pub trait Storage {
    fn open_file_dialog(&self, filter: &FileFilter) -> impl Future<Output = Option<PathBuf>>;

    fn save_file_dialog(
        &self,
        filter: &FileFilter,
        default_name: &str,
    ) -> impl Future<Output = Option<PathBuf>>;

    fn read_file(&self, path: &Path) -> impl Future<Output = io::Result<String>>;

    fn write_file(&self, path: &Path, contents: &str) -> impl Future<Output = io::Result<()>>;

    fn pick_directory(&self, hint: Option<&Path>) -> impl Future<Output = Option<PathBuf>>;
}

/// User prompts; every method blocks until the user answers
pub trait Dialogs {
    fn open_file(&self, filter: &FileFilter) -> Option<PathBuf>;

    fn save_file(&self, filter: &FileFilter, default_name: &str) -> Option<PathBuf>;

    fn pick_directory(&self, hint: Option<&Path>) -> Option<PathBuf>;

    /// Returns true when the user accepts
    fn confirm(&self, message: &str, detail: &str) -> bool;

    /// Accept an answer ahead of the dialog that will consume it
    ///
    /// Returns false when this provider asks the user itself.
    fn queue_answer(&self, _answer: DialogAnswer) -> bool {
        false
    }
}

/// Pre-supplied answer for the next dialog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum DialogAnswer {
    /// File or folder choice; `None` cancels
    Path(Option<PathBuf>),
    Confirmation(bool),
}

/// Local-disk storage with pluggable dialogs
pub struct DiskStorage<D> {
    dialogs: D,
}

impl<D: Dialogs> DiskStorage<D> {
    pub fn new(dialogs: D) -> Self {
        Self { dialogs }
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }
}

impl<D: Dialogs> Storage for DiskStorage<D> {
    async fn open_file_dialog(&self, filter: &FileFilter) -> Option<PathBuf> {
        self.dialogs.open_file(filter)
    }

    async fn save_file_dialog(&self, filter: &FileFilter, default_name: &str) -> Option<PathBuf> {
        let mut path = self.dialogs.save_file(filter, default_name)?;
        if path.extension().is_none() {
            if let Some(ext) = filter.extensions.first() {
                path.set_extension(ext);
            }
        }
        Some(path)
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        debug!(path = %path.display(), "reading file");
        tokio::fs::read_to_string(path).await
    }

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        debug!(path = %path.display(), bytes = contents.len(), "writing file");
        tokio::fs::write(path, contents).await
    }

    async fn pick_directory(&self, hint: Option<&Path>) -> Option<PathBuf> {
        self.dialogs.pick_directory(hint)
    }
}

/// Prompts on stderr and reads answers from stdin; an empty answer cancels
#[derive(Debug, Default)]
pub struct ConsoleDialogs;

impl ConsoleDialogs {
    fn ask(&self, prompt: &str) -> Option<String> {
        ask_on(prompt, io::stdin().lock(), io::stderr())
    }
}

/// A prompt that cannot be shown does not stop the answer from being read
fn ask_on(prompt: &str, mut input: impl BufRead, mut output: impl Write) -> Option<String> {
    if let Err(e) = write!(output, "{prompt}: ") {
        debug!(error = %e, "failed to write prompt");
    }
    if let Err(e) = output.flush() {
        debug!(error = %e, "failed to flush prompt");
    }

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => {
            let answer = line.trim();
            (!answer.is_empty()).then(|| answer.to_string())
        }
        Err(e) => {
            warn!(error = %e, "failed to read answer from stdin");
            None
        }
    }
}

impl Dialogs for ConsoleDialogs {
    fn open_file(&self, filter: &FileFilter) -> Option<PathBuf> {
        self.ask(&format!("Open ({}) [empty to cancel]", filter.name))
            .map(PathBuf::from)
    }

    fn save_file(&self, filter: &FileFilter, default_name: &str) -> Option<PathBuf> {
        self.ask(&format!(
            "Save as ({}, e.g. {default_name}) [empty to cancel]",
            filter.name
        ))
        .map(PathBuf::from)
    }

    fn pick_directory(&self, hint: Option<&Path>) -> Option<PathBuf> {
        let prompt = match hint {
            Some(hint) => format!("Folder (near {}) [empty to cancel]", hint.display()),
            None => "Folder [empty to cancel]".to_string(),
        };
        self.ask(&prompt).map(PathBuf::from)
    }

    fn confirm(&self, message: &str, detail: &str) -> bool {
        self.ask(&format!("{message} {detail} [y/N]"))
            .is_some_and(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"))
    }
}

/// Dialogs answered from queued responses
///
/// Front ends that run their own native dialogs push the user's answer
/// before issuing the request; an exhausted queue behaves like a cancel
/// (paths) or a refusal (confirmations).
#[derive(Debug, Default)]
pub struct PresetDialogs {
    paths: Mutex<VecDeque<Option<PathBuf>>>,
    confirmations: Mutex<VecDeque<bool>>,
}

impl PresetDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next file or folder dialog (`None` = cancel)
    pub fn push_path(&self, answer: Option<PathBuf>) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push_back(answer);
        }
    }

    pub fn push_confirmation(&self, answer: bool) {
        if let Ok(mut confirmations) = self.confirmations.lock() {
            confirmations.push_back(answer);
        }
    }

    fn next_path(&self) -> Option<PathBuf> {
        let answer = self.paths.lock().ok().and_then(|mut p| p.pop_front()).flatten();
        info!(answer = ?answer, "preset dialog answered");
        answer
    }
}

impl Dialogs for PresetDialogs {
    fn open_file(&self, _filter: &FileFilter) -> Option<PathBuf> {
        self.next_path()
    }

    fn save_file(&self, _filter: &FileFilter, _default_name: &str) -> Option<PathBuf> {
        self.next_path()
    }

    fn pick_directory(&self, _hint: Option<&Path>) -> Option<PathBuf> {
        self.next_path()
    }

    fn confirm(&self, _message: &str, _detail: &str) -> bool {
        self.confirmations
            .lock()
            .ok()
            .and_then(|mut c| c.pop_front())
            .unwrap_or(false)
    }

    fn queue_answer(&self, answer: DialogAnswer) -> bool {
        match answer {
            DialogAnswer::Path(path) => self.push_path(path),
            DialogAnswer::Confirmation(ok) => self.push_confirmation(ok),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_extension_case_insensitively() {
        assert!(FileFilter::WSB.matches(Path::new("C:\\x\\Sandbox.WSB")));
        assert!(FileFilter::WSB.matches(Path::new("/tmp/config.wsb")));
        assert!(!FileFilter::WSB.matches(Path::new("/tmp/config.xml")));
        assert!(!FileFilter::WSB.matches(Path::new("/tmp/wsb")));
    }

    #[test]
    fn test_preset_dialogs_answer_in_order_then_cancel() {
        let dialogs = PresetDialogs::new();
        dialogs.push_path(Some(PathBuf::from("/a.wsb")));
        dialogs.push_path(None);

        assert_eq!(dialogs.open_file(&FileFilter::WSB), Some(PathBuf::from("/a.wsb")));
        assert_eq!(dialogs.open_file(&FileFilter::WSB), None);
        assert_eq!(dialogs.pick_directory(None), None);
        assert!(!dialogs.confirm("?", ""));
    }

    #[test]
    fn test_console_dialogs_refuse_queued_answers() {
        assert!(!ConsoleDialogs.queue_answer(DialogAnswer::Confirmation(true)));
        let preset = PresetDialogs::new();
        assert!(preset.queue_answer(DialogAnswer::Confirmation(true)));
        assert!(preset.confirm("?", ""));
    }

    /// Writer whose every call fails, like a closed stderr
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_answer_read_when_prompt_cannot_be_written() {
        let answer = ask_on("Open", io::Cursor::new("  C:\\lab.wsb \n"), BrokenPipe);
        assert_eq!(answer.as_deref(), Some("C:\\lab.wsb"));

        assert_eq!(ask_on("Open", io::Cursor::new("\n"), BrokenPipe), None);
        assert_eq!(ask_on("Open", io::Cursor::new(""), BrokenPipe), None);
    }

    #[test]
    fn test_prompt_written_before_answer() {
        let mut shown = Vec::new();
        let answer = ask_on("Folder", io::Cursor::new("D:\\data\n"), &mut shown);
        assert_eq!(answer.as_deref(), Some("D:\\data"));
        assert_eq!(String::from_utf8(shown).unwrap(), "Folder: ");
    }

    #[tokio::test]
    async fn test_save_dialog_appends_extension() {
        let dialogs = PresetDialogs::new();
        dialogs.push_path(Some(PathBuf::from("/tmp/sandbox")));
        let storage = DiskStorage::new(dialogs);

        let path = storage
            .save_file_dialog(&FileFilter::WSB, wsb::DEFAULT_FILE_NAME)
            .await;
        assert_eq!(path, Some(PathBuf::from("/tmp/sandbox.wsb")));
    }

    #[tokio::test]
    async fn test_disk_storage_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wsb");
        let storage = DiskStorage::new(PresetDialogs::new());

        storage.write_file(&path, "<Configuration></Configuration>").await.unwrap();
        let text = storage.read_file(&path).await.unwrap();
        assert_eq!(text, "<Configuration></Configuration>");
    }

    #[tokio::test]
    async fn test_disk_storage_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(PresetDialogs::new());
        assert!(storage.read_file(&dir.path().join("missing.wsb")).await.is_err());
    }
}
