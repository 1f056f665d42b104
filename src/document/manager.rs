//! Document state manager
//!
//! Holds exactly one document plus the snapshot taken at the last
//! new/load/save. The modification flag is derived by comparing the two,
//! so no mutation site has to remember to mark anything dirty.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::Document;
use crate::constants::wsb::DEFAULT_FILE_NAME;
use crate::format::{Format, FormatError};
use crate::storage::{FileFilter, Storage};

/// Recoverable failures; the document is unchanged whenever one is returned
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to parse WSB file: {0}")]
    Parse(#[from] FormatError),

    #[error("Failed to load {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to save WSB configuration: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a load or save request
#[derive(Debug)]
pub enum Outcome {
    Loaded(PathBuf),
    Saved(PathBuf),
    /// The user dismissed a dialog; nothing changed
    Cancelled,
    Failed(DocumentError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Loaded(_) | Outcome::Saved(_))
    }

    /// Status line for the front end; `None` for a cancelled request
    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::Loaded(path) => Some(format!("Loaded: {}", path.display())),
            Outcome::Saved(path) => Some(format!("Saved to: {}", path.display())),
            Outcome::Cancelled => None,
            Outcome::Failed(err) => Some(err.to_string()),
        }
    }
}

pub struct DocumentManager<F, S> {
    format: F,
    storage: S,
    document: Document,
    saved: Document,
    current_path: Option<PathBuf>,
}

impl<F: Format, S: Storage> DocumentManager<F, S> {
    pub fn new(format: F, storage: S) -> Self {
        Self {
            format,
            storage,
            document: Document::default(),
            saved: Document::default(),
            current_path: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn is_modified(&self) -> bool {
        self.document != self.saved
    }

    pub fn new_document(&mut self) {
        self.document = Document::default();
        self.saved = self.document.clone();
        self.current_path = None;
        info!("started new document");
    }

    /// Parse `text` and adopt it as the current, unmodified document
    pub fn load_document(
        &mut self,
        text: &str,
        path: impl Into<PathBuf>,
    ) -> Result<(), DocumentError> {
        let path = path.into();
        let config = self.format.parse(text).inspect_err(|err| {
            warn!(path = %path.display(), error = %err, "failed to parse document");
        })?;

        self.document = Document::from_configuration(config);
        self.saved = self.document.clone();
        info!(path = %path.display(), "loaded document");
        self.current_path = Some(path);
        Ok(())
    }

    /// Ask for a file, read it and load it
    pub async fn open_document(&mut self) -> Outcome {
        let Some(path) = self.storage.open_file_dialog(&FileFilter::WSB).await else {
            return Outcome::Cancelled;
        };
        self.load_from_path(&path).await
    }

    /// Read and load a known file (drag-and-drop, command line)
    pub async fn load_from_path(&mut self, path: &Path) -> Outcome {
        let text = match self.storage.read_file(path).await {
            Ok(text) => text,
            Err(source) => {
                warn!(path = %path.display(), error = %source, "failed to read document");
                return Outcome::Failed(DocumentError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        match self.load_document(&text, path) {
            Ok(()) => Outcome::Loaded(path.to_path_buf()),
            Err(err) => Outcome::Failed(err),
        }
    }

    /// Serialized text of the current document with all defaults stripped
    pub fn serialize_stripped(&self) -> String {
        self.format.serialize(&self.document.to_configuration())
    }

    /// Save to `preferred`, else the current path, else wherever the user picks
    pub async fn save_document(&mut self, preferred: Option<PathBuf>) -> Outcome {
        let text = self.serialize_stripped();
        let target = match preferred.or_else(|| self.current_path.clone()) {
            Some(path) => path,
            None => match self.prompt_destination().await {
                Some(path) => path,
                None => return Outcome::Cancelled,
            },
        };
        self.write_to(target, text).await
    }

    /// Always ask for the destination
    pub async fn save_document_as(&mut self) -> Outcome {
        let text = self.serialize_stripped();
        let Some(target) = self.prompt_destination().await else {
            return Outcome::Cancelled;
        };
        self.write_to(target, text).await
    }

    async fn prompt_destination(&self) -> Option<PathBuf> {
        self.storage
            .save_file_dialog(&FileFilter::WSB, DEFAULT_FILE_NAME)
            .await
    }

    async fn write_to(&mut self, target: PathBuf, text: String) -> Outcome {
        if let Err(source) = self.storage.write_file(&target, &text).await {
            warn!(path = %target.display(), error = %source, "failed to save document");
            return Outcome::Failed(DocumentError::Write {
                path: target,
                source,
            });
        }
        info!(path = %target.display(), bytes = text.len(), "saved document");
        self.saved = self.document.clone();
        self.current_path = Some(target.clone());
        Outcome::Saved(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MappedFolder, Setting, Toggle};
    use crate::format::WsbFormat;
    use crate::storage::{DiskStorage, PresetDialogs};

    type TestManager = DocumentManager<WsbFormat, DiskStorage<PresetDialogs>>;

    fn manager() -> TestManager {
        DocumentManager::new(WsbFormat, DiskStorage::new(PresetDialogs::new()))
    }

    fn edit(doc: &mut Document) {
        doc.set_toggle(Setting::Networking, Toggle::Disable);
        doc.set_toggle(Setting::ProtectedClient, Toggle::Enable);
        doc.set_memory_mb(8192);
        doc.mapped_folders
            .push(MappedFolder::new("C:\\Data").with_sandbox_folder("C:\\Data").with_read_only(true));
        doc.logon_command = "powershell -File C:\\Data\\setup.ps1".to_string();
    }

    #[test]
    fn test_new_document_is_unmodified() {
        let mut m = manager();
        edit(m.document_mut());
        m.new_document();
        assert!(!m.is_modified());
        assert!(m.current_path().is_none());
        assert_eq!(m.document(), &Document::default());
    }

    #[test]
    fn test_mutation_marks_modified_and_revert_clears_it() {
        let mut m = manager();
        m.document_mut().set_toggle(Setting::VGpu, Toggle::Enable);
        assert!(m.is_modified());

        m.document_mut().set_toggle(Setting::VGpu, Toggle::Default);
        assert!(!m.is_modified());
    }

    #[test]
    fn test_load_applies_defaults_and_sets_path() {
        let mut m = manager();
        m.load_document(
            "<Configuration><VGpu>Enable</VGpu></Configuration>",
            "C:\\sandbox\\a.wsb",
        )
        .unwrap();

        assert!(!m.is_modified());
        assert_eq!(m.current_path(), Some(Path::new("C:\\sandbox\\a.wsb")));
        assert_eq!(m.document().toggle(Setting::VGpu), Toggle::Enable);
        assert_eq!(m.document().toggle(Setting::AudioInput), Toggle::Default);
        assert!(m.document().mapped_folders.is_empty());
        assert!(m.document().logon_command.is_empty());
    }

    #[test]
    fn test_failed_parse_leaves_state_untouched() {
        let mut m = manager();
        m.load_document("<Configuration><Networking>Disable</Networking></Configuration>", "/old.wsb")
            .unwrap();
        m.document_mut().set_memory_mb(256);
        let before_doc = m.document().clone();
        let before_modified = m.is_modified();

        let err = m.load_document("<Configuration><VGpu>", "/new.wsb").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse WSB file:"));

        assert_eq!(m.document(), &before_doc);
        assert_eq!(m.current_path(), Some(Path::new("/old.wsb")));
        assert_eq!(m.is_modified(), before_modified);
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.wsb");

        let mut m = manager();
        edit(m.document_mut());
        let edited = m.document().clone();

        let outcome = m.save_document(Some(path.clone())).await;
        assert!(matches!(outcome, Outcome::Saved(ref p) if p == &path));
        assert!(!m.is_modified());
        assert_eq!(m.current_path(), Some(path.as_path()));

        let mut other = manager();
        let outcome = other.load_from_path(&path).await;
        assert!(outcome.is_success());
        assert_eq!(other.document(), &edited);
    }

    #[tokio::test]
    async fn test_edge_values_survive_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.wsb");

        let mut m = manager();
        let doc = m.document_mut();
        doc.mapped_folders.push(MappedFolder::new(""));
        doc.mapped_folders
            .push(MappedFolder::new(" C:\\Padded ").with_sandbox_folder("").with_read_only(false));
        doc.logon_command = "   ".to_string();
        for (i, setting) in Setting::ALL.into_iter().enumerate() {
            let value = [Toggle::Default, Toggle::Enable, Toggle::Disable][i % 3];
            doc.set_toggle(setting, value);
        }
        let edited = m.document().clone();
        assert!(m.save_document(Some(path.clone())).await.is_success());

        let mut other = manager();
        assert!(other.load_from_path(&path).await.is_success());
        assert_eq!(other.document(), &edited);
        assert!(!other.is_modified());

        // Reloading into the manager that saved it is not a modification either
        assert!(m.load_from_path(&path).await.is_success());
        assert!(!m.is_modified());
        assert_eq!(m.document(), &edited);
    }

    #[tokio::test]
    async fn test_saving_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.wsb");

        let mut m = manager();
        edit(m.document_mut());
        m.save_document(Some(path.clone())).await;
        let first = std::fs::read(&path).unwrap();
        m.save_document(None).await;
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_default_document_serializes_without_fields() {
        let m = manager();
        assert_eq!(m.serialize_stripped(), "<Configuration></Configuration>\n");
    }

    #[tokio::test]
    async fn test_save_without_path_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let chosen = dir.path().join("picked.wsb");
        let mut m = manager();
        m.storage().dialogs().push_path(Some(chosen.clone()));
        m.document_mut().set_toggle(Setting::VGpu, Toggle::Disable);

        let outcome = m.save_document(None).await;
        assert!(matches!(outcome, Outcome::Saved(ref p) if p == &chosen));
        assert!(chosen.exists());
        assert_eq!(outcome.message(), Some(format!("Saved to: {}", chosen.display())));
    }

    #[tokio::test]
    async fn test_cancelled_save_as_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.wsb");
        let mut m = manager();
        m.save_document(Some(path.clone())).await;
        m.document_mut().set_toggle(Setting::VideoInput, Toggle::Enable);

        m.storage().dialogs().push_path(None);
        let outcome = m.save_document_as().await;
        assert!(matches!(outcome, Outcome::Cancelled));
        assert_eq!(outcome.message(), None);
        assert_eq!(m.current_path(), Some(path.as_path()));
        assert!(m.is_modified());
    }

    #[tokio::test]
    async fn test_cancelled_first_save_changes_nothing() {
        let mut m = manager();
        m.document_mut().set_memory_mb(1024);
        let outcome = m.save_document(None).await;
        assert!(matches!(outcome, Outcome::Cancelled));
        assert!(m.current_path().is_none());
        assert!(m.is_modified());
    }

    #[tokio::test]
    async fn test_save_as_prompts_even_with_current_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.wsb");
        let second = dir.path().join("second.wsb");
        let mut m = manager();
        m.save_document(Some(first.clone())).await;

        m.storage().dialogs().push_path(Some(second.clone()));
        let outcome = m.save_document_as().await;
        assert!(matches!(outcome, Outcome::Saved(ref p) if p == &second));
        assert_eq!(m.current_path(), Some(second.as_path()));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let unwritable = dir.path().join("missing-dir").join("a.wsb");
        let mut m = manager();
        m.document_mut().set_toggle(Setting::AudioInput, Toggle::Disable);

        let outcome = m.save_document(Some(unwritable)).await;
        assert!(matches!(outcome, Outcome::Failed(DocumentError::Write { .. })));
        assert!(m.is_modified());
        assert!(m.current_path().is_none());
    }

    #[tokio::test]
    async fn test_open_document_cancelled() {
        let mut m = manager();
        m.storage().dialogs().push_path(None);
        assert!(matches!(m.open_document().await, Outcome::Cancelled));
    }

    #[tokio::test]
    async fn test_open_document_reads_chosen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.wsb");
        std::fs::write(&path, "<Configuration><MemoryInMB>4096</MemoryInMB></Configuration>").unwrap();

        let mut m = manager();
        m.storage().dialogs().push_path(Some(path.clone()));
        let outcome = m.open_document().await;
        assert_eq!(outcome.message(), Some(format!("Loaded: {}", path.display())));
        assert_eq!(m.document().memory_mb.map(|m| m.get()), Some(4096));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager();
        let outcome = m.load_from_path(&dir.path().join("nope.wsb")).await;
        assert!(matches!(outcome, Outcome::Failed(DocumentError::Read { .. })));
        assert!(m.current_path().is_none());
    }
}
