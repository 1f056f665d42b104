//! Directory auto-completion for path fields
//!
//! `PathResolver::resolve` turns whatever the user has typed so far into a
//! list of directories: children of the typed directory plus siblings whose
//! name starts with the last typed segment. With nothing typed it offers the
//! current document's folder and the mounted volumes.
//!
//! Paths are treated as strings in a `PathStyle` rather than `std::path`, so
//! Windows-style input is handled the same way on every host.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::constants::resolver::{
    POSIX_DEFAULT_ROOT, POSIX_FALLBACK_ROOTS, WINDOWS_DEFAULT_ROOT, WINDOWS_FALLBACK_ROOTS,
};

mod fs;
pub use fs::{Filesystem, HostFilesystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `C:\dir`, `/` accepted as an alternate separator
    Windows,
    /// `/dir`
    Posix,
}

impl PathStyle {
    pub fn host() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    pub fn separator(self) -> char {
        match self {
            PathStyle::Windows => '\\',
            PathStyle::Posix => '/',
        }
    }

    fn alternate_separator(self) -> Option<char> {
        match self {
            PathStyle::Windows => Some('/'),
            PathStyle::Posix => None,
        }
    }

    fn fallback_roots(self) -> &'static [&'static str] {
        match self {
            PathStyle::Windows => WINDOWS_FALLBACK_ROOTS,
            PathStyle::Posix => POSIX_FALLBACK_ROOTS,
        }
    }

    fn default_root(self) -> &'static str {
        match self {
            PathStyle::Windows => WINDOWS_DEFAULT_ROOT,
            PathStyle::Posix => POSIX_DEFAULT_ROOT,
        }
    }

    pub fn normalize(self, path: &str) -> String {
        match self.alternate_separator() {
            Some(alt) => path.replace(alt, &self.separator().to_string()),
            None => path.to_string(),
        }
    }

    /// `C:\` or `/`
    pub fn is_volume_root(self, path: &str) -> bool {
        match self {
            PathStyle::Windows => {
                let b = path.as_bytes();
                b.len() == 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'\\'
            }
            PathStyle::Posix => path == "/",
        }
    }

    /// The drive letter when `input` is a lone letter like `c`
    fn volume_letter(self, input: &str) -> Option<char> {
        match self {
            PathStyle::Windows => {
                let mut chars = input.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
                    _ => None,
                }
            }
            PathStyle::Posix => None,
        }
    }

    pub fn with_trailing_separator(self, path: &str) -> String {
        let sep = self.separator();
        if path.ends_with(sep) {
            path.to_string()
        } else {
            format!("{path}{sep}")
        }
    }

    pub fn join(self, dir: &str, name: &str) -> String {
        format!("{}{name}", self.with_trailing_separator(dir))
    }

    /// Split into parent directory and final segment
    ///
    /// The parent of a top-level entry is the volume root, with its
    /// separator (`C:\Users` -> `C:\`, `/home` -> `/`). Returns `None` for
    /// paths with no separator or an empty final segment.
    pub fn parent(self, path: &str) -> Option<(String, String)> {
        let sep = self.separator();
        let idx = path.rfind(sep)?;
        let (head, tail) = (&path[..idx], &path[idx + sep.len_utf8()..]);
        if tail.is_empty() {
            return None;
        }
        let is_drive = matches!(self, PathStyle::Windows)
            && head.len() == 2
            && head.as_bytes()[0].is_ascii_alphabetic()
            && head.as_bytes()[1] == b':';
        let parent = if head.is_empty() || is_drive {
            format!("{head}{sep}")
        } else {
            head.to_string()
        };
        Some((parent, tail.to_string()))
    }
}

/// Directory completion over an injected `Filesystem`
#[derive(Debug, Clone)]
pub struct PathResolver<F> {
    fs: F,
    style: PathStyle,
}

impl<F: Filesystem> PathResolver<F> {
    pub fn new(fs: F) -> Self {
        Self::with_style(fs, PathStyle::host())
    }

    pub fn with_style(fs: F, style: PathStyle) -> Self {
        Self { fs, style }
    }

    /// Completion candidates for `input`; never fails, order is not significant
    pub fn resolve(&self, input: &str, current_file: Option<&str>) -> Vec<String> {
        if input.trim().is_empty() {
            return dedup(self.seed_candidates(current_file));
        }

        let mut normalized = self.style.normalize(input);
        if let Some(letter) = self.style.volume_letter(&normalized) {
            return dedup(self.volumes_starting_with(letter));
        }

        let is_root = self.style.is_volume_root(&normalized);
        if !is_root && normalized.ends_with(self.style.separator()) {
            normalized.pop();
        }

        let mut results = Vec::new();
        if self.fs.path_exists(&normalized) && self.fs.is_directory(&normalized) {
            self.push_subdirectories(&normalized, None, &mut results);
        }

        if !is_root {
            if let Some((parent, segment)) = self.style.parent(&normalized) {
                if parent != normalized && self.fs.path_exists(&parent) {
                    let prefix = segment.to_lowercase();
                    self.push_subdirectories(&parent, Some(&prefix), &mut results);
                }
            }
        }

        debug!(input = %input, candidates = results.len(), "resolved directory completions");
        dedup(results)
    }

    /// Current document folder, then volumes (or guesses), then the default root
    fn seed_candidates(&self, current_file: Option<&str>) -> Vec<String> {
        let mut results = Vec::new();

        if let Some(file) = current_file {
            let file = self.style.normalize(file);
            if let Some((dir, _)) = self.style.parent(&file) {
                if self.fs.path_exists(&dir) {
                    results.push(dir);
                }
            }
        }

        let volumes = match self.fs.list_volumes() {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!(error = %e, "failed to enumerate volumes, using fallback roots");
                Vec::new()
            }
        };
        if volumes.is_empty() {
            results.extend(
                self.style
                    .fallback_roots()
                    .iter()
                    .filter(|root| self.fs.path_exists(root))
                    .map(|root| root.to_string()),
            );
        } else {
            results.extend(volumes.iter().map(|v| self.style.with_trailing_separator(v)));
        }

        if results.is_empty() {
            results.push(self.style.default_root().to_string());
        }
        results
    }

    fn volumes_starting_with(&self, letter: char) -> Vec<String> {
        let letter = letter.to_ascii_lowercase();
        match self.fs.list_volumes() {
            Ok(volumes) => volumes
                .iter()
                .filter(|v| v.chars().next().is_some_and(|c| c.to_ascii_lowercase() == letter))
                .map(|v| self.style.with_trailing_separator(v))
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to enumerate volumes");
                Vec::new()
            }
        }
    }

    /// Append `dir`'s subdirectories, optionally only those whose lowercased
    /// name starts with `prefix`; unreadable directories contribute nothing
    fn push_subdirectories(&self, dir: &str, prefix: Option<&str>, results: &mut Vec<String>) {
        let names = match self.fs.list_subdirectories(dir) {
            Ok(names) => names,
            Err(e) => {
                warn!(path = %dir, error = %e, "failed to read directory");
                return;
            }
        };
        results.extend(
            names
                .iter()
                .filter(|name| prefix.is_none_or(|p| name.to_lowercase().starts_with(p)))
                .map(|name| self.style.join(dir, name)),
        );
    }
}

/// Remove repeats, keeping the first occurrence
fn dedup(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}
