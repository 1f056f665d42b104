//! Document format collaborator
//!
//! The rest of the editor only sees the `Format` trait: text in, partial
//! configuration out, and back. `WsbFormat` is the `.wsb` implementation.

use std::collections::BTreeMap;

use crate::document::{MappedFolder, Setting, Toggle};

mod wsb;
pub use wsb::WsbFormat;

/// A configuration exactly as it appears in (or will be written to) a file
///
/// Every field is optional; `None` / missing map entries mean the element is
/// absent from the text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WsbConfiguration {
    pub toggles: BTreeMap<Setting, Toggle>,
    pub memory_in_mb: Option<u32>,
    pub mapped_folders: Option<Vec<MappedFolder>>,
    pub logon_command: Option<LogonCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogonCommand {
    pub command: String,
}

/// Why a document could not be read
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document is empty")]
    Empty,

    #[error("expected a single <Configuration> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("text found outside the <Configuration> element")]
    TextOutsideRoot,

    #[error("element <{0}> is not closed")]
    Unclosed(String),

    #[error("invalid value {value:?} for <{element}>")]
    InvalidValue { element: String, value: String },

    #[error("<MappedFolder> has no <HostFolder>")]
    MissingHostFolder,
}

/// Parse/serialize contract
///
/// `parse(&serialize(c))` must reproduce `c` for every configuration produced
/// by `Document::to_configuration`.
pub trait Format {
    fn parse(&self, text: &str) -> Result<WsbConfiguration, FormatError>;

    fn serialize(&self, config: &WsbConfiguration) -> String;
}
