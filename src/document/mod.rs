//! Sandbox configuration document and its in-memory state
//!
//! - **model**: the `Document` type and its field types
//! - **manager**: single-document state with load/save round trip

mod manager;
mod model;

pub use manager::{DocumentManager, Outcome};
pub use model::{Document, InvalidValue, MappedFolder, Setting, Toggle};
