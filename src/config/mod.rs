//! Configuration management for the editor
//!
//! - **preferences**: theme and other per-user settings (TOML)

pub mod preferences;

pub use preferences::{PreferenceStore, Theme};
