//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Application identity
pub mod app {
    /// Name shown in window titles
    pub const DISPLAY_NAME: &str = "WSB Editor";

    /// Title used for documents that have never been saved
    pub const UNTITLED: &str = "Untitled";
}

/// Preference file location
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "wsb-editor";

    /// Preference file name
    pub const FILENAME: &str = "preferences.toml";

    /// Environment variable overriding the stored theme
    pub const THEME_ENV: &str = "WSB_EDITOR_THEME";
}

/// Windows Sandbox document files
pub mod wsb {
    /// File extension without the leading dot
    pub const EXTENSION: &str = "wsb";

    /// Filter label used by open/save dialogs
    pub const FILTER_NAME: &str = "WSB Files";

    /// Suggested file name for first saves
    pub const DEFAULT_FILE_NAME: &str = "config.wsb";

    /// Root element of every document
    pub const ROOT_ELEMENT: &str = "Configuration";
}

/// User-facing messages
pub mod messages {
    /// Confirmation asked before unsaved changes are thrown away
    pub const DISCARD_CHANGES: &str = "Do you want to discard unsaved changes?";

    /// Secondary text shown under the discard confirmation
    pub const DISCARD_DETAIL: &str = "Your changes will be lost if you do not save them.";

    /// Error shown when something other than a .wsb file is dropped
    pub const DROP_WRONG_TYPE: &str = "Please drop a .wsb file";
}

/// Directory completion
pub mod resolver {
    /// Drive roots checked when volume enumeration yields nothing (Windows style)
    pub const WINDOWS_FALLBACK_ROOTS: &[&str] = &["C:\\", "D:\\", "E:\\", "F:\\"];

    /// Returned when nothing else could be found (Windows style)
    pub const WINDOWS_DEFAULT_ROOT: &str = "C:\\";

    /// Mount roots checked when volume enumeration yields nothing (Posix style)
    pub const POSIX_FALLBACK_ROOTS: &[&str] = &["/", "/mnt", "/media", "/Volumes"];

    /// Returned when nothing else could be found (Posix style)
    pub const POSIX_DEFAULT_ROOT: &str = "/";

    /// Mount table consulted for Posix volume enumeration
    pub const MOUNT_TABLE: &str = "/proc/mounts";

    /// Mount point prefixes treated as user-visible volumes
    pub const POSIX_VOLUME_PREFIXES: &[&str] = &["/mnt/", "/media/", "/run/media/"];
}

/// Bridge framing
pub mod ipc {
    /// Maximum frame size (10 MB) to prevent memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Depth of the host request queue
    pub const REQUEST_QUEUE_DEPTH: usize = 32;
}
