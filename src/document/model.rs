//! In-memory sandbox configuration document
//!
//! `Document` always carries a value for every field; absence on disk is
//! represented by the field's default. Conversion to and from the wire form
//! (`WsbConfiguration`) is where defaults are applied and stripped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::format::{LogonCommand, WsbConfiguration};

/// Value could not be interpreted for the named kind of field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} {value:?}")]
pub struct InvalidValue {
    pub kind: &'static str,
    pub value: String,
}

/// Three-state switch used by every redirection/feature setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Toggle {
    #[default]
    Default,
    Enable,
    Disable,
}

impl Toggle {
    pub fn as_str(self) -> &'static str {
        match self {
            Toggle::Default => "Default",
            Toggle::Enable => "Enable",
            Toggle::Disable => "Disable",
        }
    }

    pub fn is_default(self) -> bool {
        self == Toggle::Default
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toggle {
    type Err = InvalidValue;

    /// Case-insensitive, matching what Windows Sandbox itself accepts
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Toggle::Default),
            "enable" => Ok(Toggle::Enable),
            "disable" => Ok(Toggle::Disable),
            _ => Err(InvalidValue {
                kind: "toggle",
                value: s.to_string(),
            }),
        }
    }
}

/// Named toggle settings of a sandbox configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Setting {
    VGpu,
    Networking,
    AudioInput,
    VideoInput,
    ProtectedClient,
    PrinterRedirection,
    ClipboardRedirection,
}

impl Setting {
    pub const COUNT: usize = 7;

    pub const ALL: [Setting; Setting::COUNT] = [
        Setting::VGpu,
        Setting::Networking,
        Setting::AudioInput,
        Setting::VideoInput,
        Setting::ProtectedClient,
        Setting::PrinterRedirection,
        Setting::ClipboardRedirection,
    ];

    /// Element name used in `.wsb` files
    pub fn element_name(self) -> &'static str {
        match self {
            Setting::VGpu => "VGpu",
            Setting::Networking => "Networking",
            Setting::AudioInput => "AudioInput",
            Setting::VideoInput => "VideoInput",
            Setting::ProtectedClient => "ProtectedClient",
            Setting::PrinterRedirection => "PrinterRedirection",
            Setting::ClipboardRedirection => "ClipboardRedirection",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.element_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

impl FromStr for Setting {
    type Err = InvalidValue;

    /// Accepts the element name in any case, with or without `-`/`_`
    /// separators (`vgpu`, `audio-input`, `Printer_Redirection`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|setting| setting.element_name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| InvalidValue {
                kind: "setting",
                value: s.to_string(),
            })
    }
}

/// One toggle value per `Setting`
///
/// Serialized as a map that only lists non-default entries; missing entries
/// deserialize as `Toggle::Default`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Setting, Toggle>", into = "BTreeMap<Setting, Toggle>")]
pub struct ToggleSet([Toggle; Setting::COUNT]);

impl ToggleSet {
    pub fn get(&self, setting: Setting) -> Toggle {
        self.0[setting.index()]
    }

    pub fn set(&mut self, setting: Setting, value: Toggle) {
        self.0[setting.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Setting, Toggle)> + '_ {
        Setting::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    pub fn non_default(&self) -> BTreeMap<Setting, Toggle> {
        self.iter().filter(|(_, t)| !t.is_default()).collect()
    }
}

impl From<BTreeMap<Setting, Toggle>> for ToggleSet {
    fn from(map: BTreeMap<Setting, Toggle>) -> Self {
        let mut set = ToggleSet::default();
        for (setting, value) in map {
            set.set(setting, value);
        }
        set
    }
}

impl From<ToggleSet> for BTreeMap<Setting, Toggle> {
    fn from(set: ToggleSet) -> Self {
        set.non_default()
    }
}

/// Host folder shared into the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedFolder {
    pub host_folder: String,
    /// Destination inside the sandbox (sandbox desktop when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl MappedFolder {
    pub fn new(host_folder: impl Into<String>) -> Self {
        Self {
            host_folder: host_folder.into(),
            sandbox_folder: None,
            read_only: None,
        }
    }

    pub fn with_sandbox_folder(mut self, sandbox_folder: impl Into<String>) -> Self {
        self.sandbox_folder = Some(sandbox_folder.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
}

impl FromStr for MappedFolder {
    type Err = InvalidValue;

    /// `HOST[=SANDBOX][;ro|;rw]`
    ///
    /// `=` and `;` are used as separators because both host and sandbox
    /// paths may contain `:`. Only a trailing `;ro` or `;rw` is a mode; any
    /// other `;` belongs to the path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (paths, read_only) = match s.rsplit_once(';') {
            Some((paths, mode)) if mode.trim().eq_ignore_ascii_case("ro") => (paths, Some(true)),
            Some((paths, mode)) if mode.trim().eq_ignore_ascii_case("rw") => (paths, Some(false)),
            _ => (s, None),
        };
        let (host, sandbox) = match paths.split_once('=') {
            Some((host, sandbox)) => (host.trim(), Some(sandbox.trim())),
            None => (paths.trim(), None),
        };
        if host.is_empty() {
            return Err(InvalidValue {
                kind: "folder mapping",
                value: s.to_string(),
            });
        }

        let mut folder = MappedFolder::new(host);
        if let Some(sandbox) = sandbox.filter(|p| !p.is_empty()) {
            folder = folder.with_sandbox_folder(sandbox);
        }
        if let Some(read_only) = read_only {
            folder = folder.with_read_only(read_only);
        }
        Ok(folder)
    }
}

/// The editable sandbox configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub toggles: ToggleSet,
    /// Memory limit in megabytes; zero is not representable
    #[serde(default)]
    pub memory_mb: Option<NonZeroU32>,
    #[serde(default)]
    pub mapped_folders: Vec<MappedFolder>,
    /// Empty means no logon command
    #[serde(default)]
    pub logon_command: String,
}

impl Document {
    pub fn toggle(&self, setting: Setting) -> Toggle {
        self.toggles.get(setting)
    }

    pub fn set_toggle(&mut self, setting: Setting, value: Toggle) {
        self.toggles.set(setting, value);
    }

    /// Zero clears the limit
    pub fn set_memory_mb(&mut self, megabytes: u32) {
        self.memory_mb = NonZeroU32::new(megabytes);
    }

    /// Build from a parsed file, filling every absent field with its default
    pub fn from_configuration(config: WsbConfiguration) -> Self {
        let mut toggles = ToggleSet::default();
        for (setting, value) in config.toggles {
            toggles.set(setting, value);
        }
        Self {
            toggles,
            memory_mb: config.memory_in_mb.and_then(NonZeroU32::new),
            mapped_folders: config.mapped_folders.unwrap_or_default(),
            logon_command: config.logon_command.map(|c| c.command).unwrap_or_default(),
        }
    }

    /// Stripped wire form: every field equal to its default is omitted
    ///
    /// This is the exact inverse of `from_configuration`'s defaulting, so
    /// `from_configuration(doc.to_configuration()) == doc` for every document.
    pub fn to_configuration(&self) -> WsbConfiguration {
        WsbConfiguration {
            toggles: self.toggles.non_default(),
            memory_in_mb: self.memory_mb.map(NonZeroU32::get),
            mapped_folders: (!self.mapped_folders.is_empty()).then(|| self.mapped_folders.clone()),
            logon_command: (!self.logon_command.is_empty()).then(|| LogonCommand {
                command: self.logon_command.clone(),
            }),
        }
    }
}
