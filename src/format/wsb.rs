//! `.wsb` reader/writer built on quick-xml

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use tracing::debug;

use super::{Format, FormatError, LogonCommand, WsbConfiguration};
use crate::constants::wsb::ROOT_ELEMENT;
use crate::document::{MappedFolder, Setting};

/// Windows Sandbox configuration format
#[derive(Debug, Clone, Copy, Default)]
pub struct WsbFormat;

impl Format for WsbFormat {
    fn parse(&self, text: &str) -> Result<WsbConfiguration, FormatError> {
        Parser::default().run(text.trim_start_matches('\u{feff}'))
    }

    fn serialize(&self, config: &WsbConfiguration) -> String {
        let mut body = XmlWriter::new(1);

        // Element order follows the Windows Sandbox documentation
        for setting in [Setting::VGpu, Setting::Networking] {
            if let Some(value) = config.toggles.get(&setting) {
                body.leaf(setting.element_name(), value.as_str());
            }
        }
        if let Some(folders) = &config.mapped_folders {
            body.open("MappedFolders");
            for folder in folders {
                body.open("MappedFolder");
                body.leaf("HostFolder", &folder.host_folder);
                if let Some(sandbox) = &folder.sandbox_folder {
                    body.leaf("SandboxFolder", sandbox);
                }
                if let Some(read_only) = folder.read_only {
                    body.leaf("ReadOnly", if read_only { "true" } else { "false" });
                }
                body.close("MappedFolder");
            }
            body.close("MappedFolders");
        }
        if let Some(logon) = &config.logon_command {
            body.open("LogonCommand");
            body.leaf("Command", &logon.command);
            body.close("LogonCommand");
        }
        for setting in &Setting::ALL[2..] {
            if let Some(value) = config.toggles.get(setting) {
                body.leaf(setting.element_name(), value.as_str());
            }
        }
        if let Some(memory) = config.memory_in_mb {
            body.leaf("MemoryInMB", &memory.to_string());
        }

        if body.out.is_empty() {
            format!("<{ROOT_ELEMENT}></{ROOT_ELEMENT}>\n")
        } else {
            format!("<{ROOT_ELEMENT}>\n{}</{ROOT_ELEMENT}>\n", body.out)
        }
    }
}

/// Indented element writer; text is escaped with quick-xml's rules
struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn new(depth: usize) -> Self {
        Self {
            out: String::new(),
            depth,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn open(&mut self, name: &str) {
        self.indent();
        self.out.push_str(&format!("<{name}>\n"));
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        self.depth -= 1;
        self.indent();
        self.out.push_str(&format!("</{name}>\n"));
    }

    fn leaf(&mut self, name: &str, value: &str) {
        self.indent();
        self.out.push_str(&format!("<{name}>{}</{name}>\n", escape(value)));
    }
}

#[derive(Default)]
struct FolderDraft {
    host_folder: Option<String>,
    sandbox_folder: Option<String>,
    read_only: Option<bool>,
}

/// Where the element being closed sits in the document
enum Slot {
    Root,
    TopLevel,
    LogonCommand,
    MappedFolder,
    MappedFolderField,
    Other,
}

#[derive(Default)]
struct Parser {
    config: WsbConfiguration,
    /// Names of the currently open elements, root first
    path: Vec<String>,
    text: String,
    folder: Option<FolderDraft>,
    saw_root: bool,
}

impl Parser {
    fn run(mut self, xml: &str) -> Result<WsbConfiguration, FormatError> {
        // Text is kept verbatim; leaf values may carry meaningful spaces
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(source) => {
                    return Err(FormatError::Xml {
                        position: reader.buffer_position(),
                        source,
                    });
                }
            };
            match event {
                Event::Start(e) => {
                    self.open(String::from_utf8_lossy(e.name().as_ref()).into_owned())?;
                }
                Event::Empty(e) => {
                    self.open(String::from_utf8_lossy(e.name().as_ref()).into_owned())?;
                    self.close()?;
                }
                Event::Text(t) => {
                    let value = t.unescape().map_err(|source| FormatError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    if self.path.is_empty() {
                        if !value.trim().is_empty() {
                            return Err(FormatError::TextOutsideRoot);
                        }
                        continue;
                    }
                    self.text.push_str(&value);
                }
                Event::CData(c) => {
                    if self.path.is_empty() {
                        return Err(FormatError::TextOutsideRoot);
                    }
                    self.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
                Event::End(_) => self.close()?,
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = self.path.pop() {
            return Err(FormatError::Unclosed(open));
        }
        if !self.saw_root {
            return Err(FormatError::Empty);
        }
        Ok(self.config)
    }

    fn open(&mut self, name: String) -> Result<(), FormatError> {
        match self.path.len() {
            0 => {
                if self.saw_root || name != ROOT_ELEMENT {
                    return Err(FormatError::UnexpectedRoot(name));
                }
                self.saw_root = true;
            }
            1 => match name.as_str() {
                "MappedFolders" => {
                    self.config.mapped_folders.get_or_insert_with(Vec::new);
                }
                "LogonCommand" => {
                    self.config
                        .logon_command
                        .get_or_insert_with(LogonCommand::default);
                }
                _ => {}
            },
            2 if name == "MappedFolder" && self.path[1] == "MappedFolders" => {
                self.folder = Some(FolderDraft::default());
            }
            _ => {}
        }
        self.path.push(name);
        self.text.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), FormatError> {
        let text = std::mem::take(&mut self.text);
        let value = text.as_str();
        let Some(name) = self.path.pop() else {
            return Ok(());
        };

        let slot = match (self.path.len(), self.path.last().map(String::as_str)) {
            (0, _) => Slot::Root,
            (1, _) => Slot::TopLevel,
            (2, Some("LogonCommand")) => Slot::LogonCommand,
            (2, Some("MappedFolders")) => Slot::MappedFolder,
            (3, Some("MappedFolder")) if self.path[1] == "MappedFolders" => Slot::MappedFolderField,
            _ => Slot::Other,
        };

        match slot {
            Slot::Root => Ok(()),
            Slot::TopLevel => self.apply_top_level(&name, value),
            Slot::LogonCommand => {
                if name == "Command" {
                    if let Some(logon) = self.config.logon_command.as_mut() {
                        logon.command = value.to_string();
                    }
                }
                Ok(())
            }
            Slot::MappedFolder => {
                if name == "MappedFolder" {
                    self.finish_folder()?;
                }
                Ok(())
            }
            Slot::MappedFolderField => self.apply_folder_field(&name, value),
            Slot::Other => {
                debug!(element = %name, "ignoring nested element");
                Ok(())
            }
        }
    }

    fn apply_top_level(&mut self, element: &str, value: &str) -> Result<(), FormatError> {
        let value = value.trim();
        if let Some(setting) = Setting::from_element_name(element) {
            if !value.is_empty() {
                let toggle = value.parse().map_err(|_| invalid(element, value))?;
                self.config.toggles.insert(setting, toggle);
            }
            return Ok(());
        }
        match element {
            "MemoryInMB" => {
                if !value.is_empty() {
                    let megabytes = value.parse().map_err(|_| invalid(element, value))?;
                    self.config.memory_in_mb = Some(megabytes);
                }
            }
            "MappedFolders" | "LogonCommand" => {}
            other => debug!(element = %other, "ignoring unknown element"),
        }
        Ok(())
    }

    fn apply_folder_field(&mut self, element: &str, value: &str) -> Result<(), FormatError> {
        let Some(draft) = self.folder.as_mut() else {
            return Ok(());
        };
        match element {
            "HostFolder" => draft.host_folder = Some(value.to_string()),
            "SandboxFolder" => draft.sandbox_folder = Some(value.to_string()),
            "ReadOnly" => {
                draft.read_only = match value.trim().to_ascii_lowercase().as_str() {
                    "" => None,
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => return Err(invalid(element, value)),
                };
            }
            other => debug!(element = %other, "ignoring unknown mapped folder element"),
        }
        Ok(())
    }

    fn finish_folder(&mut self) -> Result<(), FormatError> {
        let draft = self.folder.take().unwrap_or_default();
        // An empty <HostFolder> is kept; the element itself is required
        let host_folder = draft.host_folder.ok_or(FormatError::MissingHostFolder)?;
        self.config
            .mapped_folders
            .get_or_insert_with(Vec::new)
            .push(MappedFolder {
                host_folder,
                sandbox_folder: draft.sandbox_folder,
                read_only: draft.read_only,
            });
        Ok(())
    }
}

fn invalid(element: &str, value: &str) -> FormatError {
    FormatError::InvalidValue {
        element: element.to_string(),
        value: value.to_string(),
    }
}
