//! Filesystem queries used by the path resolver

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

#[cfg(not(windows))]
use crate::constants::resolver::{MOUNT_TABLE, POSIX_VOLUME_PREFIXES};

/// Minimal read-only view of the filesystem
///
/// Paths are plain strings in the resolver's `PathStyle`. Each method is a
/// single query; errors are reported, never retried.
pub trait Filesystem {
    fn path_exists(&self, path: &str) -> bool;

    fn is_directory(&self, path: &str) -> bool;

    /// Names (not full paths) of the immediate subdirectories of `path`
    fn list_subdirectories(&self, path: &str) -> io::Result<Vec<String>>;

    /// Mounted volume roots
    fn list_volumes(&self) -> io::Result<Vec<String>>;
}

/// The machine's real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).try_exists().unwrap_or(false)
    }

    fn is_directory(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn list_subdirectories(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(path = %path, error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let is_dir = file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir());
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    #[cfg(windows)]
    fn list_volumes(&self) -> io::Result<Vec<String>> {
        Ok((b'A'..=b'Z')
            .map(|letter| format!("{}:\\", letter as char))
            .filter(|root| Path::new(root).exists())
            .collect())
    }

    #[cfg(not(windows))]
    fn list_volumes(&self) -> io::Result<Vec<String>> {
        let table = fs::read_to_string(MOUNT_TABLE)?;
        Ok(parse_mount_table(&table))
    }
}

/// Root plus user-visible mount points from a `/proc/mounts` style table
#[cfg(not(windows))]
fn parse_mount_table(table: &str) -> Vec<String> {
    let mut volumes = vec!["/".to_string()];
    for line in table.lines() {
        let Some(mount_point) = line.split_whitespace().nth(1) else {
            continue;
        };
        let mount_point = unescape_mount_field(mount_point);
        if POSIX_VOLUME_PREFIXES.iter().any(|p| mount_point.starts_with(p))
            && !volumes.contains(&mount_point)
        {
            volumes.push(mount_point);
        }
    }
    volumes
}

/// Decode the `\040`-style octal escapes the kernel uses for spaces, tabs etc.
#[cfg(not(windows))]
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = bytes.get(i + 1..i + 4).filter(|digits| {
            bytes[i] == b'\\' && digits.iter().all(|b| (b'0'..=b'7').contains(b))
        });
        let code = octal.map(|d| {
            u32::from(d[0] - b'0') * 64 + u32::from(d[1] - b'0') * 8 + u32::from(d[2] - b'0')
        });
        match code.and_then(|c| u8::try_from(c).ok()) {
            Some(byte) => {
                out.push(byte);
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_lists_only_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();

        let mut names = HostFilesystem
            .list_subdirectories(dir.path().to_str().unwrap())
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_host_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(HostFilesystem.list_subdirectories(missing.to_str().unwrap()).is_err());
        assert!(!HostFilesystem.path_exists(missing.to_str().unwrap()));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_parse_mount_table_keeps_user_volumes() {
        let table = "\
/dev/sda1 / ext4 rw 0 0
proc /proc proc rw 0 0
/dev/sdb1 /media/me/USB\\040STICK vfat rw 0 0
/dev/sdc1 /mnt/data ext4 rw 0 0
tmpfs /run/user/1000 tmpfs rw 0 0
";
        assert_eq!(
            parse_mount_table(table),
            vec!["/", "/media/me/USB STICK", "/mnt/data"]
        );
    }
}
