//! Directory listings printed by `xfs_db ... ls`
//!
//! Each row after the header carries five whitespace separated fields:
//!
//! ```text
//! 12         131                regular        0x5a3c1d2e   4 a.txt (good)
//! cookie     inode              type           hash         namelen name...
//! ```
//!
//! The name may contain spaces and is followed by a status word, so it is
//! cut to `namelen` bytes rather than trimmed.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, XfsAidError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileType {
    Directory,
    Regular,
    Other(String),
}

impl FileType {
    pub fn parse(text: &str) -> Self {
        match text {
            "directory" => FileType::Directory,
            "regular" => FileType::Regular,
            other => FileType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FileType::Directory => "directory",
            FileType::Regular => "regular",
            FileType::Other(other) => other,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One name within a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub cookie: u64,
    pub ino: u64,
    pub file_type: FileType,
    pub hash: String,
    /// Name length in bytes as declared by the directory
    pub name_len: usize,
    pub name: String,
    /// Absolute path: parent path joined with `name`
    pub path: String,
    damaged: bool,
}

impl DirectoryEntry {
    /// Parse a listing row found in the directory at `parent`
    pub fn parse(parent: &str, row: &str) -> Result<Self> {
        let malformed = || XfsAidError::ListingParse {
            text: row.to_string(),
        };

        let mut rest = row.trim_start();
        let mut fields = [""; 4];
        for field in fields.iter_mut() {
            let end = rest.find(char::is_whitespace).ok_or_else(malformed)?;
            *field = &rest[..end];
            rest = rest[end..].trim_start();
        }
        let [cookie, ino, file_type, hash] = fields;

        // "<namelen> <name...>": exactly one separator before the payload
        let (name_len, payload) = rest.split_once(' ').ok_or_else(malformed)?;
        let name_len: usize = name_len.parse().map_err(|_| malformed())?;
        let payload = payload.as_bytes();
        let name = String::from_utf8_lossy(&payload[..name_len.min(payload.len())]).into_owned();
        let damaged = !is_plain_name(&name);
        if damaged {
            tracing::warn!("{}: unusable name {:?} in directory listing", parent, name);
        }

        Ok(Self {
            cookie: cookie.parse().map_err(|_| malformed())?,
            ino: ino.parse().map_err(|_| malformed())?,
            file_type: FileType::parse(file_type),
            hash: hash.to_string(),
            name_len,
            path: join_path(parent, &name),
            name,
            damaged,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    /// `.` and `..` never surface from a listing
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    pub fn damaged(&self) -> bool {
        self.damaged
    }

    pub fn mark_damaged(&mut self) {
        self.damaged = true;
    }
}

/// Parse a whole `ls` reply: header line skipped, dot entries dropped
pub fn parse_listing(parent: &str, text: &str) -> Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    for row in text.lines().skip(1) {
        if row.trim().is_empty() {
            continue;
        }
        let entry = DirectoryEntry::parse(parent, row)?;
        tracing::trace!("listing row {:?} => {} ({})", row, entry.path, entry.ino);
        if !entry.is_dot_entry() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// A single path component: non-empty, no separator or NUL
///
/// `.` and `..` pass here; the listing drops them before they reach a path.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\0'])
}

/// Join a directory path and a name with a single separator
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
