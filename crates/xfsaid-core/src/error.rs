//! Error taxonomy for oracle queries, reconstruction and rescue

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, XfsAidError>;

#[derive(Debug, Error)]
pub enum XfsAidError {
    /// The device is mounted; nothing may proceed
    #[error("Device {} is a mounted filesystem", .device.display())]
    MountedDevice { device: PathBuf },

    /// The oracle exited non-zero (or was killed by a signal)
    #[error("Failed ({}) to run command: {command}", exit_code(.code))]
    OracleCommand { code: Option<i32>, command: String },

    /// The oracle binary could not be started at all
    #[error("Failed to start {}: {source}", .program.display())]
    OracleSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Illegal AG (count {agcount}) number: {agno}")]
    AgNumberOutOfRange { agno: u32, agcount: u32 },

    #[error("{record} record is missing field '{key}'")]
    MissingField { record: &'static str, key: &'static str },

    #[error("{record} record field '{key}' has invalid value '{value}'")]
    InvalidField {
        record: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("Failed to parse directory row: {text}")]
    ListingParse { text: String },

    #[error("Failed to parse bmap: {text}")]
    BlockmapParse { text: String },

    /// The inode record describes a different inode than the one requested
    #[error("Inode {requested} reports inode number {reported}")]
    InodeMismatch { requested: u64, reported: u64 },

    #[error("Target '{}' already exists", .path.display())]
    TargetExists { path: PathBuf },

    #[error("Directory '{}' is not empty", .path.display())]
    DirectoryNotEmpty { path: PathBuf },

    #[error("Target '{}' is not a directory", .path.display())]
    TargetNotDirectory { path: PathBuf },

    /// A source path that would land outside the rescue target
    #[error("Source path '{path}' escapes target '{}'", .root.display())]
    EscapingPath { path: String, root: PathBuf },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extent map and declared size disagree while copying a file
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("inode {ino} extent {extent} blocksize {actual} (filesystem {expected})")]
    BlocksizeMismatch {
        ino: u64,
        extent: usize,
        expected: u64,
        actual: u64,
    },

    #[error("inode {ino} extent {extent} starts at byte {actual}, expected {expected}")]
    OffsetMismatch {
        ino: u64,
        extent: usize,
        expected: u64,
        actual: u64,
    },

    #[error("inode {ino} copied {copied} bytes (size {size})")]
    SizeMismatch { ino: u64, copied: u64, size: u64 },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
