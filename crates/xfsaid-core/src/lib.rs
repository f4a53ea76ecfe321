//! Rescue files from a damaged XFS filesystem
//!
//! All metadata (superblocks, inodes, directory listings and block maps)
//! comes from `xfs_db`, which understands XFS far better than this crate
//! ever will. File contents are then read straight off the device, block by
//! block, following the extents `xfs_db` reports.

pub mod config;
pub mod error;
pub mod fs;
pub mod recovery;

pub use config::{OracleConfig, RescueConfig, XFS_DB_ENV};
pub use error::{ConsistencyError, Result, XfsAidError};
pub use fs::xfs::{CommandRunner, DirectoryEntry, Extent, FileType, MetadataOracle, XfsDb};
pub use recovery::{
    BlockMapSummary, DirectoryScanner, FileHandle, FileOutcome, RescueEvent, RescueOrchestrator,
    RescueReport, RescueStatus, RescueTarget,
};
