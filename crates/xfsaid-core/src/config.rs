//! Session and rescue configuration

use std::path::PathBuf;

/// Environment variable naming the `xfs_db` binary to use
pub const XFS_DB_ENV: &str = "XFS_AID_XFS_DB";

/// How the metadata oracle is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Path (or bare name resolved through `PATH`) of the `xfs_db` binary
    pub program: PathBuf,
    /// Pass `-r` so the oracle opens the device read-only
    pub read_only: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("xfs_db"),
            read_only: true,
        }
    }
}

impl OracleConfig {
    /// Defaults, with the program overridden by `XFS_AID_XFS_DB` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(program) = std::env::var_os(XFS_DB_ENV).filter(|p| !p.is_empty()) {
            config.program = PathBuf::from(program);
        }
        config
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

/// Rescue behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueConfig {
    /// Hash every rescued file with SHA-256 while it is copied
    pub compute_digest: bool,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            compute_digest: true,
        }
    }
}
