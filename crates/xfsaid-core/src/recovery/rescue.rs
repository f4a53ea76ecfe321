//! Copy every healthy file of the filesystem under a target directory
//!
//! Rescue is best effort: each file succeeds or fails on its own and the
//! run carries on. Only the target precondition and an unlistable root stop
//! the whole run.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::{Dumped, FileHandle};
use super::scan::DirectoryScanner;
use crate::config::RescueConfig;
use crate::error::{Result, XfsAidError};
use crate::fs::common::is_empty_directory;
use crate::fs::xfs::{CommandRunner, DirectoryEntry, MetadataOracle};

/// Mirror an absolute source path under `root`
///
/// Only plain components are kept, so repeated separators, `.` and `..`
/// can never lead outside `root`.
pub fn destination(root: &Path, source_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(source_path).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

/// A healthy file paired with where it will be written
pub struct RescueTarget<'a, R> {
    file: FileHandle<'a, R>,
    source_path: String,
    target: PathBuf,
}

impl<'a, R: CommandRunner> RescueTarget<'a, R> {
    pub fn new(file: FileHandle<'a, R>, source_path: impl Into<String>, target: PathBuf) -> Self {
        Self {
            file,
            source_path: source_path.into(),
            target,
        }
    }

    pub fn file(&self) -> &FileHandle<'a, R> {
        &self.file
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Create missing parent directories, then write the file
    pub fn rebuild(&self, digest: bool) -> Result<Dumped> {
        if let Some(parent) = self.target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.file.dump(&self.target, digest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RescueStatus {
    Rescued,
    Failed(String),
}

/// What happened to one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub ino: u64,
    pub source_path: String,
    pub target: PathBuf,
    /// Declared size, 0 when the inode could not be read
    pub size: u64,
    pub bytes_rescued: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub status: RescueStatus,
}

impl FileOutcome {
    pub fn is_rescued(&self) -> bool {
        self.status == RescueStatus::Rescued
    }
}

/// Progress notifications delivered while a rescue runs
#[derive(Debug)]
pub enum RescueEvent<'e> {
    /// About to write `ino` to `target`
    Rebuilding { ino: u64, size: u64, target: &'e Path },
    /// Finished with one file, successfully or not
    Finished(&'e FileOutcome),
}

/// Summary of a whole rescue run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueReport {
    pub session_id: Uuid,
    pub device: PathBuf,
    pub target_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_files: usize,
    pub rescued_files: usize,
    pub failed_files: usize,
    /// Files and directories skipped because their metadata is damaged
    pub damaged_objects: usize,
    pub total_bytes_rescued: u64,
    pub outcomes: Vec<FileOutcome>,
}

impl RescueReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct RescueOrchestrator<'a, R> {
    oracle: &'a MetadataOracle<R>,
    root: PathBuf,
    config: RescueConfig,
}

impl<'a, R: CommandRunner> RescueOrchestrator<'a, R> {
    /// Fails unless `root` is absent or empty; no metadata is queried here
    pub fn new(
        oracle: &'a MetadataOracle<R>,
        root: impl Into<PathBuf>,
        config: RescueConfig,
    ) -> Result<Self> {
        let root = root.into();
        if !is_empty_directory(&root)? {
            return Err(XfsAidError::DirectoryNotEmpty { path: root });
        }
        Ok(Self {
            oracle,
            root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_for(&self, entry: &DirectoryEntry) -> Result<RescueTarget<'a, R>> {
        let target = destination(&self.root, &entry.path);
        if target == self.root || !target.starts_with(&self.root) {
            return Err(XfsAidError::EscapingPath {
                path: entry.path.clone(),
                root: self.root.clone(),
            });
        }
        let file = FileHandle::open(self.oracle, entry.ino)?;
        Ok(RescueTarget::new(file, entry.path.clone(), target))
    }

    /// Walk the tree and rebuild every healthy file
    pub fn run<F>(&self, mut on_event: F) -> Result<RescueReport>
    where
        F: FnMut(RescueEvent<'_>),
    {
        let started_at = Utc::now();
        let scanner = DirectoryScanner::new(self.oracle);
        let mut outcomes = Vec::new();
        let mut damaged_objects = 0;

        tracing::info!(
            "Rescuing {} into {}",
            self.oracle.device().display(),
            self.root.display()
        );

        for entry in scanner.objects() {
            if entry.damaged() {
                damaged_objects += 1;
                continue;
            }
            if !entry.is_file() {
                continue;
            }

            let outcome = match self.target_for(&entry) {
                Ok(target) => {
                    on_event(RescueEvent::Rebuilding {
                        ino: entry.ino,
                        size: target.file().size(),
                        target: target.target(),
                    });
                    self.rebuild(&target)
                }
                Err(e) => FileOutcome {
                    ino: entry.ino,
                    source_path: entry.path.clone(),
                    target: destination(&self.root, &entry.path),
                    size: 0,
                    bytes_rescued: 0,
                    sha256: None,
                    status: RescueStatus::Failed(e.to_string()),
                },
            };
            if !outcome.is_rescued() {
                tracing::warn!("Failed to rebuild inode {} ({})", outcome.ino, outcome.source_path);
            }
            on_event(RescueEvent::Finished(&outcome));
            outcomes.push(outcome);
        }

        if let Some(e) = scanner.take_root_failure() {
            return Err(e);
        }

        let rescued_files = outcomes.iter().filter(|o| o.is_rescued()).count();
        let report = RescueReport {
            session_id: Uuid::new_v4(),
            device: self.oracle.device().to_path_buf(),
            target_root: self.root.clone(),
            started_at,
            finished_at: Utc::now(),
            total_files: outcomes.len(),
            rescued_files,
            failed_files: outcomes.len() - rescued_files,
            damaged_objects,
            total_bytes_rescued: outcomes.iter().map(|o| o.bytes_rescued).sum(),
            outcomes,
        };

        tracing::info!(
            "Rescue complete: {}/{} files rescued, {} bytes, {} damaged objects skipped",
            report.rescued_files,
            report.total_files,
            report.total_bytes_rescued,
            report.damaged_objects
        );
        Ok(report)
    }

    fn rebuild(&self, target: &RescueTarget<'a, R>) -> FileOutcome {
        let file = target.file();
        let (bytes_rescued, sha256, status) = match target.rebuild(self.config.compute_digest) {
            Ok(dumped) => (dumped.bytes, dumped.sha256, RescueStatus::Rescued),
            Err(e) => (0, None, RescueStatus::Failed(e.to_string())),
        };
        FileOutcome {
            ino: file.ino(),
            source_path: target.source_path().to_string(),
            target: target.target().to_path_buf(),
            size: file.size(),
            bytes_rescued,
            sha256,
            status,
        }
    }
}
