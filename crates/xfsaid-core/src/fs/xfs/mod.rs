//! XFS metadata through the `xfs_db` oracle

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod bmap;
mod listing;
mod records;
mod xfs_db;

pub use bmap::{parse_block_map, Extent};
pub use listing::{join_path, parse_listing, DirectoryEntry, FileType};
pub use records::{Inode, KeyValues, Superblock, XFS_SB_MAGIC};
pub use xfs_db::XfsDb;

use crate::config::OracleConfig;
use crate::error::{Result, XfsAidError};
use crate::fs::common::is_mounted_device;

/// Executes one oracle invocation made of several chained commands
///
/// `run(&["inode 131", "bmap"])` corresponds to
/// `xfs_db <device> -c 'inode 131' -c 'bmap'`.
pub trait CommandRunner {
    fn run(&self, commands: &[&str]) -> Result<String>;
}

/// One metadata session against one device
///
/// Superblocks and inodes are cached for the lifetime of the session;
/// listings and block maps are always queried afresh.
pub struct MetadataOracle<R = XfsDb> {
    device: PathBuf,
    runner: R,
    superblocks: RefCell<HashMap<u32, Superblock>>,
    inodes: RefCell<HashMap<u64, Inode>>,
}

impl MetadataOracle<XfsDb> {
    /// Open a session on an unmounted device through `xfs_db`
    pub fn open(device: impl AsRef<Path>, config: OracleConfig) -> Result<Self> {
        let device = device.as_ref();
        if is_mounted_device(device)? {
            return Err(XfsAidError::MountedDevice {
                device: device.to_path_buf(),
            });
        }
        tracing::info!("Opening XFS session on {}", device.display());
        Ok(Self::with_runner(device, XfsDb::new(device, config)))
    }
}

impl<R: CommandRunner> MetadataOracle<R> {
    /// Session over an arbitrary runner; no mount check is made
    pub fn with_runner(device: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            device: device.into(),
            runner,
            superblocks: RefCell::new(HashMap::new()),
            inodes: RefCell::new(HashMap::new()),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Superblock of allocation group `agno`; AG 0 is the primary
    pub fn superblock(&self, agno: u32) -> Result<Superblock> {
        if agno != 0 {
            let agcount = self.agcount()?;
            if agno >= agcount {
                return Err(XfsAidError::AgNumberOutOfRange { agno, agcount });
            }
        }
        if let Some(sb) = self.superblocks.borrow().get(&agno) {
            return Ok(sb.clone());
        }

        let reply = self.runner.run(&[format!("sb {agno}").as_str(), "print"])?;
        let sb = Superblock::parse(&reply)?;
        if agno == 0 && !sb.is_xfs() {
            tracing::warn!(
                "Primary superblock magic {} is not {}",
                sb.magicnum,
                XFS_SB_MAGIC
            );
        }
        tracing::debug!("AG {} superblock: {:?}", agno, sb);
        self.superblocks.borrow_mut().insert(agno, sb.clone());
        Ok(sb)
    }

    pub fn primary_superblock(&self) -> Result<Superblock> {
        self.superblock(0)
    }

    pub fn blocksize(&self) -> Result<u64> {
        Ok(self.primary_superblock()?.blocksize)
    }

    pub fn agcount(&self) -> Result<u32> {
        Ok(self.primary_superblock()?.agcount)
    }

    pub fn inode(&self, ino: u64) -> Result<Inode> {
        if let Some(inode) = self.inodes.borrow().get(&ino) {
            return Ok(inode.clone());
        }

        let reply = self.runner.run(&[format!("inode {ino}").as_str(), "print"])?;
        let inode = Inode::parse(&reply)?;
        tracing::debug!("inode {}: {:?}", ino, inode);
        self.inodes.borrow_mut().insert(ino, inode.clone());
        Ok(inode)
    }

    /// List the directory at `path`
    pub fn list_path(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let reply = self.runner.run(&[format!("ls {path}").as_str()])?;
        parse_listing(path, &reply)
    }

    /// List the directory inode `ino`, whose absolute path is `path`
    pub fn list_inode(&self, ino: u64, path: &str) -> Result<Vec<DirectoryEntry>> {
        let reply = self.runner.run(&[format!("inode {ino}").as_str(), "ls"])?;
        parse_listing(path, &reply)
    }

    /// Block map of inode `ino`, never cached
    pub fn extents(&self, ino: u64) -> Result<Vec<Extent>> {
        let blocksize = self.blocksize()?;
        let reply = self.runner.run(&[format!("inode {ino}").as_str(), "bmap"])?;
        parse_block_map(blocksize, &reply)
    }
}
