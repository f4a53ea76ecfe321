//! Rebuild a file's bytes from its block map
//!
//! Extents must tile the file from offset 0 without gaps or overlaps; the
//! copy stops at the declared size and must land exactly on it. Output is
//! flushed after every block so an interrupted copy leaves a truncated but
//! inspectable file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{ConsistencyError, Result, XfsAidError};
use crate::fs::common::SourceDevice;
use crate::fs::xfs::{CommandRunner, Extent, Inode, MetadataOracle};

/// Whether the extents hold at least `size` bytes
pub fn extents_cover(extents: &[Extent], blocksize: u64, size: u64) -> bool {
    let blocks: u64 = extents.iter().map(|e| e.count).sum();
    blocks.saturating_mul(blocksize) >= size
}

/// Copy `size` bytes described by `extents` from `device` into `out`
///
/// Returns the number of bytes written, which on success is always `size`.
pub fn reconstruct<D, W>(
    ino: u64,
    size: u64,
    blocksize: u64,
    extents: &[Extent],
    device: &mut D,
    out: &mut W,
) -> Result<u64>
where
    D: Read + Seek,
    W: Write,
{
    let mut offset = 0u64;
    let mut buf = vec![0u8; blocksize as usize];

    for extent in extents {
        if extent.blocksize != blocksize {
            return Err(ConsistencyError::BlocksizeMismatch {
                ino,
                extent: extent.index,
                expected: blocksize,
                actual: extent.blocksize,
            }
            .into());
        }
        let start = extent.startoffset.saturating_mul(blocksize);
        if start != offset {
            return Err(ConsistencyError::OffsetMismatch {
                ino,
                extent: extent.index,
                expected: offset,
                actual: start,
            }
            .into());
        }

        device.seek(SeekFrom::Start(extent.startblock.saturating_mul(blocksize)))?;
        for _ in 0..extent.count {
            let len = (size - offset).min(blocksize) as usize;
            if len > 0 {
                device.read_exact(&mut buf[..len])?;
                out.write_all(&buf[..len])?;
                offset += len as u64;
            }
            out.flush()?;
        }
        tracing::trace!("inode {} extent {} copied, offset {}", ino, extent, offset);
    }

    if offset != size {
        return Err(ConsistencyError::SizeMismatch {
            ino,
            copied: offset,
            size,
        }
        .into());
    }
    Ok(offset)
}

/// `<size> bytes in <n> extents <blocks> blocks`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapSummary {
    pub size: u64,
    pub extents: usize,
    pub blocks: u64,
}

impl BlockMapSummary {
    pub fn new(size: u64, extents: &[Extent]) -> Self {
        Self {
            size,
            extents: extents.len(),
            blocks: extents.iter().map(|e| e.count).sum(),
        }
    }
}

impl fmt::Display for BlockMapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in {} extents {} blocks",
            self.size, self.extents, self.blocks
        )
    }
}

/// Result of writing a file to its target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dumped {
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the written bytes, when requested
    pub sha256: Option<String>,
}

/// Forwards writes and hashes whatever was accepted
struct HashingWriter<W> {
    inner: W,
    hasher: Option<Sha256>,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A regular file resolved through the oracle
///
/// Holds the inode record; the block map is fetched again on every request.
pub struct FileHandle<'a, R> {
    oracle: &'a MetadataOracle<R>,
    ino: u64,
    inode: Inode,
}

impl<'a, R: CommandRunner> FileHandle<'a, R> {
    pub fn open(oracle: &'a MetadataOracle<R>, ino: u64) -> Result<Self> {
        let inode = oracle.inode(ino)?;
        if inode.inumber != ino {
            return Err(XfsAidError::InodeMismatch {
                requested: ino,
                reported: inode.inumber,
            });
        }
        Ok(Self { oracle, ino, inode })
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    /// Declared size in bytes
    pub fn size(&self) -> u64 {
        self.inode.size
    }

    pub fn oracle(&self) -> &'a MetadataOracle<R> {
        self.oracle
    }

    pub fn extents(&self) -> Result<Vec<Extent>> {
        self.oracle.extents(self.ino)
    }

    /// Extents cover the declared size; does not look at block contents
    pub fn is_good(&self) -> Result<bool> {
        let blocksize = self.oracle.blocksize()?;
        Ok(extents_cover(&self.extents()?, blocksize, self.size()))
    }

    pub fn is_damaged(&self) -> Result<bool> {
        Ok(!self.is_good()?)
    }

    pub fn summary(&self) -> Result<BlockMapSummary> {
        Ok(BlockMapSummary::new(self.size(), &self.extents()?))
    }

    /// Copy the file's bytes from `device` into `out`
    pub fn copy_to<D: Read + Seek, W: Write>(&self, device: &mut D, out: &mut W) -> Result<u64> {
        let blocksize = self.oracle.blocksize()?;
        let extents = self.extents()?;
        reconstruct(self.ino, self.size(), blocksize, &extents, device, out)
    }

    /// Copy the file's bytes from the session's device into `out`
    pub fn raw<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut device = SourceDevice::open(self.oracle.device())?;
        self.copy_to(&mut device, out)
    }

    /// Write the file to `target`, which must not exist yet
    ///
    /// On failure the partially written target is removed before the error
    /// is returned.
    pub fn dump(&self, target: &Path, digest: bool) -> Result<Dumped> {
        if target.symlink_metadata().is_ok() {
            return Err(XfsAidError::TargetExists {
                path: target.to_path_buf(),
            });
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => XfsAidError::TargetExists {
                    path: target.to_path_buf(),
                },
                _ => XfsAidError::Io(e),
            })?;

        match self.write_target(file, digest) {
            Ok(dumped) => Ok(dumped),
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(target) {
                    tracing::warn!(
                        "Could not remove partial {}: {}",
                        target.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    fn write_target(&self, file: File, digest: bool) -> Result<Dumped> {
        let mut out = HashingWriter {
            inner: file,
            hasher: digest.then(Sha256::new),
        };
        let bytes = self.raw(&mut out)?;
        out.inner.sync_all()?;
        Ok(Dumped {
            bytes,
            sha256: out.hasher.map(|h| format!("{:x}", h.finalize())),
        })
    }
}
