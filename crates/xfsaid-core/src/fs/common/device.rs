use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A block device or image file opened read-only
///
/// Recovery never writes to the source, so there is no way to obtain a
/// writable handle through this type.
pub struct SourceDevice {
    file: File,
    path: PathBuf,
}

impl SourceDevice {
    /// Open a block device or image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        tracing::debug!("Opened {} read-only", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly `buf.len()` bytes at a block offset
    pub fn read_block(&mut self, block_number: u64, block_size: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(block_number * block_size))?;
        self.file.read_exact(buf)?;
        Ok(())
    }
}

impl Read for SourceDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for SourceDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
