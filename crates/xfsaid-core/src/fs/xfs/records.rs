//! `key = value` records printed by `xfs_db ... print`

use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, XfsAidError};

/// XFS superblock magic as `xfs_db` prints it ("XFSB")
pub const XFS_SB_MAGIC: &str = "0x58465342";

/// Block sizes XFS can be formatted with
pub const XFS_MIN_BLOCKSIZE: u64 = 512;
pub const XFS_MAX_BLOCKSIZE: u64 = 65536;

/// Raw `key = value` lines, split at the first `=` with both sides trimmed
#[derive(Debug, Clone, Default)]
pub struct KeyValues {
    fields: HashMap<String, String>,
}

impl KeyValues {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, record: &'static str, key: &'static str) -> Result<&str> {
        self.get(key)
            .ok_or(XfsAidError::MissingField { record, key })
    }

    fn require_parsed<T: FromStr>(&self, record: &'static str, key: &'static str) -> Result<T> {
        let value = self.require(record, key)?;
        value.parse().map_err(|_| XfsAidError::InvalidField {
            record,
            key,
            value: value.to_string(),
        })
    }
}

/// Allocation group superblock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Superblock {
    pub magicnum: String,
    pub blocksize: u64,
    pub agcount: u32,
    pub agblocks: u64,
}

impl Superblock {
    const RECORD: &'static str = "superblock";

    pub fn parse(text: &str) -> Result<Self> {
        let kv = KeyValues::parse(text);
        let blocksize: u64 = kv.require_parsed(Self::RECORD, "blocksize")?;
        if !blocksize.is_power_of_two()
            || !(XFS_MIN_BLOCKSIZE..=XFS_MAX_BLOCKSIZE).contains(&blocksize)
        {
            return Err(XfsAidError::InvalidField {
                record: Self::RECORD,
                key: "blocksize",
                value: blocksize.to_string(),
            });
        }
        Ok(Self {
            magicnum: kv.require(Self::RECORD, "magicnum")?.to_string(),
            blocksize,
            agcount: kv.require_parsed(Self::RECORD, "agcount")?,
            agblocks: kv.require_parsed(Self::RECORD, "agblocks")?,
        })
    }

    pub fn is_xfs(&self) -> bool {
        self.magicnum.eq_ignore_ascii_case(XFS_SB_MAGIC)
    }
}

/// The parts of an inode core the rescue relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inode {
    /// Declared file size in bytes (`core.size`)
    pub size: u64,
    /// Inode number recorded in the v3 inode header (`v3.inumber`)
    pub inumber: u64,
}

impl Inode {
    const RECORD: &'static str = "inode";

    pub fn parse(text: &str) -> Result<Self> {
        let kv = KeyValues::parse(text);
        Ok(Self {
            size: kv.require_parsed(Self::RECORD, "core.size")?,
            inumber: kv.require_parsed(Self::RECORD, "v3.inumber")?,
        })
    }
}
