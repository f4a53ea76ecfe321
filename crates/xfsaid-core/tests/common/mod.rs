//! Scripted oracle and disk image fixtures shared by the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use tempfile::NamedTempFile;
use xfsaid_core::{CommandRunner, Result, XfsAidError};

pub const BLOCKSIZE: u64 = 512;
pub const IMAGE_BLOCKS: u64 = 64;

/// Replies keyed by the chained commands joined with "; "
///
/// Unknown commands fail the way a non-zero `xfs_db` exit would. Every
/// invocation is recorded.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&mut self, commands: &str, text: impl Into<String>) -> &mut Self {
        self.replies.insert(commands.to_string(), text.into());
        self
    }

    pub fn forget(&mut self, commands: &str) -> &mut Self {
        self.replies.remove(commands);
        self
    }

    pub fn superblock(&mut self, blocksize: u64) -> &mut Self {
        self.reply(
            "sb 0; print",
            format!("magicnum = 0x58465342\nblocksize = {blocksize}\nagcount = 1\nagblocks = {IMAGE_BLOCKS}\n"),
        )
    }

    /// A regular file: its inode record plus its block map
    ///
    /// `extents` are `(startoffset, startblock, count)` triples.
    pub fn file(&mut self, ino: u64, size: u64, extents: &[(u64, u64, u64)]) -> &mut Self {
        self.reply(
            &format!("inode {ino}; print"),
            format!("core.size = {size}\nv3.inumber = {ino}\n"),
        );
        let bmap: String = extents
            .iter()
            .map(|(offset, block, count)| {
                format!("data offset {offset} startblock {block} (0/{block}) count {count} flag 0\n")
            })
            .collect();
        self.reply(&format!("inode {ino}; bmap"), bmap)
    }

    /// A directory listing reached by inode
    pub fn dir(&mut self, ino: u64, path: &str, rows: &[(u64, &str, &str)]) -> &mut Self {
        self.reply(&format!("inode {ino}; ls"), listing(path, rows))
    }

    pub fn root(&mut self, rows: &[(u64, &str, &str)]) -> &mut Self {
        self.reply("ls /", listing("/", rows))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, commands: &[&str]) -> Result<String> {
        let key = commands.join("; ");
        self.calls.borrow_mut().push(key.clone());
        match self.replies.get(&key) {
            Some(reply) => Ok(reply.clone()),
            None => Err(XfsAidError::OracleCommand {
                code: Some(1),
                command: format!("xfs_db -r disk.img -c '{}'", commands.join("' -c '")),
            }),
        }
    }
}

/// `xfs_db ls` output: a header, the dot entries, then one row per child
fn listing(path: &str, rows: &[(u64, &str, &str)]) -> String {
    let mut text = format!("{path}:\n");
    text.push_str("8          128                directory    0x0000002e   1 . (good)\n");
    text.push_str("10         128                directory    0x0000172e   2 .. (good)\n");
    for (i, (ino, kind, name)) in rows.iter().enumerate() {
        text.push_str(&format!(
            "{:<10} {:<18} {:<12} 0x{:08x}   {} {} (good)\n",
            12 + i * 4,
            ino,
            kind,
            i,
            name.len(),
            name
        ));
    }
    text
}

/// Image of [`IMAGE_BLOCKS`] blocks where every byte of block `n` is `n`
pub fn image() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for n in 0..IMAGE_BLOCKS {
        file.write_all(&vec![n as u8; BLOCKSIZE as usize]).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Bytes the image holds for `size` bytes spread over `blocks`
pub fn expected_bytes(blocks: &[u64], size: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = blocks
        .iter()
        .flat_map(|&n| std::iter::repeat(n as u8).take(BLOCKSIZE as usize))
        .collect();
    bytes.truncate(size);
    bytes
}

/// The reference tree
///
/// ```text
/// /            (128)
/// ├── a/       (200)
/// │   ├── b/   (201, listing fails)
/// │   └── x    (202, 100 bytes)
/// ├── a.txt    (131, 2500 bytes over 3 + 2 blocks)
/// └── big.bin  (132, 5000 bytes over 5 blocks, damaged)
/// ```
pub fn reference_tree() -> ScriptedRunner {
    let mut runner = ScriptedRunner::new();
    runner
        .superblock(BLOCKSIZE)
        .root(&[(200, "directory", "a"), (131, "regular", "a.txt"), (132, "regular", "big.bin")])
        .dir(200, "/a", &[(201, "directory", "b"), (202, "regular", "x")])
        .file(131, 2500, &[(0, 10, 3), (3, 20, 2)])
        .file(132, 5000, &[(0, 40, 5)])
        .file(202, 100, &[(0, 30, 1)]);
    runner
}
