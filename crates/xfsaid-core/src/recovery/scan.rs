//! Depth-first walk of the directory tree with damage classification
//!
//! Entries are produced one at a time from an explicit stack of pending
//! listings. A directory's own listing is attempted before the directory is
//! yielded, so its damage flag is final when the caller sees it, and its
//! children follow immediately after it (pre-order).
//!
//! A walk is single pass: damage depends on the queries made during that
//! exact walk, so every view starts a new one.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::iter::Filter;
use std::vec::IntoIter;

use super::file::FileHandle;
use crate::error::XfsAidError;
use crate::fs::xfs::{CommandRunner, DirectoryEntry, MetadataOracle};

/// Where every walk starts
pub const ROOT_PATH: &str = "/";

/// Minimum width of the inode column in [`DirectoryScanner::show`]
const MIN_INO_WIDTH: usize = 10;

pub struct DirectoryScanner<'a, R> {
    oracle: &'a MetadataOracle<R>,
    max_ino: Cell<u64>,
    root_failure: RefCell<Option<XfsAidError>>,
}

impl<'a, R: CommandRunner> DirectoryScanner<'a, R> {
    pub fn new(oracle: &'a MetadataOracle<R>) -> Self {
        Self {
            oracle,
            max_ino: Cell::new(0),
            root_failure: RefCell::new(None),
        }
    }

    pub fn oracle(&self) -> &'a MetadataOracle<R> {
        self.oracle
    }

    /// Every directory and file, damaged or not
    pub fn objects(&self) -> Objects<'_, R> {
        Objects {
            scanner: self,
            stack: Vec::new(),
            descended: HashSet::new(),
            started: false,
        }
    }

    /// Objects whose metadata is damaged
    pub fn damaged(&self) -> View<'_, R> {
        let predicate: fn(&DirectoryEntry) -> bool = DirectoryEntry::damaged;
        self.objects().filter(predicate)
    }

    /// Regular files whose extents cover their declared size
    pub fn files(&self) -> View<'_, R> {
        let predicate: fn(&DirectoryEntry) -> bool = is_healthy_file;
        self.objects().filter(predicate)
    }

    /// Largest inode number seen so far
    pub fn max_ino(&self) -> u64 {
        self.max_ino.get()
    }

    pub fn ino_width(&self) -> usize {
        self.max_ino.get().to_string().len().max(MIN_INO_WIDTH)
    }

    /// `<ino> <type> <path>` with the inode column padded to [`Self::ino_width`]
    pub fn show(&self, entry: &DirectoryEntry) -> String {
        format!(
            "{:<width$} {:<10} {}",
            entry.ino,
            entry.file_type.as_str(),
            entry.path,
            width = self.ino_width()
        )
    }

    /// Why the last walk yielded nothing, if the root could not be listed
    pub fn take_root_failure(&self) -> Option<XfsAidError> {
        self.root_failure.borrow_mut().take()
    }

    fn observe(&self, ino: u64) {
        if ino > self.max_ino.get() {
            self.max_ino.set(ino);
        }
    }

    /// Flag a regular file whose block map falls short or cannot be read
    fn classify_file(&self, entry: &mut DirectoryEntry) {
        match FileHandle::open(self.oracle, entry.ino).and_then(|file| file.is_damaged()) {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!("{} (inode {}): extents short of size", entry.path, entry.ino);
                entry.mark_damaged();
            }
            Err(e) => {
                tracing::warn!("{} (inode {}): {}", entry.path, entry.ino, e);
                entry.mark_damaged();
            }
        }
    }
}

/// A filtered walk
pub type View<'s, R> = Filter<Objects<'s, R>, fn(&DirectoryEntry) -> bool>;

fn is_healthy_file(entry: &DirectoryEntry) -> bool {
    entry.is_file() && !entry.damaged()
}

/// Lazy pre-order walk produced by [`DirectoryScanner::objects`]
pub struct Objects<'s, R> {
    scanner: &'s DirectoryScanner<'s, R>,
    stack: Vec<IntoIter<DirectoryEntry>>,
    /// Directory inodes already listed during this walk
    descended: HashSet<u64>,
    started: bool,
}

impl<R: CommandRunner> Iterator for Objects<'_, R> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<DirectoryEntry> {
        let scanner = self.scanner;
        if !self.started {
            self.started = true;
            match scanner.oracle.list_path(ROOT_PATH) {
                Ok(children) => self.stack.push(children.into_iter()),
                Err(e) => {
                    tracing::error!("Cannot list {}: {}", ROOT_PATH, e);
                    *scanner.root_failure.borrow_mut() = Some(e);
                    return None;
                }
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(mut entry) = frame.next() else {
                self.stack.pop();
                continue;
            };
            scanner.observe(entry.ino);

            // an unusable name is never descended into or classified
            if entry.damaged() {
                return Some(entry);
            }

            if entry.is_dir() {
                if !self.descended.insert(entry.ino) {
                    tracing::warn!(
                        "{} (inode {}): directory already visited, cycle in tree",
                        entry.path,
                        entry.ino
                    );
                    entry.mark_damaged();
                    return Some(entry);
                }
                match scanner.oracle.list_inode(entry.ino, &entry.path) {
                    Ok(children) => self.stack.push(children.into_iter()),
                    Err(e) => {
                        tracing::warn!("{} (inode {}): {}", entry.path, entry.ino, e);
                        entry.mark_damaged();
                    }
                }
            } else if entry.is_file() {
                scanner.classify_file(&mut entry);
            }
            return Some(entry);
        }
    }
}
