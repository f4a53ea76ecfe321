use std::path::{Path, PathBuf};

use crate::error::{Result, XfsAidError};

/// Mount tables consulted in order; the first readable one wins
const MOUNT_TABLES: [&str; 2] = ["/proc/self/mounts", "/etc/mtab"];

/// Source column of a mount table, octal escapes (`\040` for space) decoded
pub fn mounted_sources(table: &str) -> Vec<String> {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(unescape_mount_field)
        .collect()
}

fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Whether `device` appears as a mount source, by literal or canonical path
pub fn is_mounted_device(device: &Path) -> Result<bool> {
    let table = MOUNT_TABLES
        .iter()
        .find_map(|table| std::fs::read_to_string(table).ok());
    let Some(table) = table else {
        tracing::warn!("No readable mount table; assuming {} is not mounted", device.display());
        return Ok(false);
    };

    Ok(table_mounts(&table, device))
}

/// Whether any source in `table` names `device`
///
/// Both sides are compared literally and after resolving symlinks, so
/// `/dev/dm-0` matches a table entry for `/dev/mapper/vg-lv`.
pub fn table_mounts(table: &str, device: &Path) -> bool {
    let candidates = with_canonical(device);
    mounted_sources(table).iter().any(|source| {
        with_canonical(Path::new(source))
            .iter()
            .any(|s| candidates.contains(s))
    })
}

fn with_canonical(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize() {
        if canonical != path {
            paths.push(canonical);
        }
    }
    paths
}

/// A rescue target must be absent or an empty directory
pub fn is_empty_directory(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    if !dir.is_dir() {
        return Err(XfsAidError::TargetNotDirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(std::fs::read_dir(dir)?.next().is_none())
}
