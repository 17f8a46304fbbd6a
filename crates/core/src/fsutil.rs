// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic filesystem helpers shared across crates.

use std::io;
use std::path::Path;

/// Write `contents` to `path` atomically (write-to-temp + rename).
///
/// The temp file lives in the same directory as the target so the rename
/// never crosses a filesystem boundary. Readers either see the old file
/// or the complete new one, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("no parent dir: {}", path.display()))
    })?;
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("bad file name: {}", path.display()))
    })?;
    let tmp = dir.join(format!(".{}.tmp-{}", file_name, std::process::id()));
    std::fs::write(&tmp, contents)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Leave no temp litter behind on failure.
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "fsutil_tests.rs"]
mod tests;
