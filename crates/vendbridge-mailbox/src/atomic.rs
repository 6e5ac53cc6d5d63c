//! Temp-write-then-rename file publication.
//!
//! A record is serialized into a sibling `<name>.tmp` file, flushed to disk,
//! then renamed over the final path. Rename within one directory is atomic,
//! so a concurrent reader sees either the previous state or the complete new
//! file, never a prefix of it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{MailboxError, MailboxResult};
use vendbridge_core::constants::TEMP_SUFFIX;

/// Sibling temporary path used while `path` is being written.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Serialize `value` as pretty JSON and publish it atomically at `path`.
///
/// # Errors
///
/// Returns `MailboxError::Serialize` if the value cannot be serialized and
/// `MailboxError::Io` if writing or renaming fails. On failure the
/// temporary file is removed best-effort and `path` is left untouched.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> MailboxResult<()> {
    let body = serde_json::to_vec_pretty(value)?;
    let tmp_path = temp_path_for(path);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(MailboxError::io(path, err));
    }

    if let Some(dir) = path.parent()
        && let Ok(handle) = File::open(dir)
    {
        let _ = handle.sync_all();
    }

    Ok(())
}
