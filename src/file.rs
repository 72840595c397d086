//! File and directory creation with the permissions rotated logs need.

use {
    crate::error::{Error, Result},
    std::{
        fs::{DirBuilder, File, OpenOptions},
        io,
        path::Path,
    },
};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) const DEFAULT_DIR_MODE: u32 = 0o755;
pub(crate) const DEFAULT_FILE_MODE: u32 = 0o600;

/// Open options that create files with `mode` (Unix only; ignored elsewhere).
///
/// Files opened through std are close-on-exec on Unix, so log handles never
/// leak into child processes.
pub(crate) fn open_options(mode: u32) -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    options
}

/// Open `path` for appending, creating it with `mode` if absent.
pub(crate) fn open_log_file(path: &Path, mode: u32) -> io::Result<File> {
    open_options(mode).create(true).append(true).open(path)
}

/// Create the directory holding `path` if it doesn't exist.
pub(crate) fn create_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };
    if parent.is_dir() {
        return Ok(());
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DEFAULT_DIR_MODE);
    builder.create(parent).map_err(|source| Error::CreateDirectory {
        path: parent.to_path_buf(),
        source,
    })
}
