//! Rotation rules: when to rotate, how to name the backup, and which backups
//! to discard.

mod daily;
mod size_limit;

pub use {daily::DailyRotateRule, size_limit::SizeLimitRotateRule};

use {
    crate::error::{Error, Result},
    regex::Regex,
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
};

pub(crate) const GZIP_EXT: &str = ".gz";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const MEGABYTE: u64 = 1024 * 1024;

/// The capability set the rotating writer needs from a rotation policy.
///
/// The writer thread owns the rule: it calls [`shall_rotate`] before every
/// write and [`mark_rotated`] after every successful rotation. The
/// post-rotation pipeline works on a clone, so cleanup sees a snapshot of the
/// rule taken when the rotation happened.
///
/// [`shall_rotate`]: RotateRule::shall_rotate
/// [`mark_rotated`]: RotateRule::mark_rotated
pub trait RotateRule {
    /// The name the active file is renamed to on rotation. Does not mutate the
    /// rule.
    fn backup_file_name(&self) -> PathBuf;

    /// Records that a rotation just happened.
    fn mark_rotated(&mut self);

    /// Backups eligible for deletion under the rule's retention policy.
    fn outdated_files(&self) -> Result<Vec<PathBuf>>;

    /// Whether writing `write_len` more bytes to a file already holding
    /// `current_size` bytes must first rotate it. Must not have side effects.
    fn shall_rotate(&self, current_size: u64, write_len: usize) -> bool;
}

/// Defines size thresholds for rotating log files in various units.
///
/// ```
/// use rotatelog::{RotateRule, RotationSize, SizeLimitRotateRule};
///
/// let rule = SizeLimitRotateRule::new("logs/app.log", "-", 7, 0, 5, true)
///     .with_max_size(RotationSize::KB(512));
/// assert!(!rule.shall_rotate(512 * 1024 - 1, 1));
/// assert!(rule.shall_rotate(512 * 1024, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the size in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(MEGABYTE),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * MEGABYTE),
        }
    }
}

/// The built-in rules as one type, as produced by
/// [`RotateConfig::rotation_rule`](crate::RotateConfig::rotation_rule).
#[derive(Debug, Clone)]
pub enum RotationRule {
    /// Rotate once per calendar day.
    Daily(DailyRotateRule),
    /// Rotate when the file would grow past a byte budget.
    SizeLimit(SizeLimitRotateRule),
}

impl RotateRule for RotationRule {
    fn backup_file_name(&self) -> PathBuf {
        match self {
            RotationRule::Daily(rule) => rule.backup_file_name(),
            RotationRule::SizeLimit(rule) => rule.backup_file_name(),
        }
    }

    fn mark_rotated(&mut self) {
        match self {
            RotationRule::Daily(rule) => rule.mark_rotated(),
            RotationRule::SizeLimit(rule) => rule.mark_rotated(),
        }
    }

    fn outdated_files(&self) -> Result<Vec<PathBuf>> {
        match self {
            RotationRule::Daily(rule) => rule.outdated_files(),
            RotationRule::SizeLimit(rule) => rule.outdated_files(),
        }
    }

    fn shall_rotate(&self, current_size: u64, write_len: usize) -> bool {
        match self {
            RotationRule::Daily(rule) => rule.shall_rotate(current_size, write_len),
            RotationRule::SizeLimit(rule) => rule.shall_rotate(current_size, write_len),
        }
    }
}

impl From<DailyRotateRule> for RotationRule {
    fn from(rule: DailyRotateRule) -> Self {
        RotationRule::Daily(rule)
    }
}

impl From<SizeLimitRotateRule> for RotationRule {
    fn from(rule: SizeLimitRotateRule) -> Self {
        RotationRule::SizeLimit(rule)
    }
}

/// The directory holding `filename`; `.` for bare file names.
pub(crate) fn parent_dir(filename: &Path) -> PathBuf {
    match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `backup`, or its gzipped form, is already on disk.
pub(crate) fn backup_exists(backup: &Path) -> bool {
    let mut compressed = backup.as_os_str().to_owned();
    compressed.push(GZIP_EXT);
    backup.exists() || Path::new(&compressed).exists()
}

/// List the regular files in `directory` whose names match `pattern`, sorted
/// by name. A missing directory has no backups.
pub(crate) fn list_backups(directory: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::ListBackups {
                path: directory.to_path_buf(),
                source,
            })
        }
    };

    let mut backups = Vec::new();
    for entry in entries.flatten() {
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => {}
            _ => continue,
        }
        if let Some(file_name) = entry.file_name().to_str() {
            if pattern.is_match(file_name) {
                backups.push(entry.path());
            }
        }
    }
    backups.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(backups)
}
