//! Declarative configuration for a rotating log file.

use {
    crate::{
        error::{Error, Result},
        rule::{DailyRotateRule, RotationRule, SizeLimitRotateRule},
        writer::RotatingWriter,
    },
    serde::{Deserialize, Serialize},
    std::path::PathBuf,
};

const DEFAULT_DELIMITER: &str = "-";

/// Which rotation rule a [`RotateConfig`] builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    /// Rotate once per calendar day.
    #[default]
    Daily,
    /// Rotate when the file would exceed `max_size` megabytes.
    Size,
}

/// Rotation settings as read from a configuration file.
///
/// ```
/// use rotatelog::{RotateConfig, RotationKind};
///
/// let config: RotateConfig = toml::from_str(
///     r#"
///     path = "logs/access.log"
///     rotation = "size"
///     max_size = 100
///     max_backups = 10
///     compress = true
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.rotation, RotationKind::Size);
/// assert_eq!(config.delimiter, "-");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateConfig {
    /// Path of the active log file.
    pub path: PathBuf,
    pub rotation: RotationKind,
    /// Days to keep backups, 0 keeps them forever.
    pub keep_days: u32,
    /// Gzip backups after rotation.
    pub compress: bool,
    /// Size budget of the active file in megabytes, 0 means no limit. Only
    /// used by size rotation.
    pub max_size: u64,
    /// Backups to keep, 0 keeps them all. Only used by size rotation; backups
    /// older than `keep_days` are removed regardless.
    pub max_backups: usize,
    /// Joins the file name and the date or timestamp in backup names.
    pub delimiter: String,
}

impl Default for RotateConfig {
    fn default() -> Self {
        RotateConfig {
            path: PathBuf::from("logs/app.log"),
            rotation: RotationKind::Daily,
            keep_days: 0,
            compress: false,
            max_size: 0,
            max_backups: 0,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl RotateConfig {
    /// Check the settings can produce a working rule.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config("path must not be empty".to_string()));
        }
        if self.path.file_name().is_none() {
            return Err(Error::Config(format!(
                "path '{}' does not name a file",
                self.path.display()
            )));
        }
        if self.delimiter.is_empty() {
            return Err(Error::Config("delimiter must not be empty".to_string()));
        }
        if self.delimiter.chars().any(std::path::is_separator) {
            return Err(Error::Config(format!(
                "delimiter '{}' must not contain a path separator",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Build the rotation rule these settings describe.
    pub fn rotation_rule(&self) -> Result<RotationRule> {
        self.validate()?;
        Ok(match self.rotation {
            RotationKind::Daily => {
                DailyRotateRule::new(&self.path, self.delimiter.as_str(), self.keep_days, self.compress).into()
            }
            RotationKind::Size => SizeLimitRotateRule::new(
                &self.path,
                self.delimiter.as_str(),
                self.keep_days,
                self.max_size,
                self.max_backups,
                self.compress,
            )
            .into(),
        })
    }

    /// Open a writer for `path` with the configured rule.
    pub fn open(&self) -> Result<RotatingWriter> {
        let rule = self.rotation_rule()?;
        RotatingWriter::open(&self.path, rule, self.compress)
    }
}
