use {
    super::{list_backups, parent_dir, RotateRule, DATE_FORMAT, GZIP_EXT},
    crate::{
        clock::{Clock, SystemClock, TimeZone},
        error::Result,
    },
    chrono::{DateTime, Duration, FixedOffset},
    regex::Regex,
    std::{
        ffi::OsString,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// A rule that rotates the log file once per calendar day.
///
/// Backups are named `<filename><delimiter><YYYY-MM-DD>`, one slot per day.
/// The date is computed in the rule's time zone, local time by default.
#[derive(Debug, Clone)]
pub struct DailyRotateRule {
    pub(super) rotated_time: String,
    pub(super) filename: PathBuf,
    pub(super) delimiter: String,
    /// Retention window in days, 0 keeps backups forever.
    pub(super) days: u32,
    pub(super) gzip: bool,
    time_zone: TimeZone,
    clock: Arc<dyn Clock>,
}

impl DailyRotateRule {
    /// Create a daily rule for `filename`.
    /// # Arguments
    /// * `filename` - The path of the active log file.
    /// * `delimiter` - Joins the file name and the date in backup names.
    /// * `days` - How many days of backups to keep, 0 keeps them forever.
    /// * `gzip` - Whether backups get compressed, which changes the files
    ///   retention looks at.
    pub fn new<P: AsRef<Path>>(filename: P, delimiter: impl Into<String>, days: u32, gzip: bool) -> Self {
        let mut rule = DailyRotateRule {
            rotated_time: String::new(),
            filename: filename.as_ref().to_path_buf(),
            delimiter: delimiter.into(),
            days,
            gzip,
            time_zone: TimeZone::Local,
            clock: Arc::new(SystemClock),
        };
        rule.rotated_time = rule.today();
        rule
    }

    /// Set the time zone used to compute calendar dates.
    pub fn with_time_zone(self, time_zone: TimeZone) -> Self {
        let mut rule = Self { time_zone, ..self };
        rule.rotated_time = rule.today();
        rule
    }

    /// Replace the time source.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let mut rule = Self { clock, ..self };
        rule.rotated_time = rule.today();
        rule
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub(super) fn now(&self) -> DateTime<FixedOffset> {
        self.time_zone.at(self.clock.now())
    }

    fn today(&self) -> String {
        self.now().format(DATE_FORMAT).to_string()
    }

    fn file_name(&self) -> String {
        self.filename
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn backup_pattern(&self) -> Result<Regex> {
        let compression_suffix = if self.gzip {
            regex::escape(GZIP_EXT)
        } else {
            format!("(?:{})?", regex::escape(GZIP_EXT))
        };
        Ok(Regex::new(&format!(
            r"^{}{}\d{{4}}-\d{{2}}-\d{{2}}{compression_suffix}$",
            regex::escape(&self.file_name()),
            regex::escape(&self.delimiter),
        ))?)
    }
}

impl RotateRule for DailyRotateRule {
    fn backup_file_name(&self) -> PathBuf {
        let mut backup = OsString::from(self.filename.as_os_str());
        backup.push(&self.delimiter);
        backup.push(self.today());
        PathBuf::from(backup)
    }

    fn mark_rotated(&mut self) {
        self.rotated_time = self.today();
    }

    fn outdated_files(&self) -> Result<Vec<PathBuf>> {
        if self.days == 0 {
            return Ok(Vec::new());
        }

        let boundary_date = (self.now() - Duration::days(i64::from(self.days))).format(DATE_FORMAT);
        let mut boundary = format!("{}{}{boundary_date}", self.file_name(), self.delimiter);
        if self.gzip {
            boundary.push_str(GZIP_EXT);
        }

        // Dates sort lexicographically in time order.
        let backups = list_backups(&parent_dir(&self.filename), &self.backup_pattern()?)?;
        Ok(backups
            .into_iter()
            .filter(|file| {
                file.file_name()
                    .is_some_and(|name| name.to_string_lossy().as_ref() < boundary.as_str())
            })
            .collect())
    }

    fn shall_rotate(&self, _current_size: u64, _write_len: usize) -> bool {
        !self.rotated_time.is_empty() && self.today() != self.rotated_time
    }
}
