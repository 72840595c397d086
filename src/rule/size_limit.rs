use {
    super::{backup_exists, list_backups, parent_dir, DailyRotateRule, RotateRule, RotationSize, GZIP_EXT, MEGABYTE},
    crate::{
        clock::{Clock, TimeZone},
        error::{Error, Result},
    },
    chrono::{DateTime, Duration, FixedOffset, SecondsFormat},
    regex::Regex,
    std::{
        collections::BTreeSet,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// A rule that rotates the log file before it would grow past a byte budget,
/// and bounds the number of kept backups.
///
/// Backups are named `<dir>/<prefix><delimiter><timestamp><ext>`, where the
/// timestamp is RFC 3339 with millisecond precision, so `logs/app.log` rotates
/// into names like `logs/app-2024-03-10T12:00:00.000+00:00.log`. A name
/// already taken by a backup, plain or gzipped, is never handed out again:
/// the timestamp moves forward a millisecond at a time until it is free.
///
/// Retention by age (`days`) and by count (`max_backups`) compose: a backup is
/// outdated when either of them says so.
#[derive(Debug, Clone)]
pub struct SizeLimitRotateRule {
    daily: DailyRotateRule,
    /// Byte budget, 0 disables size rotation.
    max_size: u64,
    /// 0 keeps every backup.
    max_backups: usize,
}

impl SizeLimitRotateRule {
    /// Create a size-limit rule for `filename`.
    /// # Arguments
    /// * `filename` - The path of the active log file.
    /// * `delimiter` - Joins the file prefix and the timestamp in backup names.
    /// * `days` - How many days of backups to keep, 0 keeps them forever.
    /// * `max_size_mb` - The budget of the active file in megabytes, 0 means
    ///   unlimited.
    /// * `max_backups` - How many backups to keep, 0 keeps them all.
    /// * `gzip` - Whether backups get compressed.
    pub fn new<P: AsRef<Path>>(
        filename: P,
        delimiter: impl Into<String>,
        days: u32,
        max_size_mb: u64,
        max_backups: usize,
        gzip: bool,
    ) -> Self {
        let mut rule = SizeLimitRotateRule {
            daily: DailyRotateRule::new(filename, delimiter, days, gzip),
            max_size: max_size_mb.saturating_mul(MEGABYTE),
            max_backups,
        };
        rule.daily.rotated_time = rule.timestamp(rule.daily.now());
        rule
    }

    /// Override the byte budget with a finer-grained size.
    pub fn with_max_size(self, max_size: RotationSize) -> Self {
        Self {
            max_size: max_size.bytes(),
            ..self
        }
    }

    /// Set the time zone used in backup timestamps.
    pub fn with_time_zone(self, time_zone: TimeZone) -> Self {
        let mut rule = Self {
            daily: self.daily.with_time_zone(time_zone),
            ..self
        };
        rule.daily.rotated_time = rule.timestamp(rule.daily.now());
        rule
    }

    /// Replace the time source.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let mut rule = Self {
            daily: self.daily.with_clock(clock),
            ..self
        };
        rule.daily.rotated_time = rule.timestamp(rule.daily.now());
        rule
    }

    pub fn filename(&self) -> &Path {
        self.daily.filename()
    }

    /// Parse the rotation time back out of a backup file name.
    ///
    /// ```
    /// use rotatelog::SizeLimitRotateRule;
    ///
    /// let rule = SizeLimitRotateRule::new("logs/app.log", "-", 0, 10, 0, true);
    /// let time = rule
    ///     .parse_backup_time("logs/app-2024-03-10T12:00:00.250+08:00.log.gz")
    ///     .unwrap();
    /// assert_eq!(time.to_rfc3339(), "2024-03-10T12:00:00.250+08:00");
    /// ```
    pub fn parse_backup_time<P: AsRef<Path>>(&self, file: P) -> Result<DateTime<FixedOffset>> {
        let path = file.as_ref();
        let invalid = || Error::InvalidBackupName(path.to_path_buf());

        let name = path.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;
        let name = name.strip_suffix(GZIP_EXT).unwrap_or(name);
        let (prefix, ext) = self.name_parts();
        let timestamp = name
            .strip_suffix(ext.as_str())
            .and_then(|name| name.strip_prefix(prefix.as_str()))
            .and_then(|name| name.strip_prefix(self.daily.delimiter.as_str()))
            .filter(|timestamp| !timestamp.is_empty())
            .ok_or_else(invalid)?;

        DateTime::parse_from_rfc3339(timestamp).map_err(|source| Error::ParseBackupTime {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Split the log file name into its prefix and extension (with the dot).
    fn name_parts(&self) -> (String, String) {
        let filename = self.daily.filename();
        let ext = filename
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let prefix = filename
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        (prefix, ext)
    }

    fn timestamp(&self, time: DateTime<FixedOffset>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    fn backup_name_at(&self, time: DateTime<FixedOffset>) -> String {
        let (prefix, ext) = self.name_parts();
        format!("{prefix}{}{}{ext}", self.daily.delimiter, self.timestamp(time))
    }

    fn backup_pattern(&self) -> Result<Regex> {
        let (prefix, ext) = self.name_parts();
        let compression_suffix = if self.daily.gzip {
            regex::escape(GZIP_EXT)
        } else {
            String::new()
        };
        Ok(Regex::new(&format!(
            r"^{}{}.+{}{compression_suffix}$",
            regex::escape(&prefix),
            regex::escape(&self.daily.delimiter),
            regex::escape(&ext),
        ))?)
    }
}

impl RotateRule for SizeLimitRotateRule {
    fn backup_file_name(&self) -> PathBuf {
        let directory = parent_dir(self.daily.filename());
        let mut time = self.daily.now();
        loop {
            let backup = directory.join(self.backup_name_at(time));
            if !backup_exists(&backup) {
                return backup;
            }
            time += Duration::milliseconds(1);
        }
    }

    fn mark_rotated(&mut self) {
        self.daily.rotated_time = self.timestamp(self.daily.now());
    }

    fn outdated_files(&self) -> Result<Vec<PathBuf>> {
        if self.max_backups == 0 && self.daily.days == 0 {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = list_backups(&parent_dir(self.daily.filename()), &self.backup_pattern()?)?
            .into_iter()
            .filter(|file| self.parse_backup_time(file).is_ok())
            .collect();

        let mut outdated = BTreeSet::new();

        // Too many backups: the oldest go first.
        if self.max_backups > 0 && files.len() > self.max_backups {
            let survivors = files.split_off(files.len() - self.max_backups);
            outdated.extend(files);
            files = survivors;
        }

        // Too old backups, even among the ones kept by count.
        if self.daily.days > 0 {
            let mut boundary = self.backup_name_at(self.daily.now() - Duration::days(i64::from(self.daily.days)));
            if self.daily.gzip {
                boundary.push_str(GZIP_EXT);
            }
            for file in files {
                let is_old = file
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().as_ref() < boundary.as_str());
                if !is_old {
                    break;
                }
                outdated.insert(file);
            }
        }

        Ok(outdated.into_iter().collect())
    }

    fn shall_rotate(&self, current_size: u64, write_len: usize) -> bool {
        self.max_size > 0 && self.max_size < current_size.saturating_add(write_len as u64)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::clock::ManualClock,
        chrono::{TimeZone as _, Utc},
        std::fs,
        tempfile::TempDir,
    };

    fn rule_at(dir: &Path, days: u32, max_size_mb: u64, max_backups: usize, gzip: bool) -> (SizeLimitRotateRule, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()));
        let rule = SizeLimitRotateRule::new(dir.join("app.log"), "-", days, max_size_mb, max_backups, gzip)
            .with_time_zone(TimeZone::UTC)
            .with_clock(clock.clone());
        (rule, clock)
    }

    /// Create a backup that was rotated `days_ago` days before the clock's now.
    fn backup(rule: &SizeLimitRotateRule, days_ago: i64, suffix: &str) -> PathBuf {
        let time = rule.daily.now() - Duration::days(days_ago);
        let path = parent_dir(rule.filename()).join(format!("{}{suffix}", rule.backup_name_at(time)));
        fs::write(&path, "backup").unwrap();
        path
    }

    #[test]
    fn rotates_only_past_the_budget() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 0, false);

        assert!(!rule.shall_rotate(0, MEGABYTE as usize));
        assert!(!rule.shall_rotate(MEGABYTE - 10, 10));
        assert!(rule.shall_rotate(MEGABYTE - 10, 11));
        assert!(rule.shall_rotate(600 * 1024, 600 * 1024));
    }

    #[test]
    fn zero_budget_never_rotates() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 0, 0, false);

        assert!(!rule.shall_rotate(u64::MAX, usize::MAX));
    }

    #[test]
    fn backup_name_keeps_the_extension() {
        let dir = TempDir::new().unwrap();
        let (rule, clock) = rule_at(dir.path(), 0, 1, 0, false);

        assert_eq!(
            rule.backup_file_name(),
            dir.path().join("app-2024-03-10T12:00:00.000+00:00.log")
        );
        clock.advance(Duration::milliseconds(5));
        assert_eq!(
            rule.backup_file_name(),
            dir.path().join("app-2024-03-10T12:00:00.005+00:00.log")
        );
    }

    #[test]
    fn taken_backup_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 0, true);
        fs::write(dir.path().join("app-2024-03-10T12:00:00.000+00:00.log"), "rotated").unwrap();
        fs::write(dir.path().join("app-2024-03-10T12:00:00.001+00:00.log.gz"), "compressed").unwrap();

        let backup = rule.backup_file_name();
        assert_eq!(backup, dir.path().join("app-2024-03-10T12:00:00.002+00:00.log"));
        assert!(rule.parse_backup_time(&backup).is_ok());
    }

    #[test]
    fn backup_name_without_extension() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()));
        let rule = SizeLimitRotateRule::new(dir.path().join("server"), "_", 0, 1, 0, false)
            .with_time_zone(TimeZone::UTC)
            .with_clock(clock);

        let backup = rule.backup_file_name();
        assert_eq!(backup, dir.path().join("server_2024-03-10T12:00:00.000+00:00"));
        assert!(rule.parse_backup_time(&backup).is_ok());
    }

    #[test]
    fn parses_backup_time() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 0, true);
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        assert_eq!(rule.parse_backup_time(rule.backup_file_name()).unwrap(), expected);
        assert_eq!(
            rule.parse_backup_time(dir.path().join("app-2024-03-10T12:00:00.000+00:00.log.gz")).unwrap(),
            expected
        );
    }

    #[test]
    fn rejects_malformed_backup_names() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 0, false);

        assert!(matches!(
            rule.parse_backup_time(dir.path().join("other-2024.log")),
            Err(Error::InvalidBackupName(_))
        ));
        assert!(matches!(
            rule.parse_backup_time(dir.path().join("app-.log")),
            Err(Error::InvalidBackupName(_))
        ));
        assert!(matches!(
            rule.parse_backup_time(dir.path().join("app-yesterday.log")),
            Err(Error::ParseBackupTime { .. })
        ));
    }

    #[test]
    fn max_backups_keeps_the_newest() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 2, false);
        let backups: Vec<PathBuf> = (1..=5).rev().map(|days_ago| backup(&rule, days_ago, "")).collect();
        fs::write(dir.path().join("app.log"), "active").unwrap();

        assert_eq!(rule.outdated_files().unwrap(), backups[..3].to_vec());
    }

    #[test]
    fn retention_days_apply_to_backups_kept_by_count() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 3, 1, 2, false);
        let oldest = backup(&rule, 10, "");
        let old = backup(&rule, 5, "");
        let kept_but_old = backup(&rule, 4, "");
        let fresh = backup(&rule, 1, "");

        let outdated = rule.outdated_files().unwrap();
        assert_eq!(outdated, vec![oldest, old, kept_but_old]);
        assert!(!outdated.contains(&fresh));
    }

    #[test]
    fn retention_days_without_count_limit() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 3, 1, 0, false);
        let old = backup(&rule, 4, "");
        backup(&rule, 2, "");
        backup(&rule, 0, "");

        assert_eq!(rule.outdated_files().unwrap(), vec![old]);
    }

    #[test]
    fn gzip_mode_only_counts_compressed_backups() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 1, true);
        let plain = backup(&rule, 3, "");
        let compressed_old = backup(&rule, 2, GZIP_EXT);
        let compressed_new = backup(&rule, 1, GZIP_EXT);

        let outdated = rule.outdated_files().unwrap();
        assert_eq!(outdated, vec![compressed_old]);
        assert!(!outdated.contains(&plain));
        assert!(!outdated.contains(&compressed_new));
    }

    #[test]
    fn unrelated_files_are_never_outdated() {
        let dir = TempDir::new().unwrap();
        let (rule, _clock) = rule_at(dir.path(), 0, 1, 1, false);
        fs::write(dir.path().join("app-notes.log"), "keep me").unwrap();
        backup(&rule, 2, "");
        let newest = backup(&rule, 1, "");

        let outdated = rule.outdated_files().unwrap();
        assert_eq!(outdated.len(), 1);
        assert!(!outdated.contains(&newest));
        assert!(!outdated.contains(&dir.path().join("app-notes.log")));
    }

    #[test]
    fn mark_rotated_records_a_timestamp() {
        let dir = TempDir::new().unwrap();
        let (mut rule, clock) = rule_at(dir.path(), 0, 1, 0, false);
        clock.advance(Duration::seconds(90));
        rule.mark_rotated();

        assert_eq!(rule.daily.rotated_time, "2024-03-10T12:01:30.000+00:00");
    }
}
