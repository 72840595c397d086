//! Best-effort work done after a rotation: compress the fresh backup, then
//! delete the backups the rule considers outdated.
//!
//! Nothing here reports back to the writer. Failures, panics included, end up
//! in the log.

use {
    crate::{
        error::{Error, Result},
        file::open_options,
        rule::{RotateRule, GZIP_EXT},
    },
    crossbeam_channel::{unbounded, SendError, Sender},
    flate2::{write::GzEncoder, Compression},
    std::{
        any::Any,
        fs::{self, File},
        io::{self, BufReader, BufWriter, Write as _},
        panic::{self, AssertUnwindSafe},
        path::{Path, PathBuf},
        thread,
        time::Instant,
    },
    tracing::{error, info},
};

/// Feeds rotated backups to one long-lived `rotatelog-post-rotate` thread.
///
/// The thread starts with the first rotation and works through the backups in
/// rotation order, so a cleanup always sees the archives of the runs before it
/// complete. It exits once the rotator is dropped and its queue is empty; it is
/// never joined.
pub(crate) struct PostRotator<R> {
    jobs: Option<Sender<(PathBuf, R)>>,
    compress: bool,
    file_mode: u32,
}

impl<R> PostRotator<R>
where
    R: RotateRule + Send + 'static,
{
    pub(crate) fn new(compress: bool, file_mode: u32) -> Self {
        PostRotator {
            jobs: None,
            compress,
            file_mode,
        }
    }

    /// Queue `backup` for compression and cleanup. `rule` is a snapshot taken
    /// at rotation time.
    pub(crate) fn submit(&mut self, backup: PathBuf, rule: R) {
        if self.jobs.is_none() {
            match self.spawn() {
                Ok(jobs) => self.jobs = Some(jobs),
                Err(err) => {
                    error!(file = %backup.display(), error = %err, "failed to spawn post-rotation thread");
                    return;
                }
            }
        }
        let Some(jobs) = &self.jobs else {
            return;
        };
        if let Err(SendError((backup, _))) = jobs.send((backup, rule)) {
            error!(file = %backup.display(), "post-rotation thread is gone, backup left as is");
            self.jobs = None;
        }
    }

    fn spawn(&self) -> io::Result<Sender<(PathBuf, R)>> {
        let (jobs_tx, jobs_rx) = unbounded::<(PathBuf, R)>();
        let (compress, file_mode) = (self.compress, self.file_mode);
        thread::Builder::new()
            .name("rotatelog-post-rotate".to_string())
            .spawn(move || {
                for (backup, rule) in jobs_rx {
                    post_rotate(&backup, &rule, compress, file_mode);
                }
            })?;
        Ok(jobs_tx)
    }
}

pub(crate) fn post_rotate<R: RotateRule>(backup: &Path, rule: &R, compress: bool, file_mode: u32) {
    if compress {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| maybe_compress(backup, file_mode))) {
            error!(
                file = %backup.display(),
                panic = panic_message(payload.as_ref()),
                "panicked while compressing log file"
            );
        }
    }
    delete_outdated_files(rule);
}

fn maybe_compress(backup: &Path, file_mode: u32) {
    // Someone else may have moved or removed it already.
    if !backup.exists() {
        return;
    }

    let start = Instant::now();
    info!(file = %backup.display(), "compressing log file");
    match gzip_file(backup, file_mode) {
        Ok(compressed) => info!(
            file = %compressed.display(),
            elapsed = ?start.elapsed(),
            "compressed log file"
        ),
        Err(err) => error!(error = %err, "compress error"),
    }
}

fn delete_outdated_files<R: RotateRule>(rule: &R) {
    let files = match rule.outdated_files() {
        Ok(files) => files,
        Err(err) => {
            error!(error = %err, "failed to list outdated log files");
            return;
        }
    };
    for file in files {
        if let Err(err) = fs::remove_file(&file) {
            error!(file = %file.display(), error = %err, "failed to remove outdated file");
        }
    }
}

/// Gzip `path` into `<path>.gz` and remove `path`.
///
/// A partially written archive is removed on failure, leaving the original in
/// place.
pub(crate) fn gzip_file(path: &Path, file_mode: u32) -> Result<PathBuf> {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(GZIP_EXT);
    let compressed = PathBuf::from(compressed);

    let written = (|| -> io::Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        let outfile = open_options(file_mode).write(true).create(true).truncate(true).open(&compressed)?;
        let mut encoder = GzEncoder::new(BufWriter::new(outfile), Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()
    })();
    if let Err(source) = written {
        let _ = fs::remove_file(&compressed);
        return Err(Error::Compress {
            path: path.to_path_buf(),
            source,
        });
    }

    fs::remove_file(path).map_err(|source| Error::Compress {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(compressed)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
