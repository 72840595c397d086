use {
    crate::{
        error::{Error, Result},
        file::{create_parent_dir, open_log_file, DEFAULT_FILE_MODE},
        post_rotate::PostRotator,
        rule::{backup_exists, RotateRule},
    },
    crossbeam_channel::{bounded, select, Receiver, Select, SendError, Sender},
    std::{
        fs::{self, File},
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        },
        thread::{self, JoinHandle},
    },
    tracing::{error, warn},
};

const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// An asynchronous, rotating log file writer.
///
/// Records handed to [`write`](RotatingWriter::write) go through a bounded
/// queue to a single writer thread, which owns the file. Before each record
/// the writer thread asks the [`RotateRule`] whether to rotate; a record is
/// never split across two files, and the record that triggers a rotation is
/// the first one of the new file.
///
/// The writer is `Send + Sync`: share it behind an `Arc` between producers.
///
/// ```no_run
/// use rotatelog::{DailyRotateRule, RotatingWriter};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let rule = DailyRotateRule::new("./logs/app.log", "-", 7, true);
///     let writer = RotatingWriter::open("./logs/app.log", rule, true)?;
///     writer.write(b"service started\n")?;
///     writer.close()?;
///     Ok(())
/// }
/// ```
pub struct RotatingWriter {
    filename: PathBuf,
    /// Dropped on close, which tells producers and the writer thread to stop.
    channels: Mutex<Option<Channels>>,
    done: Receiver<()>,
    worker: Mutex<Option<JoinHandle<Option<File>>>>,
    current_size: Arc<AtomicU64>,
    close_result: OnceLock<std::result::Result<(), Arc<io::Error>>>,
}

struct Channels {
    records: Sender<Vec<u8>>,
    _done: Sender<()>,
}

/// Configures and opens a [`RotatingWriter`].
///
/// # Default Configuration
/// * No compression
/// * Room for 100 queued records
/// * New log files readable and writable by the owner only (`0o600`)
#[derive(Debug, Clone)]
pub struct RotatingWriterBuilder {
    filename: PathBuf,
    compress: bool,
    queue_capacity: usize,
    file_mode: u32,
}

impl RotatingWriterBuilder {
    pub fn new<P: AsRef<Path>>(filename: P) -> Self {
        RotatingWriterBuilder {
            filename: filename.as_ref().to_path_buf(),
            compress: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            file_mode: DEFAULT_FILE_MODE,
        }
    }

    /// Gzip backups after rotation.
    pub fn compress(self, compress: bool) -> Self {
        Self { compress, ..self }
    }

    /// How many records may wait for the writer thread before `write` blocks.
    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        Self { queue_capacity, ..self }
    }

    /// Set the permissions of newly created log files (Unix-like systems
    /// only), in octal notation like when using chmod.
    pub fn file_mode(self, file_mode: u32) -> Self {
        Self { file_mode, ..self }
    }

    /// Open the log file and start the writer thread.
    ///
    /// Creates missing parent directories, then opens the file for appending,
    /// creating it if absent. Nothing keeps running if this fails.
    pub fn build<R>(self, rule: R) -> Result<RotatingWriter>
    where
        R: RotateRule + Clone + Send + 'static,
    {
        let backup = rule.backup_file_name();

        create_parent_dir(&self.filename)?;
        let file = open_log_file(&self.filename, self.file_mode).map_err(|source| Error::OpenFile {
            path: self.filename.clone(),
            source,
        })?;
        let current_size = Arc::new(AtomicU64::new(file.metadata().map_or(0, |m| m.len())));

        let (records_tx, records_rx) = bounded(self.queue_capacity);
        let (done_tx, done_rx) = bounded(0);
        let worker = Worker {
            filename: self.filename.clone(),
            backup,
            file: Some(file),
            rule,
            file_mode: self.file_mode,
            current_size: current_size.clone(),
            post_rotate: PostRotator::new(self.compress, self.file_mode),
        };
        let done = done_rx.clone();
        let handle = thread::Builder::new()
            .name("rotatelog-writer".to_string())
            .spawn(move || worker.run(records_rx, done))
            .map_err(Error::SpawnWorker)?;

        Ok(RotatingWriter {
            filename: self.filename,
            channels: Mutex::new(Some(Channels {
                records: records_tx,
                _done: done_tx,
            })),
            done: done_rx,
            worker: Mutex::new(Some(handle)),
            current_size,
            close_result: OnceLock::new(),
        })
    }
}

impl RotatingWriter {
    /// Open `filename` with `rule`, gzipping backups if `compress` is set.
    pub fn open<P, R>(filename: P, rule: R, compress: bool) -> Result<Self>
    where
        P: AsRef<Path>,
        R: RotateRule + Clone + Send + 'static,
    {
        RotatingWriterBuilder::new(filename).compress(compress).build(rule)
    }

    pub fn builder<P: AsRef<Path>>(filename: P) -> RotatingWriterBuilder {
        RotatingWriterBuilder::new(filename)
    }

    /// The path of the active log file.
    pub fn path(&self) -> &Path {
        &self.filename
    }

    /// Bytes written to the active file since it was opened or last rotated.
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Acquire)
    }

    /// Queue `record` for the writer thread.
    ///
    /// Blocks while the queue is full. Once the writer is closed, or if it
    /// gets closed while this call is blocked, the record is written to stderr
    /// instead and [`Error::Closed`] is returned.
    pub fn write(&self, record: &[u8]) -> Result<usize> {
        let records = match self.lock_channels().as_ref() {
            Some(channels) => channels.records.clone(),
            None => return Err(reject(record)),
        };

        let mut select = Select::new();
        let send = select.send(&records);
        select.recv(&self.done);
        let operation = select.select();
        if operation.index() == send {
            match operation.send(&records, record.to_vec()) {
                Ok(()) => Ok(record.len()),
                Err(SendError(record)) => Err(reject(&record)),
            }
        } else {
            let _ = operation.recv(&self.done);
            Err(reject(record))
        }
    }

    /// Stop the writer thread and close the file.
    ///
    /// Every record accepted by `write` is on disk when this returns; the file
    /// is synced before it is closed. Only the first call does any work, later
    /// and concurrent calls get the same outcome.
    pub fn close(&self) -> Result<()> {
        self.close_result
            .get_or_init(|| self.shutdown())
            .clone()
            .map_err(|source| Error::Close {
                path: self.filename.clone(),
                source,
            })
    }

    #[allow(clippy::io_other_error)]
    fn shutdown(&self) -> std::result::Result<(), Arc<io::Error>> {
        drop(self.lock_channels().take());

        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return Ok(());
        };
        let file = handle
            .join()
            .map_err(|_| Arc::new(io::Error::new(io::ErrorKind::Other, "writer thread panicked")))?;
        if let Some(file) = file {
            file.sync_all().map_err(Arc::new)?;
        }
        Ok(())
    }

    fn lock_channels(&self) -> MutexGuard<'_, Option<Channels>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        if self.close_result.get().is_none() {
            if let Err(err) = self.close() {
                error!(error = %err, "failed to close log file");
            }
        }
    }
}

/// Route a record that can no longer reach the file to stderr.
fn reject(record: &[u8]) -> Error {
    let mut stderr = io::stderr().lock();
    let _ = stderr.write_all(record);
    if !record.ends_with(b"\n") {
        let _ = stderr.write_all(b"\n");
    }
    Error::Closed
}

#[allow(clippy::io_other_error)]
impl io::Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingWriter::write(*self, buf).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "tracing")]
impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = &'a RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

/// The writer thread's state. It is the only owner of the log file.
struct Worker<R> {
    filename: PathBuf,
    /// Where the active file goes on the next rotation.
    backup: PathBuf,
    file: Option<File>,
    rule: R,
    file_mode: u32,
    current_size: Arc<AtomicU64>,
    post_rotate: PostRotator<R>,
}

impl<R> Worker<R>
where
    R: RotateRule + Clone + Send + 'static,
{
    fn run(mut self, records: Receiver<Vec<u8>>, done: Receiver<()>) -> Option<File> {
        loop {
            select! {
                recv(records) -> record => match record {
                    Ok(record) => self.write(&record),
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }

        // Producers that got past the closed check may still be sending; the
        // queue disconnects once the last of them is done.
        for record in records.iter() {
            self.write(&record);
        }
        self.file
    }

    fn write(&mut self, record: &[u8]) {
        if self.rule.shall_rotate(self.current_size.load(Ordering::Acquire), record.len()) {
            match self.rotate() {
                Ok(()) => {
                    self.rule.mark_rotated();
                    self.current_size.store(0, Ordering::Release);
                }
                Err(err @ Error::BackupExists(_)) => {
                    // Stay on the active file until the rule asks again.
                    self.rule.mark_rotated();
                    error!(file = %self.filename.display(), error = %err, "failed to rotate log file");
                }
                Err(err) => error!(file = %self.filename.display(), error = %err, "failed to rotate log file"),
            }
        }

        let Some(file) = self.file.as_mut() else {
            error!(
                file = %self.filename.display(),
                bytes = record.len(),
                "no open log file, record dropped"
            );
            return;
        };
        let (written, result) = write_counted(file, record);
        self.current_size.fetch_add(written as u64, Ordering::AcqRel);
        if let Err(err) = result {
            error!(
                file = %self.filename.display(),
                written,
                bytes = record.len(),
                error = %err,
                "failed to write log record"
            );
        }
    }

    /// Move the active file to the cached backup name and open a fresh one.
    ///
    /// Never renames onto an existing backup: a taken cached name is asked
    /// for again, and if the rule hands out the same one the rotation is
    /// refused with the active file left as it is.
    fn rotate(&mut self) -> Result<()> {
        let exists = self.filename.exists();
        if exists && backup_exists(&self.backup) {
            self.backup = self.rule.backup_file_name();
            if backup_exists(&self.backup) {
                return Err(Error::BackupExists(self.backup.clone()));
            }
        }

        drop(self.file.take());

        if exists {
            if let Err(source) = fs::rename(&self.filename, &self.backup) {
                // Keep logging into the old file.
                match open_log_file(&self.filename, self.file_mode) {
                    Ok(file) => self.file = Some(file),
                    Err(err) => warn!(file = %self.filename.display(), error = %err, "failed to reopen log file"),
                }
                return Err(Error::Rename {
                    from: self.filename.clone(),
                    to: self.backup.clone(),
                    source,
                });
            }
            self.post_rotate.submit(self.backup.clone(), self.rule.clone());
        }

        self.backup = self.rule.backup_file_name();
        let file = open_log_file(&self.filename, self.file_mode).map_err(|source| Error::OpenFile {
            path: self.filename.clone(),
            source,
        })?;
        self.file = Some(file);
        Ok(())
    }
}

/// Write all of `buf`, reporting how much made it even on failure.
fn write_counted(file: &mut File, mut buf: &[u8]) -> (usize, io::Result<()>) {
    let mut written = 0;
    while !buf.is_empty() {
        match file.write(buf) {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => {
                written += n;
                buf = &buf[n..];
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return (written, Err(err)),
        }
    }
    (written, Ok(()))
}
