//! # rotatelog
//!
//! rotatelog is an asynchronous, rotating file writer for append-only log
//! streams. Producers on any thread hand it already formatted records; a
//! single background thread owns the file, writes the records in the order
//! they were accepted, and rotates the file according to a pluggable
//! [`RotateRule`]. Rotated files can be gzip-compressed and pruned by age or
//! by count, without ever blocking the writer.
//!
//! Two rules ship with the crate:
//! - [`DailyRotateRule`] rotates once per calendar day into
//!   `<path><delimiter><YYYY-MM-DD>`.
//! - [`SizeLimitRotateRule`] rotates before the file would exceed a byte
//!   budget, into `<dir>/<prefix><delimiter><timestamp><ext>`, and bounds the
//!   number of backups.
//!
//! The crate reports its own failures (rotation, compression, cleanup)
//! through `tracing`. Don't route those events back into the writer that
//! emits them.
//!
//! ## Example
//!
//! ```rust
//! use {
//!    rotatelog::{RotatingWriter, RotationSize, SizeLimitRotateRule, TimeZone},
//!    tracing_subscriber::util::SubscriberInitExt,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let rule = SizeLimitRotateRule::new("./logs/tracing.log", "-", 7, 100, 5, true)
//!        .with_max_size(RotationSize::KB(256))
//!        .with_time_zone(TimeZone::UTC); // Name backups after UTC timestamps
//!    let writer = RotatingWriter::builder("./logs/tracing.log")
//!        .compress(true) // Gzip rotated files
//!        .build(rule)?;
//!    let (non_blocking, _guard) = tracing_appender::non_blocking(writer);
//!    tracing_subscriber::fmt()
//!        .with_writer(non_blocking)
//!        .with_ansi(false)
//!        .with_target(false)
//!        .finish()
//!        .try_init()?;
//!
//!    tracing::info!("This is an info message");
//!    tracing::warn!("This is a warning message");
//!
//!    Ok(())
//! }
//! ```
//!
//! Records can also be written directly, from as many threads as needed:
//!
//! ```rust
//! use {
//!    rotatelog::{RotateConfig, RotationKind},
//!    std::{sync::Arc, thread},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let config = RotateConfig {
//!        path: "./logs/workers.log".into(),
//!        rotation: RotationKind::Size,
//!        max_size: 10,
//!        max_backups: 3,
//!        ..RotateConfig::default()
//!    };
//!    let writer = Arc::new(config.open()?);
//!    let workers: Vec<_> = (0..4)
//!        .map(|id| {
//!            let writer = writer.clone();
//!            thread::spawn(move || writer.write(format!("worker {id} done\n").as_bytes()))
//!        })
//!        .collect();
//!    for worker in workers {
//!        worker.join().expect("worker panicked")?;
//!    }
//!    writer.close()?;
//!    Ok(())
//! }
//! ```

mod clock;
mod config;
mod error;
mod file;
mod post_rotate;
mod rule;
mod writer;

pub use {
    clock::{Clock, ManualClock, SystemClock, TimeZone},
    config::{RotateConfig, RotationKind},
    error::{Error, Result},
    rule::{DailyRotateRule, RotateRule, RotationRule, RotationSize, SizeLimitRotateRule},
    writer::{RotatingWriter, RotatingWriterBuilder},
};
