use {
    chrono::{DateTime, Duration, TimeZone as _, Utc},
    flate2::read::GzDecoder,
    rotatelog::{Clock, RotatingWriter, RotationSize, SizeLimitRotateRule, TimeZone},
    std::{
        fs::{self, File},
        io::Read,
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
        thread,
        time::{Duration as StdDuration, Instant},
    },
    tempfile::TempDir,
};

/// A clock that moves one second forward every time it is read, so every
/// rotation gets a distinct, increasing backup name.
#[derive(Debug)]
struct TickingClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl TickingClock {
    fn new() -> Arc<Self> {
        Arc::new(TickingClock {
            start: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        })
    }
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + Duration::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}

fn backups(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("app-") && name.ends_with(suffix)
        })
        .collect();
    files.sort();
    files
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + StdDuration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(StdDuration::from_millis(20));
    }
    condition()
}

fn gunzip(path: &Path) -> Vec<u8> {
    let mut content = Vec::new();
    GzDecoder::new(File::open(path).unwrap()).read_to_end(&mut content).unwrap();
    content
}

#[test]
fn second_oversized_write_rotates_the_file() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 1, 0, false);
    let writer = RotatingWriter::open(&filename, rule, false).unwrap();

    let first = vec![b'a'; 600 * 1024];
    let second = vec![b'b'; 600 * 1024];
    writer.write(&first).unwrap();
    writer.write(&second).unwrap();
    writer.close().unwrap();

    assert_eq!(fs::read(&filename).unwrap(), second);
    let rotated = backups(dir.path(), ".log");
    assert_eq!(rotated.len(), 1, "{rotated:?}");
    assert_eq!(fs::read(&rotated[0]).unwrap(), first);
    assert_eq!(writer.current_size(), 600 * 1024);
}

#[test]
fn records_survive_many_rotations_in_order() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 0, 0, false)
        .with_max_size(RotationSize::Bytes(100))
        .with_time_zone(TimeZone::UTC)
        .with_clock(TickingClock::new());
    let writer = RotatingWriter::builder(&filename).queue_capacity(4).build(rule).unwrap();

    let records: Vec<String> = (0..200).map(|i| format!("record {i:04}\n")).collect();
    for record in &records {
        writer.write(record.as_bytes()).unwrap();
    }
    writer.close().unwrap();

    let rotated = backups(dir.path(), ".log");
    assert!(rotated.len() > 10, "expected many rotations, got {}", rotated.len());

    let mut on_disk = String::new();
    for file in rotated.iter().chain([&filename]) {
        let content = fs::read_to_string(file).unwrap();
        assert!(content.len() <= 100, "{} holds {} bytes", file.display(), content.len());
        on_disk.push_str(&content);
    }
    assert_eq!(on_disk, records.concat());
}

#[test]
fn rotations_within_one_millisecond_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    // Every record fills a file on its own, so each write rotates.
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 0, 0, false)
        .with_max_size(RotationSize::Bytes(16))
        .with_time_zone(TimeZone::UTC);
    let writer = RotatingWriter::open(&filename, rule, false).unwrap();

    let records: Vec<String> = (0..2000).map(|i| format!("{i:08}\n")).collect();
    for record in &records {
        writer.write(record.as_bytes()).unwrap();
    }
    writer.close().unwrap();

    let rotated = backups(dir.path(), ".log");
    assert_eq!(rotated.len(), records.len() - 1);
    let mut on_disk = String::new();
    for file in rotated.iter().chain([&filename]) {
        on_disk.push_str(&fs::read_to_string(file).unwrap());
    }
    assert_eq!(on_disk, records.concat());
}

#[test]
fn concurrent_producers_keep_their_own_order() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 0, 0, false)
        .with_max_size(RotationSize::KB(4))
        .with_time_zone(TimeZone::UTC)
        .with_clock(TickingClock::new());
    let writer = Arc::new(RotatingWriter::builder(&filename).queue_capacity(8).build(rule).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let writer = writer.clone();
            thread::spawn(move || {
                for seq in 0..250 {
                    writer.write(format!("{producer} {seq}\n").as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    writer.close().unwrap();

    let mut lines = Vec::new();
    for file in backups(dir.path(), ".log").iter().chain([&filename]) {
        lines.extend(fs::read_to_string(file).unwrap().lines().map(str::to_string));
    }
    assert_eq!(lines.len(), 1000);
    for producer in 0..4 {
        let seqs: Vec<u32> = lines
            .iter()
            .filter_map(|line| line.split_once(' '))
            .filter(|(p, _)| *p == producer.to_string())
            .map(|(_, seq)| seq.parse().unwrap())
            .collect();
        assert_eq!(seqs, (0..250).collect::<Vec<_>>());
    }
}

#[test]
fn backups_are_compressed_and_pruned() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 0, 2, true)
        .with_max_size(RotationSize::Bytes(64))
        .with_time_zone(TimeZone::UTC)
        .with_clock(TickingClock::new());
    let writer = RotatingWriter::open(&filename, rule, true).unwrap();

    let records: Vec<String> = (0..6).map(|i| format!("{i}{}\n", "x".repeat(50))).collect();
    for record in &records {
        writer.write(record.as_bytes()).unwrap();
    }
    writer.close().unwrap();

    // Five rotations; compression and cleanup run in the background.
    assert!(wait_until(|| backups(dir.path(), ".log").is_empty()
        && backups(dir.path(), ".log.gz").len() == 2));

    let kept = backups(dir.path(), ".log.gz");
    assert_eq!(gunzip(&kept[0]), records[3].as_bytes());
    assert_eq!(gunzip(&kept[1]), records[4].as_bytes());
    assert_eq!(fs::read_to_string(&filename).unwrap(), records[5]);
}

#[test]
fn write_after_close_is_rejected() {
    let dir = TempDir::new().unwrap();
    let filename = dir.path().join("app.log");
    let rule = SizeLimitRotateRule::new(&filename, "-", 0, 1, 0, false);
    let writer = RotatingWriter::open(&filename, rule, false).unwrap();

    writer.write(b"kept\n").unwrap();
    writer.close().unwrap();

    assert!(matches!(writer.write(b"lost to stderr\n"), Err(rotatelog::Error::Closed)));
    assert!(writer.close().is_ok());
    assert_eq!(fs::read_to_string(&filename).unwrap(), "kept\n");
}
