use {
    rotatelog::{RotatingWriter, RotationSize, SizeLimitRotateRule},
    std::{sync::Arc, thread, time::Instant},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let rule = SizeLimitRotateRule::new("./logs/sized.log", "-", 0, 0, 5, true) // Keep only last 5 files
        .with_max_size(RotationSize::KB(256));
    let writer = Arc::new(
        RotatingWriter::builder("./logs/sized.log")
            .compress(true)
            .file_mode(0o640) // owner rw, group r, others none
            .build(rule)?,
    );

    // Simulate several threads writing logs that will trigger size-based rotation
    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let writer = writer.clone();
            thread::spawn(move || -> rotatelog::Result<()> {
                for i in 1..=5_000 {
                    let line = format!(
                        "Producer {producer} entry #{i}: This is a sample log message that will contribute to file size\n"
                    );
                    writer.write(line.as_bytes())?;
                }
                Ok(())
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked")?;
    }

    writer.close()?;
    println!("Done logging: {:?}", start.elapsed());
    Ok(())
}
