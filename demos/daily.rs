use rotatelog::{DailyRotateRule, RotatingWriter, TimeZone};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rotate at UTC midnight, keep one week of gzipped logs
    let rule = DailyRotateRule::new("./logs/daily.log", "-", 7, true).with_time_zone(TimeZone::UTC);
    let writer = RotatingWriter::open("./logs/daily.log", rule, true)?;

    writer.write(b"System startup - UTC dates will be used for rotation\n")?;
    writer.write(b"Configuration loaded successfully\n")?;
    writer.write(b"Server listening on port 8080\n")?;

    writer.close()?;
    Ok(())
}
