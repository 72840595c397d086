use {
    rotatelog::{DailyRotateRule, RotatingWriter},
    tracing_subscriber::{filter::EnvFilter, util::SubscriberInitExt},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rule = DailyRotateRule::new("./logs/tracing.log", "-", 3, true);
    let writer = RotatingWriter::open("./logs/tracing.log", rule, true)?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(writer);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // rotatelog's own diagnostics must not loop back into the file it rotates
        .with_env_filter(EnvFilter::new("info,rotatelog=off"))
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish()
        .try_init()?;

    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    Ok(())
}
