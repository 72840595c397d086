use rotatelog::RotateConfig;

const CONFIG: &str = r#"
path = "./logs/config.log"
rotation = "size"
max_size = 1        # megabytes
max_backups = 3
keep_days = 7
compress = true
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: RotateConfig = toml::from_str(CONFIG)?;
    let writer = config.open()?;

    for i in 1..=20_000 {
        writer.write(format!("Log entry #{i}: configured from TOML\n").as_bytes())?;
    }

    writer.close()?;
    println!("Logs written to {}", writer.path().display());
    Ok(())
}
