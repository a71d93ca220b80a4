use std::env;
use std::fs;

use receipt_scanner::{Config, ModelName, ReceiptScanner};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: receipt-scan <text-file> [model]");
        std::process::exit(2);
    };
    let model = match args.next() {
        Some(raw) => Some(raw.parse::<ModelName>()?),
        None => None,
    };

    let config = Config::load_or_default("receipt-scanner.toml")?;
    let scanner = ReceiptScanner::from_config(&config)?;

    let text = fs::read_to_string(&path)?;
    info!(path = %path, chars = text.len(), "Loaded receipt text");

    let receipt = scanner.scan(&text, model).await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    Ok(())
}
