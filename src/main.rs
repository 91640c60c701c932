// src/main.rs

use clap::Parser;
use ldapsync::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env необязателен
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    Ok(())
}
