use anyhow::Result;
use clap::Parser;

use podium::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    run(cli).await
}
