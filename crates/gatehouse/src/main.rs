//! gatehouse - ssh bastion with replicated authorization state

use clap::Parser;
use color_eyre::eyre::Result;
use gatehouse::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let code = cli.run().await?;
    std::process::exit(code);
}
