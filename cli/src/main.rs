//! Entry-point for the `easel` binary.
use clap::Parser;
use easel_cli::Cli;
use easel_cli::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_main(cli).await
}
