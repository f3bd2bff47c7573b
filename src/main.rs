use anyhow::Result;
use clap::Parser;
use tracing::info;

use roundpay::app;
use roundpay::config::Cli;
use roundpay::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let cli = Cli::parse();
    info!(
        "Starting roundpay: rpc_url={:?}, deployment_file={}",
        cli.rpc_url,
        cli.deployment_file.display()
    );

    app::run(cli).await?;

    info!("roundpay finished");
    Ok(())
}
