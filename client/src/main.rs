use clap::Parser;
use client::config::{ClientArgs, ClientConfig};
use client::network::Client;
use log::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = ClientArgs::parse();
    let config = ClientConfig::try_from(args)?;

    info!("Starting client...");
    info!(
        "Connecting to {}:{} as {:?}",
        config.server_host, config.server_port, config.player_name
    );

    let client = Client::connect(&config).await?;
    if let Err(e) = client.run().await {
        error!("Client stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}
