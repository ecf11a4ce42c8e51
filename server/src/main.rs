use clap::Parser;
use log::info;
use server::config::{ServerArgs, ServerConfig};
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = ServerArgs::parse();
    let config = ServerConfig::try_from(args)?;
    info!("Starting worms server on port {}", config.port);

    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}
