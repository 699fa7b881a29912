use clap::Parser;
use log::{error, info};
use server::config::{GameRules, ServerConfig};
use server::network::{Server, ServerMessage};
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the server loop until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Maximum number of connected clients
        #[clap(short, long, default_value = "64")]
        max_clients: usize,
        /// Milliseconds between room ticks
        #[clap(short, long, default_value = "100")]
        tick_ms: u32,
        /// Seconds of silence before a client is dropped
        #[clap(long, default_value = "5")]
        timeout_secs: u64,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.timeout_secs),
        rules: GameRules {
            tick_interval_ms: args.tick_ms,
            ..GameRules::default()
        },
    };
    info!("Starting arena server with {:?}", config);

    let mut server = Server::new(config).await?;
    let shutdown = server.handle();

    let server_handle = tokio::spawn(async move { server.run().await });

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    }

    Ok(())
}
