//! `aether server` — Start the AetherFlow HTTP server.

use aether_server::ServerConfig;

pub async fn run(config: ServerConfig) -> Result<(), String> {
    println!("Starting AetherFlow server on {}:{}...", config.host, config.port);

    let addr = aether_server::start_server(config).await?;
    println!("AetherFlow server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
