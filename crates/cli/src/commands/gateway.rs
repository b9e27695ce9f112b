//! `wayfarer gateway` - Start the HTTP API server.

use wayfarer_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Wayfarer Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {}", config.default_provider);
    println!("   Health:    GET /health");
    println!("   Chat:      POST /api/v1/chat, /api/v1/chat/stream, /api/v1/chat/stream_tokens");

    wayfarer_gateway::start(config).await?;

    Ok(())
}
