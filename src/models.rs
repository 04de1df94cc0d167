//! Application configuration.

use std::path::PathBuf;

/// Runtime configuration, loaded from environment variables with sensible
/// defaults. A `.env` file is honored when present.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Active primary provider: "mock" | "yahoo".
    pub provider: String,
    /// Path to the external tool servers YAML config.
    pub tool_servers_path: PathBuf,
    // Brokerage TWS connection (reserved for the TWS adapter)
    pub tws_host: String,
    pub tws_port: u16,
    pub tws_client_id: u32,
    // OpenAPI-style providers (token + sim/live environment)
    pub openapi_access_token: Option<String>,
    pub openapi_environment: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let provider = std::env::var("PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let tool_servers_path = std::env::var("TOOL_SERVERS_CONFIG")
            .unwrap_or_else(|_| "./config/tool_servers.yaml".to_string())
            .into();

        let tws_host = std::env::var("TWS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let tws_port = std::env::var("TWS_PORT")
            .unwrap_or_else(|_| "7497".to_string())
            .parse()
            .unwrap_or(7497);
        let tws_client_id = std::env::var("TWS_CLIENT_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        let openapi_access_token = std::env::var("OPENAPI_ACCESS_TOKEN").ok();
        let openapi_environment =
            std::env::var("OPENAPI_ENVIRONMENT").unwrap_or_else(|_| "sim".to_string());

        Ok(Self {
            port,
            provider,
            tool_servers_path,
            tws_host,
            tws_port,
            tws_client_id,
            openapi_access_token,
            openapi_environment,
        })
    }
}
