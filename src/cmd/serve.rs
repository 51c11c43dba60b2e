//! Gateway HTTP server command (`docgate serve`).

use std::path::PathBuf;

use anyhow::Result;
use docgate::config::DocgateConfig;
use docgate::gateway::server::{ServerConfig, start_server};

/// Flags that override docgate.toml for one run.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub db_path: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub dev: bool,
}

pub async fn cmd_serve(config: &DocgateConfig, args: ServeArgs) -> Result<()> {
    let mut server = ServerConfig::from_config(config);
    if args.dev {
        server.host = "0.0.0.0".to_string();
        server.cors_permissive = true;
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(db_path) = args.db_path {
        server.db_path = db_path;
    }
    if let Some(schema) = args.schema {
        server.schema_file = Some(schema);
    }

    start_server(server).await
}
