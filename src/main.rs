use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docgate::config::DocgateConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "docgate")]
#[command(version, about = "Generic record gateway over a schema-aware document store")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to docgate.toml (defaults to ./docgate.toml when present)
    #[arg(short, long, global = true, env = "DOCGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway HTTP server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Record type definitions to register at startup (YAML or JSON)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Enable dev mode (bind all interfaces, CORS permissive)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and register record types
    Init {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Record type definitions to register (YAML or JSON)
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Inspect registered record types
    Schema {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum SchemaCommands {
    /// List registered record types
    List,
    /// Print one record type's definition as YAML
    Show { record_type: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default docgate.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = DocgateConfig::resolve(cli.config.as_deref())?;
    let _log_guard = docgate::logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
            schema,
            dev,
        } => {
            let args = cmd::ServeArgs {
                port,
                host,
                db_path,
                schema,
                dev,
            };
            cmd::cmd_serve(&config, args).await?;
        }
        Commands::Init { db_path, schema } => cmd::cmd_init(&config, db_path, schema)?,
        Commands::Schema { db_path, command } => cmd::cmd_schema(&config, db_path, command)?,
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command)?
        }
    }

    Ok(())
}
