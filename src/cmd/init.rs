//! Store initialization command (`docgate init`).

use std::path::PathBuf;

use anyhow::Result;
use docgate::config::DocgateConfig;
use docgate::gateway::server::{ServerConfig, open_store};
use docgate::gateway::store::DocumentStore;

pub fn cmd_init(
    config: &DocgateConfig,
    db_path: Option<PathBuf>,
    schema: Option<PathBuf>,
) -> Result<()> {
    let mut server = ServerConfig::from_config(config);
    if let Some(db_path) = db_path {
        server.db_path = db_path;
    }
    if let Some(schema) = schema {
        server.schema_file = Some(schema);
    }

    let store = open_store(&server)?;
    let defined = store.list_schemas()?.len();

    println!("Database initialized at {}", server.db_path.display());
    match server.schema_file {
        Some(ref file) => println!(
            "Registered record types from {} ({} defined)",
            file.display(),
            defined
        ),
        None => println!("{} record types defined", defined),
    }
    Ok(())
}
