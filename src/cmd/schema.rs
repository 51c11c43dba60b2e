//! Record type inspection commands (`docgate schema`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use docgate::config::DocgateConfig;
use docgate::gateway::server::{ServerConfig, open_store};
use docgate::gateway::store::DocumentStore;

use super::super::SchemaCommands;

pub fn cmd_schema(
    config: &DocgateConfig,
    db_path: Option<PathBuf>,
    command: SchemaCommands,
) -> Result<()> {
    let mut server = ServerConfig::from_config(config);
    if let Some(db_path) = db_path {
        server.db_path = db_path;
    }
    let store = open_store(&server)?;

    match command {
        SchemaCommands::List => {
            let mut schemas = store.list_schemas()?;
            if schemas.is_empty() {
                println!("No record types defined in {}", server.db_path.display());
                println!("Run 'docgate init --schema <file>' to register some.");
                return Ok(());
            }
            schemas.sort_by(|a, b| a.name.cmp(&b.name));

            println!("{:<30} {:>6}  FLAGS", "RECORD TYPE", "FIELDS");
            for schema in schemas {
                let mut flags = Vec::new();
                if schema.istable {
                    flags.push("child");
                }
                if schema.is_submittable {
                    flags.push("submittable");
                }
                println!(
                    "{:<30} {:>6}  {}",
                    schema.name,
                    schema.fields.len(),
                    flags.join(",")
                );
            }
        }
        SchemaCommands::Show { record_type } => {
            let schema = store
                .get_schema(&record_type)?
                .with_context(|| format!("Unknown record type '{}'", record_type))?;
            print!("{}", serde_yaml::to_string(&schema)?);
        }
    }

    Ok(())
}
