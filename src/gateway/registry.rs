//! Loading record-type definitions from a schema file.
//!
//! A schema file is YAML or JSON (JSON is valid YAML, so one parser reads
//! both) holding either a bare list of record types or a mapping with a
//! `record_types` key.

use std::path::Path;

use anyhow::{Context, Result};
use docgate_common::RecordSchema;
use serde::Deserialize;
use tracing::{debug, info};

use super::store::DocumentStore;

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    List(Vec<RecordSchema>),
    Document { record_types: Vec<RecordSchema> },
}

impl SchemaFile {
    fn into_schemas(self) -> Vec<RecordSchema> {
        match self {
            SchemaFile::List(schemas) => schemas,
            SchemaFile::Document { record_types } => record_types,
        }
    }
}

/// Parse schema definitions from text. Every definition is validated.
pub fn parse_schemas(content: &str) -> Result<Vec<RecordSchema>> {
    let file: SchemaFile =
        serde_yaml::from_str(content).context("Failed to parse record type definitions")?;
    let schemas = file.into_schemas();
    for schema in &schemas {
        schema
            .validate()
            .with_context(|| format!("Invalid record type '{}'", schema.name))?;
    }
    Ok(schemas)
}

pub fn load_schema_file(path: &Path) -> Result<Vec<RecordSchema>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    parse_schemas(&content).with_context(|| format!("In schema file {}", path.display()))
}

/// Define every schema in `store`. Child types go first so their tables
/// exist before any parent references them. Returns the number defined.
pub fn register_all<S>(store: &S, schemas: &[RecordSchema]) -> Result<usize>
where
    S: DocumentStore + ?Sized,
{
    let (children, parents): (Vec<_>, Vec<_>) = schemas.iter().partition(|s| s.istable);
    for schema in children.iter().chain(parents.iter()) {
        store.define_type(schema)?;
        debug!(record_type = %schema.name, fields = schema.fields.len(), "Defined record type");
    }
    info!(count = schemas.len(), "Registered record types");
    Ok(schemas.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::db::SqliteStore;
    use tempfile::TempDir;

    const YAML: &str = r#"
record_types:
  - name: Lead
    autoname: "LEAD-.####"
    is_submittable: 1
    fields:
      - fieldname: lead_name
        fieldtype: Data
        reqd: 1
      - fieldname: customer
        fieldtype: Link
        options: Customer
      - fieldname: plots
        fieldtype: Table
        options: Plot Detail
  - name: Customer
  - name: Plot Detail
    istable: 1
    fields:
      - fieldname: plot_no
        fieldtype: Data
"#;

    #[test]
    fn test_parse_document_form() {
        let schemas = parse_schemas(YAML).unwrap();
        assert_eq!(schemas.len(), 3);
        assert!(schemas[0].is_submittable);
        assert!(schemas[2].istable);
        assert_eq!(schemas[0].get_field("customer").unwrap().fieldtype(), "Link");
    }

    #[test]
    fn test_parse_json_list_form() {
        let json = r#"[{"name": "Tag", "fields": [{"fieldname": "tag", "fieldtype": "Data"}]}]"#;
        let schemas = parse_schemas(json).unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "Tag");
    }

    #[test]
    fn test_parse_rejects_reserved_field() {
        let yaml = "- name: Bad\n  fields:\n    - fieldname: owner\n      fieldtype: Data\n";
        let err = parse_schemas(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid record type 'Bad'"));
    }

    #[test]
    fn test_load_and_register() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("types.yaml");
        std::fs::write(&path, YAML).unwrap();

        let store = SqliteStore::new_in_memory().unwrap();
        let schemas = load_schema_file(&path).unwrap();
        assert_eq!(register_all(&store, &schemas).unwrap(), 3);

        let mut names: Vec<String> = store
            .list_schemas()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Customer", "Lead", "Plot Detail"]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_schema_file(&dir.path().join("nope.yaml")).is_err());
    }
}
