use anyhow::Result;
use docgate_common::{Record, RecordSchema};
use serde_json::Value;

use super::query::{Filters, StoreQuery};

/// The schema-aware document store the gateway runs against.
///
/// Implementations own schemas, records and transactional guarantees; the
/// gateway only reads schemas and reads or rewrites field values. Every
/// method is synchronous and runs to completion on the calling thread.
pub trait DocumentStore {
    fn get_schema(&self, record_type: &str) -> Result<Option<RecordSchema>>;

    fn list_schemas(&self) -> Result<Vec<RecordSchema>>;

    /// Register a record type, creating or extending its backing storage.
    fn define_type(&self, schema: &RecordSchema) -> Result<()>;

    fn get_all(&self, query: &StoreQuery) -> Result<Vec<Record>>;

    fn count(&self, record_type: &str, filters: &Filters, or_filters: &Filters) -> Result<u64>;

    /// Full projection of one record, without child rows.
    fn get(&self, record_type: &str, id: &str) -> Result<Option<Record>>;

    fn exists(&self, record_type: &str, id: &str) -> Result<bool> {
        Ok(self.get(record_type, id)?.is_some())
    }

    /// Child rows of `parent` stored under `parentfield`, ordered by `idx`.
    fn get_children(
        &self,
        child_type: &str,
        parenttype: &str,
        parent: &str,
        parentfield: &str,
    ) -> Result<Vec<Record>>;

    /// Insert a record whose `name` is already assigned. Returns the name.
    fn insert(&self, record_type: &str, record: &Record) -> Result<String>;

    /// Document-level write of already validated fields.
    fn update(&self, record_type: &str, id: &str, fields: &Record) -> Result<usize>;

    fn delete(&self, record_type: &str, id: &str) -> Result<usize>;

    fn delete_children(
        &self,
        child_type: &str,
        parenttype: &str,
        parent: &str,
        parentfield: &str,
    ) -> Result<usize>;

    /// Parameterized `UPDATE` straight against the backing table. Returns
    /// the number of rows touched.
    fn raw_update(&self, record_type: &str, id: &str, set_clauses: &[(String, Value)])
    -> Result<usize>;

    /// Next value of the naming-series counter for `prefix`, starting at 1.
    fn next_series(&self, prefix: &str) -> Result<u64>;
}
