use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use docgate_common::schema::{is_valid_fieldname, is_valid_type_name};
use docgate_common::{Record, RecordSchema};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use super::query::{Filter, FilterOp, Filters, Projection, StoreQuery};
use super::store::DocumentStore;
use crate::errors::{GatewayError, GatewayResult};

/// Async-safe handle to the record store.
///
/// Wraps `SqliteStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`. Calls are serialized: each one
/// runs to completion before the next acquires the store.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<std::sync::Mutex<SqliteStore>>,
}

impl StoreHandle {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> GatewayResult<R>
    where
        F: FnOnce(&SqliteStore) -> GatewayResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock().map_err(|_| GatewayError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| GatewayError::Store(anyhow::anyhow!("Store task panicked: {}", e)))?
    }
}

/// SQLite-backed [`DocumentStore`]. Each record type lives in a `tab<Type>`
/// table; schemas are kept as JSON in `__record_types`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS __record_types (
                    name TEXT PRIMARY KEY,
                    definition TEXT NOT NULL,
                    modified TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS __series (
                    prefix TEXT PRIMARY KEY,
                    current INTEGER NOT NULL DEFAULT 0
                );
                ",
            )
            .context("Failed to create metadata tables")?;
        Ok(())
    }

    fn query_records(&self, sql: &str, values: &[SqlValue]) -> Result<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let mut record = Record::new();
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(record)
            })
            .context("Failed to run query")?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("Failed to read row")?);
        }
        Ok(records)
    }

    fn write_fields(&self, record_type: &str, id: &str, fields: &[(&str, &Value)]) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut sets = Vec::with_capacity(fields.len());
        let mut values = Vec::with_capacity(fields.len() + 1);
        for (column, value) in fields {
            sets.push(format!("{} = ?", quote_column(column)?));
            values.push(to_sql(value));
        }
        values.push(SqlValue::Text(id.to_string()));
        let sql = format!(
            "UPDATE {} SET {} WHERE name = ?",
            table_name(record_type)?,
            sets.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .with_context(|| format!("Failed to update {} {}", record_type, id))
    }
}

impl DocumentStore for SqliteStore {
    fn get_schema(&self, record_type: &str) -> Result<Option<RecordSchema>> {
        let definition: Option<String> = self
            .conn
            .query_row(
                "SELECT definition FROM __record_types WHERE name = ?1",
                params![record_type],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query record type")?;
        definition
            .map(|d| {
                serde_json::from_str(&d)
                    .with_context(|| format!("Corrupt schema definition for {}", record_type))
            })
            .transpose()
    }

    fn list_schemas(&self) -> Result<Vec<RecordSchema>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, definition FROM __record_types ORDER BY name")
            .context("Failed to prepare list_schemas")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("Failed to query record types")?;
        let mut schemas = Vec::new();
        for row in rows {
            let (name, definition) = row.context("Failed to read record type row")?;
            schemas.push(
                serde_json::from_str(&definition)
                    .with_context(|| format!("Corrupt schema definition for {}", name))?,
            );
        }
        Ok(schemas)
    }

    fn define_type(&self, schema: &RecordSchema) -> Result<()> {
        schema
            .validate()
            .with_context(|| format!("Invalid schema for {}", schema.name))?;
        let table = table_name(&schema.name)?;

        let child_columns = if schema.istable {
            ",
                parent TEXT,
                parentfield TEXT,
                parenttype TEXT,
                idx INTEGER NOT NULL DEFAULT 0"
        } else {
            ""
        };
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    name TEXT PRIMARY KEY,
                    owner TEXT,
                    creation TEXT,
                    modified TEXT,
                    modified_by TEXT,
                    docstatus INTEGER NOT NULL DEFAULT 0{child_columns}
                );"
            ))
            .with_context(|| format!("Failed to create table for {}", schema.name))?;

        // Additive migrations: only "duplicate column" is tolerated.
        for (field, storage) in schema.storable_fields() {
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table,
                quote_column(&field.fieldname)?,
                storage.as_sql()
            );
            match self.conn.execute(&sql, []) {
                Ok(_) => {}
                Err(e) if e.to_string().contains("duplicate column") => {}
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to add column {} to {}: {}",
                        field.fieldname,
                        schema.name,
                        e
                    ));
                }
            }
        }

        let index_prefix = schema.name.replace([' ', '-'], "_");
        let mut indexes = format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{index_prefix}_modified\" ON {table}(modified);"
        );
        if schema.istable {
            indexes.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{index_prefix}_parent\" ON {table}(parent, parentfield);"
            ));
        }
        self.conn
            .execute_batch(&indexes)
            .with_context(|| format!("Failed to create indexes for {}", schema.name))?;

        let definition = serde_json::to_string(schema).context("Failed to serialize schema")?;
        self.conn
            .execute(
                "INSERT INTO __record_types (name, definition) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET definition = excluded.definition,
                                                 modified = datetime('now')",
                params![schema.name, definition],
            )
            .context("Failed to store schema definition")?;
        Ok(())
    }

    fn get_all(&self, query: &StoreQuery) -> Result<Vec<Record>> {
        let columns = match &query.projection {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| quote_column(c))
                .collect::<Result<Vec<_>>>()?
                .join(", "),
        };
        let mut values = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            columns,
            table_name(&query.record_type)?,
            where_clause(&query.filters, &query.or_filters, &mut values)?
        );
        if let Some(order_by) = query.order_by.as_ref().filter(|o| !o.0.is_empty()) {
            let terms = order_by
                .0
                .iter()
                .map(|(c, d)| Ok(format!("{} {}", quote_column(c)?, d.as_sql())))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
        // SQLite reads a negative OFFSET as 0, so large values saturate instead.
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(SqlValue::Integer(limit));
        values.push(SqlValue::Integer(offset));
        self.query_records(&sql, &values)
    }

    fn count(&self, record_type: &str, filters: &Filters, or_filters: &Filters) -> Result<u64> {
        let mut values = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            table_name(record_type)?,
            where_clause(filters, or_filters, &mut values)?
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .with_context(|| format!("Failed to count {}", record_type))?;
        Ok(count.max(0) as u64)
    }

    fn get(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE name = ?", table_name(record_type)?);
        let mut rows = self.query_records(&sql, &[SqlValue::Text(id.to_string())])?;
        Ok(rows.pop())
    }

    fn get_children(
        &self,
        child_type: &str,
        parenttype: &str,
        parent: &str,
        parentfield: &str,
    ) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE parent = ? AND parenttype = ? AND parentfield = ? ORDER BY idx",
            table_name(child_type)?
        );
        self.query_records(
            &sql,
            &[
                SqlValue::Text(parent.to_string()),
                SqlValue::Text(parenttype.to_string()),
                SqlValue::Text(parentfield.to_string()),
            ],
        )
    }

    fn insert(&self, record_type: &str, record: &Record) -> Result<String> {
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .context("Record has no name")?
            .to_string();
        let mut columns = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (column, value) in record {
            columns.push(quote_column(column)?);
            values.push(to_sql(value));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_name(record_type)?,
            columns.join(", "),
            vec!["?"; values.len()].join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .with_context(|| format!("Failed to insert {} {}", record_type, name))?;
        Ok(name)
    }

    fn update(&self, record_type: &str, id: &str, fields: &Record) -> Result<usize> {
        let pairs: Vec<(&str, &Value)> = fields
            .iter()
            .filter(|(k, _)| k.as_str() != "name")
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        self.write_fields(record_type, id, &pairs)
    }

    fn delete(&self, record_type: &str, id: &str) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE name = ?1", table_name(record_type)?);
        self.conn
            .execute(&sql, params![id])
            .with_context(|| format!("Failed to delete {} {}", record_type, id))
    }

    fn delete_children(
        &self,
        child_type: &str,
        parenttype: &str,
        parent: &str,
        parentfield: &str,
    ) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE parent = ?1 AND parenttype = ?2 AND parentfield = ?3",
            table_name(child_type)?
        );
        self.conn
            .execute(&sql, params![parent, parenttype, parentfield])
            .with_context(|| format!("Failed to delete {} rows of {} {}", child_type, parenttype, parent))
    }

    fn raw_update(
        &self,
        record_type: &str,
        id: &str,
        set_clauses: &[(String, Value)],
    ) -> Result<usize> {
        let pairs: Vec<(&str, &Value)> = set_clauses.iter().map(|(k, v)| (k.as_str(), v)).collect();
        self.write_fields(record_type, id, &pairs)
    }

    fn next_series(&self, prefix: &str) -> Result<u64> {
        let current: i64 = self
            .conn
            .query_row(
                "INSERT INTO __series (prefix, current) VALUES (?1, 1)
                 ON CONFLICT(prefix) DO UPDATE SET current = current + 1
                 RETURNING current",
                params![prefix],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to advance naming series {}", prefix))?;
        Ok(current as u64)
    }
}

// ── SQL helpers ───────────────────────────────────────────────────────

fn table_name(record_type: &str) -> Result<String> {
    if !is_valid_type_name(record_type) {
        anyhow::bail!("Invalid record type name '{}'", record_type);
    }
    Ok(format!("\"tab{}\"", record_type))
}

fn quote_column(column: &str) -> Result<String> {
    if !is_valid_fieldname(column) {
        anyhow::bail!("Invalid column name '{}'", column);
    }
    Ok(format!("\"{}\"", column))
}

fn where_clause(filters: &Filters, or_filters: &Filters, values: &mut Vec<SqlValue>) -> Result<String> {
    let mut parts = Vec::new();
    for filter in filters.iter() {
        parts.push(condition(filter, values)?);
    }
    if !or_filters.is_empty() {
        let alternatives = or_filters
            .iter()
            .map(|f| condition(f, values))
            .collect::<Result<Vec<_>>>()?;
        parts.push(format!("({})", alternatives.join(" OR ")));
    }
    if parts.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }
}

fn condition(filter: &Filter, values: &mut Vec<SqlValue>) -> Result<String> {
    let column = quote_column(&filter.field)?;
    let sql = match filter.op {
        FilterOp::Eq | FilterOp::NotEq if filter.value.is_null() => {
            let not = if filter.op == FilterOp::NotEq { " NOT" } else { "" };
            format!("{} IS{} NULL", column, not)
        }
        FilterOp::Eq
        | FilterOp::NotEq
        | FilterOp::Lt
        | FilterOp::Gt
        | FilterOp::Le
        | FilterOp::Ge => {
            values.push(to_sql(&filter.value));
            format!("{} {} ?", column, filter.op.as_str())
        }
        FilterOp::Like | FilterOp::NotLike => {
            values.push(SqlValue::Text(value_text(&filter.value)));
            let not = if filter.op == FilterOp::NotLike { "NOT " } else { "" };
            format!("{} {}LIKE ?", column, not)
        }
        FilterOp::In | FilterOp::NotIn => {
            let items = filter.value.as_array().map(Vec::as_slice).unwrap_or_default();
            if items.is_empty() {
                // Empty membership: nothing is in it, everything is outside it.
                return Ok(if filter.op == FilterOp::In { "0".into() } else { "1".into() });
            }
            values.extend(items.iter().map(to_sql));
            let not = if filter.op == FilterOp::NotIn { "NOT " } else { "" };
            format!("{} {}IN ({})", column, not, vec!["?"; items.len()].join(", "))
        }
        FilterOp::Is => {
            if filter.value.as_str() == Some("set") {
                format!("({c} IS NOT NULL AND {c} != '')", c = column)
            } else {
                format!("({c} IS NULL OR {c} = '')", c = column)
            }
        }
        FilterOp::Between => {
            let bounds = filter
                .value
                .as_array()
                .filter(|b| b.len() == 2)
                .context("between needs two bounds")?;
            values.push(to_sql(&bounds[0]));
            values.push(to_sql(&bounds[1]));
            format!("{} BETWEEN ? AND ?", column)
        }
    };
    Ok(sql)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::query::{Direction, OrderBy};
    use docgate_common::{FieldDescriptor, FieldKind, ScalarKind};
    use serde_json::json;

    fn store_with_leads() -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .define_type(
                &RecordSchema::new("Lead")
                    .field(FieldDescriptor::new("status", FieldKind::Scalar(ScalarKind::Data)))
                    .field(FieldDescriptor::new("score", FieldKind::Scalar(ScalarKind::Int))),
            )
            .unwrap();
        for (i, status) in ["Open", "Open", "Closed"].iter().enumerate() {
            let mut rec = Record::new();
            rec.insert("name".into(), json!(format!("LEAD-{}", i + 1)));
            rec.insert("status".into(), json!(status));
            rec.insert("score".into(), json!(i * 10));
            rec.insert("modified".into(), json!(format!("2025-01-0{} 00:00:00", i + 1)));
            store.insert("Lead", &rec).unwrap();
        }
        store
    }

    #[test]
    fn define_type_round_trips_schema() {
        let store = store_with_leads();
        let schema = store.get_schema("Lead").unwrap().unwrap();
        assert_eq!(schema.name, "Lead");
        assert!(store.get_schema("Missing").unwrap().is_none());
        assert_eq!(store.list_schemas().unwrap().len(), 1);
    }

    #[test]
    fn redefining_adds_columns_without_failing() {
        let store = store_with_leads();
        let extended = store
            .get_schema("Lead")
            .unwrap()
            .unwrap()
            .field(FieldDescriptor::new("source", FieldKind::Scalar(ScalarKind::Data)));
        store.define_type(&extended).unwrap();
        store.define_type(&extended).unwrap();
        let rec = store.get("Lead", "LEAD-1").unwrap().unwrap();
        assert_eq!(rec["source"], Value::Null);
    }

    #[test]
    fn get_all_filters_orders_and_pages() {
        let store = store_with_leads();
        let query = StoreQuery::new("Lead")
            .project(Projection::columns(&["name", "status"]))
            .filter(Filter::eq("status", "Open"))
            .order_by(OrderBy(vec![("modified".into(), Direction::Desc)]))
            .page(0, 1);
        let rows = store.get_all(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "LEAD-2");
        assert!(rows[0].get("score").is_none());
    }

    #[test]
    fn get_all_offset_beyond_i64_is_empty() {
        let store = store_with_leads();
        let query = StoreQuery::new("Lead").page(u64::MAX - 5, 10);
        assert!(store.get_all(&query).unwrap().is_empty());
        let query = StoreQuery::new("Lead").page(0, u64::MAX);
        assert_eq!(store.get_all(&query).unwrap().len(), 3);
    }

    #[test]
    fn count_combines_filters_and_or_filters() {
        let store = store_with_leads();
        let filters = Filters(vec![Filter::eq("status", "Open")]);
        let or_filters = Filters::from_value(&json!([["score", "=", 0], ["score", ">", 5]])).unwrap();
        assert_eq!(store.count("Lead", &filters, &Filters::default()).unwrap(), 2);
        assert_eq!(store.count("Lead", &filters, &or_filters).unwrap(), 2);
        let only_zero = Filters::from_value(&json!([["score", "=", 0]])).unwrap();
        assert_eq!(store.count("Lead", &filters, &only_zero).unwrap(), 1);
    }

    #[test]
    fn membership_and_set_filters() {
        let store = store_with_leads();
        let in_filter = Filters::from_value(&json!({"name": ["in", ["LEAD-1", "LEAD-3"]]})).unwrap();
        assert_eq!(store.count("Lead", &in_filter, &Filters::default()).unwrap(), 2);
        let empty_in = Filters::from_value(&json!({"name": ["in", []]})).unwrap();
        assert_eq!(store.count("Lead", &empty_in, &Filters::default()).unwrap(), 0);
        let not_set = Filters::from_value(&json!({"owner": ["is", "not set"]})).unwrap();
        assert_eq!(store.count("Lead", &not_set, &Filters::default()).unwrap(), 3);
        let like = Filters::from_value(&json!({"status": ["like", "Clo%"]})).unwrap();
        assert_eq!(store.count("Lead", &like, &Filters::default()).unwrap(), 1);
    }

    #[test]
    fn raw_update_reports_affected_rows() {
        let store = store_with_leads();
        let n = store
            .raw_update("Lead", "LEAD-1", &[("status".into(), json!("Closed"))])
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.get("Lead", "LEAD-1").unwrap().unwrap()["status"], "Closed");
        let missing = store
            .raw_update("Lead", "LEAD-9", &[("status".into(), json!("Closed"))])
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn raw_update_rejects_bad_identifiers() {
        let store = store_with_leads();
        let err = store
            .raw_update("Lead", "LEAD-1", &[("status = 'x' --".into(), json!("y"))])
            .unwrap_err();
        assert!(err.to_string().contains("Invalid column"));
    }

    #[test]
    fn numbers_round_trip_with_column_affinity() {
        let store = store_with_leads();
        let rec = store.get("Lead", "LEAD-3").unwrap().unwrap();
        assert_eq!(rec["score"], json!(20));
    }

    #[test]
    fn children_are_scoped_to_parent_and_field() {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .define_type(
                &RecordSchema::new("Plot Detail")
                    .child()
                    .field(FieldDescriptor::new("plot_no", FieldKind::Scalar(ScalarKind::Data))),
            )
            .unwrap();
        for (i, parent) in ["L-1", "L-1", "L-2"].iter().enumerate() {
            let mut row = Record::new();
            row.insert("name".into(), json!(format!("row{}", i)));
            row.insert("parent".into(), json!(parent));
            row.insert("parenttype".into(), json!("Lead"));
            row.insert("parentfield".into(), json!("plots"));
            row.insert("idx".into(), json!(2 - i));
            store.insert("Plot Detail", &row).unwrap();
        }
        let rows = store.get_children("Plot Detail", "Lead", "L-1", "plots").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "row1");
        assert_eq!(
            store.delete_children("Plot Detail", "Lead", "L-1", "plots").unwrap(),
            2
        );
    }

    #[test]
    fn naming_series_counts_per_prefix() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(store.next_series("LEAD-").unwrap(), 1);
        assert_eq!(store.next_series("LEAD-").unwrap(), 2);
        assert_eq!(store.next_series("CUST-").unwrap(), 1);
    }

    #[tokio::test]
    async fn handle_runs_calls_on_blocking_pool() {
        let handle = StoreHandle::new(store_with_leads());
        let count = handle
            .call(|store| {
                store
                    .count("Lead", &Filters::default(), &Filters::default())
                    .map_err(GatewayError::from)
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
