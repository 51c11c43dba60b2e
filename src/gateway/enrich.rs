//! Link and child-table resolution.
//!
//! A [`Resolver`] lives for one request and caches every schema it loads, so
//! a page of rows with the same Link column costs one schema read.

use std::collections::HashMap;
use std::rc::Rc;

use docgate_common::{FieldDescriptor, FieldKind, Record, RecordSchema};
use serde::Serialize;
use serde_json::{Map, Value};

use super::query::{Direction, OrderBy, Projection, StoreQuery};
use super::store::DocumentStore;
use crate::errors::{GatewayError, GatewayResult};

const DETAIL_SUFFIX: &str = " Detail";

/// One `{value, label}` entry of a field's options list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
}

/// Shape of a child-table column in `sub_fields`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubField {
    pub fieldname: String,
    pub fieldtype: String,
    pub options: Option<String>,
}

impl From<&FieldDescriptor> for SubField {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            fieldname: field.fieldname.clone(),
            fieldtype: field.fieldtype().to_string(),
            options: field.kind.options_text(),
        }
    }
}

/// Target type of a Table MultiSelect child type: `"Plot Detail"` -> `"Plot"`.
pub fn multiselect_target(child_type: &str) -> &str {
    child_type.strip_suffix(DETAIL_SUFFIX).unwrap_or(child_type)
}

/// True for values that count as "no reference".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    schemas: HashMap<String, Option<Rc<RecordSchema>>>,
}

impl<'a, S> Resolver<'a, S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            schemas: HashMap::new(),
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn schema(&mut self, record_type: &str) -> GatewayResult<Option<Rc<RecordSchema>>> {
        if let Some(cached) = self.schemas.get(record_type) {
            return Ok(cached.clone());
        }
        let loaded = self.store.get_schema(record_type)?.map(Rc::new);
        self.schemas.insert(record_type.to_string(), loaded.clone());
        Ok(loaded)
    }

    pub fn require_schema(&mut self, record_type: &str) -> GatewayResult<Rc<RecordSchema>> {
        self.schema(record_type)?
            .ok_or_else(|| GatewayError::UnknownRecordType(record_type.to_string()))
    }

    /// A field descriptor in platform shape, annotated for its kind.
    ///
    /// Link and Table MultiSelect fields gain `options_list` and
    /// `title_field`; Table fields gain `sub_fields`. A missing target schema
    /// leaves the descriptor unannotated.
    pub fn describe_field(&mut self, field: &FieldDescriptor) -> GatewayResult<Value> {
        let mut described = match serde_json::to_value(field)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match &field.kind {
            FieldKind::Link { options } => {
                self.annotate_options(&mut described, options)?;
            }
            FieldKind::TableMultiSelect { options } => {
                self.annotate_options(&mut described, multiselect_target(options))?;
            }
            FieldKind::Table { options } => {
                if let Some(child) = self.schema(options)? {
                    let sub_fields: Vec<SubField> = child.fields.iter().map(SubField::from).collect();
                    described.insert("sub_fields".into(), serde_json::to_value(sub_fields)?);
                }
            }
            FieldKind::Scalar(_) | FieldKind::Select { .. } | FieldKind::Layout(_) => {}
        }
        Ok(Value::Object(described))
    }

    /// Options and title come from `target`'s schema. For Table MultiSelect
    /// that is the stripped target (`Tag` for `Tag Detail`), not the child type.
    fn annotate_options(&mut self, described: &mut Map<String, Value>, target: &str) -> GatewayResult<()> {
        let Some(schema) = self.schema(target)? else {
            return Ok(());
        };
        let title = schema.title_field().map(str::to_string);
        let options = self.options_list(&schema, title.as_deref())?;
        described.insert("options_list".into(), serde_json::to_value(options)?);
        described.insert(
            "title_field".into(),
            title.map(Value::String).unwrap_or(Value::Null),
        );
        Ok(())
    }

    /// Every record of `schema` as `{value: name, label: title or name}`.
    pub fn options_list(
        &self,
        schema: &RecordSchema,
        title_field: Option<&str>,
    ) -> GatewayResult<Vec<OptionItem>> {
        let title_field = title_field.filter(|t| schema.has_column(t));
        let mut columns = vec!["name"];
        columns.extend(title_field.filter(|t| *t != "name"));
        let query = StoreQuery::new(&schema.name)
            .project(Projection::columns(&columns))
            .order_by(OrderBy(vec![("modified".into(), Direction::Desc)]).with_tiebreaker());
        let rows = self.store.get_all(&query)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let value = row.get("name").map(value_text).unwrap_or_default();
                let label = title_field
                    .and_then(|t| row.get(t))
                    .filter(|v| !is_blank(v))
                    .map(value_text)
                    .unwrap_or_else(|| value.clone());
                OptionItem { value, label }
            })
            .collect())
    }

    /// The full linked record, or `None` when the value is blank, the target
    /// type is unknown, or no such record exists.
    pub fn resolve_link(&mut self, target: &str, value: &Value) -> GatewayResult<Option<Record>> {
        if is_blank(value) || self.schema(target)?.is_none() {
            return Ok(None);
        }
        Ok(self.store.get(target, &value_text(value))?)
    }

    /// Attach `<field>_data` for every non-blank Link column of `row`.
    pub fn attach_links(&mut self, schema: &RecordSchema, row: &mut Record) -> GatewayResult<()> {
        for (field, target) in schema.link_fields() {
            let Some(value) = row.get(&field.fieldname).cloned() else {
                continue;
            };
            if let Some(linked) = self.resolve_link(target, &value)? {
                row.insert(format!("{}_data", field.fieldname), Value::Object(linked));
            }
        }
        Ok(())
    }
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::db::SqliteStore;
    use docgate_common::ScalarKind;
    use serde_json::json;

    fn insert(store: &SqliteStore, rt: &str, fields: Value) {
        let rec = fields.as_object().cloned().unwrap();
        store.insert(rt, &rec).unwrap();
    }

    fn fixture() -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .define_type(
                &RecordSchema::new("Customer")
                    .field(FieldDescriptor::new(
                        "customer_name",
                        FieldKind::Scalar(ScalarKind::Data),
                    ))
                    .with_title_field("customer_name"),
            )
            .unwrap();
        store
            .define_type(
                &RecordSchema::new("Plot").field(FieldDescriptor::new(
                    "area",
                    FieldKind::Scalar(ScalarKind::Float),
                )),
            )
            .unwrap();
        store
            .define_type(
                &RecordSchema::new("Plot Detail")
                    .child()
                    .field(FieldDescriptor::new("plot", FieldKind::link("Plot"))),
            )
            .unwrap();
        insert(&store, "Customer", json!({"name": "CUST-1", "customer_name": "Acme", "modified": "2"}));
        insert(&store, "Customer", json!({"name": "CUST-2", "customer_name": "", "modified": "1"}));
        insert(&store, "Plot", json!({"name": "P-1", "area": 12.5}));
        store
    }

    #[test]
    fn link_fields_get_options_with_title_labels() {
        let store = fixture();
        let mut resolver = Resolver::new(&store);
        let field = FieldDescriptor::new("customer", FieldKind::link("Customer"));
        let described = resolver.describe_field(&field).unwrap();
        assert_eq!(described["title_field"], "customer_name");
        assert_eq!(
            described["options_list"],
            json!([
                {"value": "CUST-1", "label": "Acme"},
                {"value": "CUST-2", "label": "CUST-2"}
            ])
        );
    }

    #[test]
    fn multiselect_strips_detail_suffix() {
        let store = fixture();
        let mut resolver = Resolver::new(&store);
        let field = FieldDescriptor::new("plots", FieldKind::table_multiselect("Plot Detail"));
        let described = resolver.describe_field(&field).unwrap();
        assert_eq!(described["title_field"], Value::Null);
        assert_eq!(described["options_list"], json!([{"value": "P-1", "label": "P-1"}]));
    }

    #[test]
    fn multiselect_title_comes_from_stripped_target() {
        let store = fixture();
        store
            .define_type(
                &RecordSchema::new("Zone")
                    .field(FieldDescriptor::new("zone_name", FieldKind::Scalar(ScalarKind::Data)))
                    .with_title_field("zone_name"),
            )
            .unwrap();
        store
            .define_type(
                &RecordSchema::new("Zone Detail")
                    .child()
                    .field(FieldDescriptor::new("zone", FieldKind::link("Zone")))
                    .with_title_field("zone"),
            )
            .unwrap();
        insert(&store, "Zone", json!({"name": "Z-1", "zone_name": "North"}));
        let mut resolver = Resolver::new(&store);
        let field = FieldDescriptor::new("zones", FieldKind::table_multiselect("Zone Detail"));
        let described = resolver.describe_field(&field).unwrap();
        assert_eq!(described["title_field"], "zone_name");
        assert_eq!(described["options_list"], json!([{"value": "Z-1", "label": "North"}]));
    }

    #[test]
    fn table_fields_get_sub_fields() {
        let store = fixture();
        let mut resolver = Resolver::new(&store);
        let field = FieldDescriptor::new("plot_rows", FieldKind::table("Plot Detail"));
        let described = resolver.describe_field(&field).unwrap();
        assert_eq!(
            described["sub_fields"],
            json!([{"fieldname": "plot", "fieldtype": "Link", "options": "Plot"}])
        );
        assert!(described.get("options_list").is_none());
    }

    #[test]
    fn missing_target_skips_enrichment() {
        let store = fixture();
        let mut resolver = Resolver::new(&store);
        let field = FieldDescriptor::new("territory", FieldKind::link("Territory"));
        let described = resolver.describe_field(&field).unwrap();
        assert!(described.get("options_list").is_none());
        assert_eq!(described["fieldtype"], "Link");
    }

    #[test]
    fn resolve_link_ignores_blank_and_unknown() {
        let store = fixture();
        let mut resolver = Resolver::new(&store);
        assert!(resolver.resolve_link("Plot", &json!("")).unwrap().is_none());
        assert!(resolver.resolve_link("Plot", &json!("P-9")).unwrap().is_none());
        assert!(resolver.resolve_link("Nope", &json!("P-1")).unwrap().is_none());
        let plot = resolver.resolve_link("Plot", &json!("P-1")).unwrap().unwrap();
        assert_eq!(plot["area"], json!(12.5));
    }

    #[test]
    fn multiselect_target_name() {
        assert_eq!(multiselect_target("Plot Detail"), "Plot");
        assert_eq!(multiselect_target("Tags"), "Tags");
    }
}
