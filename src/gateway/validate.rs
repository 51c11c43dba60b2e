//! Save-path validation shared by insert and update_validated.
//!
//! Bodies are filtered down to the type's data fields, scalar values are
//! coerced to their column's storage class, and Link and Select values are
//! checked. `update_raw` never passes through here.

use docgate_common::{
    CHILD_COLUMNS, FieldDescriptor, FieldKind, Record, RecordSchema, STANDARD_COLUMNS, ScalarKind,
    StorageClass,
};
use serde_json::{Number, Value};

use super::enrich::{Resolver, is_blank, value_text};
use super::store::DocumentStore;
use crate::errors::{GatewayError, GatewayResult};

/// Rows supplied for one Table or Table MultiSelect field.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildTable {
    pub fieldname: String,
    pub child_type: String,
    pub rows: Vec<Record>,
}

/// A request body reduced to what the store will write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedDoc {
    pub fields: Record,
    pub tables: Vec<ChildTable>,
}

/// Keep the body keys that are data fields of `schema`, coerced and checked.
/// Standard columns and unknown keys are dropped.
pub fn prepare<S>(
    resolver: &mut Resolver<'_, S>,
    schema: &RecordSchema,
    body: &Record,
) -> GatewayResult<PreparedDoc>
where
    S: DocumentStore + ?Sized,
{
    let mut prepared = PreparedDoc::default();
    for (key, value) in body {
        if STANDARD_COLUMNS.contains(&key.as_str()) || CHILD_COLUMNS.contains(&key.as_str()) {
            continue;
        }
        let Some(field) = schema.get_field(key) else {
            continue;
        };
        match &field.kind {
            FieldKind::Scalar(kind) => {
                prepared.fields.insert(key.clone(), coerce_scalar(*kind, field, value)?);
            }
            FieldKind::Select { choices } => {
                check_choice(field, choices, value)?;
                prepared.fields.insert(key.clone(), text_or_null(value));
            }
            FieldKind::Link { options } => {
                check_link(resolver, field, options, value)?;
                prepared.fields.insert(key.clone(), text_or_null(value));
            }
            FieldKind::Table { options } | FieldKind::TableMultiSelect { options } => {
                let rows = prepare_rows(resolver, field, options, value)?;
                prepared.tables.push(ChildTable {
                    fieldname: key.clone(),
                    child_type: options.clone(),
                    rows,
                });
            }
            FieldKind::Layout(_) => {}
        }
    }
    Ok(prepared)
}

fn prepare_rows<S>(
    resolver: &mut Resolver<'_, S>,
    field: &FieldDescriptor,
    child_type: &str,
    value: &Value,
) -> GatewayResult<Vec<Record>>
where
    S: DocumentStore + ?Sized,
{
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(GatewayError::Validation(format!(
                "{} must be a list of rows",
                field.display_label()
            )));
        }
    };
    let child_schema = resolver.require_schema(child_type)?;
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(row) = item else {
            return Err(GatewayError::Validation(format!(
                "Each row of {} must be an object",
                field.display_label()
            )));
        };
        // Tables nested inside child rows are dropped.
        let prepared = prepare(resolver, &child_schema, row)?;
        check_mandatory(&child_schema, &prepared.fields)?;
        rows.push(prepared.fields);
    }
    Ok(rows)
}

/// Every required data field of `schema` must be non-blank in `doc`.
pub fn check_mandatory(schema: &RecordSchema, doc: &Record) -> GatewayResult<()> {
    let missing: Vec<&str> = schema
        .storable_fields()
        .filter(|(f, _)| f.reqd)
        .filter(|(f, _)| doc.get(&f.fieldname).is_none_or(is_blank))
        .map(|(f, _)| f.display_label())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::Validation(format!(
            "Mandatory fields required in {}: {}",
            schema.name,
            missing.join(", ")
        )))
    }
}

fn check_choice(field: &FieldDescriptor, choices: &[String], value: &Value) -> GatewayResult<()> {
    if is_blank(value) || choices.is_empty() {
        return Ok(());
    }
    let text = value_text(value);
    if choices.iter().any(|c| *c == text) {
        Ok(())
    } else {
        Err(GatewayError::Validation(format!(
            "{} cannot be \"{}\". It should be one of {}",
            field.display_label(),
            text,
            choices.join(", ")
        )))
    }
}

fn check_link<S>(
    resolver: &mut Resolver<'_, S>,
    field: &FieldDescriptor,
    target: &str,
    value: &Value,
) -> GatewayResult<()>
where
    S: DocumentStore + ?Sized,
{
    if is_blank(value) || resolver.schema(target)?.is_none() {
        return Ok(());
    }
    let name = value_text(value);
    if resolver.store().exists(target, &name)? {
        Ok(())
    } else {
        Err(GatewayError::Validation(format!(
            "Could not find {}: {}",
            field.display_label(),
            name
        )))
    }
}

fn text_or_null(value: &Value) -> Value {
    if value.is_null() {
        Value::Null
    } else {
        Value::String(value_text(value))
    }
}

/// Coerce a body value to the storage class of a scalar field.
pub fn coerce_scalar(kind: ScalarKind, field: &FieldDescriptor, value: &Value) -> GatewayResult<Value> {
    let not_a_number = || {
        GatewayError::Validation(format!(
            "Value '{}' for {} must be a number",
            value_text(value),
            field.display_label()
        ))
    };
    match (kind.storage(), value) {
        (_, Value::Null) => Ok(Value::Null),
        (StorageClass::Integer, Value::Bool(b)) => Ok(Value::from(i64::from(*b))),
        (StorageClass::Integer, Value::Number(n)) => Ok(match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or_default().trunc() as i64),
        }),
        (StorageClass::Integer, Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<i64>()
                .map(Value::from)
                .or_else(|_| s.parse::<f64>().map(|f| Value::from(f.trunc() as i64)))
                .map_err(|_| not_a_number())
        }
        (StorageClass::Real, Value::Bool(b)) => Ok(Value::from(f64::from(u8::from(*b)))),
        (StorageClass::Real, Value::Number(_)) => Ok(value.clone()),
        (StorageClass::Real, Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(not_a_number)
        }
        (StorageClass::Integer | StorageClass::Real, _) => Err(not_a_number()),
        (StorageClass::Text, Value::String(_)) => Ok(value.clone()),
        (StorageClass::Text, _) => Ok(Value::String(value_text(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::db::SqliteStore;
    use serde_json::json;

    fn body(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn fixture() -> (SqliteStore, RecordSchema) {
        let store = SqliteStore::new_in_memory().unwrap();
        store.define_type(&RecordSchema::new("Customer")).unwrap();
        store
            .insert("Customer", &body(json!({"name": "CUST-1"})))
            .unwrap();
        store
            .define_type(
                &RecordSchema::new("Plot Detail")
                    .child()
                    .field(FieldDescriptor::new("plot_no", FieldKind::Scalar(ScalarKind::Data)).required())
                    .field(FieldDescriptor::new("area", FieldKind::Scalar(ScalarKind::Float))),
            )
            .unwrap();
        let lead = RecordSchema::new("Lead")
            .field(FieldDescriptor::new("lead_name", FieldKind::Scalar(ScalarKind::Data)).required())
            .field(FieldDescriptor::new("status", FieldKind::select(["Open", "Closed"])))
            .field(FieldDescriptor::new("customer", FieldKind::link("Customer")))
            .field(FieldDescriptor::new("score", FieldKind::Scalar(ScalarKind::Int)))
            .field(FieldDescriptor::new("plots", FieldKind::table("Plot Detail")));
        store.define_type(&lead).unwrap();
        (store, lead)
    }

    #[test]
    fn keeps_only_data_fields() {
        let (store, lead) = fixture();
        let mut resolver = Resolver::new(&store);
        let prepared = prepare(
            &mut resolver,
            &lead,
            &body(json!({"lead_name": "A", "owner": "x", "bogus": 1, "score": "7"})),
        )
        .unwrap();
        assert_eq!(prepared.fields, body(json!({"lead_name": "A", "score": 7})));
        assert!(prepared.tables.is_empty());
    }

    #[test]
    fn rejects_unknown_select_and_missing_link() {
        let (store, lead) = fixture();
        let mut resolver = Resolver::new(&store);
        let err = prepare(&mut resolver, &lead, &body(json!({"status": "Lost"}))).unwrap_err();
        assert!(err.to_string().contains("should be one of Open, Closed"));
        let err = prepare(&mut resolver, &lead, &body(json!({"customer": "CUST-9"}))).unwrap_err();
        assert_eq!(err.to_string(), "Could not find customer: CUST-9");
        assert!(prepare(&mut resolver, &lead, &body(json!({"customer": "CUST-1", "status": ""}))).is_ok());
    }

    #[test]
    fn table_rows_are_prepared_against_child_schema() {
        let (store, lead) = fixture();
        let mut resolver = Resolver::new(&store);
        let prepared = prepare(
            &mut resolver,
            &lead,
            &body(json!({"plots": [{"plot_no": "A1", "area": "10.5", "junk": true}]})),
        )
        .unwrap();
        assert_eq!(prepared.tables.len(), 1);
        assert_eq!(prepared.tables[0].child_type, "Plot Detail");
        assert_eq!(prepared.tables[0].rows[0], body(json!({"plot_no": "A1", "area": 10.5})));

        let missing = prepare(&mut resolver, &lead, &body(json!({"plots": [{"area": 1}]})));
        assert!(missing.unwrap_err().to_string().contains("Mandatory fields required in Plot Detail"));
        let not_list = prepare(&mut resolver, &lead, &body(json!({"plots": "A1"})));
        assert_eq!(not_list.unwrap_err().status_code(), 400);
    }

    #[test]
    fn mandatory_check_names_labels() {
        let (_, lead) = fixture();
        let err = check_mandatory(&lead, &body(json!({"lead_name": ""}))).unwrap_err();
        assert_eq!(err.to_string(), "Mandatory fields required in Lead: lead_name");
        assert!(check_mandatory(&lead, &body(json!({"lead_name": "A"}))).is_ok());
    }

    #[test]
    fn numeric_coercion() {
        let int = FieldDescriptor::new("n", FieldKind::Scalar(ScalarKind::Int));
        assert_eq!(coerce_scalar(ScalarKind::Int, &int, &json!("42")).unwrap(), json!(42));
        assert_eq!(coerce_scalar(ScalarKind::Check, &int, &json!(true)).unwrap(), json!(1));
        assert_eq!(coerce_scalar(ScalarKind::Int, &int, &json!("")).unwrap(), Value::Null);
        assert!(coerce_scalar(ScalarKind::Int, &int, &json!("forty")).is_err());
        assert!(coerce_scalar(ScalarKind::Currency, &int, &json!([1])).is_err());
        assert_eq!(
            coerce_scalar(ScalarKind::Data, &int, &json!(12)).unwrap(),
            json!("12")
        );
    }
}
