//! Declarative query pieces: filters, ordering and projection.
//!
//! Filters accept both platform shapes:
//!
//! ```text
//! {"status": "Open", "source": ["in", ["Web", "Walk In"]]}
//! [["status", "=", "Open"], ["Lead", "source", "like", "%Web%"]]
//! ```
//!
//! Nothing here talks to a store; column names are checked against a
//! [`RecordSchema`] before a query is handed to one.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use docgate_common::RecordSchema;
use regex::Regex;
use serde_json::Value;

use crate::errors::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    Is,
    Between,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::Between => "between",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            "is" => Ok(Self::Is),
            "between" => Ok(Self::Between),
            _ => Err(GatewayError::bad_request(format!(
                "Invalid filter operator '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> GatewayResult<Self> {
        let field = field.into();
        let value = normalize_value(&field, op, value)?;
        Ok(Self { field, op, value })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }
}

/// `in` accepts a comma-separated string, `between` needs two bounds and
/// `is` only understands `set` / `not set`.
fn normalize_value(field: &str, op: FilterOp, value: Value) -> GatewayResult<Value> {
    match op {
        FilterOp::In | FilterOp::NotIn => match value {
            Value::Array(_) => Ok(value),
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            )),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Ok(Value::Array(vec![other])),
        },
        FilterOp::Between => match &value {
            Value::Array(bounds) if bounds.len() == 2 => Ok(value),
            _ => Err(GatewayError::bad_request(format!(
                "Filter on '{}' with 'between' needs a two-element list",
                field
            ))),
        },
        FilterOp::Is => match value.as_str().map(str::to_lowercase).as_deref() {
            Some("set") => Ok(Value::String("set".into())),
            Some("not set") => Ok(Value::String("not set".into())),
            _ => Err(GatewayError::bad_request(format!(
                "Filter on '{}' with 'is' expects 'set' or 'not set'",
                field
            ))),
        },
        _ => Ok(value),
    }
}

/// Conjunction of filters (or, for `or_filters`, a disjunction; the store
/// decides how to join them).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(pub Vec<Filter>);

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    /// Build from an already-decoded JSON value. A well-formed value of the
    /// wrong shape is a client error.
    pub fn from_value(value: &Value) -> GatewayResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => map
                .iter()
                .map(|(field, v)| object_entry(field, v))
                .collect::<GatewayResult<Vec<_>>>()
                .map(Self),
            Value::Array(items) => items
                .iter()
                .map(list_entry)
                .collect::<GatewayResult<Vec<_>>>()
                .map(Self),
            _ => Err(GatewayError::bad_request(
                "Filters must be an object or a list of conditions",
            )),
        }
    }

    pub fn validate_against(&self, schema: &RecordSchema) -> GatewayResult<()> {
        for filter in &self.0 {
            if !schema.has_column(&filter.field) {
                return Err(GatewayError::bad_request(format!(
                    "Unknown field '{}' in filters for {}",
                    filter.field, schema.name
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<Filter> for Filters {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn object_entry(field: &str, value: &Value) -> GatewayResult<Filter> {
    match value {
        Value::Array(parts) if parts.len() == 2 && parts[0].is_string() => {
            let op: FilterOp = parts[0].as_str().unwrap_or_default().parse()?;
            Filter::new(field, op, parts[1].clone())
        }
        Value::Array(_) => Err(GatewayError::bad_request(format!(
            "Filter on '{}' must be a value or an [operator, value] pair",
            field
        ))),
        other => Filter::new(field, FilterOp::Eq, other.clone()),
    }
}

fn list_entry(item: &Value) -> GatewayResult<Filter> {
    let parts = item
        .as_array()
        .ok_or_else(|| GatewayError::bad_request("Each filter must be a list"))?;
    // [field, op, value] or [record_type, field, op, value]
    let (field, op, value) = match parts.as_slice() {
        [field, op, value] => (field, op, value),
        [_, field, op, value] => (field, op, value),
        _ => {
            return Err(GatewayError::bad_request(
                "Each filter must be [field, operator, value]",
            ));
        }
    };
    let field = field
        .as_str()
        .ok_or_else(|| GatewayError::bad_request("Filter field must be a string"))?;
    let op: FilterOp = op
        .as_str()
        .ok_or_else(|| GatewayError::bad_request("Filter operator must be a string"))?
        .parse()?;
    Filter::new(field, op, value.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

static ORDER_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^`?(?:tab[A-Za-z0-9 _-]+`?\.`?)?([A-Za-z_][A-Za-z0-9_]*)`?(?:\s+(asc|desc))?$")
        .expect("order term pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy(pub Vec<(String, Direction)>);

impl OrderBy {
    /// Parse `"field [asc|desc], ..."`. The direction defaults to ascending.
    pub fn parse(text: &str) -> GatewayResult<Self> {
        let mut terms = Vec::new();
        for raw in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let caps = ORDER_TERM.captures(raw).ok_or_else(|| {
                GatewayError::bad_request(format!("Invalid order_by term '{}'", raw))
            })?;
            let direction = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
                Some(d) if d == "desc" => Direction::Desc,
                _ => Direction::Asc,
            };
            terms.push((caps[1].to_string(), direction));
        }
        Ok(Self(terms))
    }

    pub fn validate_against(&self, schema: &RecordSchema) -> GatewayResult<()> {
        for (column, _) in &self.0 {
            if !schema.has_column(column) {
                return Err(GatewayError::bad_request(format!(
                    "Unknown field '{}' in order_by for {}",
                    column, schema.name
                )));
            }
        }
        Ok(())
    }

    /// Append `name asc` so rows with equal sort keys page deterministically.
    pub fn with_tiebreaker(mut self) -> Self {
        if !self.0.iter().any(|(c, _)| c == "name") {
            self.0.push(("name".to_string(), Direction::Asc));
        }
        self
    }
}

/// Column selection for a page query.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

impl Projection {
    /// Resolve a requested field list against the schema. An empty list or
    /// `"*"` selects every column; `name` is always included.
    pub fn resolve(requested: &[String], schema: &RecordSchema) -> GatewayResult<Self> {
        if requested.is_empty() || requested.iter().any(|f| f == "*") {
            return Ok(Self::All);
        }
        let mut columns = vec!["name".to_string()];
        for field in requested {
            if !schema.has_column(field) {
                return Err(GatewayError::bad_request(format!(
                    "Unknown field '{}' for {}",
                    field, schema.name
                )));
            }
            if !columns.contains(field) {
                columns.push(field.clone());
            }
        }
        Ok(Self::Columns(columns))
    }

    pub fn columns(names: &[&str]) -> Self {
        Self::Columns(names.iter().map(|n| n.to_string()).collect())
    }
}

/// A fully resolved read against one record type.
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub record_type: String,
    pub projection: Projection,
    pub filters: Filters,
    pub or_filters: Filters,
    pub order_by: Option<OrderBy>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl StoreQuery {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            projection: Projection::All,
            filters: Filters::default(),
            or_filters: Filters::default(),
            order_by: None,
            offset: 0,
            limit: None,
        }
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.0.push(filter);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_common::{FieldDescriptor, FieldKind, ScalarKind};
    use serde_json::json;

    fn lead_schema() -> RecordSchema {
        RecordSchema::new("Lead")
            .field(FieldDescriptor::new("status", FieldKind::select(["Open", "Closed"])))
            .field(FieldDescriptor::new("source", FieldKind::Scalar(ScalarKind::Data)))
            .field(FieldDescriptor::new("plots", FieldKind::table("Plot Detail")))
    }

    #[test]
    fn object_filters_default_to_equality() {
        let filters = Filters::from_value(&json!({"status": "Open"})).unwrap();
        assert_eq!(filters.0, vec![Filter::eq("status", "Open")]);
    }

    #[test]
    fn object_filters_accept_operator_pairs() {
        let filters = Filters::from_value(&json!({"source": ["in", "Web, Walk In"]})).unwrap();
        assert_eq!(filters.0[0].op, FilterOp::In);
        assert_eq!(filters.0[0].value, json!(["Web", "Walk In"]));
    }

    #[test]
    fn list_filters_accept_three_and_four_element_forms() {
        let filters = Filters::from_value(&json!([
            ["status", "=", "Open"],
            ["Lead", "source", "NOT  LIKE", "%spam%"]
        ]))
        .unwrap();
        assert_eq!(filters.0.len(), 2);
        assert_eq!(filters.0[1].field, "source");
        assert_eq!(filters.0[1].op, FilterOp::NotLike);
    }

    #[test]
    fn wrong_shapes_are_client_errors() {
        assert_eq!(
            Filters::from_value(&json!("status=Open")).unwrap_err().status_code(),
            400
        );
        assert_eq!(
            Filters::from_value(&json!([["status", "="]])).unwrap_err().status_code(),
            400
        );
        assert_eq!(
            Filters::from_value(&json!({"status": ["~", "Open"]}))
                .unwrap_err()
                .status_code(),
            400
        );
    }

    #[test]
    fn between_and_is_values_are_checked() {
        assert!(Filters::from_value(&json!([["creation", "between", ["2024-01-01"]]])).is_err());
        let f = Filters::from_value(&json!([["source", "is", "Not Set"]])).unwrap();
        assert_eq!(f.0[0].value, json!("not set"));
    }

    #[test]
    fn unknown_filter_columns_are_rejected() {
        let schema = lead_schema();
        let ok = Filters::from_value(&json!({"status": "Open", "modified": ["<", "2025"]})).unwrap();
        assert!(ok.validate_against(&schema).is_ok());

        let bad = Filters::from_value(&json!({"plots": "x"})).unwrap();
        assert!(bad.validate_against(&schema).is_err());
    }

    #[test]
    fn order_by_parses_terms_and_directions() {
        let order = OrderBy::parse("modified desc, `tabLead`.`status` ASC, source").unwrap();
        assert_eq!(
            order.0,
            vec![
                ("modified".to_string(), Direction::Desc),
                ("status".to_string(), Direction::Asc),
                ("source".to_string(), Direction::Asc),
            ]
        );
    }

    #[test]
    fn order_by_rejects_injection() {
        assert!(OrderBy::parse("modified; DROP TABLE x").is_err());
        assert!(OrderBy::parse("modified sideways").is_err());
    }

    #[test]
    fn tiebreaker_is_appended_once() {
        let order = OrderBy::parse("modified desc").unwrap().with_tiebreaker();
        assert_eq!(order.0.last().unwrap().0, "name");
        let again = order.clone().with_tiebreaker();
        assert_eq!(again.0.len(), order.0.len());
    }

    #[test]
    fn projection_always_includes_name() {
        let schema = lead_schema();
        let p = Projection::resolve(&["status".to_string()], &schema).unwrap();
        assert_eq!(p, Projection::columns(&["name", "status"]));
        assert_eq!(Projection::resolve(&[], &schema).unwrap(), Projection::All);
        assert_eq!(
            Projection::resolve(&["*".to_string()], &schema).unwrap(),
            Projection::All
        );
        assert!(Projection::resolve(&["count(name)".to_string()], &schema).is_err());
    }
}
