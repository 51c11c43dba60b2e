//! Record-type schemas as served by the document store.
//!
//! A [`RecordSchema`] is an ordered list of [`FieldDescriptor`]s. Each descriptor
//! carries a [`FieldKind`], the closed union the gateway dispatches enrichment
//! on. On the wire descriptors keep the platform shape
//! (`fieldname` / `fieldtype` / `options` / `label` / `reqd`), so schema files
//! exported from the platform load unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored record: field name to value, keyed by its `name`.
pub type Record = Map<String, Value>;

/// Columns present on every record of every type.
pub const STANDARD_COLUMNS: &[&str] = &[
    "name",
    "owner",
    "creation",
    "modified",
    "modified_by",
    "docstatus",
];

/// Extra columns carried by rows of child (`istable`) types.
pub const CHILD_COLUMNS: &[&str] = &["parent", "parentfield", "parenttype", "idx"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Unknown fieldtype '{0}'")]
    UnknownFieldType(String),

    #[error("Fieldtype {fieldtype} requires options naming a record type")]
    MissingOptions { fieldtype: String },

    #[error("Invalid field name '{0}'")]
    InvalidFieldName(String),

    #[error("Invalid record type name '{0}'")]
    InvalidTypeName(String),

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Field '{0}' shadows a standard column")]
    ReservedField(String),

    #[error("Title field '{0}' is not a field of this record type")]
    UnknownTitleField(String),

    #[error("Field '{fieldname}': {source}")]
    Field {
        fieldname: String,
        #[source]
        source: Box<SchemaError>,
    },
}

/// SQL storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Integer,
    Real,
    Text,
}

impl StorageClass {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Data,
    SmallText,
    Text,
    LongText,
    Int,
    Float,
    Currency,
    Percent,
    Check,
    Date,
    Datetime,
    Time,
    Attach,
    Email,
    Phone,
    Json,
    ReadOnly,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "Data",
            Self::SmallText => "Small Text",
            Self::Text => "Text",
            Self::LongText => "Long Text",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Currency => "Currency",
            Self::Percent => "Percent",
            Self::Check => "Check",
            Self::Date => "Date",
            Self::Datetime => "Datetime",
            Self::Time => "Time",
            Self::Attach => "Attach",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Json => "JSON",
            Self::ReadOnly => "Read Only",
        }
    }

    pub fn storage(&self) -> StorageClass {
        match self {
            Self::Int | Self::Check => StorageClass::Integer,
            Self::Float | Self::Currency | Self::Percent => StorageClass::Real,
            _ => StorageClass::Text,
        }
    }
}

impl FromStr for ScalarKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Data" => Ok(Self::Data),
            "Small Text" => Ok(Self::SmallText),
            "Text" | "Text Editor" => Ok(Self::Text),
            "Long Text" => Ok(Self::LongText),
            "Int" => Ok(Self::Int),
            "Float" => Ok(Self::Float),
            "Currency" => Ok(Self::Currency),
            "Percent" => Ok(Self::Percent),
            "Check" => Ok(Self::Check),
            "Date" => Ok(Self::Date),
            "Datetime" => Ok(Self::Datetime),
            "Time" => Ok(Self::Time),
            "Attach" | "Attach Image" => Ok(Self::Attach),
            "Email" => Ok(Self::Email),
            "Phone" => Ok(Self::Phone),
            "JSON" => Ok(Self::Json),
            "Read Only" => Ok(Self::ReadOnly),
            other => Err(SchemaError::UnknownFieldType(other.to_string())),
        }
    }
}

/// Form-layout pseudo fields. They have no storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    SectionBreak,
    ColumnBreak,
    TabBreak,
}

impl LayoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SectionBreak => "Section Break",
            Self::ColumnBreak => "Column Break",
            Self::TabBreak => "Tab Break",
        }
    }
}

/// What a field holds, and therefore how the gateway enriches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// Fixed choice list, stored as text.
    Select { choices: Vec<String> },
    Layout(LayoutKind),
    /// Identifier of a record in `options`.
    Link { options: String },
    /// Ordered child rows of type `options`.
    Table { options: String },
    /// Child rows of type `options`, each linking to the type named by
    /// `options` minus its `" Detail"` suffix.
    TableMultiSelect { options: String },
}

impl FieldKind {
    pub fn link(options: impl Into<String>) -> Self {
        Self::Link {
            options: options.into(),
        }
    }

    pub fn table(options: impl Into<String>) -> Self {
        Self::Table {
            options: options.into(),
        }
    }

    pub fn table_multiselect(options: impl Into<String>) -> Self {
        Self::TableMultiSelect {
            options: options.into(),
        }
    }

    pub fn select<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Select {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the platform `fieldtype` / `options` pair.
    pub fn parse(fieldtype: &str, options: Option<&str>) -> Result<Self, SchemaError> {
        let options = options.map(str::trim).filter(|o| !o.is_empty());
        let target = || {
            options
                .map(str::to_string)
                .ok_or_else(|| SchemaError::MissingOptions {
                    fieldtype: fieldtype.to_string(),
                })
        };
        let kind = match fieldtype {
            "Link" => Self::Link { options: target()? },
            "Table" => Self::Table { options: target()? },
            "Table MultiSelect" => Self::TableMultiSelect { options: target()? },
            "Select" => Self::Select {
                choices: options
                    .map(|o| {
                        o.lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "Section Break" => Self::Layout(LayoutKind::SectionBreak),
            "Column Break" => Self::Layout(LayoutKind::ColumnBreak),
            "Tab Break" => Self::Layout(LayoutKind::TabBreak),
            other => Self::Scalar(other.parse()?),
        };
        Ok(kind)
    }

    pub fn fieldtype(&self) -> &'static str {
        match self {
            Self::Scalar(s) => s.as_str(),
            Self::Select { .. } => "Select",
            Self::Layout(l) => l.as_str(),
            Self::Link { .. } => "Link",
            Self::Table { .. } => "Table",
            Self::TableMultiSelect { .. } => "Table MultiSelect",
        }
    }

    /// The platform `options` text for this kind, if any.
    pub fn options_text(&self) -> Option<String> {
        match self {
            Self::Link { options } | Self::Table { options } | Self::TableMultiSelect { options } => {
                Some(options.clone())
            }
            Self::Select { choices } if !choices.is_empty() => Some(choices.join("\n")),
            _ => None,
        }
    }

    /// Storage class of the backing column; `None` when the field has no column.
    pub fn storage(&self) -> Option<StorageClass> {
        match self {
            Self::Scalar(s) => Some(s.storage()),
            Self::Select { .. } | Self::Link { .. } => Some(StorageClass::Text),
            Self::Layout(_) | Self::Table { .. } | Self::TableMultiSelect { .. } => None,
        }
    }

    /// Child type name for `Table` and `Table MultiSelect` fields.
    pub fn child_type(&self) -> Option<&str> {
        match self {
            Self::Table { options } | Self::TableMultiSelect { options } => Some(options),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fieldtype())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldDescriptor {
    pub fieldname: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub reqd: bool,
}

impl FieldDescriptor {
    pub fn new(fieldname: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            fieldname: fieldname.into(),
            label: None,
            kind,
            reqd: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.reqd = true;
        self
    }

    pub fn fieldtype(&self) -> &'static str {
        self.kind.fieldtype()
    }

    /// Human label, falling back to the field name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.fieldname)
    }
}

#[derive(Serialize, Deserialize)]
struct RawField {
    fieldname: String,
    fieldtype: String,
    #[serde(default)]
    options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, with = "flag")]
    reqd: bool,
}

impl TryFrom<RawField> for FieldDescriptor {
    type Error = SchemaError;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let kind = FieldKind::parse(&raw.fieldtype, raw.options.as_deref()).map_err(|e| {
            SchemaError::Field {
                fieldname: raw.fieldname.clone(),
                source: Box::new(e),
            }
        })?;
        Ok(Self {
            fieldname: raw.fieldname,
            label: raw.label,
            kind,
            reqd: raw.reqd,
        })
    }
}

impl From<FieldDescriptor> for RawField {
    fn from(field: FieldDescriptor) -> Self {
        Self {
            fieldtype: field.kind.fieldtype().to_string(),
            options: field.kind.options_text(),
            fieldname: field.fieldname,
            label: field.label,
            reqd: field.reqd,
        }
    }
}

/// Platform booleans arrive as `0`/`1`, `true`/`false` or `null`.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Repr>::deserialize(d)? {
            Some(Repr::Bool(b)) => b,
            Some(Repr::Int(i)) => i != 0,
            None => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub field_order: Vec<String>,
    #[serde(default, with = "flag")]
    pub is_submittable: bool,
    #[serde(default, with = "flag")]
    pub istable: bool,
    #[serde(default)]
    pub title_field: Option<String>,
    #[serde(default)]
    pub autoname: Option<String>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            field_order: Vec::new(),
            is_submittable: false,
            istable: false,
            title_field: None,
            autoname: None,
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_title_field(mut self, fieldname: impl Into<String>) -> Self {
        self.title_field = Some(fieldname.into());
        self
    }

    pub fn with_autoname(mut self, rule: impl Into<String>) -> Self {
        self.autoname = Some(rule.into());
        self
    }

    pub fn child(mut self) -> Self {
        self.istable = true;
        self
    }

    pub fn submittable(mut self) -> Self {
        self.is_submittable = true;
        self
    }

    pub fn get_field(&self, fieldname: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.fieldname == fieldname)
    }

    /// Declared title field, ignoring an empty string.
    pub fn title_field(&self) -> Option<&str> {
        self.title_field.as_deref().filter(|t| !t.is_empty())
    }

    /// Fields backed by a storage column, in declaration order.
    pub fn storable_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, StorageClass)> {
        self.fields
            .iter()
            .filter_map(|f| f.kind.storage().map(|s| (f, s)))
    }

    /// `(field, target type)` for every Link field.
    pub fn link_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &str)> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Link { options } => Some((f, options.as_str())),
            _ => None,
        })
    }

    /// `(field, child type)` for every Table and Table MultiSelect field.
    pub fn table_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.kind.child_type().map(|c| (f, c)))
    }

    pub fn has_column(&self, column: &str) -> bool {
        STANDARD_COLUMNS.contains(&column)
            || (self.istable && CHILD_COLUMNS.contains(&column))
            || self
                .get_field(column)
                .is_some_and(|f| f.kind.storage().is_some())
    }

    /// `field_order` as declared, or the field declaration order when empty.
    pub fn effective_field_order(&self) -> Vec<String> {
        if self.field_order.is_empty() {
            self.fields.iter().map(|f| f.fieldname.clone()).collect()
        } else {
            self.field_order.clone()
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !is_valid_type_name(&self.name) {
            return Err(SchemaError::InvalidTypeName(self.name.clone()));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !is_valid_fieldname(&field.fieldname) {
                return Err(SchemaError::InvalidFieldName(field.fieldname.clone()));
            }
            if STANDARD_COLUMNS.contains(&field.fieldname.as_str())
                || CHILD_COLUMNS.contains(&field.fieldname.as_str())
            {
                return Err(SchemaError::ReservedField(field.fieldname.clone()));
            }
            if !seen.insert(field.fieldname.as_str()) {
                return Err(SchemaError::DuplicateField(field.fieldname.clone()));
            }
            if let Some(target) = field.kind.child_type().or(match &field.kind {
                FieldKind::Link { options } => Some(options.as_str()),
                _ => None,
            }) {
                if !is_valid_type_name(target) {
                    return Err(SchemaError::Field {
                        fieldname: field.fieldname.clone(),
                        source: Box::new(SchemaError::InvalidTypeName(target.to_string())),
                    });
                }
            }
        }
        if let Some(title) = self.title_field() {
            if title != "name" && self.get_field(title).is_none() {
                return Err(SchemaError::UnknownTitleField(title.to_string()));
            }
        }
        Ok(())
    }
}

/// Column identifiers: ASCII letter or `_`, then letters, digits or `_`.
pub fn is_valid_fieldname(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Record type names may contain spaces ("Plot Detail") but never quotes.
pub fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    name.len() <= 61
        && !name.ends_with(' ')
        && matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
}
