//! The five gateway operations plus the validated insert/update paths.
//!
//! Every operation is synchronous and runs against a borrowed
//! [`DocumentStore`]; the API layer moves the whole call onto the blocking
//! pool through `StoreHandle::call`.

use std::fmt;

use docgate_common::{FieldKind, Record, RecordSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::context::{RequestContext, now_timestamp};
use super::enrich::{Resolver, is_blank};
use super::hooks::{HookEvent, HookRegistry};
use super::naming::{NamingRule, random_hash};
use super::query::{Filter, FilterOp, Filters, OrderBy, Projection, StoreQuery};
use super::store::DocumentStore;
use super::validate::{ChildTable, check_mandatory, prepare};
use crate::errors::{GatewayError, GatewayResult};

/// Key under which list_data attaches a resolved Link record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKeying {
    /// `<field>_data`, one key per Link column.
    #[default]
    FieldName,
    /// The linked record type's name. Two Link columns to the same type
    /// share one key and the later column wins.
    RecordType,
}

impl fmt::Display for LinkKeying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKeying::FieldName => write!(f, "field_name"),
            LinkKeying::RecordType => write!(f, "record_type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    pub default_page_length: u64,
    pub max_page_length: u64,
    pub default_order_by: String,
    pub link_keying: LinkKeying,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            default_page_length: 10,
            max_page_length: 500,
            default_order_by: "modified desc".to_string(),
            link_keying: LinkKeying::FieldName,
        }
    }
}

impl GatewayOptions {
    /// `(offset, limit)` for a 1-based page. Out-of-range inputs are clamped;
    /// an offset past `u64::MAX` saturates, which still lies beyond every row.
    pub fn page_window(&self, page: Option<i64>, page_length: Option<i64>) -> (u64, u64) {
        let page = page.unwrap_or(1).max(1).unsigned_abs();
        let length = match page_length {
            Some(n) if n >= 1 => n.unsigned_abs(),
            _ => self.default_page_length,
        }
        .clamp(1, self.max_page_length.max(1));
        let offset = (page - 1).checked_mul(length).unwrap_or(u64::MAX);
        (offset, length)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListInfoRequest {
    pub record_type: String,
    /// Exact field names to describe. Empty means every field.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListDataRequest {
    pub record_type: String,
    pub fields: Vec<String>,
    pub filters: Filters,
    pub or_filters: Filters,
    pub page: Option<i64>,
    pub page_length: Option<i64>,
    pub order_by: Option<String>,
}

/// `update_fields` as sent: one object, or a list of objects applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateFields {
    One(Record),
    Many(Vec<Record>),
}

impl UpdateFields {
    /// Flatten into `(field, value)` pairs. A key repeated later keeps its
    /// first position and takes the later value.
    pub fn flatten(self) -> Vec<(String, Value)> {
        let maps = match self {
            UpdateFields::One(map) => vec![map],
            UpdateFields::Many(maps) => maps,
        };
        let mut pairs: Vec<(String, Value)> = Vec::new();
        for (key, value) in maps.into_iter().flatten() {
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => pairs.push((key, value)),
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListInfo {
    pub fields: Vec<Value>,
    pub field_order: Vec<String>,
    #[serde(serialize_with = "as_flag")]
    pub is_submittable: bool,
}

fn as_flag<S: serde::Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*value))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub counts: u64,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub name: String,
    /// Field names written, in request order.
    pub data: Vec<String>,
}

/// Columns `update_raw` stamps itself; caller-supplied values are dropped.
const STAMPED_COLUMNS: &[&str] = &["modified", "modified_by"];

pub struct Gateway<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    options: &'a GatewayOptions,
    hooks: &'a HookRegistry,
}

impl<'a, S> Gateway<'a, S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: &'a S, options: &'a GatewayOptions, hooks: &'a HookRegistry) -> Self {
        Self {
            store,
            options,
            hooks,
        }
    }

    /// Field metadata for a form, annotated for Link, Table MultiSelect and
    /// Table fields.
    pub fn list_info(&self, _ctx: &RequestContext, req: &ListInfoRequest) -> GatewayResult<ListInfo> {
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(&req.record_type)?;
        let mut fields = Vec::new();
        for field in &schema.fields {
            if !req.fields.is_empty() && !req.fields.contains(&field.fieldname) {
                continue;
            }
            fields.push(resolver.describe_field(field)?);
        }
        Ok(ListInfo {
            fields,
            field_order: schema.effective_field_order(),
            is_submittable: schema.is_submittable,
        })
    }

    /// One page of records plus the total count under the same filters.
    pub fn list_data(&self, ctx: &RequestContext, req: &ListDataRequest) -> GatewayResult<ListPage> {
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(&req.record_type)?;

        req.filters.validate_against(&schema)?;
        req.or_filters.validate_against(&schema)?;
        let projection = Projection::resolve(&req.fields, &schema)?;
        let order_text = req
            .order_by
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.options.default_order_by);
        let order_by = OrderBy::parse(order_text)?;
        order_by.validate_against(&schema)?;
        let (offset, limit) = self.options.page_window(req.page, req.page_length);

        let counts = self
            .store
            .count(&schema.name, &req.filters, &req.or_filters)?;
        let query = StoreQuery {
            record_type: schema.name.clone(),
            projection,
            filters: req.filters.clone(),
            or_filters: req.or_filters.clone(),
            order_by: Some(order_by.with_tiebreaker()),
            offset,
            limit: Some(limit),
        };
        let rows = self.store.get_all(&query)?;

        let mut data = Vec::with_capacity(rows.len());
        for mut row in rows {
            for (field, target) in schema.link_fields() {
                let Some(value) = row.get(&field.fieldname).cloned() else {
                    continue;
                };
                if let Some(linked) = resolver.resolve_link(target, &value)? {
                    let key = match self.options.link_keying {
                        LinkKeying::FieldName => format!("{}_data", field.fieldname),
                        LinkKeying::RecordType => target.to_string(),
                    };
                    row.insert(key, Value::Object(linked));
                }
            }
            add_id_alias(&mut row);
            data.push(row);
        }
        debug!(
            request_id = %ctx.request_id,
            record_type = %schema.name,
            counts,
            offset,
            returned = data.len(),
            "list_data page"
        );
        Ok(ListPage { counts, data })
    }

    /// One record with Link fields resolved and Table rows expanded one
    /// level deep.
    pub fn single_data(&self, _ctx: &RequestContext, record_type: &str, id: &str) -> GatewayResult<Record> {
        if id.trim().is_empty() {
            return Err(GatewayError::bad_request("ID is required"));
        }
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(record_type)?;
        let mut doc = self
            .load_doc(&mut resolver, &schema, id)?
            .ok_or_else(|| GatewayError::not_found(record_type, id).into_fault())?;

        resolver.attach_links(&schema, &mut doc)?;
        for field in &schema.fields {
            let FieldKind::Table { options } = &field.kind else {
                continue;
            };
            let Some(child_schema) = resolver.schema(options)? else {
                continue;
            };
            let Some(Value::Array(rows)) = doc.get_mut(&field.fieldname) else {
                continue;
            };
            let mut enriched = std::mem::take(rows);
            for row in enriched.iter_mut() {
                if let Value::Object(row) = row {
                    resolver.attach_links(&child_schema, row)?;
                }
            }
            doc.insert(field.fieldname.clone(), Value::Array(enriched));
        }
        add_id_alias(&mut doc);
        Ok(doc)
    }

    /// Delete `ids` one after another. The first failure stops the batch;
    /// records deleted before it stay deleted.
    pub fn delete_data(&self, ctx: &RequestContext, record_type: &str, ids: &[String]) -> GatewayResult<()> {
        if ids.is_empty() {
            return Err(GatewayError::bad_request("IDs are required"));
        }
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(record_type)?;
        let referrers = self.referrers_of(record_type)?;
        for id in ids {
            self.delete_one(ctx, &mut resolver, &schema, &referrers, id)
                .map_err(GatewayError::into_fault)?;
        }
        Ok(())
    }

    fn delete_one(
        &self,
        ctx: &RequestContext,
        resolver: &mut Resolver<'_, S>,
        schema: &RecordSchema,
        referrers: &[Referrer],
        id: &str,
    ) -> GatewayResult<()> {
        let doc = self
            .load_doc(resolver, schema, id)?
            .ok_or_else(|| GatewayError::not_found(&schema.name, id))?;
        self.check_not_linked(schema, referrers, id)?;

        for (field, child_type) in schema.table_fields() {
            if resolver.schema(child_type)?.is_some() {
                self.store
                    .delete_children(child_type, &schema.name, id, &field.fieldname)?;
            }
        }
        if self.store.delete(&schema.name, id)? == 0 {
            return Err(GatewayError::not_found(&schema.name, id));
        }
        info!(
            request_id = %ctx.request_id,
            user = %ctx.user,
            record_type = %schema.name,
            name = id,
            "deleted record"
        );
        self.hooks.fire(HookEvent::OnTrash, ctx, &schema.name, &doc)?;
        Ok(())
    }

    /// Every Link column, in any type, that points at `record_type`.
    fn referrers_of(&self, record_type: &str) -> GatewayResult<Vec<Referrer>> {
        let mut referrers = Vec::new();
        for schema in self.store.list_schemas()? {
            for (field, target) in schema.link_fields() {
                if target == record_type {
                    referrers.push(Referrer {
                        record_type: schema.name.clone(),
                        fieldname: field.fieldname.clone(),
                        istable: schema.istable,
                    });
                }
            }
        }
        Ok(referrers)
    }

    fn check_not_linked(&self, schema: &RecordSchema, referrers: &[Referrer], id: &str) -> GatewayResult<()> {
        for referrer in referrers {
            let mut query = StoreQuery::new(&referrer.record_type)
                .filter(Filter::eq(&referrer.fieldname, id))
                .page(0, 1);
            if referrer.record_type == schema.name {
                query = query.filter(Filter::new("name", FilterOp::NotEq, Value::from(id))?);
            }
            let Some(row) = self.store.get_all(&query)?.into_iter().next() else {
                continue;
            };
            // A child row is reported through the document that owns it.
            let (linked_type, linked_name) = if referrer.istable {
                (text_of(&row, "parenttype"), text_of(&row, "parent"))
            } else {
                (referrer.record_type.clone(), text_of(&row, "name"))
            };
            return Err(GatewayError::LinkExists {
                record_type: schema.name.clone(),
                id: id.to_string(),
                linked_type,
                linked_name,
            });
        }
        Ok(())
    }

    /// Direct parameterized write of `fields` onto one row. No validation and
    /// no hooks; `modified` and `modified_by` are always stamped.
    pub fn update_raw(
        &self,
        ctx: &RequestContext,
        record_type: &str,
        name: &str,
        fields: UpdateFields,
    ) -> GatewayResult<UpdateOutcome> {
        if name.trim().is_empty() {
            return Err(GatewayError::bad_request("Name is required"));
        }
        let pairs = fields.flatten();
        if pairs.is_empty() {
            return Err(GatewayError::bad_request("Update fields are required"));
        }
        let schema = self
            .store
            .get_schema(record_type)?
            .ok_or_else(|| GatewayError::UnknownRecordType(record_type.to_string()))?;

        let mut set_clauses = Vec::with_capacity(pairs.len() + STAMPED_COLUMNS.len());
        let mut written = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if key == "name" {
                return Err(GatewayError::bad_request("Field 'name' cannot be updated"));
            }
            if STAMPED_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            if !schema.has_column(&key) {
                return Err(GatewayError::bad_request(format!(
                    "Unknown field '{}' for {}",
                    key, record_type
                )));
            }
            written.push(key.clone());
            set_clauses.push((key, value));
        }
        set_clauses.push(("modified".to_string(), Value::String(now_timestamp())));
        set_clauses.push(("modified_by".to_string(), Value::String(ctx.user.clone())));

        let affected = self.store.raw_update(record_type, name, &set_clauses)?;
        if affected == 0 {
            return Err(GatewayError::not_found(record_type, name));
        }
        info!(
            request_id = %ctx.request_id,
            user = %ctx.user,
            record_type,
            name,
            fields = ?written,
            "raw update"
        );
        Ok(UpdateOutcome {
            success: true,
            name: name.to_string(),
            data: written,
        })
    }

    /// Document save: validate, write fields and child tables, then run
    /// `on_update` hooks. Returns the saved document.
    pub fn update_validated(
        &self,
        ctx: &RequestContext,
        record_type: &str,
        id: &str,
        body: &Record,
    ) -> GatewayResult<Record> {
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(record_type)?;
        if schema.istable {
            return Err(GatewayError::bad_request(format!(
                "{} is a child table and cannot be saved on its own",
                record_type
            )));
        }
        let existing = self
            .store
            .get(record_type, id)?
            .ok_or_else(|| GatewayError::not_found(record_type, id))?;

        let prepared = prepare(&mut resolver, &schema, body)?;
        let mut merged = existing;
        merged.extend(prepared.fields.clone());
        check_mandatory(&schema, &merged)?;

        let now = now_timestamp();
        let mut fields = prepared.fields;
        fields.insert("modified".into(), Value::String(now.clone()));
        fields.insert("modified_by".into(), Value::String(ctx.user.clone()));
        self.store.update(record_type, id, &fields)?;
        for table in &prepared.tables {
            self.replace_children(ctx, &schema.name, id, table, &now)?;
        }

        let doc = self
            .load_doc(&mut resolver, &schema, id)?
            .ok_or_else(|| GatewayError::not_found(record_type, id))?;
        info!(
            request_id = %ctx.request_id,
            user = %ctx.user,
            record_type,
            name = id,
            "saved record"
        );
        self.hooks.fire(HookEvent::OnUpdate, ctx, record_type, &doc)?;
        Ok(doc)
    }

    /// Create a record named by the type's `autoname` rule, then run
    /// `after_insert` hooks. Returns the saved document.
    pub fn insert(&self, ctx: &RequestContext, record_type: &str, body: &Record) -> GatewayResult<Record> {
        let mut resolver = Resolver::new(self.store);
        let schema = resolver.require_schema(record_type)?;
        if schema.istable {
            return Err(GatewayError::bad_request(format!(
                "{} is a child table and cannot be inserted on its own",
                record_type
            )));
        }
        let prepared = prepare(&mut resolver, &schema, body)?;
        check_mandatory(&schema, &prepared.fields)?;

        let rule = NamingRule::parse_autoname(schema.autoname.as_deref())?;
        let mut naming_input = prepared.fields.clone();
        if let Some(name) = body.get("name") {
            naming_input.insert("name".into(), name.clone());
        }
        let name = rule.make_name(self.store, record_type, &naming_input)?;
        if self.store.exists(record_type, &name)? {
            return Err(GatewayError::Validation(format!(
                "{} {} already exists",
                record_type, name
            )));
        }

        let now = now_timestamp();
        let mut record = stamped(&name, ctx, &now);
        record.extend(prepared.fields);
        self.store.insert(record_type, &record)?;
        for table in &prepared.tables {
            self.replace_children(ctx, &schema.name, &name, table, &now)?;
        }

        let doc = self
            .load_doc(&mut resolver, &schema, &name)?
            .ok_or_else(|| GatewayError::not_found(record_type, &name))?;
        info!(
            request_id = %ctx.request_id,
            user = %ctx.user,
            record_type,
            name = %name,
            "inserted record"
        );
        self.hooks.fire(HookEvent::AfterInsert, ctx, record_type, &doc)?;
        Ok(doc)
    }

    fn replace_children(
        &self,
        ctx: &RequestContext,
        parenttype: &str,
        parent: &str,
        table: &ChildTable,
        now: &str,
    ) -> GatewayResult<()> {
        self.store
            .delete_children(&table.child_type, parenttype, parent, &table.fieldname)?;
        for (i, row) in table.rows.iter().enumerate() {
            let mut child = stamped(&random_hash(), ctx, now);
            child.insert("parent".into(), Value::from(parent));
            child.insert("parentfield".into(), Value::from(table.fieldname.as_str()));
            child.insert("parenttype".into(), Value::from(parenttype));
            child.insert("idx".into(), Value::from(i as u64 + 1));
            child.extend(row.clone());
            self.store.insert(&table.child_type, &child)?;
        }
        Ok(())
    }

    /// The stored record with every child table attached as raw rows.
    fn load_doc(
        &self,
        resolver: &mut Resolver<'_, S>,
        schema: &RecordSchema,
        id: &str,
    ) -> GatewayResult<Option<Record>> {
        let Some(mut doc) = self.store.get(&schema.name, id)? else {
            return Ok(None);
        };
        for (field, child_type) in schema.table_fields() {
            let rows = if resolver.schema(child_type)?.is_some() {
                self.store
                    .get_children(child_type, &schema.name, id, &field.fieldname)?
            } else {
                Vec::new()
            };
            doc.insert(
                field.fieldname.clone(),
                Value::Array(rows.into_iter().map(Value::Object).collect()),
            );
        }
        Ok(Some(doc))
    }
}

struct Referrer {
    record_type: String,
    fieldname: String,
    istable: bool,
}

fn stamped(name: &str, ctx: &RequestContext, now: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".into(), Value::from(name));
    record.insert("owner".into(), Value::from(ctx.user.as_str()));
    record.insert("creation".into(), Value::from(now));
    record.insert("modified".into(), Value::from(now));
    record.insert("modified_by".into(), Value::from(ctx.user.as_str()));
    record.insert("docstatus".into(), Value::from(0));
    record
}

fn add_id_alias(row: &mut Record) {
    if let Some(name) = row.get("name").cloned() {
        row.insert("id".into(), name);
    }
}

fn text_of(row: &Record, key: &str) -> String {
    row.get(key)
        .filter(|v| !is_blank(v))
        .map(super::enrich::value_text)
        .unwrap_or_default()
}
