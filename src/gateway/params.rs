//! Request parameter decoding for the method endpoints.
//!
//! Parameters arrive as one flat map merged from the query string (all
//! strings) and a JSON body (any JSON). List-valued parameters may be JSON
//! text; malformed text degrades to "absent" except for `update_fields`.

use docgate_common::Record;
use serde_json::{Map, Value};

use super::query::Filters;
use super::service::{ListDataRequest, ListInfoRequest, UpdateFields};
use crate::errors::{GatewayError, GatewayResult};

pub type Params = Map<String, Value>;

/// The value of `key`, with JSON text decoded. `None` when absent, empty or
/// not valid JSON.
pub fn decode_json_param(params: &Params, key: &str) -> Option<Value> {
    match params.get(key)? {
        Value::Null => None,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            serde_json::from_str(text).ok()
        }
        other => Some(other.clone()),
    }
}

/// Strings of a JSON list; anything else is empty.
pub fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn get_str(params: &Params, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An integer parameter; unparsable values count as absent.
pub fn get_i64(params: &Params, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn record_type(params: &Params) -> GatewayResult<String> {
    get_str(params, "doctype").ok_or_else(|| GatewayError::bad_request("doctype is required"))
}

fn filters(params: &Params, key: &str) -> GatewayResult<Filters> {
    match decode_json_param(params, key) {
        Some(value) => Filters::from_value(&value),
        None => Ok(Filters::default()),
    }
}

pub fn list_info_request(params: &Params) -> GatewayResult<ListInfoRequest> {
    Ok(ListInfoRequest {
        record_type: record_type(params)?,
        fields: string_list(decode_json_param(params, "fields")),
    })
}

pub fn list_data_request(params: &Params) -> GatewayResult<ListDataRequest> {
    Ok(ListDataRequest {
        record_type: record_type(params)?,
        fields: string_list(decode_json_param(params, "fields")),
        filters: filters(params, "filters")?,
        or_filters: filters(params, "or_filters")?,
        page: get_i64(params, "page"),
        page_length: get_i64(params, "page_length"),
        order_by: get_str(params, "order_by"),
    })
}

pub fn ids_param(params: &Params) -> Vec<String> {
    string_list(decode_json_param(params, "ids"))
        .into_iter()
        .filter(|id| !id.trim().is_empty())
        .collect()
}

/// `update_fields` as an object or a list of objects. Invalid JSON text is
/// a client error; an absent value is an empty update.
pub fn update_fields(params: &Params) -> GatewayResult<UpdateFields> {
    let value = match params.get("update_fields") {
        None | Some(Value::Null) => return Ok(UpdateFields::One(Record::new())),
        Some(Value::String(text)) if text.trim().is_empty() => {
            return Ok(UpdateFields::One(Record::new()));
        }
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|_| GatewayError::bad_request("Invalid JSON format in update_fields"))?,
        Some(other) => other.clone(),
    };
    match value {
        Value::Object(map) => Ok(UpdateFields::One(map)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(GatewayError::bad_request(
                    "update_fields must be an object or a list of objects",
                )),
            })
            .collect::<GatewayResult<Vec<_>>>()
            .map(UpdateFields::Many),
        _ => Err(GatewayError::bad_request(
            "update_fields must be an object or a list of objects",
        )),
    }
}
