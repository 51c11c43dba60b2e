use std::str::FromStr;

use docgate_common::Record;
use serde_json::Value;
use uuid::Uuid;

use super::store::DocumentStore;
use crate::errors::{GatewayError, GatewayResult};

/// How a new record of a type gets its `name`, parsed from `autoname`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingRule {
    /// No rule: use a supplied name, else a hash.
    Default,
    /// The caller must supply the name.
    Prompt,
    Hash,
    /// Copy the value of a field.
    Field(String),
    /// `PREFIX.####`: a per-prefix counter zero-padded to the number of `#`.
    Series { prefix: String, digits: usize },
}

impl FromStr for NamingRule {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim();
        if rule.is_empty() {
            return Ok(Self::Default);
        }
        if rule.eq_ignore_ascii_case("prompt") {
            return Ok(Self::Prompt);
        }
        if rule.eq_ignore_ascii_case("hash") {
            return Ok(Self::Hash);
        }
        if let Some(field) = rule.strip_prefix("field:") {
            let field = field.trim();
            if field.is_empty() {
                return Err(GatewayError::Validation(format!(
                    "Invalid naming rule '{}'",
                    s
                )));
            }
            return Ok(Self::Field(field.to_string()));
        }
        if let Some((prefix, hashes)) = rule.rsplit_once('.') {
            if !hashes.is_empty() && hashes.chars().all(|c| c == '#') {
                return Ok(Self::Series {
                    prefix: prefix.to_string(),
                    digits: hashes.len(),
                });
            }
        }
        Err(GatewayError::Validation(format!(
            "Invalid naming rule '{}'",
            s
        )))
    }
}

impl NamingRule {
    pub fn parse_autoname(autoname: Option<&str>) -> GatewayResult<Self> {
        autoname.unwrap_or_default().parse()
    }

    /// Pick the name for `doc`. A series rule advances the store counter.
    pub fn make_name<S>(&self, store: &S, record_type: &str, doc: &Record) -> GatewayResult<String>
    where
        S: DocumentStore + ?Sized,
    {
        let supplied = doc
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty());
        match self {
            Self::Default => Ok(supplied.map(str::to_string).unwrap_or_else(random_hash)),
            Self::Prompt => supplied.map(str::to_string).ok_or_else(|| {
                GatewayError::Validation(format!("{}: name is required", record_type))
            }),
            Self::Hash => Ok(random_hash()),
            Self::Field(field) => match doc.get(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(GatewayError::Validation(format!(
                    "{} is required to name a new {}",
                    field, record_type
                ))),
            },
            Self::Series { prefix, digits } => {
                let next = store.next_series(prefix)?;
                Ok(format!("{}{:0width$}", prefix, next, width = *digits))
            }
        }
    }
}

/// Ten lowercase hex characters.
pub fn random_hash() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::db::SqliteStore;
    use serde_json::json;

    fn doc(pairs: Value) -> Record {
        pairs.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_rules() {
        assert_eq!("".parse::<NamingRule>().unwrap(), NamingRule::Default);
        assert_eq!("Prompt".parse::<NamingRule>().unwrap(), NamingRule::Prompt);
        assert_eq!("hash".parse::<NamingRule>().unwrap(), NamingRule::Hash);
        assert_eq!(
            "field:customer_name".parse::<NamingRule>().unwrap(),
            NamingRule::Field("customer_name".into())
        );
        assert_eq!(
            "LEAD-.####".parse::<NamingRule>().unwrap(),
            NamingRule::Series {
                prefix: "LEAD-".into(),
                digits: 4
            }
        );
        assert!("naming_series:".parse::<NamingRule>().is_err());
    }

    #[test]
    fn series_names_are_padded_and_sequential() {
        let store = SqliteStore::new_in_memory().unwrap();
        let rule: NamingRule = "LEAD-.####".parse().unwrap();
        let empty = Record::new();
        assert_eq!(rule.make_name(&store, "Lead", &empty).unwrap(), "LEAD-0001");
        assert_eq!(rule.make_name(&store, "Lead", &empty).unwrap(), "LEAD-0002");
    }

    #[test]
    fn supplied_name_wins_only_without_a_rule() {
        let store = SqliteStore::new_in_memory().unwrap();
        let body = doc(json!({"name": "Mine"}));
        assert_eq!(
            NamingRule::Default.make_name(&store, "Lead", &body).unwrap(),
            "Mine"
        );
        let hashed = NamingRule::Hash.make_name(&store, "Lead", &body).unwrap();
        assert_eq!(hashed.len(), 10);
        assert_ne!(hashed, "Mine");
    }

    #[test]
    fn prompt_and_field_rules_need_input() {
        let store = SqliteStore::new_in_memory().unwrap();
        let empty = Record::new();
        assert_eq!(
            NamingRule::Prompt
                .make_name(&store, "Lead", &empty)
                .unwrap_err()
                .status_code(),
            400
        );
        let rule = NamingRule::Field("customer_name".into());
        assert!(rule.make_name(&store, "Customer", &empty).is_err());
        let named = doc(json!({"customer_name": " Acme "}));
        assert_eq!(rule.make_name(&store, "Customer", &named).unwrap(), "Acme");
    }
}
