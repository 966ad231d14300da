//! Core Types and Trait Definitions
//!
//! The reconciler talks to the outside world through two seams:
//! - [`SourceSystem`]: the record system counterparties are read from (Elba)
//! - [`DestinationCrm`]: the CRM records are created in (Bitrix24)
//!
//! Both are implemented over HTTP in `services`; tests substitute in-memory fakes.

use async_trait::async_trait;
use ebsync_common::Result;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::models::{ContactPerson, Counterparty};

/// CRM entity kinds this sync writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Company,
    Contact,
}

impl EntityKind {
    /// Name used in Bitrix24 method paths (`crm.<kind>.add`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Contact => "contact",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRM field set sent as `{"fields": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldSet(Map<String, Value>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Append a work entry to a multi-value field (`PHONE`, `EMAIL`)
    pub fn push_work_value(&mut self, key: &str, value: &str) {
        let entry = json!({ "VALUE": value, "VALUE_TYPE": "WORK" });
        match self.0.get_mut(key) {
            Some(Value::Array(entries)) => entries.push(entry),
            _ => {
                self.0.insert(key.to_string(), Value::Array(vec![entry]));
            }
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Source record system
#[async_trait]
pub trait SourceSystem: Send + Sync {
    /// Organization the credential operates on
    ///
    /// # Errors
    /// `Error::Config` when the source reports no organization
    async fn resolve_organization_id(&self) -> Result<String>;

    /// Lazy, finite sequence of all counterparties; empty when the source is unavailable
    fn list_counterparties<'a>(&'a self, organization_id: &'a str) -> BoxStream<'a, Counterparty>;

    /// Contact persons of one counterparty; empty when none can be found
    fn list_contacts<'a>(
        &'a self,
        organization_id: &'a str,
        counterparty_id: &'a str,
    ) -> BoxStream<'a, ContactPerson>;
}

/// Destination CRM
#[async_trait]
pub trait DestinationCrm: Send + Sync {
    /// Create the string field `field_name` on `kind` unless it already exists
    async fn ensure_identity_field(&self, kind: EntityKind, field_name: &str, label: &str)
        -> Result<()>;

    /// Map identity key → CRM record id for every key already present
    async fn find_by_identity_keys(
        &self,
        kind: EntityKind,
        keys: &BTreeSet<String>,
    ) -> Result<HashMap<String, String>>;

    /// Create one record and return its CRM id
    async fn create_record(&self, kind: EntityKind, fields: &FieldSet) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_work_value_appends() {
        let mut fields = FieldSet::new();
        fields.push_work_value("PHONE", "+7 900 000-00-00");
        fields.push_work_value("PHONE", "+7 900 111-11-11");

        assert_eq!(
            fields.get("PHONE"),
            Some(&json!([
                { "VALUE": "+7 900 000-00-00", "VALUE_TYPE": "WORK" },
                { "VALUE": "+7 900 111-11-11", "VALUE_TYPE": "WORK" },
            ]))
        );
    }

    #[test]
    fn test_field_set_serializes_as_plain_object() {
        let mut fields = FieldSet::new();
        fields.insert("TITLE", "Рога и копыта");
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({ "TITLE": "Рога и копыта" })
        );
    }

    #[test]
    fn test_entity_kind_names() {
        assert_eq!(EntityKind::Company.to_string(), "company");
        assert_eq!(EntityKind::Contact.as_str(), "contact");
    }
}
