//! Elba record → Bitrix24 field set mapping
//!
//! Pure transformations: no I/O, never fails. Absent source values produce
//! no field at all rather than an empty placeholder.

use ebsync_common::config::DestinationConfig;

use crate::models::{ContactPerson, Counterparty};
use crate::types::FieldSet;

/// Company title when the counterparty has neither name nor tax id
pub const UNTITLED_COMPANY: &str = "Без названия";

/// Identity key of a contact: `<counterpartyId>:<personId>`.
///
/// Person ids are unique only within their counterparty; the prefix makes
/// the key globally unique.
pub fn contact_identity_key(counterparty_id: &str, person_id: &str) -> String {
    format!("{}:{}", counterparty_id, person_id)
}

/// Split "Last First Middle" by whitespace into (last, first, middle).
///
/// Positional only: "First Last" input is misassigned. Missing parts are
/// empty strings; tokens past the third are ignored.
pub fn split_full_name(full_name: &str) -> (String, String, String) {
    let mut parts = full_name.split_whitespace();
    let mut next = || parts.next().unwrap_or_default().to_string();
    let last = next();
    let first = next();
    let middle = next();
    (last, first, middle)
}

/// Maps source records onto the configured CRM field names
#[derive(Debug, Clone)]
pub struct FieldMapper {
    identity_field: String,
    tax_id_field: String,
}

impl FieldMapper {
    pub fn new(config: &DestinationConfig) -> Self {
        Self {
            identity_field: config.identity_field.clone(),
            tax_id_field: config.tax_id_field.clone(),
        }
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    pub fn company_fields(&self, cp: &Counterparty) -> FieldSet {
        let title = cp
            .display_name()
            .or(cp.tax_id.as_deref())
            .unwrap_or(UNTITLED_COMPANY);

        let mut fields = FieldSet::new();
        fields.insert("TITLE", title);
        fields.insert(&self.identity_field, cp.external_id.clone().unwrap_or_default());

        if let Some(tax_id) = &cp.tax_id {
            fields.insert(&self.tax_id_field, tax_id.as_str());
        }
        if let Some(phone) = &cp.phone {
            fields.push_work_value("PHONE", phone);
        }
        if let Some(email) = &cp.email {
            fields.push_work_value("EMAIL", email);
        }

        fields
    }

    /// Contact fields without the parent link; the reconciler adds `COMPANY_ID`
    pub fn contact_fields(&self, person: &ContactPerson, parent: &Counterparty) -> FieldSet {
        let person_id = person.external_id.as_deref().unwrap_or_default();
        let full_name = match &person.full_name {
            Some(name) => name.clone(),
            None => format!("Контакт {}", person_id),
        };
        let (last, first, middle) = split_full_name(&full_name);

        let mut fields = FieldSet::new();
        fields.insert("LAST_NAME", last);
        fields.insert("NAME", first);
        fields.insert("SECOND_NAME", middle);
        fields.insert(
            &self.identity_field,
            contact_identity_key(parent.external_id.as_deref().unwrap_or_default(), person_id),
        );

        if let Some(phone) = &person.phone {
            fields.push_work_value("PHONE", phone);
        }
        if let Some(email) = &person.email {
            fields.push_work_value("EMAIL", email);
        }

        fields
    }
}
