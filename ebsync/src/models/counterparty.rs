//! Counterparty and contact person records as read from Elba

use serde_json::Value;

use super::{first_array, first_string};

const COUNTERPARTY_ID_KEYS: &[&str] = &["id", "counterpartyId", "contractorId"];
const INLINE_CONTACT_KEYS: &[&str] = &["contacts", "contactPersons", "persons"];
const PERSON_ID_KEYS: &[&str] = &["id", "personId"];
const PERSON_NAME_KEYS: &[&str] = &["fullName", "fio", "name"];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber"];
const EMAIL_KEYS: &[&str] = &["email", "eMail"];

/// Business partner in Elba; becomes a Bitrix24 company
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counterparty {
    /// Source-assigned id; `None` means the record cannot be synced
    pub external_id: Option<String>,
    pub short_name: Option<String>,
    pub name: Option<String>,
    /// ИНН
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Contact persons embedded in the counterparty card, if any
    pub inline_contacts: Vec<ContactPerson>,
}

impl Counterparty {
    pub fn from_json(value: &Value) -> Self {
        let contact_info = value.get("contactInfo").unwrap_or(&Value::Null);

        Self {
            external_id: first_string(value, COUNTERPARTY_ID_KEYS),
            short_name: first_string(value, &["shortName"]),
            name: first_string(value, &["name"]),
            tax_id: first_string(value, &["inn", "INN"]),
            phone: first_string(contact_info, PHONE_KEYS),
            email: first_string(contact_info, EMAIL_KEYS),
            inline_contacts: first_array(value, INLINE_CONTACT_KEYS)
                .map(|items| items.iter().map(ContactPerson::from_json).collect())
                .unwrap_or_default(),
        }
    }

    /// Identity key of the company this counterparty maps to
    pub fn identity_key(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Short name, else full name
    pub fn display_name(&self) -> Option<&str> {
        self.short_name.as_deref().or(self.name.as_deref())
    }
}

/// Contact person of a counterparty; ids are unique only within the parent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactPerson {
    pub external_id: Option<String>,
    /// "Last First Middle"; any part may be missing
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ContactPerson {
    pub fn from_json(value: &Value) -> Self {
        Self {
            external_id: first_string(value, PERSON_ID_KEYS),
            full_name: first_string(value, PERSON_NAME_KEYS),
            phone: first_string(value, PHONE_KEYS),
            email: first_string(value, EMAIL_KEYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counterparty_from_full_payload() {
        let cp = Counterparty::from_json(&json!({
            "id": "7f1c",
            "shortName": "ООО Ромашка",
            "name": "Общество с ограниченной ответственностью Ромашка",
            "inn": "7701234567",
            "contactInfo": { "phoneNumber": "+74950000000", "eMail": "info@romashka.ru" },
            "contactPersons": [{ "personId": 5, "fio": "Петров Пётр" }]
        }));

        assert_eq!(cp.identity_key(), Some("7f1c"));
        assert_eq!(cp.display_name(), Some("ООО Ромашка"));
        assert_eq!(cp.tax_id.as_deref(), Some("7701234567"));
        assert_eq!(cp.phone.as_deref(), Some("+74950000000"));
        assert_eq!(cp.email.as_deref(), Some("info@romashka.ru"));
        assert_eq!(cp.inline_contacts.len(), 1);
        assert_eq!(cp.inline_contacts[0].external_id.as_deref(), Some("5"));
        assert_eq!(cp.inline_contacts[0].full_name.as_deref(), Some("Петров Пётр"));
    }

    #[test]
    fn test_counterparty_id_fallbacks() {
        let cp = Counterparty::from_json(&json!({ "contractorId": "k-9", "INN": "123" }));
        assert_eq!(cp.identity_key(), Some("k-9"));
        assert_eq!(cp.tax_id.as_deref(), Some("123"));
        assert_eq!(cp.display_name(), None);
    }

    #[test]
    fn test_counterparty_without_id() {
        let cp = Counterparty::from_json(&json!({ "name": "Без ID", "id": "" }));
        assert_eq!(cp.identity_key(), None);
    }

    #[test]
    fn test_empty_inline_list_falls_through() {
        let cp = Counterparty::from_json(&json!({
            "id": "1",
            "contacts": [],
            "persons": [{ "id": "p1" }]
        }));
        assert_eq!(cp.inline_contacts.len(), 1);
        assert_eq!(cp.inline_contacts[0].external_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_person_contact_methods() {
        let person = ContactPerson::from_json(&json!({
            "id": "p1",
            "name": "Сидорова Анна",
            "phone": "+79001234567",
            "email": "anna@example.ru"
        }));
        assert_eq!(person.full_name.as_deref(), Some("Сидорова Анна"));
        assert_eq!(person.phone.as_deref(), Some("+79001234567"));
        assert_eq!(person.email.as_deref(), Some("anna@example.ru"));
    }
}
