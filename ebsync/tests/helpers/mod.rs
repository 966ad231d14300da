//! Shared test helpers: wiremock stand-ins for Elba and Bitrix24

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ebsync_common::config::{DestinationConfig, SourceConfig};
use ebsync_common::{RetryPolicy, SyncConfig};

pub const TEST_TOKEN: &str = "test-token";
pub const WEBHOOK_PATH: &str = "/rest/1/test/";

/// Source config pointing at a mock Elba server (`/v1` prefix)
pub fn source_config(elba: &MockServer, page_size: usize) -> SourceConfig {
    SourceConfig {
        api_key: TEST_TOKEN.to_string(),
        base_url: format!("{}/v1", elba.uri()),
        page_size,
        ..Default::default()
    }
}

/// Destination config pointing at a mock Bitrix24 webhook
pub fn destination_config(bitrix: &MockServer) -> DestinationConfig {
    DestinationConfig {
        webhook_url: format!("{}{}", bitrix.uri(), WEBHOOK_PATH),
        ..Default::default()
    }
}

/// Millisecond backoff so retry tests stay fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, 1, 5)
}

pub fn sync_config(elba: &MockServer, bitrix: &MockServer) -> SyncConfig {
    SyncConfig {
        source: source_config(elba, 100),
        destination: destination_config(bitrix),
        retry: fast_retry(),
        ..Default::default()
    }
}

/// `count` counterparty payloads with ids `<prefix>-<n>`
pub fn counterparty_items(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|n| json!({ "id": format!("{}-{}", prefix, n), "name": format!("Контрагент {}", n) }))
        .collect()
}

/// Recorded state of the fake CRM
#[derive(Debug, Default)]
pub struct BitrixState {
    /// (entity kind, FIELD_NAME)
    pub user_fields: Vec<(String, String)>,
    /// (entity kind, id, fields)
    pub records: Vec<(String, u64, Value)>,
    next_id: u64,
}

/// Stateful Bitrix24 webhook: supports crm.<kind>.{userfield.list, userfield.add, list, add}
#[derive(Clone, Default)]
pub struct FakeBitrix {
    pub state: Arc<Mutex<BitrixState>>,
}

impl FakeBitrix {
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/rest/1/test/crm\..+"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn records(&self, kind: &str) -> Vec<(u64, Value)> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(k, _, _)| k == kind)
            .map(|(_, id, fields)| (*id, fields.clone()))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn user_fields(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().user_fields.clone()
    }
}

impl Respond for FakeBitrix {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let rest_method = request.url.path().rsplit('/').next().unwrap_or_default().to_string();
        let body: Value = request.body_json().unwrap_or(Value::Null);
        let parts: Vec<&str> = rest_method.split('.').collect();
        if parts.len() < 3 || parts[0] != "crm" {
            return method_not_found();
        }
        let kind = parts[1].to_string();

        let mut state = self.state.lock().unwrap();
        let result = match &parts[2..] {
            ["userfield", "list"] => {
                let name = body["filter"]["FIELD_NAME"].as_str().unwrap_or_default();
                let matching: Vec<Value> = state
                    .user_fields
                    .iter()
                    .filter(|(k, f)| *k == kind && f == name)
                    .map(|(_, f)| json!({ "ID": "1", "FIELD_NAME": f }))
                    .collect();
                Value::Array(matching)
            }
            ["userfield", "add"] => {
                let name = body["fields"]["FIELD_NAME"].as_str().unwrap_or_default().to_string();
                state.user_fields.push((kind, name));
                state.next_id += 1;
                json!(state.next_id)
            }
            ["list"] => {
                let Some((field, wanted)) = body["filter"]
                    .as_object()
                    .and_then(|filter| filter.iter().next())
                else {
                    return method_not_found();
                };
                let wanted: Vec<&Value> = wanted.as_array().map(|w| w.iter().collect()).unwrap_or_default();
                let rows: Vec<Value> = state
                    .records
                    .iter()
                    .filter(|(k, _, fields)| *k == kind && wanted.contains(&&fields[field.as_str()]))
                    .map(|(_, id, fields)| json!({ "ID": id.to_string(), field.as_str(): fields[field.as_str()] }))
                    .collect();
                Value::Array(rows)
            }
            ["add"] => {
                state.next_id += 1;
                let id = state.next_id;
                state.records.push((kind, id, body["fields"].clone()));
                json!(id)
            }
            _ => return method_not_found(),
        };

        ResponseTemplate::new(200).set_body_json(json!({ "result": result }))
    }
}

fn method_not_found() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": "ERROR_METHOD_NOT_FOUND",
        "error_description": "Method not found!"
    }))
}
