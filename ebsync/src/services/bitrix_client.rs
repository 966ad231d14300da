//! Bitrix24 REST client over an inbound webhook
//!
//! Every call is `POST <webhook><method>` with a JSON body. A response is
//! either `{"result": ...}` or `{"error": ..., "error_description": ...}`;
//! the latter is a hard API failure and is never retried. Transport failures
//! go through the retry policy.

use async_trait::async_trait;
use ebsync_common::config::DestinationConfig;
use ebsync_common::{Error, Result, RetryPolicy};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

use crate::types::{DestinationCrm, EntityKind, FieldSet};

/// Bitrix24 webhook client
pub struct BitrixClient {
    http_client: reqwest::Client,
    webhook_url: String,
    identity_field: String,
    lookup_chunk_size: usize,
    retry: RetryPolicy,
}

impl BitrixClient {
    pub fn new(config: &DestinationConfig, retry: RetryPolicy) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let webhook_url = if config.webhook_url.ends_with('/') {
            config.webhook_url.clone()
        } else {
            format!("{}/", config.webhook_url)
        };

        Ok(Self {
            http_client,
            webhook_url,
            identity_field: config.identity_field.clone(),
            lookup_chunk_size: config.lookup_chunk_size.max(1),
            retry,
        })
    }

    /// Call a REST method, retrying transport failures per the retry policy
    pub async fn call(&self, method: &str, params: &Value) -> Result<Value> {
        Ok(take_result(self.call_envelope(method, params).await?))
    }

    /// Whole response body (`result` plus `next`/`total` for list methods)
    async fn call_envelope(&self, method: &str, params: &Value) -> Result<Value> {
        self.retry
            .run(method, Error::is_retryable, || self.call_once(method, params))
            .await
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value> {
        let url = format!("{}{}", self.webhook_url, method);

        let response = self
            .http_client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(error) = body.as_ref().and_then(|b| b.get("error")) {
            return Err(Error::DestinationApi {
                code: value_to_string(error).unwrap_or_else(|| error.to_string()),
                description: body
                    .as_ref()
                    .and_then(|b| b.get("error_description"))
                    .and_then(value_to_string)
                    .unwrap_or_default(),
            });
        }

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::Transport(format!("{}: HTTP {}", method, status.as_u16())));
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        body.ok_or_else(|| Error::Parse(format!("{}: response is not JSON", method)))
    }
}

fn take_result(envelope: Value) -> Value {
    match envelope {
        Value::Object(mut map) => map.remove("result").unwrap_or(Value::Null),
        other => other,
    }
}

/// Bitrix24 returns ids as strings or numbers depending on the method
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DestinationCrm for BitrixClient {
    async fn ensure_identity_field(
        &self,
        kind: EntityKind,
        field_name: &str,
        label: &str,
    ) -> Result<()> {
        let existing = self
            .call(
                &format!("crm.{}.userfield.list", kind),
                &json!({ "filter": { "FIELD_NAME": field_name } }),
            )
            .await?;

        let present = existing
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .any(|f| f.get("FIELD_NAME").and_then(Value::as_str) == Some(field_name))
            })
            .unwrap_or(false);

        if present {
            tracing::debug!(kind = %kind, field = field_name, "User field already exists");
            return Ok(());
        }

        let field_id = self
            .call(
                &format!("crm.{}.userfield.add", kind),
                &json!({
                    "fields": {
                        "FIELD_NAME": field_name,
                        "EDIT_FORM_LABEL": { "ru": label },
                        "LIST_COLUMN_LABEL": { "ru": label },
                        "USER_TYPE_ID": "string",
                        "MANDATORY": "N",
                    }
                }),
            )
            .await?;

        tracing::info!(
            kind = %kind,
            field = field_name,
            field_id = %field_id,
            "Created user field"
        );
        Ok(())
    }

    async fn find_by_identity_keys(
        &self,
        kind: EntityKind,
        keys: &BTreeSet<String>,
    ) -> Result<HashMap<String, String>> {
        let mut found = HashMap::new();
        if keys.is_empty() {
            return Ok(found);
        }

        let method = format!("crm.{}.list", kind);
        let keys: Vec<&String> = keys.iter().collect();

        // crm.*.list returns at most 50 rows per response; `next` is the offset of the following page
        for chunk in keys.chunks(self.lookup_chunk_size) {
            let mut start: Option<Value> = None;
            loop {
                let mut params = json!({
                    "filter": { self.identity_field.as_str(): chunk },
                    "select": ["ID", self.identity_field.as_str()],
                });
                if let Some(offset) = &start {
                    params["start"] = offset.clone();
                }

                let envelope = self.call_envelope(&method, &params).await?;
                let next = envelope.get("next").filter(|n| !n.is_null()).cloned();

                let rows = match take_result(envelope) {
                    Value::Array(rows) => rows,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(Error::Parse(format!(
                            "{}: expected a list, got {}",
                            method, other
                        )))
                    }
                };

                for row in &rows {
                    let key = row.get(&self.identity_field).and_then(value_to_string);
                    let id = row.get("ID").and_then(value_to_string);
                    if let (Some(key), Some(id)) = (key, id) {
                        found.insert(key, id);
                    }
                }

                match next {
                    Some(offset) if start.as_ref() != Some(&offset) => start = Some(offset),
                    Some(offset) => {
                        tracing::warn!(method = %method, next = %offset, "CRM repeated page offset, stopping lookup");
                        break;
                    }
                    None => break,
                }
            }
        }

        tracing::debug!(kind = %kind, requested = keys.len(), found = found.len(), "Looked up existing records");
        Ok(found)
    }

    async fn create_record(&self, kind: EntityKind, fields: &FieldSet) -> Result<String> {
        let method = format!("crm.{}.add", kind);
        let result = self.call(&method, &json!({ "fields": fields })).await?;

        value_to_string(&result)
            .ok_or_else(|| Error::Parse(format!("{}: no record id in result {}", method, result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!(17)), Some("17".to_string()));
        assert_eq!(value_to_string(&json!("17")), Some("17".to_string()));
        assert_eq!(value_to_string(&json!("")), None);
        assert_eq!(value_to_string(&json!(null)), None);
        assert_eq!(value_to_string(&json!(true)), None);
    }

    #[test]
    fn test_webhook_url_normalized() {
        let client = BitrixClient::new(
            &DestinationConfig {
                webhook_url: "https://example.bitrix24.ru/rest/1/abc".to_string(),
                ..Default::default()
            },
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(client.webhook_url, "https://example.bitrix24.ru/rest/1/abc/");
    }

    #[test]
    fn test_take_result_drops_paging_envelope() {
        let envelope = json!({ "result": [{ "ID": "1" }], "next": 50, "total": 120 });
        assert_eq!(take_result(envelope), json!([{ "ID": "1" }]));
        assert_eq!(take_result(json!({ "total": 0 })), Value::Null);
    }
}
