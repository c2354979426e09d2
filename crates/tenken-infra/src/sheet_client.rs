//! HTTP client for the spreadsheet endpoint
//!
//! `GET ?action=pull[&sheet=..]`, `GET ?action=config` and
//! `POST {"action":"push","data":[...]}` against one URL. Every GET carries a
//! cache-busting `_ts` parameter; every call is bounded by the client timeout.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use tenken_domain::repository::SheetSource;
use tenken_types::{PartitionConfig, SyncError, VehicleRecord};

/// Default client-side timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Remote sheet endpoint client
#[derive(Debug, Clone)]
pub struct SheetClient {
    endpoint: String,
    timeout_secs: u64,
    http: reqwest::Client,
}

impl SheetClient {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, SyncError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(SyncError::NoEndpoint);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout_secs,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout_secs)
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus(status.as_u16())
        } else {
            SyncError::Network(err.to_string())
        }
    }

    async fn get_text(&self, params: &[(&str, String)]) -> Result<String, SyncError> {
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("_ts", Utc::now().timestamp_millis().to_string()));
        debug!("GET {} {:?}", self.endpoint, query);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status().as_u16()));
        }
        response.text().await.map_err(|e| self.map_error(e))
    }
}

impl SheetSource for SheetClient {
    async fn pull(&self, sheet: Option<&str>) -> Result<Vec<Value>, SyncError> {
        let mut params = vec![("action", "pull".to_string())];
        if let Some(sheet) = sheet.filter(|s| !s.trim().is_empty()) {
            params.push(("sheet", sheet.to_string()));
        }
        let body = self.get_text(&params).await?;
        let rows = parse_pull_body(&body)?;
        debug!("Pull returned {} rows ({} bytes)", rows.len(), body.len());
        Ok(rows)
    }

    async fn fetch_config(&self) -> Result<Vec<PartitionConfig>, SyncError> {
        let body = self.get_text(&[("action", "config".to_string())]).await?;
        parse_config_body(&body)
    }

    async fn push(&self, records: &[VehicleRecord]) -> Result<(), SyncError> {
        let payload = json!({ "action": "push", "data": records });
        debug!("POST {} ({} records)", self.endpoint, records.len());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status().as_u16()));
        }
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        parse_push_body(&body)
    }
}

/// `ok: false` with its message, if present
fn server_failure(map: &serde_json::Map<String, Value>) -> Option<SyncError> {
    match map.get("ok") {
        Some(Value::Bool(false)) => {
            let message = map
                .get("error")
                .or_else(|| map.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Some(SyncError::ServerReported(message))
        }
        _ => None,
    }
}

/// Rows from a pull response: `{ok, data}`, `{data}` or a bare array
pub fn parse_pull_body(body: &str) -> Result<Vec<Value>, SyncError> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| SyncError::Parse(e.to_string()))?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(map) => {
            if let Some(err) = server_failure(&map) {
                return Err(err);
            }
            match map.get("data") {
                Some(Value::Array(rows)) => Ok(rows.clone()),
                Some(other) => Err(SyncError::Shape(format!(
                    "`data` is {} instead of an array",
                    json_kind(other)
                ))),
                None => Err(SyncError::Shape("missing `data` array".to_string())),
            }
        }
        other => Err(SyncError::Shape(format!(
            "expected object or array, got {}",
            json_kind(&other)
        ))),
    }
}

/// Partitions from a config response: `{config: [...]}`
///
/// Entries without a name or prefix are skipped.
pub fn parse_config_body(body: &str) -> Result<Vec<PartitionConfig>, SyncError> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| SyncError::Parse(e.to_string()))?;
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(SyncError::Shape(format!(
                "expected object, got {}",
                json_kind(&other)
            )))
        }
    };
    if let Some(err) = server_failure(&map) {
        return Err(err);
    }
    let entries = match map.get("config") {
        Some(Value::Array(entries)) => entries,
        _ => return Err(SyncError::Shape("missing `config` array".to_string())),
    };

    let partitions: Vec<PartitionConfig> = entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<PartitionConfig>(entry.clone()).ok())
        .filter(|p| !p.name.trim().is_empty() && !p.prefix.trim().is_empty())
        .collect();
    if partitions.is_empty() {
        return Err(SyncError::Shape("`config` has no usable partitions".to_string()));
    }
    Ok(partitions)
}

/// Push acknowledgement: `{ok: true}` or `{ok: false, error}`
pub fn parse_push_body(body: &str) -> Result<(), SyncError> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| SyncError::Parse(e.to_string()))?;
    match value {
        Value::Object(map) => match server_failure(&map) {
            Some(err) => Err(err),
            None => Ok(()),
        },
        other => Err(SyncError::Shape(format!(
            "expected object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenken_types::FailurePhase;

    #[test]
    fn test_pull_accepts_three_shapes() {
        assert_eq!(parse_pull_body(r#"{"ok":true,"data":[{"a":1}]}"#).unwrap().len(), 1);
        assert_eq!(parse_pull_body(r#"{"data":[1,2]}"#).unwrap().len(), 2);
        assert_eq!(parse_pull_body(r#"[[], {}, null]"#).unwrap().len(), 3);
    }

    #[test]
    fn test_pull_not_json_is_parse_error() {
        let err = parse_pull_body("<html>Service unavailable</html>").unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
        assert_eq!(err.phase(), FailurePhase::Parse);
    }

    #[test]
    fn test_pull_missing_data_is_shape_error() {
        assert!(matches!(
            parse_pull_body(r#"{"rows":[]}"#).unwrap_err(),
            SyncError::Shape(_)
        ));
        assert!(matches!(
            parse_pull_body(r#"{"data":"nope"}"#).unwrap_err(),
            SyncError::Shape(_)
        ));
        assert!(matches!(parse_pull_body("42").unwrap_err(), SyncError::Shape(_)));
    }

    #[test]
    fn test_pull_server_flag() {
        let err = parse_pull_body(r#"{"ok":false,"error":"sheet not found"}"#).unwrap_err();
        match err {
            SyncError::ServerReported(msg) => assert_eq!(msg, "sheet not found"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_body() {
        let body = r#"{"config":[
            {"name":"大和市","slug":"yamato","prefix":"Y","status":"active"},
            {"name":"座間市","slug":"zama","prefix":"Z","status":"stop"},
            {"name":"","prefix":"X"},
            {"slug":"broken"}
        ]}"#;
        let partitions = parse_config_body(body).unwrap();
        assert_eq!(partitions.len(), 2);
        assert!(partitions[0].is_offered());
        assert!(!partitions[1].is_offered());
    }

    #[test]
    fn test_config_body_without_partitions() {
        assert!(matches!(
            parse_config_body(r#"{"config":[]}"#).unwrap_err(),
            SyncError::Shape(_)
        ));
    }

    #[test]
    fn test_push_body() {
        assert!(parse_push_body(r#"{"ok":true}"#).is_ok());
        assert!(matches!(
            parse_push_body(r#"{"ok":false,"error":"locked"}"#).unwrap_err(),
            SyncError::ServerReported(_)
        ));
    }

    #[test]
    fn test_blank_endpoint_rejected() {
        assert!(matches!(
            SheetClient::new("  ", DEFAULT_TIMEOUT_SECS).unwrap_err(),
            SyncError::NoEndpoint
        ));
    }
}
