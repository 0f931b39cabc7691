//! BigQuery v2 REST client using `curl` as the HTTP transport.
//!
//! Requests are fed to curl as a config file on stdin (`--config -`) so the
//! bearer token never appears on the process command line.

use std::io::Write as _;
use std::process::{Command, Stdio};

use serde_json::{Value, json};

use crate::core::config::SinkConfig;
use crate::core::errors::{EmitError, Result};
use crate::record::AnalyticsRecord;
use crate::warehouse::{TableAddress, TableSchema, Warehouse};

/// Status line appended by curl's `--write-out`.
const STATUS_MARKER: &str = "\n__ci_analytics_status__:";

/// Authenticated handle to the BigQuery REST API.
#[derive(Clone)]
pub struct BigQueryClient {
    api_base: String,
    curl_bin: String,
    token: String,
}

impl std::fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("api_base", &self.api_base)
            .field("curl_bin", &self.curl_bin)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Raw HTTP exchange result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl BigQueryClient {
    /// Build a client with an explicit token.
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        curl_bin: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            curl_bin: curl_bin.into(),
            token: token.into(),
        }
    }

    /// Build a client from configuration, resolving the access token from
    /// `sink.token_env` or, when unset, from `gcloud auth print-access-token`.
    pub fn from_config(sink: &SinkConfig) -> Result<Self> {
        let token = match std::env::var(&sink.token_env) {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => gcloud_access_token(&sink.token_env)?,
        };
        Ok(Self::new(&sink.api_base, &sink.curl_bin, token))
    }

    fn tables_url(&self, address: &TableAddress) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables",
            self.api_base, address.project_id, address.dataset
        )
    }

    fn table_url(&self, address: &TableAddress) -> String {
        format!("{}/{}", self.tables_url(address), address.table)
    }

    fn send(&self, method: &str, url: &str, body: Option<&str>) -> Result<HttpResponse> {
        let config = curl_config(method, url, &self.token, body);

        let mut child = Command::new(&self.curl_bin)
            .args(["--config", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EmitError::sink(format!("{} not found or failed: {e}", self.curl_bin)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(config.as_bytes())
                .map_err(|e| EmitError::sink(format!("failed to write request to curl: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| EmitError::sink(format!("failed to wait for curl: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EmitError::sink(format!(
                "request to {url} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_curl_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Warehouse for BigQueryClient {
    fn resolve_table(&self, address: &TableAddress) -> Result<String> {
        let response = self.send("GET", &self.table_url(address), None)?;
        if !response.is_success() {
            return Err(EmitError::sink(error_message(&response)));
        }
        let table: Value = serde_json::from_str(&response.body)?;
        Ok(table
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(
                || format!("{}:{}.{}", address.project_id, address.dataset, address.table),
                String::from,
            ))
    }

    fn insert_row(&self, address: &TableAddress, record: &AnalyticsRecord) -> Result<()> {
        let body = insert_all_body(record)?;
        let url = format!("{}/insertAll", self.table_url(address));
        let response = self.send("POST", &url, Some(&body))?;
        if !response.is_success() {
            return Err(EmitError::sink(error_message(&response)));
        }
        if let Some(message) = insert_errors(&response.body) {
            return Err(EmitError::sink(message));
        }
        Ok(())
    }

    fn create_table(&self, address: &TableAddress, schema: &TableSchema) -> Result<()> {
        let body = json!({
            "tableReference": {
                "projectId": address.project_id,
                "datasetId": address.dataset,
                "tableId": address.table,
            },
            "schema": { "fields": schema.fields },
            "timePartitioning": schema.time_partitioning,
        });
        let response = self.send("POST", &self.tables_url(address), Some(&body.to_string()))?;
        if !response.is_success() {
            return Err(EmitError::sink(error_message(&response)));
        }
        Ok(())
    }
}

fn gcloud_access_token(token_env: &str) -> Result<String> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .map_err(|e| {
            EmitError::sink(format!(
                "no access token: {token_env} is unset and gcloud could not run: {e}"
            ))
        })?;

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || token.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EmitError::sink(format!(
            "no access token: {token_env} is unset and gcloud failed: {}",
            stderr.trim()
        )));
    }
    Ok(token)
}

/// Quote a value for a curl config file.
fn curl_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn curl_config(method: &str, url: &str, token: &str, body: Option<&str>) -> String {
    let mut lines = vec![
        "silent".to_string(),
        "show-error".to_string(),
        format!("request = {}", curl_quote(method)),
        format!("url = {}", curl_quote(url)),
        format!("header = {}", curl_quote(&format!("Authorization: Bearer {token}"))),
        format!(
            "write-out = {}",
            curl_quote(&format!("{STATUS_MARKER}%{{http_code}}"))
        ),
    ];
    if let Some(body) = body {
        lines.push(format!("header = {}", curl_quote("Content-Type: application/json")));
        lines.push(format!("data-binary = {}", curl_quote(body)));
    }
    let mut config = lines.join("\n");
    config.push('\n');
    config
}

fn parse_curl_output(stdout: &str) -> Result<HttpResponse> {
    let (body, status) = stdout
        .rsplit_once(STATUS_MARKER)
        .ok_or_else(|| EmitError::sink("malformed curl output: missing status"))?;
    let status = status
        .trim()
        .parse()
        .map_err(|_| EmitError::sink(format!("malformed curl status {:?}", status.trim())))?;
    Ok(HttpResponse {
        status,
        body: body.to_string(),
    })
}

fn insert_all_body(record: &AnalyticsRecord) -> Result<String> {
    let body = json!({
        "kind": "bigquery#tableDataInsertAllRequest",
        "rows": [{ "json": record }],
    });
    Ok(serde_json::to_string(&body)?)
}

/// The service's own error message, or the status and raw body.
fn error_message(response: &HttpResponse) -> String {
    serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", response.status, response.body.trim()))
}

/// Row-level failures reported inside a 200 insertAll response.
fn insert_errors(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let rows = value.get("insertErrors")?.as_array()?;
    let messages: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get("errors").and_then(Value::as_array))
        .flatten()
        .filter_map(|error| error.get("message").and_then(Value::as_str))
        .collect();
    if rows.is_empty() {
        None
    } else if messages.is_empty() {
        Some("insertAll rejected the row".to_string())
    } else {
        Some(messages.join("; "))
    }
}
