//! Scripted [`HttpTransport`] for tests in this and dependent crates.
//!
//! Responses are matched by HTTP method and URL suffix (query string
//! included), and every call is recorded so tests can count network hits.

use std::sync::Mutex;

use serde_json::{json, Value};

use crate::config::GraphConfig;
use crate::error::HttpFailure;
use crate::transport::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    PostJson,
    PostForm,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

struct Scripted {
    method: Method,
    suffix: String,
    response: Result<Value, HttpFailure>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Vec<Scripted>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response. Later registrations for the same route win.
    pub fn on(self, method: Method, suffix: &str, response: Result<Value, HttpFailure>) -> Self {
        self.set(method, suffix, response);
        self
    }

    /// Replace (or add) a response on an already shared transport.
    pub fn set(&self, method: Method, suffix: &str, response: Result<Value, HttpFailure>) {
        let mut script = self.script.lock().expect("script lock");
        script.retain(|s| !(s.method == method && s.suffix == suffix));
        script.push(Scripted {
            method,
            suffix: suffix.to_string(),
            response,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.url.ends_with(suffix))
            .count()
    }

    fn respond(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, HttpFailure> {
        self.calls.lock().expect("calls lock").push(Call {
            method,
            url: url.to_string(),
            body,
        });
        let script = self.script.lock().expect("script lock");
        script
            .iter()
            .rev()
            .find(|s| s.method == method && url.ends_with(&s.suffix))
            .map(|s| s.response.clone())
            .unwrap_or_else(|| {
                Err(HttpFailure::Status {
                    status: 404,
                    body: format!("no scripted response for {url}"),
                })
            })
    }
}

impl HttpTransport for ScriptedTransport {
    fn get_json(&self, url: &str, _bearer: &str) -> Result<Value, HttpFailure> {
        self.respond(Method::Get, url, None)
    }

    fn post_json(&self, url: &str, _bearer: &str, body: &Value) -> Result<Value, HttpFailure> {
        self.respond(Method::PostJson, url, Some(body.clone()))
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, HttpFailure> {
        let body = form
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect::<serde_json::Map<_, _>>();
        self.respond(Method::PostForm, url, Some(Value::Object(body)))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const TOKEN_SUFFIX: &str = "/oauth2/v2.0/token";
pub const SITE_SUFFIX: &str = "/sites?search=SST";
pub const DRIVES_SUFFIX: &str = "/sites/site-1/drives";
pub const FILE_SUFFIX: &str = "/drives/drive-1/root:/General/ROTAS/Gest%C3%A3o%20SST.xlsm";
pub const WORKSHEETS_SUFFIX: &str = "/drives/drive-1/items/item-1/workbook/worksheets";
pub const TABLES_SUFFIX: &str = "/worksheets/sheet-1/tables";
pub const ROWS_SUFFIX: &str = "/workbook/tables/table-1/rows";
pub const ADD_ROW_SUFFIX: &str = "/workbook/tables/table-1/rows/add";

pub fn test_config() -> GraphConfig {
    GraphConfig::from_lookup(|key| {
        let value = match key {
            "ROTAS_TENANT_ID" => "tenant-1",
            "ROTAS_CLIENT_ID" => "client-1",
            "ROTAS_CLIENT_SECRET" => "shh",
            "ROTAS_SITE_NAME" => "SST",
            "ROTAS_FILE_PATH" => "/General/ROTAS/Gestão SST.xlsm",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test config")
}

pub fn token_response(expires_in: i64) -> Value {
    json!({ "access_token": "bearer-abc", "token_type": "Bearer", "expires_in": expires_in })
}

/// A transport scripted with a healthy token endpoint and resolver chain.
pub fn healthy_workbook(rows: Vec<Vec<Value>>) -> ScriptedTransport {
    let rows: Vec<Value> = rows
        .into_iter()
        .enumerate()
        .map(|(index, cells)| json!({ "index": index, "values": [cells] }))
        .collect();
    ScriptedTransport::new()
        .on(Method::PostForm, TOKEN_SUFFIX, Ok(token_response(3600)))
        .on(
            Method::Get,
            SITE_SUFFIX,
            Ok(json!({ "value": [{ "id": "site-1", "name": "SST", "displayName": "SST" }] })),
        )
        .on(Method::Get, DRIVES_SUFFIX, Ok(json!({ "value": [{ "id": "drive-1" }] })))
        .on(Method::Get, FILE_SUFFIX, Ok(json!({ "id": "item-1" })))
        .on(
            Method::Get,
            WORKSHEETS_SUFFIX,
            Ok(json!({ "value": [
                { "id": "sheet-0", "name": "Riscos" },
                { "id": "sheet-1", "name": "Aderência" }
            ] })),
        )
        .on(
            Method::Get,
            TABLES_SUFFIX,
            Ok(json!({ "value": [{ "id": "table-1", "name": "Aderência" }] })),
        )
        .on(Method::Get, ROWS_SUFFIX, Ok(json!({ "value": rows })))
        .on(Method::PostJson, ADD_ROW_SUFFIX, Ok(json!({ "index": 41 })))
}
