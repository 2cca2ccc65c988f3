//! Graph client: token + resolver + the two row calls the pipeline needs.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::GraphConfig;
use crate::error::{GraphError, HttpFailure, Stage};
use crate::resolver::{rows_url, ResolvedAddress, ResourceResolver};
use crate::token::{AccessToken, TokenProvider};
use crate::transport::{HttpTransport, UreqTransport};

/// Row id reported when Graph accepts a row without echoing its index.
pub const PLACEHOLDER_ROW_ID: &str = "added";

/// A token plus the address it was used to resolve.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: AccessToken,
    pub address: ResolvedAddress,
}

#[derive(Debug, Deserialize)]
struct RowCollection {
    #[serde(default)]
    value: Vec<RowEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct AddedRow {
    #[serde(default)]
    index: Option<i64>,
}

pub struct GraphClient {
    transport: Arc<dyn HttpTransport>,
    graph_base: String,
    tokens: TokenProvider,
    resolver: ResourceResolver,
}

impl GraphClient {
    pub fn new(config: &GraphConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            tokens: TokenProvider::new(config, transport.clone()),
            resolver: ResourceResolver::new(config, transport.clone()),
            graph_base: config.graph_base.clone(),
            transport,
        }
    }

    /// Production client over a shared `ureq` agent with the configured timeout.
    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(config, Arc::new(UreqTransport::new(config.timeout)))
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Token, then address. Either failure is returned untouched; a 401 from
    /// Graph also drops the cached token.
    pub fn session(&self) -> Result<Session, GraphError> {
        let token = self.tokens.token()?;
        let address = self
            .resolver
            .resolve_cached(&token.bearer)
            .inspect_err(|err| self.forget_rejected_token(err))?;
        Ok(Session { token, address })
    }

    /// Every row of the adherence table, as raw positional cells.
    pub fn fetch_rows(&self, session: &Session) -> Result<Vec<Vec<Value>>, GraphError> {
        let url = rows_url(&self.graph_base, &session.address);
        let payload = self
            .transport
            .get_json(&url, &session.token.bearer)
            .map_err(|failure| {
                self.resolver.invalidate();
                let err = Stage::Rows.fail_http(&failure);
                self.forget_rejected_token(&err);
                err
            })?;
        let rows: RowCollection = serde_json::from_value(payload).map_err(|e| {
            self.resolver.invalidate();
            Stage::Rows.fail(HttpFailure::Decode(e.to_string()).to_string())
        })?;

        Ok(rows
            .value
            .into_iter()
            .filter_map(|row| row.values.into_iter().next())
            .collect())
    }

    /// Append one row; returns the remote row index as a string id.
    ///
    /// Exactly one POST per call; nothing here retries.
    pub fn add_row(&self, session: &Session, cells: &[String]) -> Result<String, HttpFailure> {
        let url = format!("{}/add", rows_url(&self.graph_base, &session.address));
        let body = json!({ "values": [cells] });
        let payload = self
            .transport
            .post_json(&url, &session.token.bearer, &body)
            .inspect_err(|failure| {
                self.resolver.invalidate();
                if failure.status() == Some(401) {
                    self.tokens.invalidate();
                }
            })?;

        let added: AddedRow = serde_json::from_value(payload).unwrap_or(AddedRow { index: None });
        match added.index {
            Some(index) => Ok(index.to_string()),
            None => {
                tracing::warn!(
                    table = %session.address.table_name,
                    "row added but the response carried no index; reporting placeholder id",
                );
                Ok(PLACEHOLDER_ROW_ID.to_string())
            }
        }
    }

    fn forget_rejected_token(&self, err: &GraphError) {
        if err.is_unauthorized() {
            tracing::warn!("graph rejected the access token; dropping it from the cache");
            self.tokens.invalidate();
        }
    }
}
