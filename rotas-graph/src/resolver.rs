//! Resolver chain: site → drive → file → worksheet → table.
//!
//! Each stage needs the previous stage's identifier, so the chain is a plain
//! sequence of `?`: the first failure short-circuits and carries its
//! [`Stage`]. The resolved address is memoized per process and dropped again
//! on any failure, so a moved file is picked up on the next run.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::GraphConfig;
use crate::error::{GraphError, HttpFailure, Stage};
use crate::transport::HttpTransport;

/// Worksheet labels accepted for the adherence tab (compared case-insensitively).
pub const WORKSHEET_NAMES: [&str; 2] = ["Aderência", "Aderencia"];

/// Exact name of the Excel table inside the adherence worksheet.
pub const TABLE_NAME: &str = "Aderência";

/// Fully resolved handle to the remote adherence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub site_id: String,
    pub drive_id: String,
    pub item_id: String,
    pub worksheet_id: String,
    pub table_id: String,
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SiteEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    id: String,
    name: String,
}

pub struct ResourceResolver {
    transport: Arc<dyn HttpTransport>,
    graph_base: String,
    site_name: String,
    file_path: String,
    cache: Mutex<Option<ResolvedAddress>>,
}

impl ResourceResolver {
    pub fn new(config: &GraphConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            graph_base: config.graph_base.clone(),
            site_name: config.site_name.clone(),
            file_path: config.file_path.clone(),
            cache: Mutex::new(None),
        }
    }

    /// Run the full chain with no caching.
    pub fn resolve(&self, bearer: &str) -> Result<ResolvedAddress, GraphError> {
        let site_id = self.resolve_site(bearer)?;
        let drive_id = self.resolve_drive(bearer, &site_id)?;
        let item_id = self.resolve_file(bearer, &drive_id)?;
        let worksheet_id = self.resolve_worksheet(bearer, &drive_id, &item_id)?;
        let (table_id, table_name) =
            self.resolve_table(bearer, &drive_id, &item_id, &worksheet_id)?;

        tracing::info!(
            site = %site_id,
            drive = %drive_id,
            item = %item_id,
            worksheet = %worksheet_id,
            table = %table_name,
            "resolved adherence table",
        );
        Ok(ResolvedAddress {
            site_id,
            drive_id,
            item_id,
            worksheet_id,
            table_id,
            table_name,
        })
    }

    /// Memoized [`resolve`](Self::resolve). A failure clears the memo.
    pub fn resolve_cached(&self, bearer: &str) -> Result<ResolvedAddress, GraphError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(address) = cache.as_ref() {
            return Ok(address.clone());
        }
        match self.resolve(bearer) {
            Ok(address) => {
                *cache = Some(address.clone());
                Ok(address)
            }
            Err(err) => {
                *cache = None;
                Err(err)
            }
        }
    }

    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Site directory search. An exact name match wins; otherwise the first
    /// search hit is accepted.
    fn resolve_site(&self, bearer: &str) -> Result<String, GraphError> {
        let url = format!(
            "{}/sites?search={}",
            self.graph_base,
            urlencoding::encode(&self.site_name)
        );
        let sites: Collection<SiteEntry> = self.get(Stage::Site, &url, bearer)?;
        if sites.value.is_empty() {
            return Err(Stage::Site.fail(format!(
                "no site matches '{}'",
                self.site_name
            )));
        }

        let wanted = self.site_name.to_lowercase();
        let exact = sites.value.iter().position(|site| {
            [site.name.as_deref(), site.display_name.as_deref()]
                .into_iter()
                .flatten()
                .any(|n| n.to_lowercase() == wanted)
        });
        let index = match exact {
            Some(index) => index,
            None => {
                tracing::warn!(
                    site = %self.site_name,
                    candidates = sites.value.len(),
                    "no exact site name match; using first search result",
                );
                0
            }
        };
        Ok(sites.value[index].id.clone())
    }

    fn resolve_drive(&self, bearer: &str, site_id: &str) -> Result<String, GraphError> {
        let url = format!("{}/sites/{}/drives", self.graph_base, site_id);
        let drives: Collection<IdEntry> = self.get(Stage::Drive, &url, bearer)?;
        drives
            .value
            .into_iter()
            .next()
            .map(|d| d.id)
            .ok_or_else(|| Stage::Drive.fail(format!("site {site_id} has no document library")))
    }

    /// Exact, case-sensitive server-relative path lookup.
    fn resolve_file(&self, bearer: &str, drive_id: &str) -> Result<String, GraphError> {
        let url = format!(
            "{}/drives/{}/root:{}",
            self.graph_base,
            drive_id,
            encode_path(&self.file_path)
        );
        match self.transport.get_json(&url, bearer) {
            Ok(payload) => parse::<IdEntry>(Stage::File, payload).map(|f| f.id),
            Err(HttpFailure::Status { status: 404, .. }) => Err(Stage::File.fail(format!(
                "path not found: {}",
                self.file_path
            ))),
            Err(failure) => Err(Stage::File.fail_http(&failure)),
        }
    }

    fn resolve_worksheet(
        &self,
        bearer: &str,
        drive_id: &str,
        item_id: &str,
    ) -> Result<String, GraphError> {
        let url = format!(
            "{}/drives/{}/items/{}/workbook/worksheets",
            self.graph_base, drive_id, item_id
        );
        let sheets: Collection<NamedEntry> = self.get(Stage::Worksheet, &url, bearer)?;
        if let Some(sheet) = sheets.value.iter().find(|s| is_adherence_sheet(&s.name)) {
            return Ok(sheet.id.clone());
        }
        Err(Stage::Worksheet.fail(format!(
            "no worksheet named '{}'; available: [{}]",
            WORKSHEET_NAMES[0],
            names(&sheets.value)
        )))
    }

    fn resolve_table(
        &self,
        bearer: &str,
        drive_id: &str,
        item_id: &str,
        worksheet_id: &str,
    ) -> Result<(String, String), GraphError> {
        let url = format!(
            "{}/drives/{}/items/{}/workbook/worksheets/{}/tables",
            self.graph_base,
            drive_id,
            item_id,
            urlencoding::encode(worksheet_id)
        );
        let tables: Collection<NamedEntry> = self.get(Stage::Table, &url, bearer)?;
        if let Some(table) = tables.value.iter().find(|t| t.name == TABLE_NAME) {
            return Ok((table.id.clone(), table.name.clone()));
        }
        Err(Stage::Table.fail(format!(
            "no table named '{TABLE_NAME}'; available: [{}]",
            names(&tables.value)
        )))
    }

    fn get<T: DeserializeOwned>(&self, stage: Stage, url: &str, bearer: &str) -> Result<T, GraphError> {
        let payload = self
            .transport
            .get_json(url, bearer)
            .map_err(|failure| stage.fail_http(&failure))?;
        parse(stage, payload)
    }
}

/// `…/workbook/tables/{table}/rows` for an address.
pub fn rows_url(graph_base: &str, address: &ResolvedAddress) -> String {
    format!(
        "{}/drives/{}/items/{}/workbook/tables/{}/rows",
        graph_base,
        address.drive_id,
        address.item_id,
        urlencoding::encode(&address.table_id)
    )
}

fn parse<T: DeserializeOwned>(stage: Stage, payload: Value) -> Result<T, GraphError> {
    serde_json::from_value(payload)
        .map_err(|e| stage.fail(HttpFailure::Decode(e.to_string()).to_string()))
}

fn is_adherence_sheet(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    WORKSHEET_NAMES.iter().any(|w| w.to_lowercase() == lowered)
}

fn names(entries: &[NamedEntry]) -> String {
    entries
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
