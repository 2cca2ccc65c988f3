//! # rotas-graph
//!
//! Microsoft Graph access for the adherence workbook: client-credentials
//! token cache, the site → drive → file → worksheet → table resolver chain,
//! and the row read/append calls built on top of them.

pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod token;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{GraphClient, Session, PLACEHOLDER_ROW_ID};
pub use config::GraphConfig;
pub use error::{ConfigError, GraphError, HttpFailure, Stage};
pub use resolver::{ResolvedAddress, ResourceResolver};
pub use token::{AccessToken, TokenProvider};
pub use transport::{HttpTransport, UreqTransport, HTTP_TIMEOUT};
