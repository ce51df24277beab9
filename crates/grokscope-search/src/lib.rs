use std::collections::BTreeMap;

use async_trait::async_trait;
use grokscope_core::{Location, QueryType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod keepalive;
mod opengrok;

pub use keepalive::spawn_keepalive;
pub use opengrok::{ClientSettings, OpenGrokClient, SearchPage, parse_search_page};

/// Line matches keyed by repository-relative path.
pub type SearchResults = BTreeMap<String, Vec<LineMatch>>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search service unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected search response: {0}")]
    Malformed(String),
    #[error("invalid server address '{0}', expected an http:// or https:// URL")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line: String,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_type: QueryType,
    pub term: String,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl SearchRequest {
    pub fn new(query_type: QueryType, term: impl Into<String>) -> Self {
        Self {
            query_type,
            term: term.into(),
            fuzzy: false,
            project: None,
        }
    }

    /// Term as sent to the server; fuzzy queries match anywhere in the token.
    pub fn effective_term(&self) -> String {
        let term = self.term.trim();
        if self.fuzzy {
            format!("*{term}*")
        } else {
            term.to_owned()
        }
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError>;

    /// Cheap round trip used to check that the server answers.
    async fn verify(&self) -> Result<(), SearchError>;
}

pub fn flatten_results(results: SearchResults) -> Vec<Location> {
    results
        .into_iter()
        .flat_map(|(path, matches)| {
            matches.into_iter().map(move |item| Location {
                path: path.clone(),
                content: item.line,
                line_number: item.line_number,
            })
        })
        .collect()
}
