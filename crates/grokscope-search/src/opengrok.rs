use std::time::Duration;

use async_trait::async_trait;
use grokscope_config::{DEFAULT_PAGE_SIZE, ServerConfig};
use serde_json::Value;

use crate::{LineMatch, SearchBackend, SearchError, SearchRequest, SearchResults};

const API_PATH: &str = "api/v1/search";
const VERIFY_PROBE_TERM: &str = "lkjsadadfkj";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub verify_timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl ClientSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            verify_timeout: Duration::from_millis(config.verify_timeout_ms),
            page_size: if config.page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                config.page_size
            },
            max_pages: config.max_pages.max(1),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// One page of a search response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub result_count: usize,
    pub results: SearchResults,
}

/// Client for the OpenGrok REST search API rooted at a web address such as
/// `http://localhost:8080/source`.
#[derive(Debug, Clone)]
pub struct OpenGrokClient {
    client: reqwest::Client,
    api_base: String,
    settings: ClientSettings,
}

impl OpenGrokClient {
    pub fn new(address: &str, settings: ClientSettings) -> Result<Self, SearchError> {
        let address = address.trim().trim_end_matches('/');
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(SearchError::InvalidAddress(address.to_owned()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: format!("{address}/{API_PATH}"),
            settings,
        })
    }

    /// Builds a client and, when `verify` is set, checks the server answers before returning it.
    pub async fn connect(
        address: &str,
        settings: ClientSettings,
        verify: bool,
    ) -> Result<Self, SearchError> {
        let client = Self::new(address, settings)?;
        if verify {
            client.verify().await?;
        }
        Ok(client)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn fetch_page(
        &self,
        request: &SearchRequest,
        count: u32,
        start: usize,
        timeout: Duration,
    ) -> Result<SearchPage, SearchError> {
        let mut query = vec![
            (request.query_type.api_key(), request.effective_term()),
            ("maxresults", count.to_string()),
            ("start", start.to_string()),
        ];
        if let Some(project) = request.project.as_deref().map(str::trim)
            && !project.is_empty()
        {
            query.push(("projects", project.to_owned()));
        }

        let response = self
            .client
            .get(&self.api_base)
            .query(&query)
            .timeout(timeout)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Unavailable(format!(
                "{} did not respond OK: {status}",
                self.api_base
            )));
        }

        let body = response.text().await.map_err(unavailable)?;
        parse_search_page(&body)
    }
}

#[async_trait]
impl SearchBackend for OpenGrokClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let page_size = self.settings.page_size;
        let timeout = self.settings.request_timeout;

        let first = self.fetch_page(request, page_size, 0, timeout).await?;
        let mut total = first.result_count;
        let mut results = first.results;
        let mut requests = 1;

        while results.len() < total {
            if requests >= self.settings.max_pages {
                tracing::warn!(
                    received = results.len(),
                    claimed = total,
                    "server claims too many results, returning early"
                );
                break;
            }

            let page = self
                .fetch_page(request, page_size, results.len(), timeout)
                .await?;
            requests += 1;
            if page.results.is_empty() {
                break;
            }

            total = page.result_count;
            for (path, matches) in page.results {
                results.entry(path).or_default().extend(matches);
            }
        }

        tracing::debug!(
            query_type = request.query_type.as_str(),
            term = %request.term,
            paths = results.len(),
            requests,
            "search completed"
        );
        Ok(results)
    }

    async fn verify(&self) -> Result<(), SearchError> {
        let check = SearchRequest::new(grokscope_core::QueryType::Definition, VERIFY_PROBE_TERM);
        self.fetch_page(&check, 1, 0, self.settings.verify_timeout)
            .await
            .map(|_| ())
    }
}

/// Decodes one response body of the search endpoint.
pub fn parse_search_page(body: &str) -> Result<SearchPage, SearchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| SearchError::Malformed(format!("invalid JSON: {err}")))?;

    let Some(raw_results) = value.get("results").and_then(Value::as_object) else {
        return Err(SearchError::Malformed(
            "missing 'results' object".to_owned(),
        ));
    };

    let mut results = SearchResults::new();
    for (path, raw_matches) in raw_results {
        let Some(raw_matches) = raw_matches.as_array() else {
            return Err(SearchError::Malformed(format!(
                "matches for '{path}' are not a list"
            )));
        };

        let matches = raw_matches
            .iter()
            .map(|item| parse_line_match(path, item))
            .collect::<Result<Vec<_>, _>>()?;
        results.insert(path.clone(), matches);
    }

    let result_count = match value.get("resultCount") {
        None | Some(Value::Null) => results.len(),
        Some(count) => count.as_u64().map(|count| count as usize).ok_or_else(|| {
            SearchError::Malformed(format!("'resultCount' is not a count: {count}"))
        })?,
    };

    Ok(SearchPage {
        result_count,
        results,
    })
}

fn parse_line_match(path: &str, item: &Value) -> Result<LineMatch, SearchError> {
    let Some(item) = item.as_object() else {
        return Err(SearchError::Malformed(format!(
            "match for '{path}' is not an object"
        )));
    };

    let line = match item.get("line") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => {
            return Err(SearchError::Malformed(format!(
                "line text for '{path}' is not a string: {other}"
            )));
        }
    };

    // Servers send the number as a string; anything unreadable falls back to 0.
    let line_number = match item.get("lineNumber") {
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or(0),
        Some(Value::Number(number)) => number.as_u64().map(|n| n as usize).unwrap_or(0),
        _ => 0,
    };

    Ok(LineMatch { line, line_number })
}

fn unavailable(err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Unavailable(format!("request timed out: {err}"))
    } else {
        SearchError::Unavailable(err.to_string())
    }
}
