//! web_search tool - Search the web using SerpAPI
//!
//! Results come back as structured JSON, so no HTML scraping is involved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ToolError;
use crate::tools::{str_param, BoxFuture, Tool, ToolOutput};

const SERPAPI_URL: &str = "https://serpapi.com/search";

/// Search result from web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Tool for searching the web using SerpAPI
pub struct WebSearch {
    api_key: String,
    max_results: usize,
    endpoint: String,
}

impl WebSearch {
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Self {
        Self {
            api_key: api_key.into(),
            max_results: max_results.max(1),
            endpoint: SERPAPI_URL.to_string(),
        }
    }

    /// Point the tool at a different SerpAPI-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Perform search using SerpAPI
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let num = self.max_results.to_string();
        let response = client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("engine", "google"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("SerpAPI search failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("SerpAPI error: {}", response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse SerpAPI response: {}", e))?;

        Ok(parse_results(&body, self.max_results))
    }
}

/// Pull the organic results out of a SerpAPI response body
fn parse_results(body: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    if let Some(organic) = body.get("organic_results").and_then(|o| o.as_array()) {
        for item in organic.iter().take(max_results) {
            results.push(SearchResult {
                title: item.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string(),
                url: item.get("link").and_then(|l| l.as_str()).unwrap_or("").to_string(),
                snippet: item.get("snippet").and_then(|s| s.as_str()).unwrap_or("").to_string(),
            });
        }
    }
    results
}

/// Render results as compact text for the model
fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No web results found for \"{}\".", query);
    }

    let mut out = format!("Web results for \"{}\":\n", query);
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n   {}\n", i + 1, r.title, r.url, r.snippet));
    }
    out.trim_end().to_string()
}

impl Tool for WebSearch {
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = str_param(&params, "query")?;

            if query.chars().count() < 2 {
                return Err(ToolError::InvalidParams(
                    "query must be at least 2 characters".into(),
                ));
            }

            debug!(query, "Searching the web");
            match self.search(query).await {
                Ok(results) => Ok(ToolOutput::text(format_results(query, &results))),
                Err(e) => Err(ToolError::ExecutionFailed(e)),
            }
        })
    }
}
