//! GitHub search-based discoverers.
//!
//! Two complementary sweeps over the repository search API:
//!
//! - [`GithubSearchDiscoverer`] targets `mcp-server` topics and name/
//!   description keywords, sorted by stars, paginating up to two pages per
//!   query.
//! - [`GithubTopicsDiscoverer`] covers adjacent topic tags and README
//!   keywords, sorted by recent update, one page per query.
//!
//! Queries are isolated from each other; an HTTP 403 (rate limit) stops
//! the affected sweep early with whatever has been gathered, never failing
//! the run.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::discover::Discoverer;
use crate::models::CapabilityEntry;

const SEARCH_URL: &str = "https://api.github.com/search/repositories";

/// Descriptions longer than this are truncated to 297 chars + `...`.
const MAX_DESCRIPTION: usize = 300;

/// Star-sorted queries for the primary search sweep.
const SEARCH_QUERIES: [&str; 4] = [
    "topic:mcp-server",
    "topic:model-context-protocol",
    "mcp-server in:name,description language:TypeScript",
    "mcp-server in:name,description language:Python",
];

/// Update-sorted queries for the complementary topics sweep.
const TOPIC_QUERIES: [&str; 5] = [
    "topic:mcp-plugin",
    "topic:mcp-tool",
    "topic:mcp stars:>5",
    "mcp server in:readme language:TypeScript stars:>10",
    "mcp server in:readme language:Python stars:>10",
];

/// Pause between topic queries to stay clear of abuse detection.
const TOPIC_QUERY_DELAY: Duration = Duration::from_secs(2);

fn truncate_description(desc: &str) -> String {
    if desc.chars().count() > MAX_DESCRIPTION {
        let head: String = desc.chars().take(MAX_DESCRIPTION - 3).collect();
        format!("{head}...")
    } else {
        desc.to_string()
    }
}

fn build_client(token: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/vnd.github.v3+json"),
    );
    if !token.is_empty() {
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("token {token}")) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }
    Ok(reqwest::Client::builder()
        .user_agent("agentstore")
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Convert one search-result item into an entry, tagged with `source`.
fn item_to_entry(item: &Value, source: &str) -> Option<CapabilityEntry> {
    let owner = item.get("owner")?.get("login")?.as_str()?.to_string();
    let repo_name = item.get("name")?.as_str()?.to_string();
    if owner.is_empty() || repo_name.is_empty() {
        return None;
    }

    let desc = item
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("");
    let repo_url = item
        .get("html_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://github.com/{owner}/{repo_name}"));

    Some(CapabilityEntry {
        name: repo_name.clone(),
        source: source.to_string(),
        source_id: format!("{owner}/{repo_name}"),
        provider: owner,
        description: truncate_description(desc),
        // Reclassified later by the analyzer's category suggestion.
        category: "other".to_string(),
        repo_url: Some(repo_url),
        endpoint: None,
        protocol: "mcp".to_string(),
    })
}

/// Star-sorted repository search over `mcp-server` queries.
pub struct GithubSearchDiscoverer {
    token: String,
    timeout_secs: u64,
}

impl GithubSearchDiscoverer {
    pub fn new(token: String, timeout_secs: u64) -> Self {
        Self {
            token,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Discoverer for GithubSearchDiscoverer {
    fn name(&self) -> &str {
        "github-search"
    }

    fn source(&self) -> &str {
        "mcp-github"
    }

    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>> {
        let client = build_client(&self.token, self.timeout_secs)?;
        let mut entries: Vec<CapabilityEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for query in SEARCH_QUERIES {
            if entries.len() >= limit {
                break;
            }
            for page in 1..=2u32 {
                if entries.len() >= limit {
                    break;
                }
                let page_param = page.to_string();
                let resp = client
                    .get(SEARCH_URL)
                    .query(&[
                        ("q", query),
                        ("sort", "stars"),
                        ("order", "desc"),
                        ("per_page", "100"),
                        ("page", page_param.as_str()),
                    ])
                    .send()
                    .await;

                let resp = match resp {
                    Ok(r) => r,
                    Err(e) => {
                        eprintln!("  github-search error (query={query}, page={page}): {e}");
                        break;
                    }
                };

                if resp.status().as_u16() == 403 {
                    eprintln!(
                        "  github-search rate limited, keeping {} entries",
                        entries.len()
                    );
                    break;
                }
                if !resp.status().is_success() {
                    eprintln!(
                        "  github-search HTTP {} (query={query}, page={page})",
                        resp.status()
                    );
                    break;
                }

                let body: Value = match resp.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        eprintln!("  github-search bad response (query={query}): {e}");
                        break;
                    }
                };
                let items = body
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if items.is_empty() {
                    break;
                }

                for item in &items {
                    if let Some(entry) = item_to_entry(item, self.source()) {
                        if seen.insert(entry.slug()) {
                            entries.push(entry);
                        }
                    }
                }
            }
        }

        entries.truncate(limit);
        Ok(entries)
    }
}

/// Update-sorted repository search over adjacent MCP topics.
pub struct GithubTopicsDiscoverer {
    token: String,
    timeout_secs: u64,
}

impl GithubTopicsDiscoverer {
    pub fn new(token: String, timeout_secs: u64) -> Self {
        Self {
            token,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Discoverer for GithubTopicsDiscoverer {
    fn name(&self) -> &str {
        "github-topics"
    }

    fn source(&self) -> &str {
        "mcp-topics"
    }

    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>> {
        let client = build_client(&self.token, self.timeout_secs)?;
        let mut entries: Vec<CapabilityEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        'queries: for query in TOPIC_QUERIES {
            if entries.len() >= limit {
                break;
            }
            let resp = client
                .get(SEARCH_URL)
                .query(&[
                    ("q", query),
                    ("sort", "updated"),
                    ("order", "desc"),
                    ("per_page", "100"),
                    ("page", "1"),
                ])
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("  github-topics error (query={query}): {e}");
                    continue;
                }
            };

            if resp.status().as_u16() == 403 {
                eprintln!(
                    "  github-topics rate limited, keeping {} entries",
                    entries.len()
                );
                break 'queries;
            }
            if !resp.status().is_success() {
                eprintln!("  github-topics HTTP {} (query={query})", resp.status());
                continue;
            }

            let body: Value = match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("  github-topics bad response (query={query}): {e}");
                    continue;
                }
            };

            for item in body
                .get("items")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(entry) = item_to_entry(item, self.source()) {
                    if seen.insert(entry.slug()) {
                        entries.push(entry);
                    }
                }
            }

            tokio::time::sleep(TOPIC_QUERY_DELAY).await;
        }

        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_maps_to_entry() {
        let item = json!({
            "owner": {"login": "octo"},
            "name": "mcp-weather",
            "description": "Weather data over MCP",
            "html_url": "https://github.com/octo/mcp-weather",
        });
        let entry = item_to_entry(&item, "mcp-github").unwrap();
        assert_eq!(entry.source_id, "octo/mcp-weather");
        assert_eq!(entry.slug(), "mcp-github-octo/mcp-weather");
        assert_eq!(entry.category, "other");
        assert_eq!(
            entry.repo_url.as_deref(),
            Some("https://github.com/octo/mcp-weather")
        );
    }

    #[test]
    fn missing_owner_is_skipped() {
        let item = json!({"name": "orphan"});
        assert!(item_to_entry(&item, "mcp-github").is_none());
    }

    #[test]
    fn null_description_becomes_empty() {
        let item = json!({
            "owner": {"login": "octo"},
            "name": "silent",
            "description": null,
        });
        let entry = item_to_entry(&item, "mcp-github").unwrap();
        assert!(entry.description.is_empty());
    }

    #[test]
    fn long_description_truncated_to_300() {
        let long = "x".repeat(400);
        let item = json!({
            "owner": {"login": "octo"},
            "name": "verbose",
            "description": long,
        });
        let entry = item_to_entry(&item, "mcp-github").unwrap();
        assert_eq!(entry.description.chars().count(), 300);
        assert!(entry.description.ends_with("..."));
    }
}
