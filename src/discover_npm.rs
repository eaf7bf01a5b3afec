//! npm package-registry discoverer.
//!
//! Many MCP servers ship only as npm packages and never appear in the
//! curated lists. This discoverer sweeps the registry search API for
//! MCP-related keywords and opportunistically resolves each package's
//! GitHub repository from its metadata links.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::discover::Discoverer;
use crate::models::CapabilityEntry;

const NPM_SEARCH_URL: &str = "https://registry.npmjs.org/-/v1/search";

const SEARCH_TERMS: [&str; 3] = ["mcp-server", "mcp-plugin", "model-context-protocol"];

/// Resolve a GitHub repository URL from a package's repository link.
///
/// Returns `None` for non-GitHub hosts; a trailing slash and `.git`
/// suffix are normalized away.
fn resolve_repo_url(raw: &str) -> Option<String> {
    if !raw.contains("github.com") {
        return None;
    }
    let trimmed = raw.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    Some(trimmed.to_string())
}

/// Derive the entry's source id: `owner/repo` when a repository is known,
/// the package name otherwise.
fn resolve_source_id(name: &str, repo_url: Option<&str>) -> String {
    if let Some(url) = repo_url {
        let parts: Vec<&str> = url.trim_end_matches('/').split('/').collect();
        if parts.len() >= 2 {
            return format!("{}/{}", parts[parts.len() - 2], parts[parts.len() - 1]);
        }
    }
    name.to_string()
}

/// Internal dedup key derived from the package name, so scoped packages
/// (`@org/pkg`) cannot collide with GitHub-sourced slugs.
fn package_key(name: &str) -> String {
    let slug_name = name.replace('/', "-").replace('@', "");
    format!("mcp-npm-{slug_name}").to_lowercase()
}

fn truncate_description(desc: &str) -> String {
    if desc.chars().count() > 300 {
        let head: String = desc.chars().take(297).collect();
        format!("{head}...")
    } else {
        desc.to_string()
    }
}

/// Discoverer over the npm registry search API.
pub struct NpmDiscoverer {
    timeout_secs: u64,
}

impl NpmDiscoverer {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    fn object_to_entry(&self, obj: &Value) -> Option<CapabilityEntry> {
        let pkg = obj.get("package")?;
        let name = pkg.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }

        let repo_raw = pkg
            .get("links")
            .and_then(|l| l.get("repository"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let repo_url = resolve_repo_url(repo_raw);
        let source_id = resolve_source_id(name, repo_url.as_deref());

        let publisher = pkg
            .get("publisher")
            .and_then(|p| p.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let desc = pkg.get("description").and_then(Value::as_str).unwrap_or("");

        Some(CapabilityEntry {
            name: name.to_string(),
            source: "mcp-npm".to_string(),
            source_id,
            provider: if publisher.is_empty() {
                "npm".to_string()
            } else {
                publisher.to_string()
            },
            description: truncate_description(desc),
            category: "other".to_string(),
            repo_url,
            endpoint: None,
            protocol: "mcp".to_string(),
        })
    }
}

#[async_trait]
impl Discoverer for NpmDiscoverer {
    fn name(&self) -> &str {
        "npm-registry"
    }

    fn source(&self) -> &str {
        "mcp-npm"
    }

    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>> {
        let client = reqwest::Client::builder()
            .user_agent("agentstore")
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let mut entries: Vec<CapabilityEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for term in SEARCH_TERMS {
            if entries.len() >= limit {
                break;
            }
            let resp = client
                .get(NPM_SEARCH_URL)
                .query(&[("text", term), ("size", "100")])
                .send()
                .await;

            let body: Value = match resp.and_then(reqwest::Response::error_for_status) {
                Ok(r) => match r.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        eprintln!("  npm-registry bad response (term={term}): {e}");
                        continue;
                    }
                },
                Err(e) => {
                    eprintln!("  npm-registry error (term={term}): {e}");
                    continue;
                }
            };

            for obj in body
                .get("objects")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let name = obj
                    .get("package")
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if name.is_empty() || !seen.insert(package_key(name)) {
                    continue;
                }
                if let Some(entry) = self.object_to_entry(obj) {
                    entries.push(entry);
                }
            }
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
    fn resolves_github_repo_url() {
        assert_eq!(
            resolve_repo_url("https://github.com/org/pkg.git"),
            Some("https://github.com/org/pkg".to_string())
        );
        assert_eq!(
            resolve_repo_url("https://github.com/org/pkg/"),
            Some("https://github.com/org/pkg".to_string())
        );
        assert_eq!(resolve_repo_url("https://gitlab.com/org/pkg"), None);
        assert_eq!(resolve_repo_url(""), None);
    }

    #[test]
    fn source_id_prefers_owner_repo() {
        assert_eq!(
            resolve_source_id("@scope/pkg", Some("https://github.com/org/pkg")),
            "org/pkg"
        );
        assert_eq!(resolve_source_id("plain-pkg", None), "plain-pkg");
    }

    #[test]
    fn package_key_flattens_scoped_names() {
        assert_eq!(package_key("@Scope/Pkg"), "mcp-npm-scope-pkg");
        assert_eq!(package_key("plain"), "mcp-npm-plain");
    }

    #[test]
    fn object_maps_to_entry() {
        let obj = json!({
            "package": {
                "name": "@acme/mcp-files",
                "description": "File access over MCP",
                "publisher": {"username": "acme-bot"},
                "links": {"repository": "https://github.com/acme/mcp-files.git"},
            }
        });
        let entry = NpmDiscoverer::new(30).object_to_entry(&obj).unwrap();
        assert_eq!(entry.name, "@acme/mcp-files");
        assert_eq!(entry.source_id, "acme/mcp-files");
        assert_eq!(entry.provider, "acme-bot");
        assert_eq!(
            entry.repo_url.as_deref(),
            Some("https://github.com/acme/mcp-files")
        );
    }

    #[test]
    fn publisher_defaults_to_npm() {
        let obj = json!({
            "package": {"name": "bare-pkg"}
        });
        let entry = NpmDiscoverer::new(30).object_to_entry(&obj).unwrap();
        assert_eq!(entry.provider, "npm");
        assert!(entry.repo_url.is_none());
        assert_eq!(entry.source_id, "bare-pkg");
    }
}
