//! Skills-hub discoverer.
//!
//! Pulls agent skills from a hub JSON API (`GET {api}/skills`). The hub is
//! deployment-specific, so this discoverer is config-gated: it only runs
//! when `discovery.hub_url` is set.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::discover::Discoverer;
use crate::models::CapabilityEntry;

/// Parse a hub skills response into capability entries.
///
/// Skills missing an id or name are skipped individually; a malformed
/// object never poisons the batch.
pub fn parse_hub_response(raw: &Value) -> Vec<CapabilityEntry> {
    let mut entries = Vec::new();

    for skill in raw
        .get("skills")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let (Some(name), Some(id)) = (
            skill.get("name").and_then(Value::as_str),
            skill.get("id").and_then(Value::as_str),
        ) else {
            continue;
        };
        if name.is_empty() || id.is_empty() {
            continue;
        }

        entries.push(CapabilityEntry {
            name: name.to_string(),
            source: "skillhub".to_string(),
            source_id: id.to_string(),
            provider: skill
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            description: skill
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            category: skill
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or("other")
                .to_string(),
            repo_url: skill
                .get("repo_url")
                .and_then(Value::as_str)
                .map(str::to_string),
            endpoint: None,
            protocol: "skill".to_string(),
        });
    }

    entries
}

/// Discoverer over a skills-hub JSON API.
pub struct SkillHubDiscoverer {
    api_url: String,
    timeout_secs: u64,
}

impl SkillHubDiscoverer {
    pub fn new(api_url: String, timeout_secs: u64) -> Self {
        Self {
            api_url,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Discoverer for SkillHubDiscoverer {
    fn name(&self) -> &str {
        "skills-hub"
    }

    fn source(&self) -> &str {
        "skillhub"
    }

    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>> {
        let client = reqwest::Client::builder()
            .user_agent("agentstore")
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let url = format!("{}/skills", self.api_url.trim_end_matches('/'));
        let raw: Value = client
            .get(&url)
            .query(&[("limit", limit.to_string().as_str()), ("sort", "installs")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("Failed to fetch skills from {url}"))?
            .json()
            .await?;

        let mut entries = parse_hub_response(&raw);
        entries.truncate(limit);
        Ok(entries)
    }
}
