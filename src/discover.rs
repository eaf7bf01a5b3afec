//! Discoverer contract, registry, and cross-source deduplication.
//!
//! Each upstream registry/search source is a [`Discoverer`]. Discoverers
//! run concurrently with per-source failure isolation: a failing source
//! logs and contributes zero entries, and never aborts its siblings.
//!
//! Registration order encodes source priority for the first-seen-wins
//! deduplication pass: skills hub (when enabled) > curated list > official
//! registry > code search > topic search > package registry.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::config::Config;
use crate::models::CapabilityEntry;

/// A source of candidate capability entries.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Short human-readable name (e.g. `"curated-list"`), used in logs and
    /// the `sources` listing.
    fn name(&self) -> &str;

    /// The source tag stamped on produced entries (e.g. `"mcp"`).
    fn source(&self) -> &str;

    /// Pull up to `limit` candidate entries from the upstream source.
    ///
    /// Called on the tokio runtime; may perform HTTP requests. Format
    /// drift upstream yields fewer or zero entries, not an error.
    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>>;
}

/// Registry of discoverers with their per-source limits.
pub struct DiscovererRegistry {
    discoverers: Vec<(Box<dyn Discoverer>, usize)>,
}

impl DiscovererRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            discoverers: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with all configured discoverers, in
    /// priority order.
    pub fn from_config(config: &Config) -> Self {
        use crate::discover_hub::SkillHubDiscoverer;
        use crate::discover_list::AwesomeListDiscoverer;
        use crate::discover_npm::NpmDiscoverer;
        use crate::discover_search::{GithubSearchDiscoverer, GithubTopicsDiscoverer};

        let d = &config.discovery;
        let mut registry = Self::new();

        if let Some(hub_url) = &d.hub_url {
            registry.register(
                Box::new(SkillHubDiscoverer::new(hub_url.clone(), d.timeout_secs)),
                d.hub_limit,
            );
        }
        registry.register(
            Box::new(AwesomeListDiscoverer::curated(
                d.curated_url.clone(),
                d.timeout_secs,
            )),
            d.curated_limit,
        );
        registry.register(
            Box::new(AwesomeListDiscoverer::official(
                d.registry_url.clone(),
                d.timeout_secs,
            )),
            d.registry_limit,
        );
        registry.register(
            Box::new(GithubSearchDiscoverer::new(
                config.github.token.clone(),
                d.timeout_secs,
            )),
            d.search_limit,
        );
        registry.register(
            Box::new(GithubTopicsDiscoverer::new(
                config.github.token.clone(),
                d.timeout_secs,
            )),
            d.topics_limit,
        );
        registry.register(Box::new(NpmDiscoverer::new(d.timeout_secs)), d.npm_limit);

        registry
    }

    /// Register a discoverer with its item limit.
    pub fn register(&mut self, discoverer: Box<dyn Discoverer>, limit: usize) {
        self.discoverers.push((discoverer, limit));
    }

    /// All registered discoverers with their limits.
    pub fn discoverers(&self) -> impl Iterator<Item = (&dyn Discoverer, usize)> {
        self.discoverers.iter().map(|(d, l)| (d.as_ref(), *l))
    }

    /// Run all discoverers concurrently and concatenate their output in
    /// registration order.
    ///
    /// Each source is isolated: an `Err` from one discoverer is logged and
    /// contributes an empty batch without cancelling the others. A source
    /// with a zero limit is skipped.
    pub async fn discover_all(&self) -> Vec<CapabilityEntry> {
        let batches = futures::future::join_all(self.discoverers.iter().map(|(d, limit)| {
            async move {
                if *limit == 0 {
                    return Vec::new();
                }
                match d.discover(*limit).await {
                    Ok(entries) => {
                        eprintln!("  {}: {} entries", d.name(), entries.len());
                        entries
                    }
                    Err(e) => {
                        eprintln!("  {}: failed ({}), skipping", d.name(), e);
                        Vec::new()
                    }
                }
            }
        }))
        .await;

        batches.into_iter().flatten().collect()
    }
}

impl Default for DiscovererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a repository URL for deduplication: case-folded, trailing
/// slash stripped.
pub fn normalize_repo_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

/// Cross-source deduplication, first-seen-wins.
///
/// The key is the normalized repository URL when present, falling back to
/// the slug. Input order is preserved, so discoverer priority decides which
/// duplicate survives.
pub fn dedupe_entries(entries: Vec<CapabilityEntry>) -> Vec<CapabilityEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(entries.len());

    for entry in entries {
        let key = match &entry.repo_url {
            Some(url) => normalize_repo_url(url),
            None => entry.slug(),
        };
        if seen.insert(key) {
            result.push(entry);
        }
    }

    result
}
