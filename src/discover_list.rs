//! Curated-list and official-registry discoverers.
//!
//! Both sources are markdown "awesome list" documents with the same
//! grammar, parsed line by line:
//!
//! - a `##`/`###` header line sets the running category context (decorative
//!   markup stripped);
//! - a `- [name](https://github.com/owner/repo) ... - description` list
//!   item yields one entry.
//!
//! Upstream format drift is an expected failure mode: unrecognized lines
//! are skipped, so a drifted document produces fewer (or zero) entries,
//! never an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use crate::discover::Discoverer;
use crate::models::CapabilityEntry;

/// Matches one GitHub-linked list item: name, owner, repo, trailing text.
static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s+\[([^\]]+)\]\(https://github\.com/([^/]+)/([^/\s)]+)[^)]*\)\s*(.+)$")
        .unwrap()
});

/// Matches a section header line; the capture is the header text.
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###?\s+.*?(?:<a[^>]*></a>)?(.+)$").unwrap());

/// Strips emoji and other decorative characters from header text.
static DECORATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s&/-]").unwrap());

/// The description sits after a ` - ` separator (emoji badges come first).
static DESC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s-\s(.+)$").unwrap());

/// Parse an awesome-list markdown document into capability entries.
///
/// `source_tag` distinguishes the curated list from the official registry
/// so entries stay attributable. Duplicate `(owner, repo)` pairs within
/// the same document are skipped.
pub fn parse_awesome_list(md: &str, source_tag: &str) -> Vec<CapabilityEntry> {
    let mut entries = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut current_category = "other".to_string();

    for line in md.lines() {
        if let Some(cat) = CATEGORY_RE.captures(line) {
            let raw_cat = DECORATION_RE.replace_all(cat[1].trim(), "");
            let raw_cat = raw_cat.trim();
            if !raw_cat.is_empty() {
                current_category = raw_cat.to_string();
            }
            continue;
        }

        if let Some(m) = ENTRY_RE.captures(line) {
            let name = m[1].trim().to_string();
            let owner = m[2].trim().to_string();
            // The repo segment may carry a #anchor; drop it.
            let repo = m[3]
                .split('#')
                .next()
                .unwrap_or("")
                .trim_end_matches('/')
                .to_string();
            let rest = &m[4];

            let key = (owner.to_lowercase(), repo.to_lowercase());
            if repo.is_empty() || !seen.insert(key) {
                continue;
            }

            let rest = rest.trim();
            let desc = match DESC_RE.captures(rest) {
                Some(d) => d[1].trim().to_string(),
                // No badge separator: the description starts right after the
                // link, possibly still carrying the list-item dash.
                None => rest.strip_prefix('-').unwrap_or(rest).trim().to_string(),
            };

            entries.push(CapabilityEntry {
                name,
                source: source_tag.to_string(),
                source_id: format!("{owner}/{repo}"),
                provider: owner.clone(),
                description: desc,
                category: current_category.clone(),
                repo_url: Some(format!("https://github.com/{owner}/{repo}")),
                endpoint: None,
                protocol: "mcp".to_string(),
            });
        }
    }

    entries
}

/// Discoverer over an awesome-list style markdown document.
pub struct AwesomeListDiscoverer {
    label: &'static str,
    source_tag: &'static str,
    url: String,
    timeout_secs: u64,
}

impl AwesomeListDiscoverer {
    /// The community-curated list, tagged `mcp`.
    pub fn curated(url: String, timeout_secs: u64) -> Self {
        Self {
            label: "curated-list",
            source_tag: "mcp",
            url,
            timeout_secs,
        }
    }

    /// The official registry document, tagged `mcp-official`.
    pub fn official(url: String, timeout_secs: u64) -> Self {
        Self {
            label: "official-registry",
            source_tag: "mcp-official",
            url,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Discoverer for AwesomeListDiscoverer {
    fn name(&self) -> &str {
        self.label
    }

    fn source(&self) -> &str {
        self.source_tag
    }

    async fn discover(&self, limit: usize) -> Result<Vec<CapabilityEntry>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let md = client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("Failed to fetch list document: {}", self.url))?
            .text()
            .await?;

        let mut entries = parse_awesome_list(&md, self.source_tag);
        entries.truncate(limit);
        Ok(entries)
    }
}
