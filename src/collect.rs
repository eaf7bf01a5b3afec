//! GitHub repository data collection.
//!
//! For each entry with a parseable repository reference, a batch of
//! independent metadata queries runs concurrently per repository: core repo
//! info, contributor count, closed-issue count, README, top-level contents,
//! and releases/tags. Any individual query's failure degrades only its
//! field to the default; a per-entry failure degrades the whole entry to
//! [`RepoData::default`]. The batch never aborts.
//!
//! # Retry Strategy
//!
//! Each HTTP call makes up to 3 attempts with 1s/2s/4s backoff. A 403 is
//! treated as a rate-limit signal, logged with the remaining-quota and
//! reset-time headers, and retried; exhausting retries raises the
//! distinguishable [`CollectError::RateLimitExceeded`] for that call only.

use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::models::{CapabilityEntry, RepoData};
use crate::progress::{PipelineEvent, PipelineProgress};

/// Hard ceiling on simultaneous repository fetches.
pub const MAX_CONCURRENT_REPOS: usize = 5;

const MAX_RETRIES: u32 = 3;
const BACKOFF_SECONDS: [u64; 3] = [1, 2, 4];

/// Dependency lists are capped at this many manifest entries.
const MAX_DEPENDENCIES: usize = 10;

/// Top-level names that indicate a test suite.
const TEST_INDICATORS: [&str; 8] = [
    "tests",
    "test",
    "__tests__",
    "spec",
    "__test__",
    "pytest.ini",
    "jest.config.js",
    "vitest.config.ts",
];

/// Ordered client-compatibility patterns over README text. Each client is
/// reported once, in first-match order.
static CLIENT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)\bclaude\s*desktop\b").unwrap(), "claude"),
        (Regex::new(r"(?i)\bclaude\b").unwrap(), "claude"),
        (Regex::new(r"(?i)\bcursor\b").unwrap(), "cursor"),
        (Regex::new(r"(?i)\bwindsurf\b").unwrap(), "windsurf"),
        (Regex::new(r"(?i)\bvs\s*code\b").unwrap(), "vscode"),
        (Regex::new(r"(?i)\bvscode\b").unwrap(), "vscode"),
        (Regex::new(r"(?i)\bcline\b").unwrap(), "cline"),
    ]
});

/// `page=N>; rel="last"` in a pagination Link header.
static LAST_PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"page=(\d+)>; rel="last""#).unwrap());

/// Collector failure taxonomy. Only the rate-limit case needs to stay
/// distinguishable across the retry boundary; everything else flows
/// through the generic HTTP variant.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("GitHub rate limit exceeded after {attempts} retries")]
    RateLimitExceeded { attempts: u32 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Issue a GET with retry/backoff; returns the response whatever its
/// status, except for a 403 which is retried and eventually raised as
/// [`CollectError::RateLimitExceeded`].
async fn request_with_retry(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<reqwest::Response, CollectError> {
    let mut last_err: Option<CollectError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(BACKOFF_SECONDS[attempt as usize - 1])).await;
        }

        match client.get(url).query(query).send().await {
            Ok(resp) => {
                if resp.status().as_u16() == 403 {
                    let remaining = header_str(&resp, "x-ratelimit-remaining");
                    let reset_at = header_str(&resp, "x-ratelimit-reset");
                    eprintln!(
                        "  GitHub 403 rate limit: remaining={remaining}, reset={reset_at} \
                         (attempt {}/{MAX_RETRIES})",
                        attempt + 1
                    );
                    last_err = Some(CollectError::RateLimitExceeded {
                        attempts: MAX_RETRIES,
                    });
                    continue;
                }
                return Ok(resp);
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                eprintln!(
                    "  request failed: {e}, retrying ({}/{MAX_RETRIES})",
                    attempt + 1
                );
                last_err = Some(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_err.unwrap_or(CollectError::RateLimitExceeded {
        attempts: MAX_RETRIES,
    }))
}

fn header_str(resp: &reqwest::Response, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("?")
        .to_string()
}

/// Extract `(owner, repo)` from a GitHub repository URL.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let rest = url.split("github.com").nth(1)?;
    let rest = rest.trim_start_matches([':', '/']);
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Count items via the pagination Link header trick: request one item per
/// page and read the last page number. Falls back to the body array length.
fn count_from_link_header(link: &str, body: &Value, fallback: u32) -> u32 {
    if link.contains("last") {
        LAST_PAGE_RE
            .captures(link)
            .and_then(|m| m[1].parse().ok())
            .unwrap_or(fallback)
    } else {
        body.as_array().map_or(fallback, |a| a.len() as u32)
    }
}

/// Detect supported clients from README text, case-insensitive, each label
/// once in first-match order.
pub fn detect_clients(readme_text: &str) -> Vec<String> {
    if readme_text.is_empty() {
        return Vec::new();
    }
    let mut seen: HashSet<&str> = HashSet::new();
    let mut clients = Vec::new();
    for (pattern, client) in CLIENT_PATTERNS.iter() {
        if !seen.contains(client) && pattern.is_match(readme_text) {
            seen.insert(client);
            clients.push((*client).to_string());
        }
    }
    clients
}

/// Decode GitHub's base64 content field (which embeds newlines).
fn decode_content(value: &Value) -> Option<String> {
    let content: String = value
        .get("content")?
        .as_str()?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(content)
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse a `package.json` body into its dependency names, capped.
fn parse_dependencies(pkg_text: &str) -> Vec<String> {
    let Ok(pkg) = serde_json::from_str::<Value>(pkg_text) else {
        return Vec::new();
    };
    pkg.get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| deps.keys().take(MAX_DEPENDENCIES).cloned().collect())
        .unwrap_or_default()
}

async fn json_of(resp: reqwest::Response) -> Option<(String, Value)> {
    if !resp.status().is_success() {
        return None;
    }
    let link = header_str(&resp, "link");
    let body = resp.json::<Value>().await.ok()?;
    Some((link, body))
}

/// Fetch all repository signals for one `owner/repo`.
pub async fn fetch_repo_data(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
) -> Result<RepoData, CollectError> {
    let base = format!("https://api.github.com/repos/{owner}/{repo}");
    let contributors_url = format!("{base}/contributors");
    let issues_url = format!("{base}/issues");
    let readme_url = format!("{base}/readme");
    let contents_url = format!("{base}/contents");
    let releases_url = format!("{base}/releases");

    let (repo_resp, contrib_resp, issues_resp, readme_resp, contents_resp, releases_resp) = tokio::join!(
        request_with_retry(client, &base, &[]),
        request_with_retry(client, &contributors_url, &[("per_page", "1")]),
        request_with_retry(
            client,
            &issues_url,
            &[("state", "closed"), ("per_page", "1")],
        ),
        request_with_retry(client, &readme_url, &[]),
        request_with_retry(client, &contents_url, &[]),
        request_with_retry(client, &releases_url, &[("per_page", "1")]),
    );

    let mut data = RepoData::default();

    if let Ok(resp) = repo_resp {
        if let Some((_, r)) = json_of(resp).await {
            data.stars = r.get("stargazers_count").and_then(Value::as_u64).unwrap_or(0) as u32;
            data.forks = r.get("forks_count").and_then(Value::as_u64).unwrap_or(0) as u32;
            data.language = r.get("language").and_then(Value::as_str).map(str::to_string);
            data.last_updated = r
                .get("pushed_at")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            data.open_issues = r
                .get("open_issues_count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
        }
    }

    if let Ok(resp) = contrib_resp {
        if let Some((link, body)) = json_of(resp).await {
            data.contributors = count_from_link_header(&link, &body, 1);
        }
    }

    if let Ok(resp) = issues_resp {
        if let Some((link, body)) = json_of(resp).await {
            data.closed_issues = count_from_link_header(&link, &body, 0);
        }
    }

    if let Ok(resp) = readme_resp {
        if let Some((_, body)) = json_of(resp).await {
            if let Some(text) = decode_content(&body) {
                data.readme_length = text.len();
                data.readme_text = text;
            }
        }
    }

    if let Ok(resp) = contents_resp {
        if let Some((_, body)) = json_of(resp).await {
            let files: HashSet<String> = body
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|f| f.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect();

            data.has_typescript =
                files.contains("tsconfig.json") || data.language.as_deref() == Some("TypeScript");
            data.has_tests = TEST_INDICATORS.iter().any(|t| files.contains(*t));

            if files.contains("package.json") {
                if let Ok(pkg_resp) =
                    request_with_retry(client, &format!("{base}/contents/package.json"), &[]).await
                {
                    if let Some((_, pkg_body)) = json_of(pkg_resp).await {
                        if let Some(pkg_text) = decode_content(&pkg_body) {
                            data.dependencies = parse_dependencies(&pkg_text);
                        }
                    }
                }
            }
        }
    }

    if let Ok(resp) = releases_resp {
        if let Some((_, releases)) = json_of(resp).await {
            if let Some(first) = releases.as_array().and_then(|a| a.first()) {
                data.latest_version = first
                    .get("tag_name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
            }
        }
    }

    // No releases: fall back to the most recent git tag.
    if data.latest_version.is_empty() {
        if let Ok(resp) =
            request_with_retry(client, &format!("{base}/tags"), &[("per_page", "1")]).await
        {
            if let Some((_, tags)) = json_of(resp).await {
                if let Some(first) = tags.as_array().and_then(|a| a.first()) {
                    data.latest_version = first
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                }
            }
        }
    }

    data.supported_clients = detect_clients(&data.readme_text);

    Ok(data)
}

/// Collect repository data for a batch of entries.
///
/// The output aligns positionally with the input: index `i` of the result
/// is entry `i`'s data. At most [`MAX_CONCURRENT_REPOS`] repositories are
/// fetched simultaneously; a per-entry failure yields the default record.
pub async fn collect_repo_data(
    entries: &[CapabilityEntry],
    config: &Config,
    progress: &dyn PipelineProgress,
) -> Vec<RepoData> {
    let client = match build_client(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("  collect: failed to build HTTP client: {e}");
            return vec![RepoData::default(); entries.len()];
        }
    };

    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_REPOS));
    let total = entries.len() as u64;
    let done = AtomicU64::new(0);

    futures::future::join_all(entries.iter().map(|entry| {
        let sem = Arc::clone(&sem);
        let client = client.clone();
        let done = &done;
        async move {
            let _permit = sem.acquire_owned().await.ok();
            let result = match entry.repo_url.as_deref().and_then(parse_owner_repo) {
                Some((owner, repo)) => match fetch_repo_data(&client, &owner, &repo).await {
                    Ok(data) => data,
                    Err(e) => {
                        eprintln!("  collect failed for {}: {e}", entry.slug());
                        RepoData::default()
                    }
                },
                None => RepoData::default(),
            };
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(PipelineEvent::ItemDone {
                stage: "collect",
                n,
                total,
            });
            result
        }
    }))
    .await
}

fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/vnd.github.v3+json"),
    );
    if !config.github.token.is_empty() {
        if let Ok(value) =
            reqwest::header::HeaderValue::from_str(&format!("token {}", config.github.token))
        {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }
    reqwest::Client::builder()
        .user_agent("agentstore")
        .default_headers(headers)
        .timeout(Duration::from_secs(config.github.timeout_secs))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use serde_json::json;

    #[test]
    fn parses_owner_repo_variants() {
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo/tree/main/sub"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(
            parse_owner_repo("git@github.com:owner/repo.git"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(parse_owner_repo("https://example.com/owner/repo"), None);
        assert_eq!(parse_owner_repo("https://github.com/loner"), None);
        assert_eq!(parse_owner_repo(""), None);
    }

    #[test]
    fn counts_from_link_header_last_page() {
        let link = r#"<https://api.github.com/repositories/1/contributors?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/contributors?per_page=1&page=57>; rel="last""#;
        assert_eq!(count_from_link_header(link, &json!([]), 1), 57);
    }

    #[test]
    fn counts_fall_back_to_body_length() {
        assert_eq!(count_from_link_header("", &json!([{}, {}]), 1), 2);
        assert_eq!(count_from_link_header("", &json!("not an array"), 1), 1);
    }

    #[test]
    fn detects_clients_in_first_match_order() {
        let readme = "Works with Cursor and Claude Desktop. Also VSCode.";
        assert_eq!(detect_clients(readme), vec!["claude", "cursor", "vscode"]);
    }

    #[test]
    fn detects_each_client_once() {
        let readme = "claude claude desktop CLAUDE";
        assert_eq!(detect_clients(readme), vec!["claude"]);
    }

    #[test]
    fn empty_readme_detects_nothing() {
        assert!(detect_clients("").is_empty());
    }

    #[test]
    fn decodes_newline_embedded_base64() {
        let body = json!({"content": "IyBIZWxs\nbyB3b3Js\nZA==\n"});
        assert_eq!(decode_content(&body).unwrap(), "# Hello world");
    }

    #[test]
    fn dependency_parse_caps_at_ten() {
        let deps: String = (0..15)
            .map(|i| format!("\"dep{i}\": \"^1.0.0\""))
            .collect::<Vec<_>>()
            .join(",");
        let pkg = format!("{{\"dependencies\": {{{deps}}}}}");
        assert_eq!(parse_dependencies(&pkg).len(), 10);
    }

    #[test]
    fn dependency_parse_tolerates_garbage() {
        assert!(parse_dependencies("not json at all").is_empty());
        assert!(parse_dependencies("{}").is_empty());
    }

    #[tokio::test]
    async fn entries_without_repo_url_yield_defaults_in_order() {
        let entries = vec![
            CapabilityEntry {
                name: "a".to_string(),
                source: "skillhub".to_string(),
                source_id: "a-1".to_string(),
                provider: "x".to_string(),
                description: String::new(),
                category: "other".to_string(),
                repo_url: None,
                endpoint: None,
                protocol: "skill".to_string(),
            },
            CapabilityEntry {
                name: "b".to_string(),
                source: "skillhub".to_string(),
                source_id: "b-2".to_string(),
                provider: "x".to_string(),
                description: String::new(),
                category: "other".to_string(),
                repo_url: Some("not a github url".to_string()),
                endpoint: None,
                protocol: "skill".to_string(),
            },
        ];
        let config = Config::minimal();
        let repos = collect_repo_data(&entries, &config, &NoProgress).await;
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].stars, 0);
        assert!(!repos[1].has_tests);
    }

    #[tokio::test]
    async fn concurrency_stays_within_ceiling() {
        use std::sync::atomic::AtomicUsize;

        let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_REPOS));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        futures::future::join_all((0..25).map(|_| {
            let sem = Arc::clone(&sem);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let _permit = sem.acquire_owned().await.ok();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }))
        .await;

        assert!(peak.load(Ordering::SeqCst) <= MAX_CONCURRENT_REPOS);
    }
}
