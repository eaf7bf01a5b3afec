use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration for the pipeline.
///
/// Parsed from TOML; every section has defaults so a missing config file
/// means "run with defaults". Credentials are resolved from the environment
/// exactly once, in [`load_config`] / [`Config::resolve_env`], and threaded
/// through as plain fields so tests can inject fixed values.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    /// Access token for elevated API rate limits. Filled from `GITHUB_TOKEN`
    /// when empty; anonymous requests still work at the low quota.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            timeout_secs: default_github_timeout(),
        }
    }
}

fn default_github_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Backend provider: `openai`, `anthropic`, `gemini`, or `ollama`.
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    /// Model override. Each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (used by the ollama provider).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    /// Filled from the provider's `*_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            model: None,
            url: None,
            timeout_secs: default_ai_timeout(),
            api_key: String::new(),
        }
    }
}

fn default_ai_provider() -> String {
    "openai".to_string()
}
fn default_ai_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Curated-list document URL.
    #[serde(default = "default_curated_url")]
    pub curated_url: String,
    /// Official registry document URL.
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// Skills-hub API base URL. The hub discoverer is disabled when unset.
    #[serde(default)]
    pub hub_url: Option<String>,
    #[serde(default = "default_curated_limit")]
    pub curated_limit: usize,
    #[serde(default = "default_curated_limit")]
    pub registry_limit: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_topics_limit")]
    pub topics_limit: usize,
    #[serde(default = "default_topics_limit")]
    pub npm_limit: usize,
    #[serde(default = "default_hub_limit")]
    pub hub_limit: usize,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            curated_url: default_curated_url(),
            registry_url: default_registry_url(),
            hub_url: None,
            curated_limit: default_curated_limit(),
            registry_limit: default_curated_limit(),
            search_limit: default_search_limit(),
            topics_limit: default_topics_limit(),
            npm_limit: default_topics_limit(),
            hub_limit: default_hub_limit(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_curated_url() -> String {
    "https://raw.githubusercontent.com/punkpeye/awesome-mcp-servers/main/README.md".to_string()
}
fn default_registry_url() -> String {
    "https://raw.githubusercontent.com/modelcontextprotocol/servers/main/README.md".to_string()
}
fn default_curated_limit() -> usize {
    500
}
fn default_search_limit() -> usize {
    300
}
fn default_topics_limit() -> usize {
    200
}
fn default_hub_limit() -> usize {
    100
}
fn default_fetch_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Disable to skip cloning and scanning entirely; safety scoring then
    /// falls back to its no-scan-data formula.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,
    #[serde(default = "default_scanner_timeout")]
    pub scanner_timeout_secs: u64,
    /// Root for per-entry scratch clone directories. Defaults to the system
    /// temp directory.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clone_timeout_secs: default_clone_timeout(),
            scanner_timeout_secs: default_scanner_timeout(),
            scratch_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_clone_timeout() -> u64 {
    60
}
fn default_scanner_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Ranked snapshot of all capability records, fully rewritten each run.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Append-only run log, capped to the most recent 100 entries.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            log_file: default_log_file(),
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/capabilities.json")
}
fn default_log_file() -> PathBuf {
    PathBuf::from("data/update_log.json")
}

impl Config {
    /// A default config with no environment resolution, for tests.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Resolve credentials from the environment, once, at startup.
    ///
    /// Values already present in the config file win over the environment.
    pub fn resolve_env(&mut self) {
        if self.github.token.is_empty() {
            self.github.token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
        }
        if self.ai.api_key.is_empty() {
            let var = match self.ai.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                "anthropic" => "ANTHROPIC_API_KEY",
                "gemini" => "GEMINI_API_KEY",
                _ => return,
            };
            self.ai.api_key = std::env::var(var).unwrap_or_default();
        }
        if self.ai.provider == "ollama" && self.ai.model.is_none() {
            self.ai.model = std::env::var("OLLAMA_MODEL").ok();
        }
    }
}

/// Load configuration from a TOML file and resolve environment credentials.
///
/// A missing file yields the defaults; a present but invalid file is an
/// error so misconfiguration does not silently fall back.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    match config.ai.provider.as_str() {
        "openai" | "anthropic" | "gemini" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown AI provider: '{}'. Must be openai, anthropic, gemini, or ollama.",
            other
        ),
    }

    if config.discovery.timeout_secs == 0 {
        anyhow::bail!("discovery.timeout_secs must be > 0");
    }
    if config.scan.clone_timeout_secs == 0 {
        anyhow::bail!("scan.clone_timeout_secs must be > 0");
    }

    config.resolve_env();
    Ok(config)
}
