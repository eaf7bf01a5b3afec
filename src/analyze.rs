//! AI analysis backends.
//!
//! Defines the [`Analyzer`] trait and concrete implementations for the
//! openai, anthropic, gemini, and ollama backends, selected by the
//! `ai.provider` config value via [`create_analyzer`].
//!
//! Response parsing is defensive: fenced or loosely-wrapped JSON is
//! recovered, missing or wrong-typed fields default, and a completely
//! unparseable response yields `AnalysisResult::default()` rather than an
//! error. A single malformed response never takes down a batch.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AiConfig;
use crate::models::{AnalysisResult, CapabilityEntry, RepoData};
use crate::progress::{PipelineEvent, PipelineProgress};

/// Hard ceiling on simultaneous in-flight analysis requests.
pub const MAX_CONCURRENT_ANALYSES: usize = 5;

/// README budget for hosted backends.
const README_BUDGET: usize = 8000;
/// README budget for local ollama models, which have tighter contexts.
const README_BUDGET_OLLAMA: usize = 4000;

/// One-line descriptions are hard-capped at this many characters.
const ONE_LINER_MAX: usize = 80;

const SYSTEM_PROMPT: &str = r#"You are an expert evaluator of AI agent capabilities. Analyze the given capability (skill/plugin/server) and score it on four dimensions (0-10):

1. **reliability_score**: code quality, error handling, stability
   - 9-10: production grade, thorough error handling and tests
   - 5-6: usable but rough
   - 0-2: experimental, likely to break

2. **safety_score**: permission scope, data leak risk, malicious behavior
   - 9-10: least privilege, no leak risk
   - 5-6: reasonable permissions but poorly documented
   - 0-2: over-broad permissions or security concerns

3. **capability_score**: feature completeness, edge case handling
   - 9-10: complete, covers edge cases
   - 5-6: core features work, edges missing
   - 0-2: bare proof of concept

4. **usability_score**: documentation quality, interface design, onboarding
   - 9-10: great docs, rich examples, 5 minutes to first use
   - 5-6: basic docs, need to read the code
   - 0-2: nearly undocumented

Also provide:
- summary: 2-3 sentence summary
- one_liner: one-line description (80 characters max)
- install_guide: installation steps (Markdown)
- usage_guide: usage example (Markdown)
- safety_notes: security analysis notes
- category_suggestion: one of development / data / web / productivity / ai / media / trading / communication

Respond in JSON."#;

/// A language-model backend producing structured assessments.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Provider identifier (e.g. `"openai"`).
    fn provider(&self) -> &str;

    /// Produce a structured assessment for one capability.
    async fn analyze(&self, name: &str, readme: &str, description: &str)
        -> Result<AnalysisResult>;
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn user_prompt(name: &str, readme: &str, description: &str, budget: usize) -> String {
    format!(
        "Capability: {name}\nDescription: {description}\n\nREADME:\n{}",
        truncate_chars(readme, budget)
    )
}

/// Locate the outermost balanced `{...}` span in free text.
fn balanced_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn field_f64(data: &Value, key: &str) -> f64 {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn field_str(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Defensively parse a backend response into an [`AnalysisResult`].
///
/// Tries, in order: fenced ```json blocks, a direct parse, the outermost
/// balanced `{...}` span. Every failure mode degrades to defaults.
pub fn parse_response(raw: &str) -> AnalysisResult {
    let candidate = if let Some(fenced) = raw.split("```json").nth(1) {
        fenced.split("```").next().unwrap_or("")
    } else if let Some(fenced) = raw.split("```").nth(1) {
        fenced
    } else {
        raw
    };

    let data: Value = match serde_json::from_str(candidate.trim()) {
        Ok(v) => v,
        Err(_) => match balanced_json_span(raw).and_then(|s| serde_json::from_str(s).ok()) {
            Some(v) => v,
            None => return AnalysisResult::default(),
        },
    };

    if !data.is_object() {
        return AnalysisResult::default();
    }

    AnalysisResult {
        reliability_score: field_f64(&data, "reliability_score"),
        safety_score: field_f64(&data, "safety_score"),
        capability_score: field_f64(&data, "capability_score"),
        usability_score: field_f64(&data, "usability_score"),
        summary: field_str(&data, "summary"),
        one_liner: truncate_chars(&field_str(&data, "one_liner"), ONE_LINER_MAX),
        install_guide: field_str(&data, "install_guide"),
        usage_guide: field_str(&data, "usage_guide"),
        safety_notes: field_str(&data, "safety_notes"),
        category_suggestion: field_str(&data, "category_suggestion"),
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ OpenAI ============

/// Analyzer backed by the OpenAI chat completions API.
pub struct OpenAiAnalyzer {
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiAnalyzer {
    pub fn new(config: &AiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("OPENAI_API_KEY not set");
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    fn provider(&self) -> &str {
        "openai"
    }

    async fn analyze(
        &self,
        name: &str,
        readme: &str,
        description: &str,
    ) -> Result<AnalysisResult> {
        let client = build_client(self.timeout_secs)?;
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1500,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(name, readme, description, README_BUDGET)},
            ],
        });

        let resp: Value = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(parse_response(content))
    }
}

// ============ Anthropic ============

/// Analyzer backed by the Anthropic messages API.
pub struct AnthropicAnalyzer {
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl AnthropicAnalyzer {
    pub fn new(config: &AiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("ANTHROPIC_API_KEY not set");
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "claude-sonnet-4-5".to_string()),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Analyzer for AnthropicAnalyzer {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn analyze(
        &self,
        name: &str,
        readme: &str,
        description: &str,
    ) -> Result<AnalysisResult> {
        let client = build_client(self.timeout_secs)?;
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1500,
            "system": SYSTEM_PROMPT,
            "messages": [
                {"role": "user", "content": user_prompt(name, readme, description, README_BUDGET)},
            ],
        });

        let resp: Value = client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(parse_response(content))
    }
}

// ============ Gemini ============

/// Analyzer backed by the Gemini generateContent API.
pub struct GeminiAnalyzer {
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl GeminiAnalyzer {
    pub fn new(config: &AiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("GEMINI_API_KEY not set");
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn analyze(
        &self,
        name: &str,
        readme: &str,
        description: &str,
    ) -> Result<AnalysisResult> {
        let client = build_client(self.timeout_secs)?;
        let prompt = format!(
            "{SYSTEM_PROMPT}\n\n{}",
            user_prompt(name, readme, description, README_BUDGET)
        );
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let resp: Value = client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(parse_response(content))
    }
}

// ============ Ollama ============

/// Analyzer backed by a local Ollama instance's `/api/chat` endpoint.
pub struct OllamaAnalyzer {
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl OllamaAnalyzer {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            model: config.model.clone().unwrap_or_else(|| "llama3".to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn analyze(
        &self,
        name: &str,
        readme: &str,
        description: &str,
    ) -> Result<AnalysisResult> {
        let client = build_client(self.timeout_secs)?;
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(name, readme, description, README_BUDGET_OLLAMA)},
            ],
        });

        let resp: Value = client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let content = resp
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(parse_response(content))
    }
}

/// Create the analyzer selected by `ai.provider`.
///
/// # Errors
///
/// Returns an error for an unknown provider or a missing credential.
pub fn create_analyzer(config: &AiConfig) -> Result<Box<dyn Analyzer>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiAnalyzer::new(config)?)),
        "anthropic" => Ok(Box::new(AnthropicAnalyzer::new(config)?)),
        "gemini" => Ok(Box::new(GeminiAnalyzer::new(config)?)),
        "ollama" => Ok(Box::new(OllamaAnalyzer::new(config))),
        other => bail!("Unsupported AI provider: {}", other),
    }
}

/// Analyze a batch of entries, output aligned positionally with the input.
///
/// At most [`MAX_CONCURRENT_ANALYSES`] requests are in flight; a failed
/// call yields the default result for that entry only.
pub async fn analyze_entries(
    analyzer: &dyn Analyzer,
    entries: &[CapabilityEntry],
    repos: &[RepoData],
    progress: &dyn PipelineProgress,
) -> Vec<AnalysisResult> {
    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_ANALYSES));
    let total = entries.len() as u64;
    let done = AtomicU64::new(0);

    futures::future::join_all(entries.iter().zip(repos.iter()).map(|(entry, repo)| {
        let sem = Arc::clone(&sem);
        let done = &done;
        async move {
            let _permit = sem.acquire_owned().await.ok();
            let result = match analyzer
                .analyze(&entry.name, &repo.readme_text, &entry.description)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("  analysis failed for {}: {e}", entry.name);
                    AnalysisResult::default()
                }
            };
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(PipelineEvent::ItemDone {
                stage: "analyze",
                n,
                total,
            });
            result
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = r#"{"reliability_score": 7.5, "safety_score": 8.0, "capability_score": 6.5, "usability_score": 7.0, "summary": "A good tool", "one_liner": "Test tool", "install_guide": "npm i test", "usage_guide": "Use it", "safety_notes": "No known issues", "category_suggestion": "development"}"#;

    #[test]
    fn parses_valid_json() {
        let result = parse_response(FULL_RESPONSE);
        assert_eq!(result.reliability_score, 7.5);
        assert_eq!(result.safety_score, 8.0);
        assert_eq!(result.summary, "A good tool");
        assert_eq!(result.category_suggestion, "development");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = format!("```json\n{FULL_RESPONSE}\n```");
        let result = parse_response(&raw);
        assert_eq!(result.reliability_score, 7.5);
    }

    #[test]
    fn parses_bare_fenced_json() {
        let raw = format!("```\n{FULL_RESPONSE}\n```");
        let result = parse_response(&raw);
        assert_eq!(result.capability_score, 6.5);
    }

    #[test]
    fn recovers_embedded_json_span() {
        let raw = format!("Sure! Here is my assessment:\n{FULL_RESPONSE}\nHope that helps.");
        let result = parse_response(&raw);
        assert_eq!(result.usability_score, 7.0);
    }

    #[test]
    fn malformed_input_yields_defaults() {
        let result = parse_response("not json");
        assert_eq!(result.reliability_score, 0.0);
        assert!(result.summary.is_empty());
    }

    #[test]
    fn non_object_json_yields_defaults() {
        let result = parse_response("[1, 2, 3]");
        assert_eq!(result.safety_score, 0.0);
    }

    #[test]
    fn wrong_typed_fields_default() {
        let raw = r#"{"reliability_score": {"oops": true}, "safety_score": "8.5", "summary": 42}"#;
        let result = parse_response(raw);
        assert_eq!(result.reliability_score, 0.0);
        assert_eq!(result.safety_score, 8.5);
        assert!(result.summary.is_empty());
    }

    #[test]
    fn one_liner_truncated_to_80_chars() {
        let long = "x".repeat(200);
        let raw = format!(r#"{{"one_liner": "{long}"}}"#);
        let result = parse_response(&raw);
        assert_eq!(result.one_liner.chars().count(), 80);
    }

    #[test]
    fn balanced_span_ignores_braces_in_strings() {
        let raw = r#"prefix {"summary": "uses { and } inside", "safety_score": 5} suffix"#;
        let result = parse_response(raw);
        assert_eq!(result.safety_score, 5.0);
        assert_eq!(result.summary, "uses { and } inside");
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let config = AiConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(create_analyzer(&config).is_err());
    }

    #[test]
    fn factory_requires_api_key() {
        let config = AiConfig {
            provider: "openai".to_string(),
            api_key: String::new(),
            ..Default::default()
        };
        assert!(create_analyzer(&config).is_err());
    }

    #[test]
    fn factory_builds_ollama_without_key() {
        let config = AiConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        let analyzer = create_analyzer(&config).unwrap();
        assert_eq!(analyzer.provider(), "ollama");
    }

    struct CannedAnalyzer;

    #[async_trait]
    impl Analyzer for CannedAnalyzer {
        fn provider(&self) -> &str {
            "canned"
        }
        async fn analyze(
            &self,
            name: &str,
            _readme: &str,
            _description: &str,
        ) -> Result<AnalysisResult> {
            if name == "bad" {
                bail!("backend exploded");
            }
            Ok(AnalysisResult {
                reliability_score: 9.0,
                ..Default::default()
            })
        }
    }

    struct SlowAnalyzer {
        in_flight: Arc<std::sync::atomic::AtomicUsize>,
        peak: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Analyzer for SlowAnalyzer {
        fn provider(&self) -> &str {
            "slow"
        }
        async fn analyze(
            &self,
            _name: &str,
            _readme: &str,
            _description: &str,
        ) -> Result<AnalysisResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(AnalysisResult::default())
        }
    }

    #[tokio::test]
    async fn batch_concurrency_stays_within_ceiling() {
        let entries: Vec<CapabilityEntry> = (0..20)
            .map(|i| CapabilityEntry {
                name: format!("cap-{i}"),
                source: "mcp".to_string(),
                source_id: format!("x/{i}"),
                provider: "x".to_string(),
                description: String::new(),
                category: "other".to_string(),
                repo_url: None,
                endpoint: None,
                protocol: "mcp".to_string(),
            })
            .collect();
        let repos = vec![RepoData::default(); 20];
        let analyzer = SlowAnalyzer {
            in_flight: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            peak: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        };
        let peak = Arc::clone(&analyzer.peak);

        let results =
            analyze_entries(&analyzer, &entries, &repos, &crate::progress::NoProgress).await;
        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= MAX_CONCURRENT_ANALYSES);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn batch_isolates_per_entry_failures() {
        let entries: Vec<CapabilityEntry> = ["good", "bad", "good"]
            .iter()
            .map(|n| CapabilityEntry {
                name: (*n).to_string(),
                source: "mcp".to_string(),
                source_id: format!("x/{n}"),
                provider: "x".to_string(),
                description: String::new(),
                category: "other".to_string(),
                repo_url: None,
                endpoint: None,
                protocol: "mcp".to_string(),
            })
            .collect();
        let repos = vec![RepoData::default(); 3];
        let results =
            analyze_entries(&CannedAnalyzer, &entries, &repos, &crate::progress::NoProgress).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].reliability_score, 9.0);
        assert_eq!(results[1].reliability_score, 0.0);
        assert_eq!(results[2].reliability_score, 9.0);
    }
}
