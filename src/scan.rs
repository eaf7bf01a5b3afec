//! Security scanning over shallow clones.
//!
//! Each repository is cloned at depth 1 into a per-entry scratch directory
//! and scanned by three independent scanners whose results merge:
//!
//! - [`SecretScanner`] — built-in, no external dependency: credential
//!   pattern detection plus permission-category detection over source files.
//! - [`SemgrepScanner`] — static analysis, soft dependency on the `semgrep`
//!   binary; returns a skipped result when absent.
//! - [`TrivyScanner`] — dependency vulnerabilities, soft dependency on the
//!   `trivy` binary; returns a skipped result when absent.
//!
//! Any clone- or scanner-level failure degrades to an empty result for
//! that repository only. Scratch directories are removed on every exit
//! path, including timeouts and panics, via `TempDir`'s drop.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{CapabilityEntry, ScanResult};
use crate::progress::{PipelineEvent, PipelineProgress};

/// Hard ceiling on simultaneous clones.
pub const MAX_CONCURRENT_CLONES: usize = 3;

/// Patterns that detect leaked credentials in file content.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"sk-[a-zA-Z0-9]{20,}").unwrap(), "OpenAI API Key"),
        (
            Regex::new(r"ghp_[a-zA-Z0-9]{36}").unwrap(),
            "GitHub Personal Access Token",
        ),
        (Regex::new(r"AKIA[A-Z0-9]{16}").unwrap(), "AWS Access Key ID"),
        (
            Regex::new(r"AIza[a-zA-Z0-9_-]{35}").unwrap(),
            "Google API Key",
        ),
        (
            Regex::new(r"xox[bpas]-[a-zA-Z0-9-]{10,}").unwrap(),
            "Slack Token",
        ),
    ]
});

/// Placeholder/example values; a match here means the hit is not a real
/// leak.
static DUMMY_VALUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(test|fake|dummy|example|placeholder|xxx|your[_-]|changeme|replace|TODO|sk-xxx|sk-your|sk-test|INSERT|REPLACE_ME|<[^>]+>|\$\{|process\.env|os\.getenv|\.{3,}|0{8,}|1{8,}|a{8,}|x{8,})",
    )
    .unwrap()
});

/// Filenames that mark test/mock content, excluded from secret scanning.
static TEST_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(test_|_test\.|\.test\.|\.spec\.|mock|fixture)").unwrap());

/// Permission categories and the per-category patterns over source code.
static PERMISSION_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    let compile = |patterns: &[&str]| {
        patterns
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect::<Vec<_>>()
    };
    vec![
        (
            "filesystem",
            compile(&[
                r"\bopen\s*\(",
                r"\bos\.path\b",
                r"\bos\.listdir\b",
                r"\bos\.remove\b",
                r"\bos\.mkdir\b",
                r"\bshutil\b",
                r"\bfs\.\w+Sync\b",
                r"\bfs\.promises\b",
                r"\breadFileSync\b",
                r"\bwriteFileSync\b",
            ]),
        ),
        (
            "network",
            compile(&[
                r"\brequests\.\w+\b",
                r"\bhttpx\.\w+\b",
                r"\burllib\b",
                r"\baiohttp\b",
                r"\bfetch\s*\(",
                r"\baxios\b",
                r"\bsocket\b",
                r"\bhttp\.get\b",
                r"\bhttp\.request\b",
            ]),
        ),
        (
            "env_vars",
            compile(&[
                r"\bos\.environ\b",
                r"\bos\.getenv\b",
                r"\bprocess\.env\b",
                r"\bdotenv\b",
            ]),
        ),
        (
            "subprocess",
            compile(&[
                r"\bsubprocess\b",
                r"\bos\.system\b",
                r"\bos\.popen\b",
                r"\bexec\s*\(",
                r"\beval\s*\(",
                r"\bchild_process\b",
                r"\bspawn\s*\(",
                r"\bexecSync\b",
            ]),
        ),
    ]
});

const SKIP_DIRS: [&str; 19] = [
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    ".venv",
    "dist",
    "build",
    "tests",
    "test",
    "__tests__",
    "spec",
    "__test__",
    "fixtures",
    "mocks",
    "testdata",
    "test_data",
    "examples",
    "example",
    "docs",
];

const SKIP_FILES: [&str; 6] = [
    "example.env",
    ".env.example",
    ".env.sample",
    ".env.template",
    "config.example.js",
    "config.sample.js",
];

const SKIP_EXTENSIONS: [&str; 27] = [
    "png", "jpg", "jpeg", "gif", "ico", "woff", "woff2", "ttf", "eot", "svg", "mp3", "mp4", "zip",
    "tar", "gz", "bin", "exe", "dll", "so", "dylib", "pyc", "pyo", "bmp", "tif", "tiff", "webp",
    "lock",
];

const CODE_EXTENSIONS: [&str; 7] = ["py", "js", "ts", "jsx", "tsx", "go", "rs"];

const MAX_FILE_SIZE: u64 = 1_000_000;

/// A single security scanner over a local repository checkout.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Tool name recorded in the merged result's `tool` field.
    fn name(&self) -> &str;

    /// Scan the repository at `repo_path`.
    async fn scan(&self, repo_path: &Path) -> Result<ScanResult>;
}

fn file_ext(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Built-in credential and permission pattern scanner.
pub struct SecretScanner;

impl SecretScanner {
    fn scan_secrets(&self, repo_path: &Path) -> Vec<String> {
        let mut findings = Vec::new();

        let walker = WalkDir::new(repo_path).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIP_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
        });

        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let fname = entry.file_name().to_string_lossy().to_lowercase();

            if SKIP_EXTENSIONS.contains(&file_ext(path).as_str()) {
                continue;
            }
            if SKIP_FILES.contains(&fname.as_str()) {
                continue;
            }
            if TEST_FILE_RE.is_match(&fname) {
                continue;
            }
            if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_SIZE {
                continue;
            }

            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };

            let rel_path = path
                .strip_prefix(repo_path)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            for (pattern, label) in SECRET_PATTERNS.iter() {
                // One finding per file per pattern.
                if pattern
                    .find_iter(&content)
                    .any(|m| !DUMMY_VALUES.is_match(m.as_str()))
                {
                    findings.push(format!("[{label}] {rel_path}"));
                }
            }
        }

        findings
    }

    fn detect_permissions(&self, repo_path: &Path) -> Vec<String> {
        let mut detected: Vec<&'static str> = Vec::new();

        let walker = WalkDir::new(repo_path).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIP_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
        });

        for entry in walker.flatten() {
            if detected.len() == PERMISSION_PATTERNS.len() {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !CODE_EXTENSIONS.contains(&file_ext(path).as_str()) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };

            for (category, patterns) in PERMISSION_PATTERNS.iter() {
                if detected.contains(category) {
                    continue;
                }
                // First match per category per file is enough.
                if patterns.iter().any(|p| p.is_match(&content)) {
                    detected.push(*category);
                }
            }
        }

        detected.sort_unstable();
        detected.iter().map(|s| (*s).to_string()).collect()
    }
}

#[async_trait]
impl Scanner for SecretScanner {
    fn name(&self) -> &str {
        "secret_scanner"
    }

    async fn scan(&self, repo_path: &Path) -> Result<ScanResult> {
        let findings = self.scan_secrets(repo_path);
        let permissions = self.detect_permissions(repo_path);

        let has_keys = !findings.is_empty();
        let details = if findings.is_empty() {
            "no credential leaks detected".to_string()
        } else {
            findings
                .iter()
                .take(20)
                .cloned()
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(ScanResult {
            tool: self.name().to_string(),
            vulnerabilities: findings.len() as u32,
            // Credential leaks count as high severity.
            severity_high: findings.len() as u32,
            severity_medium: 0,
            severity_low: 0,
            permissions,
            has_api_keys: has_keys,
            details,
        })
    }
}

/// Is `name` an executable on the PATH?
fn tool_on_path(name: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

async fn run_tool(program: &str, args: &[&str], timeout_secs: u64) -> Result<Vec<u8>> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .with_context(|| format!("{program} timed out after {timeout_secs}s"))?
        .with_context(|| format!("Failed to execute '{program}'"))?;

    Ok(output.stdout)
}

/// Static-analysis scanner, soft dependency on the `semgrep` binary.
pub struct SemgrepScanner {
    timeout_secs: u64,
}

impl SemgrepScanner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl Scanner for SemgrepScanner {
    fn name(&self) -> &str {
        "semgrep"
    }

    async fn scan(&self, repo_path: &Path) -> Result<ScanResult> {
        if !tool_on_path("semgrep") {
            return Ok(ScanResult {
                tool: self.name().to_string(),
                details: "semgrep not installed, skipped".to_string(),
                ..Default::default()
            });
        }

        let path = repo_path.to_string_lossy();
        let stdout = match run_tool(
            "semgrep",
            &["scan", "--config", "auto", "--json", &path],
            self.timeout_secs,
        )
        .await
        {
            Ok(out) => out,
            Err(e) => {
                return Ok(ScanResult {
                    tool: self.name().to_string(),
                    details: format!("semgrep failed: {e}"),
                    ..Default::default()
                })
            }
        };

        let output: Value = match serde_json::from_slice(&stdout) {
            Ok(v) => v,
            Err(e) => {
                return Ok(ScanResult {
                    tool: self.name().to_string(),
                    details: format!("semgrep output unparseable: {e}"),
                    ..Default::default()
                })
            }
        };

        let (mut high, mut medium, mut low) = (0u32, 0u32, 0u32);
        for finding in output
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let severity = finding
                .get("extra")
                .and_then(|e| e.get("severity"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_uppercase();
            match severity.as_str() {
                "ERROR" | "HIGH" | "CRITICAL" => high += 1,
                "WARNING" | "MEDIUM" => medium += 1,
                "INFO" | "LOW" => low += 1,
                _ => {}
            }
        }

        let total = high + medium + low;
        Ok(ScanResult {
            tool: self.name().to_string(),
            vulnerabilities: total,
            severity_high: high,
            severity_medium: medium,
            severity_low: low,
            permissions: Vec::new(),
            has_api_keys: false,
            details: format!("semgrep found {total} findings (high={high}, medium={medium}, low={low})"),
        })
    }
}

/// Dependency-vulnerability scanner, soft dependency on the `trivy` binary.
pub struct TrivyScanner {
    timeout_secs: u64,
}

impl TrivyScanner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl Scanner for TrivyScanner {
    fn name(&self) -> &str {
        "trivy"
    }

    async fn scan(&self, repo_path: &Path) -> Result<ScanResult> {
        if !tool_on_path("trivy") {
            return Ok(ScanResult {
                tool: self.name().to_string(),
                details: "trivy not installed, skipped".to_string(),
                ..Default::default()
            });
        }

        let path = repo_path.to_string_lossy();
        let stdout = match run_tool("trivy", &["fs", "--format", "json", &path], self.timeout_secs)
            .await
        {
            Ok(out) => out,
            Err(e) => {
                return Ok(ScanResult {
                    tool: self.name().to_string(),
                    details: format!("trivy failed: {e}"),
                    ..Default::default()
                })
            }
        };

        let output: Value = match serde_json::from_slice(&stdout) {
            Ok(v) => v,
            Err(e) => {
                return Ok(ScanResult {
                    tool: self.name().to_string(),
                    details: format!("trivy output unparseable: {e}"),
                    ..Default::default()
                })
            }
        };

        let (mut high, mut medium, mut low) = (0u32, 0u32, 0u32);
        for target in output
            .get("Results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            for vuln in target
                .get("Vulnerabilities")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let severity = vuln
                    .get("Severity")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_uppercase();
                match severity.as_str() {
                    "CRITICAL" | "HIGH" => high += 1,
                    "MEDIUM" => medium += 1,
                    "LOW" | "UNKNOWN" => low += 1,
                    _ => {}
                }
            }
        }

        let total = high + medium + low;
        Ok(ScanResult {
            tool: self.name().to_string(),
            vulnerabilities: total,
            severity_high: high,
            severity_medium: medium,
            severity_low: low,
            permissions: Vec::new(),
            has_api_keys: false,
            details: format!("trivy found {total} CVEs (high={high}, medium={medium}, low={low})"),
        })
    }
}

/// Merge per-scanner results: counts sum, permissions union, the leak flag
/// ORs, details concatenate, tool names comma-join.
pub fn merge_results(results: &[ScanResult]) -> ScanResult {
    let mut merged = ScanResult::default();
    let mut tools = Vec::new();
    let mut details_parts = Vec::new();
    let mut all_permissions: Vec<String> = Vec::new();

    for r in results {
        if !r.tool.is_empty() {
            tools.push(r.tool.clone());
        }
        merged.vulnerabilities += r.vulnerabilities;
        merged.severity_high += r.severity_high;
        merged.severity_medium += r.severity_medium;
        merged.severity_low += r.severity_low;
        for p in &r.permissions {
            if !all_permissions.contains(p) {
                all_permissions.push(p.clone());
            }
        }
        if r.has_api_keys {
            merged.has_api_keys = true;
        }
        if !r.details.is_empty() {
            details_parts.push(r.details.clone());
        }
    }

    all_permissions.sort_unstable();
    merged.tool = tools.join(",");
    merged.permissions = all_permissions;
    merged.details = details_parts.join("\n---\n");
    merged
}

/// Run all scanners concurrently over one repository and merge the results.
pub async fn run_all_scanners(repo_path: &Path, config: &Config) -> ScanResult {
    let timeout = config.scan.scanner_timeout_secs;
    let scanners: Vec<Box<dyn Scanner>> = vec![
        Box::new(SecretScanner),
        Box::new(SemgrepScanner::new(timeout)),
        Box::new(TrivyScanner::new(timeout)),
    ];

    let results =
        futures::future::join_all(scanners.iter().map(|s| async move {
            match s.scan(repo_path).await {
                Ok(r) => r,
                Err(e) => ScanResult {
                    tool: "error".to_string(),
                    details: format!("scanner failed: {e}"),
                    ..Default::default()
                },
            }
        }))
        .await;

    if results.is_empty() {
        return ScanResult {
            details: "all scanners failed".to_string(),
            ..Default::default()
        };
    }

    merge_results(&results)
}

/// Turn a slug into a safe scratch-directory name.
fn sanitize_slug(slug: &str) -> String {
    slug.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

async fn shallow_clone(repo_url: &str, dest: &Path, timeout_secs: u64) -> Result<()> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(["clone", "--depth", "1", repo_url])
        .arg(dest)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .with_context(|| format!("git clone timed out after {timeout_secs}s"))?
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

async fn clone_and_scan(entry: &CapabilityEntry, repo_url: &str, config: &Config) -> Result<ScanResult> {
    let scratch_root: PathBuf = config
        .scan
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&scratch_root)
        .with_context(|| format!("Failed to create scratch root: {}", scratch_root.display()))?;

    // The TempDir guard removes the clone on every exit path.
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{}-", sanitize_slug(&entry.slug())))
        .tempdir_in(&scratch_root)?;

    let clone_dir = scratch.path().join("repo");
    shallow_clone(repo_url, &clone_dir, config.scan.clone_timeout_secs).await?;

    Ok(run_all_scanners(&clone_dir, config).await)
}

/// Scan a batch of entries, output aligned positionally with the input.
///
/// At most [`MAX_CONCURRENT_CLONES`] clones run simultaneously. Entries
/// without a repository, and any clone/scan failure, yield the default
/// (empty-tool) result so safety scoring falls back to its no-scan-data
/// formula.
pub async fn scan_entries(
    entries: &[CapabilityEntry],
    config: &Config,
    progress: &dyn PipelineProgress,
) -> Vec<ScanResult> {
    if !config.scan.enabled {
        return vec![ScanResult::default(); entries.len()];
    }

    let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_CLONES));
    let total = entries.len() as u64;
    let done = AtomicU64::new(0);

    futures::future::join_all(entries.iter().map(|entry| {
        let sem = Arc::clone(&sem);
        let done = &done;
        async move {
            let _permit = sem.acquire_owned().await.ok();
            let result = match entry.repo_url.as_deref() {
                Some(url) => match clone_and_scan(entry, url, config).await {
                    Ok(r) => r,
                    Err(e) => {
                        eprintln!("  scan failed for {}: {e}", entry.slug());
                        ScanResult::default()
                    }
                },
                None => ScanResult::default(),
            };
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(PipelineEvent::ItemDone {
                stage: "scan",
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

    #[test]
    fn merge_sums_counts_and_ors_flags() {
        let a = ScanResult {
            tool: "semgrep".to_string(),
            vulnerabilities: 1,
            severity_high: 1,
            has_api_keys: true,
            permissions: vec!["network".to_string()],
            details: "a".to_string(),
            ..Default::default()
        };
        let b = ScanResult {
            tool: "trivy".to_string(),
            vulnerabilities: 2,
            severity_medium: 2,
            has_api_keys: false,
            permissions: vec!["filesystem".to_string(), "network".to_string()],
            details: "b".to_string(),
            ..Default::default()
        };
        let merged = merge_results(&[a, b]);
        assert_eq!(merged.tool, "semgrep,trivy");
        assert_eq!(merged.severity_high, 1);
        assert_eq!(merged.severity_medium, 2);
        assert_eq!(merged.vulnerabilities, 3);
        assert!(merged.has_api_keys);
        assert_eq!(merged.permissions, vec!["filesystem", "network"]);
        assert_eq!(merged.details, "a\n---\nb");
    }

    #[test]
    fn merge_of_empty_is_default() {
        let merged = merge_results(&[]);
        assert!(merged.tool.is_empty());
        assert_eq!(merged.vulnerabilities, 0);
    }

    #[test]
    fn dummy_values_filter_placeholders() {
        assert!(DUMMY_VALUES.is_match("sk-your-key-here-aaaaaaaaaa"));
        assert!(DUMMY_VALUES.is_match("sk-test00000000000000000000"));
        assert!(DUMMY_VALUES.is_match("${OPENAI_API_KEY}"));
        assert!(DUMMY_VALUES.is_match("sk-xxxxxxxxxxxxxxxxxxxxxxxx"));
        assert!(!DUMMY_VALUES.is_match("sk-Zq81GbNw4LkP92RhV3cJdM5y"));
    }

    #[tokio::test]
    async fn secret_scanner_finds_leaks_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.py"),
            "API_KEY = \"sk-Zq81GbNw4LkP92RhV3cJdM5y\"\n",
        )
        .unwrap();
        let result = SecretScanner.scan(dir.path()).await.unwrap();
        assert!(result.has_api_keys);
        assert_eq!(result.severity_high, 1);
        assert!(result.details.contains("OpenAI API Key"));
    }

    #[tokio::test]
    async fn secret_scanner_skips_placeholders_and_test_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env.example"), "OPENAI=sk-your-key\n").unwrap();
        let tests_dir = dir.path().join("tests");
        std::fs::create_dir(&tests_dir).unwrap();
        std::fs::write(
            tests_dir.join("creds.py"),
            "KEY = \"sk-Zq81GbNw4LkP92RhV3cJdM5y\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("readme.md"), "use ${OPENAI_API_KEY}\n").unwrap();

        let result = SecretScanner.scan(dir.path()).await.unwrap();
        assert!(!result.has_api_keys);
        assert_eq!(result.vulnerabilities, 0);
    }

    #[tokio::test]
    async fn permission_detection_covers_categories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.py"),
            "import subprocess\nimport os\nos.environ['X']\nrequests.get(url)\nopen('f')\n",
        )
        .unwrap();
        let result = SecretScanner.scan(dir.path()).await.unwrap();
        assert_eq!(
            result.permissions,
            vec!["env_vars", "filesystem", "network", "subprocess"]
        );
    }

    #[tokio::test]
    async fn absent_external_tool_reports_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = SemgrepScanner::new(5);
        if tool_on_path("semgrep") {
            // Installed on this machine; the skip branch is untestable here.
            return;
        }
        let result = scanner.scan(dir.path()).await.unwrap();
        assert_eq!(result.tool, "semgrep");
        assert_eq!(result.vulnerabilities, 0);
        assert!(result.details.contains("skipped"));
    }

    #[test]
    fn sanitized_slug_is_filesystem_safe() {
        assert_eq!(sanitize_slug("mcp-owner/repo"), "mcp-owner-repo");
        assert_eq!(sanitize_slug("mcp-npm-@scope/pkg"), "mcp-npm--scope-pkg");
    }

    #[tokio::test]
    async fn disabled_scanning_yields_defaults() {
        let mut config = Config::minimal();
        config.scan.enabled = false;
        let entries = vec![CapabilityEntry {
            name: "x".to_string(),
            source: "mcp".to_string(),
            source_id: "a/b".to_string(),
            provider: "a".to_string(),
            description: String::new(),
            category: "other".to_string(),
            repo_url: Some("https://github.com/a/b".to_string()),
            endpoint: None,
            protocol: "mcp".to_string(),
        }];
        let results = scan_entries(&entries, &config, &crate::progress::NoProgress).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].tool.is_empty());
    }
}
