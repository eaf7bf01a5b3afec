//! Core data models used throughout AgentStore.
//!
//! These types represent the capability entries, collected repository
//! signals, scan and analysis results, and final scores that flow through
//! the discovery-and-scoring pipeline.

use serde::{Deserialize, Serialize};

/// Raw capability entry produced by a discoverer.
///
/// Immutable once created; a later run with the same slug supersedes the
/// persisted record rather than mutating it.
#[derive(Debug, Clone)]
pub struct CapabilityEntry {
    pub name: String,
    pub source: String,
    pub source_id: String,
    pub provider: String,
    pub description: String,
    pub category: String,
    pub repo_url: Option<String>,
    pub endpoint: Option<String>,
    pub protocol: String,
}

impl CapabilityEntry {
    /// Deterministic identity key: `lowercase(source + "-" + source_id)`.
    ///
    /// The slug is the sole deduplication key for incremental updates.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.source, self.source_id).to_lowercase()
    }
}

/// Signals collected from a capability's repository.
///
/// All fields default to zero/empty: an entry without a resolvable
/// repository reference yields `RepoData::default()`, never an error.
#[derive(Debug, Clone, Default)]
pub struct RepoData {
    pub stars: u32,
    pub forks: u32,
    pub language: Option<String>,
    pub last_updated: String,
    pub open_issues: u32,
    pub closed_issues: u32,
    pub contributors: u32,
    pub has_typescript: bool,
    pub has_tests: bool,
    pub readme_text: String,
    pub readme_length: usize,
    pub dependencies: Vec<String>,
    pub latest_version: String,
    pub supported_clients: Vec<String>,
}

/// Output of the security-scanning stage.
///
/// `tool` holds the comma-joined names of the scanners that ran; an empty
/// string means no scan data is available for this repository.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub tool: String,
    pub vulnerabilities: u32,
    pub severity_high: u32,
    pub severity_medium: u32,
    pub severity_low: u32,
    pub permissions: Vec<String>,
    pub has_api_keys: bool,
    pub details: String,
}

/// AI-derived qualitative judgment.
///
/// A parse failure or a failed backend call yields the all-default record
/// rather than an error.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub reliability_score: f64,
    pub safety_score: f64,
    pub capability_score: f64,
    pub usability_score: f64,
    pub summary: String,
    pub one_liner: String,
    pub install_guide: String,
    pub usage_guide: String,
    pub safety_notes: String,
    pub category_suggestion: String,
}

/// Final computed five-dimension scores plus the weighted overall.
///
/// Derived only; recomputed fully on every scoring pass.
#[derive(Debug, Clone, Default)]
pub struct Scores {
    pub reliability: f64,
    pub safety: f64,
    pub capability: f64,
    pub reputation: f64,
    pub usability: f64,
    pub overall: f64,
}

/// The scoring engine's input unit: one entry joined with its collected
/// repository data, AI analysis, and scan result.
#[derive(Debug, Clone)]
pub struct CapabilityData {
    pub entry: CapabilityEntry,
    pub repo: RepoData,
    pub analysis: AnalysisResult,
    pub scan: ScanResult,
}

/// The flat persisted capability record.
///
/// Read at run start and written at run end; the external storage/API layer
/// ingests this shape without transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub slug: String,
    pub name: String,
    pub source: String,
    pub source_id: String,
    pub provider: String,
    pub description: String,
    pub category: String,
    pub repo_url: Option<String>,
    pub endpoint: Option<String>,
    pub protocol: String,
    pub stars: u32,
    pub forks: u32,
    pub language: Option<String>,
    pub last_updated: String,
    pub contributors: u32,
    pub has_tests: bool,
    pub has_typescript: bool,
    pub readme_length: usize,
    pub scores: DimensionScores,
    pub overall_score: f64,
    pub ai_summary: String,
    pub one_liner: String,
    pub install_guide: String,
    pub usage_guide: String,
    pub safety_notes: String,
    pub dependencies: Vec<String>,
    pub latest_version: String,
    pub supported_clients: Vec<String>,
}

/// The nested five-key scores mapping inside [`CapabilityRecord`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub reliability: f64,
    pub safety: f64,
    pub capability: f64,
    pub reputation: f64,
    pub usability: f64,
}
