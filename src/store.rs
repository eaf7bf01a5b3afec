//! Snapshot and run-log persistence.
//!
//! The persisted store is a ranked JSON snapshot of all capability
//! records, read once at run start and fully rewritten at run end, plus an
//! append-only run log capped to the most recent 100 entries. A missing or
//! corrupt snapshot reads as empty — previously persisted data is never a
//! reason to fail a run.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::models::CapabilityRecord;

/// Maximum run-log entries retained.
const RUN_LOG_CAP: usize = 100;

/// One appended run-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub total_discovered: usize,
    pub total_existing: usize,
    pub new_count: usize,
    pub failed: Vec<String>,
    pub forced: bool,
}

impl RunLogEntry {
    /// Build an entry stamped with the current UTC time.
    pub fn now(
        total_discovered: usize,
        total_existing: usize,
        new_count: usize,
        failed: Vec<String>,
        forced: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            total_discovered,
            total_existing,
            new_count,
            failed,
            forced,
        }
    }
}

/// Load the persisted snapshot; missing or corrupt files read as empty.
pub fn load_snapshot(path: &Path) -> Vec<CapabilityRecord> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

/// The slugs present in a snapshot.
pub fn snapshot_slugs(records: &[CapabilityRecord]) -> HashSet<String> {
    records.iter().map(|r| r.slug.clone()).collect()
}

/// Write the full snapshot, creating parent directories as needed.
pub fn save_snapshot(path: &Path, records: &[CapabilityRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    Ok(())
}

/// Merge fresh records over the persisted set: `(existing \ slugs(fresh)) ∪
/// fresh`, fresh wins on slug collision, sorted descending by overall score.
pub fn merge_records(
    existing: Vec<CapabilityRecord>,
    fresh: Vec<CapabilityRecord>,
) -> Vec<CapabilityRecord> {
    let fresh_slugs: HashSet<&str> = fresh.iter().map(|r| r.slug.as_str()).collect();
    let mut merged: Vec<CapabilityRecord> = existing
        .into_iter()
        .filter(|r| !fresh_slugs.contains(r.slug.as_str()))
        .collect();
    merged.extend(fresh);
    sort_by_overall(&mut merged);
    merged
}

/// Sort records descending by overall score (stable, so equal scores keep
/// their relative order across runs).
pub fn sort_by_overall(records: &mut [CapabilityRecord]) {
    records.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Append one run-log entry, keeping only the most recent 100.
pub fn append_run_log(path: &Path, entry: RunLogEntry) -> Result<()> {
    let mut logs: Vec<RunLogEntry> = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    logs.push(entry);
    if logs.len() > RUN_LOG_CAP {
        logs.drain(..logs.len() - RUN_LOG_CAP);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&logs)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run log: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DimensionScores;

    fn record(slug: &str, overall: f64) -> CapabilityRecord {
        CapabilityRecord {
            slug: slug.to_string(),
            name: slug.to_string(),
            source: "mcp".to_string(),
            source_id: slug.to_string(),
            provider: "owner".to_string(),
            description: String::new(),
            category: "development".to_string(),
            repo_url: None,
            endpoint: None,
            protocol: "mcp".to_string(),
            stars: 0,
            forks: 0,
            language: None,
            last_updated: String::new(),
            contributors: 0,
            has_tests: false,
            has_typescript: false,
            readme_length: 0,
            scores: DimensionScores::default(),
            overall_score: overall,
            ai_summary: String::new(),
            one_liner: String::new(),
            install_guide: String::new(),
            usage_guide: String::new(),
            safety_notes: String::new(),
            dependencies: Vec::new(),
            latest_version: String::new(),
            supported_clients: Vec::new(),
        }
    }

    #[test]
    fn merge_replaces_colliding_slugs() {
        let existing = vec![record("a", 5.0), record("b", 4.0), record("c", 3.0)];
        let fresh = vec![record("b", 9.0), record("d", 1.0)];
        let merged = merge_records(existing, fresh);

        let slugs: Vec<&str> = merged.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a", "c", "d"]);
        let b = merged.iter().find(|r| r.slug == "b").unwrap();
        assert_eq!(b.overall_score, 9.0);
    }

    #[test]
    fn merge_with_no_fresh_preserves_existing_order() {
        let existing = vec![record("a", 9.0), record("b", 7.0), record("c", 7.0)];
        let merged = merge_records(existing.clone(), Vec::new());
        let slugs: Vec<&str> = merged.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b", "c"]);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        let records = vec![record("a", 8.0), record("b", 6.5)];

        save_snapshot(&path, &records).unwrap();
        let loaded = load_snapshot(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].slug, "a");
        assert_eq!(loaded[1].overall_score, 6.5);
    }

    #[test]
    fn missing_or_corrupt_snapshot_reads_empty() {
        assert!(load_snapshot(Path::new("/nonexistent/snapshot.json")).is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_snapshot(&path).is_empty());
    }

    #[test]
    fn run_log_caps_at_100() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_log.json");

        for i in 0..105 {
            append_run_log(&path, RunLogEntry::now(i, 0, 0, Vec::new(), false)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let logs: Vec<RunLogEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(logs.len(), 100);
        // Oldest entries were dropped.
        assert_eq!(logs[0].total_discovered, 5);
        assert_eq!(logs[99].total_discovered, 104);
    }
}
