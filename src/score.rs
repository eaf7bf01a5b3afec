//! Five-dimension scoring engine.
//!
//! Dimensions and weights:
//! - reliability: 25%
//! - safety: 25%
//! - capability: 20%
//! - reputation: 15%
//! - usability: 15%
//!
//! Pure functions, no I/O: given the same entry/repo/analysis/scan inputs
//! the output is deterministic. Each dimension is clamped to [0, 10] and
//! rounded to one decimal; the overall is computed from the already-rounded
//! dimension values and rounded once more.

use chrono::{DateTime, Utc};

use crate::models::{CapabilityData, Scores};

fn clamp(value: f64) -> f64 {
    value.clamp(0.0, 10.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Days since an ISO-8601 timestamp; unparseable or empty input counts as
/// 999 days (stale).
fn days_since(iso_date: &str) -> i64 {
    match DateTime::parse_from_rfc3339(iso_date) {
        Ok(dt) => (Utc::now() - dt.with_timezone(&Utc)).num_days(),
        Err(_) => 999,
    }
}

/// Reliability = AI judgment (70%) + maintenance recency (30%).
pub fn score_reliability(data: &CapabilityData) -> f64 {
    let ai_part = data.analysis.reliability_score * 0.7;
    let days = days_since(&data.repo.last_updated);
    let maint = if days <= 7 {
        10.0
    } else if days <= 30 {
        8.5
    } else if days <= 90 {
        7.0
    } else if days <= 180 {
        5.0
    } else if days <= 365 {
        3.0
    } else {
        1.0
    };
    clamp(ai_part + maint * 0.3)
}

/// Safety score.
///
/// With scan data: scan-derived score (60%) + AI judgment (40%), where the
/// scan score starts at 10 and loses 2 per high finding, 1 per medium,
/// 0.3 per low, and a flat 3 for detected credential leakage.
/// Without scan data: AI judgment (85%) plus a small code-signal bonus.
pub fn score_safety(data: &CapabilityData) -> f64 {
    let scan = &data.scan;
    let has_scan = !scan.tool.is_empty();

    if has_scan {
        let mut scan_score = 10.0;
        scan_score -= f64::from(scan.severity_high) * 2.0;
        scan_score -= f64::from(scan.severity_medium) * 1.0;
        scan_score -= f64::from(scan.severity_low) * 0.3;
        if scan.has_api_keys {
            scan_score -= 3.0;
        }
        let scan_score = clamp(scan_score);

        clamp(scan_score * 0.6 + data.analysis.safety_score * 0.4)
    } else {
        let ai_part = data.analysis.safety_score * 0.85;
        let mut code_bonus = 0.0;
        if data.repo.has_tests {
            code_bonus += 1.0;
        }
        if data.repo.has_typescript {
            code_bonus += 0.5;
        }
        clamp(ai_part + code_bonus)
    }
}

/// Capability = AI judgment (80%) + code maturity (20%).
pub fn score_capability(data: &CapabilityData) -> f64 {
    let ai_part = data.analysis.capability_score * 0.8;
    let mut maturity = 0.0;
    if data.repo.has_tests {
        maturity += 1.0;
    }
    if data.repo.contributors >= 3 {
        maturity += 0.5;
    }
    if data.repo.readme_length >= 1000 {
        maturity += 0.5;
    }
    clamp(ai_part + maturity)
}

/// Reputation = stars (40%) + issue closure ratio (30%) + contributors (30%).
pub fn score_reputation(data: &CapabilityData) -> f64 {
    let stars = f64::from(data.repo.stars.max(1));
    let star_score = (10.0 * (stars / 50.0 + 1.0).ln() / 200.0_f64.ln()).min(10.0);

    let total_issues = data.repo.open_issues + data.repo.closed_issues;
    let issue_score = if total_issues > 0 {
        f64::from(data.repo.closed_issues) / f64::from(total_issues) * 10.0
    } else {
        5.0
    };

    let contributors = f64::from(data.repo.contributors.max(1));
    let contrib_score = (10.0 * (contributors + 1.0).ln() / 20.0_f64.ln()).min(10.0);

    clamp(star_score * 0.4 + issue_score * 0.3 + contrib_score * 0.3)
}

/// Usability = AI judgment (75%) + documentation length (25%).
///
/// A README shorter than 100 characters fails the documentation floor and
/// scores a hard 0 regardless of the AI judgment.
pub fn score_usability(data: &CapabilityData) -> f64 {
    if data.repo.readme_length < 100 {
        return 0.0;
    }
    let ai_part = data.analysis.usability_score * 0.75;
    let doc_score = (data.repo.readme_length as f64 / 3000.0 * 2.5).min(2.5);
    clamp(ai_part + doc_score)
}

/// Compute scores for a batch of capabilities, in input order.
pub fn calculate_scores(data_list: &[CapabilityData]) -> Vec<Scores> {
    data_list
        .iter()
        .map(|data| {
            let r = round1(score_reliability(data));
            let s = round1(score_safety(data));
            let c = round1(score_capability(data));
            let rep = round1(score_reputation(data));
            let u = round1(score_usability(data));
            // Overall is computed from the rounded dimensions, not raw floats.
            let overall = round1(r * 0.25 + s * 0.25 + c * 0.20 + rep * 0.15 + u * 0.15);
            Scores {
                reliability: r,
                safety: s,
                capability: c,
                reputation: rep,
                usability: u,
                overall,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, CapabilityEntry, RepoData, ScanResult};

    fn make_entry() -> CapabilityEntry {
        CapabilityEntry {
            name: "test-skill".to_string(),
            source: "skillhub".to_string(),
            source_id: "test-1".to_string(),
            provider: "testuser".to_string(),
            description: "A test capability".to_string(),
            category: "development".to_string(),
            repo_url: None,
            endpoint: None,
            protocol: "skill".to_string(),
        }
    }

    fn make_data() -> CapabilityData {
        CapabilityData {
            entry: make_entry(),
            repo: RepoData {
                stars: 100,
                forks: 20,
                language: Some("Python".to_string()),
                last_updated: (Utc::now() - chrono::Duration::days(2)).to_rfc3339(),
                open_issues: 5,
                closed_issues: 45,
                contributors: 8,
                has_typescript: false,
                has_tests: true,
                readme_text: "# Test\nGood docs here".to_string(),
                readme_length: 500,
                ..Default::default()
            },
            analysis: AnalysisResult {
                reliability_score: 7.0,
                safety_score: 8.0,
                capability_score: 6.5,
                usability_score: 7.5,
                summary: "Good tool".to_string(),
                one_liner: "A test tool".to_string(),
                ..Default::default()
            },
            scan: ScanResult::default(),
        }
    }

    #[test]
    fn reliability_recent_push_example() {
        let mut data = make_data();
        data.analysis.reliability_score = 9.0;
        data.repo.last_updated = Utc::now().to_rfc3339();
        // 9.0 * 0.7 + 10 * 0.3 = 9.3
        assert_eq!(round1(score_reliability(&data)), 9.3);
    }

    #[test]
    fn reliability_old_repo_scores_low() {
        let mut data = make_data();
        data.analysis.reliability_score = 2.0;
        data.repo.last_updated = "2024-01-01T00:00:00Z".to_string();
        let score = score_reliability(&data);
        assert!((0.0..=4.0).contains(&score));
    }

    #[test]
    fn reliability_clamps_at_ten() {
        let mut data = make_data();
        data.analysis.reliability_score = 15.0;
        data.repo.last_updated = Utc::now().to_rfc3339();
        assert_eq!(score_reliability(&data), 10.0);
    }

    #[test]
    fn unparseable_date_counts_as_stale() {
        let mut data = make_data();
        data.repo.last_updated = String::new();
        data.analysis.reliability_score = 0.0;
        // maintenance part degrades to 1.0 * 0.3
        assert_eq!(round1(score_reliability(&data)), 0.3);
    }

    #[test]
    fn safety_without_scan_uses_ai_and_code_bonus() {
        let mut data = make_data();
        data.analysis.safety_score = 8.0;
        // 8.0 * 0.85 + 1.0 (tests) = 7.8
        assert_eq!(round1(score_safety(&data)), 7.8);
    }

    #[test]
    fn safety_with_scan_blends_scan_and_ai() {
        let mut data = make_data();
        data.analysis.safety_score = 8.0;
        data.scan = ScanResult {
            tool: "secret_scanner".to_string(),
            severity_high: 1,
            severity_medium: 2,
            ..Default::default()
        };
        // scan score = 10 - 2 - 2 = 6; 6*0.6 + 8*0.4 = 6.8
        assert_eq!(round1(score_safety(&data)), 6.8);
    }

    #[test]
    fn safety_scan_score_clamps_at_zero() {
        let mut data = make_data();
        data.analysis.safety_score = 5.0;
        data.scan = ScanResult {
            tool: "secret_scanner,trivy".to_string(),
            severity_high: 10,
            has_api_keys: true,
            ..Default::default()
        };
        // scan score bottoms out at 0; 0*0.6 + 5*0.4 = 2.0
        assert_eq!(round1(score_safety(&data)), 2.0);
    }

    #[test]
    fn capability_bonus_components() {
        let mut data = make_data();
        data.analysis.capability_score = 8.0;
        data.repo.has_tests = true;
        data.repo.contributors = 3;
        data.repo.readme_length = 1000;
        // 8.0 * 0.8 + 1.0 + 0.5 + 0.5 = 8.4
        assert_eq!(round1(score_capability(&data)), 8.4);
    }

    #[test]
    fn reputation_popular_repo_scores_high() {
        let mut data = make_data();
        data.repo.stars = 5000;
        data.repo.closed_issues = 90;
        data.repo.open_issues = 10;
        data.repo.contributors = 20;
        let score = score_reputation(&data);
        assert!((7.0..=10.0).contains(&score));
    }

    #[test]
    fn reputation_zero_issues_scores_half_ratio() {
        let mut data = make_data();
        data.repo.stars = 2;
        data.repo.open_issues = 0;
        data.repo.closed_issues = 0;
        data.repo.contributors = 1;
        let score = score_reputation(&data);
        assert!((0.0..=4.0).contains(&score));
    }

    #[test]
    fn usability_floor_below_100_chars() {
        let mut data = make_data();
        data.analysis.usability_score = 10.0;
        data.repo.readme_length = 99;
        assert_eq!(score_usability(&data), 0.0);
    }

    #[test]
    fn usability_floor_boundary_at_100_chars() {
        let mut data = make_data();
        data.analysis.usability_score = 10.0;
        data.repo.readme_length = 100;
        assert!(score_usability(&data) > 0.0);
    }

    #[test]
    fn usability_doc_bonus_caps() {
        let mut data = make_data();
        data.analysis.usability_score = 8.5;
        data.repo.readme_length = 30_000;
        // 8.5 * 0.75 + 2.5 = 8.875
        assert!((score_usability(&data) - 8.875).abs() < 1e-9);
    }

    #[test]
    fn overall_from_rounded_dimensions() {
        let results = calculate_scores(&[make_data()]);
        assert_eq!(results.len(), 1);
        let s = &results[0];
        assert!((0.0..=10.0).contains(&s.overall));
        let expected = round1(
            s.reliability * 0.25
                + s.safety * 0.25
                + s.capability * 0.20
                + s.reputation * 0.15
                + s.usability * 0.15,
        );
        assert_eq!(s.overall, expected);
    }

    #[test]
    fn overall_known_vector() {
        // 7.0*0.25 + 8.0*0.25 + 6.0*0.20 + 5.0*0.15 + 4.0*0.15 = 6.3
        let overall = round1(7.0 * 0.25 + 8.0 * 0.25 + 6.0 * 0.20 + 5.0 * 0.15 + 4.0 * 0.15);
        assert_eq!(overall, 6.3);
    }

    #[test]
    fn empty_batch_yields_empty_scores() {
        assert!(calculate_scores(&[]).is_empty());
    }
}
