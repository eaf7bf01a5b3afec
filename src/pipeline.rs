//! Pipeline orchestration.
//!
//! One update run is a fixed stage sequence:
//! discover → dedupe → incremental filter → collect → scan → analyze →
//! score → assemble → merge → persist.
//!
//! Each stage is awaited fully before the next begins; work within a stage
//! is internally concurrent. The orchestrator is the only component with
//! cross-stage state: the persisted-slug index used for incremental merge.

use anyhow::Result;

use crate::analyze;
use crate::category::clean_category;
use crate::collect;
use crate::config::Config;
use crate::discover::{dedupe_entries, DiscovererRegistry};
use crate::models::{
    AnalysisResult, CapabilityData, CapabilityEntry, CapabilityRecord, DimensionScores, RepoData,
    Scores,
};
use crate::progress::{PipelineEvent, PipelineProgress};
use crate::scan;
use crate::score::calculate_scores;
use crate::store;

/// Options for one update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Ignore persisted data and recompute everything.
    pub force: bool,
    /// List pending entries without processing or persisting anything.
    pub dry_run: bool,
}

/// Summary of a finished run, for the CLI to report.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    pub total_discovered: usize,
    pub total_existing: usize,
    pub new_count: usize,
    pub failed: Vec<String>,
    pub total_records: usize,
}

/// Project a fully processed entry into the flat persisted record.
///
/// The published category prefers the analyzer's (cleaned) suggestion and
/// falls back to the discovery category.
pub fn assemble_record(
    entry: &CapabilityEntry,
    repo: &RepoData,
    analysis: &AnalysisResult,
    scores: &Scores,
) -> CapabilityRecord {
    let category = if analysis.category_suggestion.is_empty() {
        entry.category.clone()
    } else {
        clean_category(&analysis.category_suggestion).to_string()
    };

    CapabilityRecord {
        slug: entry.slug(),
        name: entry.name.clone(),
        source: entry.source.clone(),
        source_id: entry.source_id.clone(),
        provider: entry.provider.clone(),
        description: entry.description.clone(),
        category,
        repo_url: entry.repo_url.clone(),
        endpoint: entry.endpoint.clone(),
        protocol: entry.protocol.clone(),
        stars: repo.stars,
        forks: repo.forks,
        language: repo.language.clone(),
        last_updated: repo.last_updated.clone(),
        contributors: repo.contributors,
        has_tests: repo.has_tests,
        has_typescript: repo.has_typescript,
        readme_length: repo.readme_length,
        scores: DimensionScores {
            reliability: scores.reliability,
            safety: scores.safety,
            capability: scores.capability,
            reputation: scores.reputation,
            usability: scores.usability,
        },
        overall_score: scores.overall,
        ai_summary: analysis.summary.clone(),
        one_liner: analysis.one_liner.clone(),
        install_guide: analysis.install_guide.clone(),
        usage_guide: analysis.usage_guide.clone(),
        safety_notes: analysis.safety_notes.clone(),
        dependencies: repo.dependencies.clone(),
        latest_version: repo.latest_version.clone(),
        supported_clients: repo.supported_clients.clone(),
    }
}

/// Run collect → scan → analyze → score → assemble for a batch of new
/// entries.
///
/// Per-entry failures degrade inside each stage; an `Err` here means a
/// stage-wide failure (e.g. the analyzer cannot be constructed), which the
/// caller turns into an all-failed run.
async fn process_entries(
    entries: &[CapabilityEntry],
    config: &Config,
    progress: &dyn PipelineProgress,
) -> Result<Vec<CapabilityRecord>> {
    progress.report(PipelineEvent::StageStart { stage: "collect" });
    let repos = collect::collect_repo_data(entries, config, progress).await;

    progress.report(PipelineEvent::StageStart { stage: "scan" });
    let scans = scan::scan_entries(entries, config, progress).await;

    progress.report(PipelineEvent::StageStart { stage: "analyze" });
    let analyzer = analyze::create_analyzer(&config.ai)?;
    let analyses = analyze::analyze_entries(analyzer.as_ref(), entries, &repos, progress).await;

    progress.report(PipelineEvent::StageStart { stage: "score" });
    let data_list: Vec<CapabilityData> = entries
        .iter()
        .zip(repos.iter())
        .zip(analyses.iter())
        .zip(scans.iter())
        .map(|(((entry, repo), analysis), scan)| CapabilityData {
            entry: entry.clone(),
            repo: repo.clone(),
            analysis: analysis.clone(),
            scan: scan.clone(),
        })
        .collect();
    let all_scores = calculate_scores(&data_list);

    Ok(data_list
        .iter()
        .zip(all_scores.iter())
        .map(|(data, scores)| assemble_record(&data.entry, &data.repo, &data.analysis, scores))
        .collect())
}

/// Run one full update.
///
/// Always terminates with either a merged, ranked, persisted dataset
/// (possibly unchanged if everything failed) or, in dry-run mode, no
/// persisted mutation at all.
pub async fn run_update(
    config: &Config,
    opts: &UpdateOptions,
    progress: &dyn PipelineProgress,
) -> Result<UpdateOutcome> {
    // Persisted state is read once at run start.
    let existing_data = if opts.force {
        Vec::new()
    } else {
        store::load_snapshot(&config.output.data_file)
    };
    let existing_slugs = store::snapshot_slugs(&existing_data);
    let total_existing = existing_data.len();
    println!("[1/5] {} capabilities already persisted", total_existing);

    println!("[2/5] discovering capabilities...");
    progress.report(PipelineEvent::StageStart { stage: "discover" });
    let registry = DiscovererRegistry::from_config(config);
    let discovered = registry.discover_all().await;
    let deduped = dedupe_entries(discovered);
    let total_discovered = deduped.len();
    println!("  discovered {} unique capabilities", total_discovered);

    // Incremental runs skip everything already persisted.
    let new_entries: Vec<CapabilityEntry> = deduped
        .into_iter()
        .filter(|e| !existing_slugs.contains(&e.slug()))
        .collect();
    println!(
        "[3/5] {} new, {} already known",
        new_entries.len(),
        total_discovered - new_entries.len()
    );

    if opts.dry_run {
        println!("\ndry-run: the following capabilities would be processed:");
        for (i, entry) in new_entries.iter().enumerate() {
            println!("  {}. {} ({}) - {}", i + 1, entry.name, entry.slug(), entry.source);
        }
        println!("\n{} capabilities pending.", new_entries.len());
        return Ok(UpdateOutcome {
            total_discovered,
            total_existing,
            new_count: new_entries.len(),
            failed: Vec::new(),
            total_records: total_existing,
        });
    }

    if new_entries.is_empty() {
        println!("  nothing new to process.");
        store::append_run_log(
            &config.output.log_file,
            store::RunLogEntry::now(total_discovered, total_existing, 0, Vec::new(), opts.force),
        )?;
        return Ok(UpdateOutcome {
            total_discovered,
            total_existing,
            new_count: 0,
            failed: Vec::new(),
            total_records: total_existing,
        });
    }

    println!("[4/5] processing {} new capabilities...", new_entries.len());
    let mut failed: Vec<String> = Vec::new();
    let new_results = match process_entries(&new_entries, config, progress).await {
        Ok(results) => results,
        Err(e) => {
            // Stage-wide failure: the whole run's new entries are excluded,
            // persisted data stays untouched.
            eprintln!("  processing failed: {e}");
            failed = new_entries.iter().map(CapabilityEntry::slug).collect();
            Vec::new()
        }
    };

    // Quality gate: a zero overall score is a failed outcome, not a rank.
    let mut successful: Vec<CapabilityRecord> = Vec::new();
    for record in new_results {
        if record.overall_score > 0.0 {
            successful.push(record);
        } else {
            failed.push(record.slug.clone());
        }
    }
    let new_count = successful.len();
    println!("  succeeded: {}, failed: {}", new_count, failed.len());

    println!("[5/5] merging and persisting...");
    let merged = if opts.force {
        let mut all = successful;
        store::sort_by_overall(&mut all);
        all
    } else {
        store::merge_records(existing_data, successful)
    };

    store::save_snapshot(&config.output.data_file, &merged)?;
    store::append_run_log(
        &config.output.log_file,
        store::RunLogEntry::now(
            total_discovered,
            total_existing,
            new_count,
            failed.clone(),
            opts.force,
        ),
    )?;

    println!(
        "done: {} new capabilities, {} total.",
        new_count,
        merged.len()
    );

    Ok(UpdateOutcome {
        total_discovered,
        total_existing,
        new_count,
        failed,
        total_records: merged.len(),
    })
}
