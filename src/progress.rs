//! Pipeline progress reporting.
//!
//! Reports observable progress during `agentstore update` so operators see
//! which stage is running and how much is left. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a pipeline run.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// A stage began; item totals may still be unknown.
    StageStart { stage: &'static str },
    /// Within a stage: n items finished out of total.
    ItemDone {
        stage: &'static str,
        n: u64,
        total: u64,
    },
}

/// Reports pipeline progress. Implementations write to stderr (human or JSON).
pub trait PipelineProgress: Send + Sync {
    /// Emit a progress event. Called from concurrently running stage tasks.
    fn report(&self, event: PipelineEvent);
}

/// Human-friendly progress: `"collect  123 / 500"`.
pub struct StderrProgress;

impl PipelineProgress for StderrProgress {
    fn report(&self, event: PipelineEvent) {
        let line = match &event {
            PipelineEvent::StageStart { stage } => format!("{stage}  starting...\n"),
            PipelineEvent::ItemDone { stage, n, total } => {
                format!("{stage}  {} / {}\n", format_number(*n), format_number(*total))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PipelineProgress for JsonProgress {
    fn report(&self, event: PipelineEvent) {
        let obj = match &event {
            PipelineEvent::StageStart { stage } => serde_json::json!({
                "event": "progress",
                "stage": stage,
                "phase": "start"
            }),
            PipelineEvent::ItemDone { stage, n, total } => serde_json::json!({
                "event": "progress",
                "stage": stage,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PipelineProgress for NoProgress {
    fn report(&self, _event: PipelineEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn PipelineProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
