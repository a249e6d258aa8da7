//! Operator-facing texts: acceptance, progress lines and final summaries.

use chrono::{DateTime, Utc};
use clawguard_core::types::{OutcomeKind, Priority, ProgressSnapshot};

use crate::cancel::AbortRecord;
use crate::executor::ExecutionSummary;

/// Longest failure reason kept per target.
pub const REASON_MAX_CHARS: usize = 120;

/// Cut a reason to `REASON_MAX_CHARS` characters on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    let reason = reason.trim();
    if reason.chars().count() <= REASON_MAX_CHARS {
        return reason.to_string();
    }
    let mut cut: String = reason.chars().take(REASON_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

pub fn render_accepted(title: &str, key: &str, priority: Priority, waiting: usize) -> String {
    if waiting == 0 {
        format!("📋 {title}: accepted (job {key}, priority {priority}). Starting shortly.")
    } else {
        format!("📋 {title}: accepted (job {key}, priority {priority}). {waiting} job(s) ahead in queue.")
    }
}

pub fn render_progress(title: &str, snap: &ProgressSnapshot) -> String {
    let pct = if snap.total == 0 { 100 } else { snap.processed * 100 / snap.total };
    format!(
        "⏳ {title}\nProgress: {}/{} ({pct}%)\n✅ {} · ♻️ {} · 🛡️ {} · ❌ {}",
        snap.processed, snap.total, snap.applied, snap.already_absent, snap.skipped_protected, snap.failed,
    )
}

pub fn render_cancelled(title: &str, record: Option<&AbortRecord>) -> String {
    match record {
        Some(r) => format!("🚫 {title}: cancelled before start by {}. Nothing was processed.", r.actor),
        None => format!("🚫 {title}: cancelled before start. Nothing was processed."),
    }
}

pub fn render_failed(title: &str, error: &dyn std::fmt::Display) -> String {
    format!("❌ {title}: could not run: {error}")
}

/// Final summary of a finished or aborted job.
pub struct JobReport<'a> {
    title: &'a str,
    summary: &'a ExecutionSummary,
    started_by: Option<&'a str>,
    started_at: Option<DateTime<Utc>>,
    failure_samples: usize,
    details: Vec<String>,
}

impl<'a> JobReport<'a> {
    pub fn new(title: &'a str, summary: &'a ExecutionSummary) -> Self {
        Self { title, summary, started_by: None, started_at: None, failure_samples: 5, details: vec![] }
    }

    /// Name the submitting operator and the start time.
    pub fn started(mut self, actor: &'a str, at: Option<DateTime<Utc>>) -> Self {
        self.started_by = Some(actor);
        self.started_at = at;
        self
    }

    pub fn with_samples(mut self, n: usize) -> Self {
        self.failure_samples = n;
        self
    }

    /// Extra per-target lines (e.g. one per group for propagation).
    pub fn with_details(mut self, lines: Vec<String>) -> Self {
        self.details = lines;
        self
    }

    pub fn render(&self) -> String {
        let snap = &self.summary.snapshot;
        let abort = self.summary.aborted_by.as_ref();
        let mut out = String::new();

        match abort {
            Some(_) => out.push_str(&format!("🛑 {}: aborted\n", self.title)),
            None => out.push_str(&format!("🏁 {}: finished\n", self.title)),
        }
        match (self.started_by, self.started_at) {
            (Some(actor), Some(at)) => {
                out.push_str(&format!("Started by {actor} at {}\n", at.format("%Y-%m-%d %H:%M:%S UTC")))
            }
            (Some(actor), None) => out.push_str(&format!("Started by {actor}\n")),
            _ => {}
        }
        out.push_str(&format!("Processed {}/{}\n", snap.processed, snap.total));
        out.push_str(&format!("✅ Applied: {}\n", snap.applied));
        out.push_str(&format!("♻️ Already absent: {}\n", snap.already_absent));
        out.push_str(&format!("🛡️ Skipped (protected): {}\n", snap.skipped_protected));
        out.push_str(&format!("❌ Failed: {}", snap.failed));

        if !self.details.is_empty() {
            out.push('\n');
            for line in &self.details {
                out.push_str(&format!("\n{line}"));
            }
        }

        let samples: Vec<_> = self
            .summary
            .outcomes
            .iter()
            .filter(|o| o.result == OutcomeKind::Failed)
            .take(self.failure_samples)
            .collect();
        if !samples.is_empty() {
            out.push_str("\n\nFailure samples:");
            for o in samples {
                let reason = o.reason.as_deref().unwrap_or("unknown error");
                out.push_str(&format!("\n • {}: {}", o.target_id, truncate_reason(reason)));
            }
        }

        if let Some(record) = abort {
            let at = record.at.format("%Y-%m-%d %H:%M:%S UTC");
            match &record.reason {
                Some(reason) => out.push_str(&format!(
                    "\n\n🛑 Aborted by {} at {at}: {}.",
                    record.actor,
                    truncate_reason(reason)
                )),
                None => out.push_str(&format!("\n\n🛑 Aborted by {} at {at}.", record.actor)),
            }
            out.push_str(&format!(" Remaining {} target(s) were not processed.", snap.remaining()));
        }
        out
    }
}
