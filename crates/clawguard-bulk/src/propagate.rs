//! Cross-group propagation — one flagged identity, one action per group it
//! was seen in. Same executor, but targets are group ids.

use clawguard_core::error::Result;
use clawguard_core::types::{OutcomeKind, PropagationMode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::actions::SanctionInGroups;
use crate::cancel::JobControl;
use crate::executor::{BulkActionExecutor, ExecutionSummary};
use crate::progress::ProgressReporter;
use crate::report::truncate_reason;
use crate::service::Collaborators;

pub struct PropagationRun {
    pub summary: ExecutionSummary,
    /// One report line per processed group.
    pub details: Vec<String>,
}

pub async fn run(
    collab: &Collaborators,
    executor: &BulkActionExecutor,
    control: &Arc<JobControl>,
    reporter: Option<&Arc<ProgressReporter>>,
    identity: &str,
    mode: PropagationMode,
    origin_group: Option<&str>,
) -> Result<PropagationRun> {
    let mut groups = collab.presence.get_groups_for_identity(identity).await?;
    if let Some(origin) = origin_group {
        groups.retain(|g| g != origin);
    }
    let own = collab.platform.own_identity().await?;

    let mut protected = HashSet::new();
    let mut titles = HashMap::new();
    for group_id in &groups {
        if identity == own {
            protected.insert(group_id.clone());
        } else {
            match collab.auth.list_elevated_members(group_id).await {
                Ok(admins) if admins.contains(identity) => {
                    protected.insert(group_id.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    // Unknown admin list: leave the group alone.
                    tracing::warn!("Admin lookup failed for {group_id}, skipping it: {e}");
                    protected.insert(group_id.clone());
                }
            }
        }
        let title = collab.platform.group_title(group_id).await.unwrap_or_else(|| group_id.clone());
        titles.insert(group_id.clone(), title);
    }

    tracing::info!(
        "🌐 Propagate {mode} for {identity}: {} group(s), {} protected",
        groups.len(),
        protected.len()
    );

    let action = Arc::new(SanctionInGroups::new(
        Arc::clone(&collab.platform),
        Arc::clone(&collab.presence),
        identity,
        mode,
    ));
    let summary = executor.run(control, reporter, groups, &protected, action).await;
    let details = group_lines(&summary, &titles, mode);
    Ok(PropagationRun { summary, details })
}

fn group_lines(summary: &ExecutionSummary, titles: &HashMap<String, String>, mode: PropagationMode) -> Vec<String> {
    summary
        .outcomes
        .iter()
        .map(|o| {
            let title = titles.get(&o.target_id).unwrap_or(&o.target_id);
            match o.result {
                OutcomeKind::Applied => format!("• {title}: {mode} applied"),
                OutcomeKind::AlreadyAbsent => format!("• {title}: already absent"),
                OutcomeKind::SkippedProtected => format!("• {title}: skipped (protected)"),
                OutcomeKind::Failed => format!(
                    "• {title}: {mode} failed ({})",
                    truncate_reason(o.reason.as_deref().unwrap_or("unknown error"))
                ),
            }
        })
        .collect()
}
