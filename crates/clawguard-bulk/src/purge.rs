//! Member purge — remove every tracked member of a group except protected ones.

use clawguard_core::error::Result;
use std::sync::Arc;

use crate::actions::RemoveMember;
use crate::cancel::JobControl;
use crate::executor::{BulkActionExecutor, ExecutionSummary};
use crate::progress::ProgressReporter;
use crate::service::Collaborators;

pub async fn run(
    collab: &Collaborators,
    executor: &BulkActionExecutor,
    control: &Arc<JobControl>,
    reporter: Option<&Arc<ProgressReporter>>,
    group_id: &str,
    soft: bool,
) -> Result<ExecutionSummary> {
    let targets = collab.presence.get_known_targets(group_id).await?;

    // Admins and the executor itself are never touched.
    let mut protected = collab.auth.list_elevated_members(group_id).await?;
    protected.insert(collab.platform.own_identity().await?);

    tracing::info!(
        "👥 Purge {}: {} tracked member(s), {} protected id(s)",
        group_id,
        targets.len(),
        protected.len()
    );

    let action = Arc::new(RemoveMember::new(
        Arc::clone(&collab.platform),
        Arc::clone(&collab.presence),
        group_id,
        soft,
    ));
    Ok(executor.run(control, reporter, targets, &protected, action).await)
}
