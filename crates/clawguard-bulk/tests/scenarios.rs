//! End-to-end job scenarios against in-process fakes, on paused time.

mod common;

use clawguard_bulk::{Collaborators, ModerationService};
use clawguard_core::config::GuardConfig;
use clawguard_core::error::GuardError;
use clawguard_core::traits::PresenceStore;
use clawguard_core::types::{ActionResult, JobKind, JobRequest, OutcomeKind, Priority, PropagationMode};
use clawguard_presence::MemoryPresenceStore;
use clawguard_scheduler::TaskStatus;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn purge(group: &str, soft: bool) -> JobRequest {
    JobRequest::new(JobKind::PurgeMembers { group_id: group.into(), soft }, OPERATOR).reply_to("ops-chat")
}

fn propagate(identity: &str, mode: PropagationMode, origin: Option<&str>) -> JobRequest {
    JobRequest::new(
        JobKind::Propagate { identity: identity.into(), mode, origin_group: origin.map(String::from) },
        OPERATOR,
    )
    .reply_to("ops-chat")
}

/// 96 regular members (10 of them already gone), 3 admins and the bot.
fn big_group() -> (FakePlatform, MemoryPresenceStore, FakeAuth) {
    let regular = ids("u", 96);
    let mut tracked = regular.clone();
    tracked.extend(["a0", "a1", "a2", BOT].map(String::from));

    let still_there: Vec<String> = regular.iter().take(86).cloned().collect();
    let platform = FakePlatform::new().with_members("g1", still_there);
    let presence = MemoryPresenceStore::new().with_group("g1", tracked);
    let auth = FakeAuth::new().with_admins("g1", &["a0", "a1", "a2"]);
    (platform, presence, auth)
}

#[tokio::test(start_paused = true)]
async fn test_purge_large_group() {
    let (platform, presence, auth) = big_group();
    let h = harness(platform, presence, auth);

    let job = h.service.submit_job(purge("g1", false), None).await.unwrap();
    assert_eq!(job.key, "purge:g1");
    let result = job.wait().await;
    assert_eq!(result.status, TaskStatus::Completed);

    let summary = result.summary.unwrap();
    let snap = summary.snapshot;
    assert_eq!(snap.total, 100);
    assert_eq!(snap.processed, 100);
    assert_eq!(snap.applied, 86);
    assert_eq!(snap.already_absent, 10);
    assert_eq!(snap.skipped_protected, 4);
    assert_eq!(snap.failed, 0);
    assert!(!snap.aborted);

    assert_eq!(h.platform.calls("ban").len(), 96);
    for protected in ["a0", "a1", "a2", BOT] {
        assert!(h.platform.calls_for("g1", protected).is_empty());
    }

    let mut left = h.presence.get_known_targets("g1").await.unwrap();
    left.sort();
    assert_eq!(left, vec!["a0", "a1", "a2", BOT]);
    assert_eq!(summary.pruned, 96);

    settle().await;
    let report = h.sink.find("finished").unwrap();
    assert!(report.contains("Processed 100/100"));
    assert!(report.contains("✅ Applied: 86"));
    assert!(report.contains("♻️ Already absent: 10"));
    assert!(report.contains("🛡️ Skipped (protected): 4"));
    assert!(h.service.query_status("purge:g1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rerun_is_idempotent() {
    let (platform, presence, auth) = big_group();
    let h = harness(platform, presence, auth);

    h.service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    // Same tracked set again, nobody left on the platform side.
    for id in ids("u", 96) {
        h.presence.record_seen("g1", &id).await.unwrap();
    }

    let second = h.service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    let snap = second.summary.unwrap().snapshot;
    assert_eq!(snap.applied, 0);
    assert_eq!(snap.already_absent, 96);
    assert_eq!(snap.failed, 0);
    assert_eq!(snap.skipped_protected, 4);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_target_is_retried() {
    let hint = Some(Duration::from_secs(5));
    let platform = FakePlatform::new()
        .with_members("g1", ids("u", 3))
        .script("g1", "u0", vec![
            ActionResult::RateLimited { retry_after: hint },
            ActionResult::RateLimited { retry_after: hint },
        ]);
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 3));
    let h = harness(platform, presence, FakeAuth::new());

    let result = h.service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    let summary = result.summary.unwrap();

    assert_eq!(summary.outcome_for("u0").unwrap().result, OutcomeKind::Applied);
    assert_eq!(summary.snapshot.applied, 3);
    let calls = h.platform.calls_for("g1", "u0");
    assert_eq!(calls.len(), 3);
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(5));
    assert!(calls[2].at - calls[1].at >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_abort_mid_run() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 50));
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 50));
    let h = harness(platform, presence, FakeAuth::new());

    let job = h.service.submit_job(purge("g1", false), None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let live = h.service.query_status("purge:g1").unwrap();
    assert!(live.processed > 0);
    assert!(!live.aborted);

    let abort_at = Instant::now();
    assert!(h.service.request_abort("purge:g1", "op-2").await);
    assert!(!h.service.request_abort("purge:g1", "op-3").await);
    assert!(h.service.query_status("purge:g1").unwrap().aborted);

    let result = job.wait().await;
    let summary = result.summary.unwrap();
    assert!(summary.snapshot.aborted);
    assert!(summary.snapshot.processed < summary.snapshot.total);
    assert_eq!(summary.aborted_by.as_ref().unwrap().actor, "op-2");
    assert!(h.platform.calls("ban").iter().all(|c| c.at <= abort_at));

    settle().await;
    let report = h.sink.find("aborted").unwrap();
    assert!(report.contains("Aborted by op-2"));
    assert!(report.contains("were not processed"));
    assert!(!h.service.request_abort("purge:g1", "op-2").await);
}

#[tokio::test(start_paused = true)]
async fn test_lost_permissions_abort_job() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 40)).script(
        "g1",
        "u10",
        vec![ActionResult::Forbidden("Bad Request: not enough rights to restrict/unrestrict chat member".into())],
    );
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 40));
    let h = harness(platform, presence, FakeAuth::new());

    let result = h.service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    let summary = result.summary.unwrap();

    assert!(summary.snapshot.aborted);
    assert!(summary.snapshot.processed < 40);
    assert_eq!(summary.outcome_for("u10").unwrap().result, OutcomeKind::Failed);
    let record = summary.aborted_by.unwrap();
    assert_eq!(record.actor, "system");
    assert!(record.reason.unwrap().contains("insufficient permissions"));
    assert_eq!(h.platform.calls_for("g1", "u10").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submissions() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 20));
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 20));
    let h = harness(platform, presence, FakeAuth::new());

    let intruder = JobRequest::new(JobKind::PurgeMembers { group_id: "g1".into(), soft: false }, "intruder");
    assert!(matches!(h.service.submit_job(intruder, None).await, Err(GuardError::Authorization(_))));
    assert!(h.sink.texts().is_empty());

    assert!(matches!(h.service.submit_job(purge("  ", false), None).await, Err(GuardError::Validation(_))));

    let first = h.service.submit_job(purge("g1", false), None).await.unwrap();
    let dup = h.service.submit_job(purge("g1", true), None).await;
    assert!(matches!(dup, Err(GuardError::Validation(_))));
    first.wait().await;

    // Key is free again once the job ended.
    assert!(h.service.submit_job(purge("g1", false), None).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_purge_fails_when_admins_unknown() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 12));
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 12));
    let h = harness(platform, presence, FakeAuth::new().broken_group("g1"));

    let result = h.service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.summary.is_none());
    assert!(h.platform.calls("ban").is_empty());
    assert_eq!(h.presence.get_known_targets("g1").await.unwrap().len(), 12);

    let text = h.sink.find("could not run").unwrap();
    assert!(text.contains("chat not found"));
    assert!(h.service.query_status("purge:g1").is_none());
    assert!(h.service.submit_job(purge("g1", false), None).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_crashed_job_releases_its_key() {
    let platform = Arc::new(FakePlatform::new().with_members("g1", ids("u", 3)));
    let presence = PanickingPresence::new(MemoryPresenceStore::new().with_group("g1", ids("u", 3)), 1);
    let sink = Arc::new(RecordingSink::default());
    let collab = Collaborators {
        presence: Arc::new(presence),
        platform: platform.clone(),
        auth: Arc::new(FakeAuth::new()),
        status: sink.clone(),
    };
    let service = ModerationService::new(&GuardConfig::default(), collab).unwrap();

    let first = service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    assert_eq!(first.status, TaskStatus::Failed);
    assert!(first.summary.is_none());
    assert!(service.query_status("purge:g1").is_none());

    let text = sink.find("could not run").unwrap();
    assert!(text.contains("job crashed"));
    assert!(text.contains("is corrupt"));
    assert!(platform.calls("ban").is_empty());

    // Same key runs normally once the crashed job is gone.
    let second = service.submit_job(purge("g1", false), None).await.unwrap().wait().await;
    assert_eq!(second.status, TaskStatus::Completed);
    assert_eq!(second.summary.unwrap().snapshot.applied, 3);
    assert!(sink.find("finished").unwrap().contains("Started by op"));
}

#[tokio::test(start_paused = true)]
async fn test_queued_job_cancelled_before_start() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 30)).with_members("g2", ids("v", 5));
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 30)).with_group("g2", ids("v", 5));
    let h = harness(platform, presence, FakeAuth::new());

    let running = h.service.submit_job(purge("g1", false), None).await.unwrap();
    let queued = h.service.submit_job(purge("g2", false), Some(Priority::Low)).await.unwrap();
    assert_eq!(h.service.scheduler().len(), 1);
    assert!(h.service.query_status("purge:g2").is_some());

    assert!(h.service.request_abort("purge:g2", "op-9").await);
    let result = queued.wait().await;
    assert_eq!(result.status, TaskStatus::Cancelled);
    assert!(result.summary.is_none());
    assert!(h.service.query_status("purge:g2").is_none());

    running.wait().await;
    assert!(h.platform.calls_in("g2").is_empty());
    settle().await;
    assert!(h.sink.find("cancelled before start by op-9").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_higher_priority_job_runs_first() {
    let platform = FakePlatform::new()
        .with_members("g1", ids("u", 10))
        .with_members("g2", ids("v", 3))
        .with_members("g3", ids("w", 3));
    let presence = MemoryPresenceStore::new()
        .with_group("g1", ids("u", 10))
        .with_group("g2", ids("v", 3))
        .with_group("g3", ids("w", 3));
    let h = harness(platform, presence, FakeAuth::new());

    let blocker = h.service.submit_job(purge("g1", false), None).await.unwrap();
    let low = h.service.submit_job(purge("g2", false), Some(Priority::Low)).await.unwrap();
    let high = h.service.submit_job(purge("g3", false), Some(Priority::High)).await.unwrap();

    blocker.wait().await;
    high.wait().await;
    low.wait().await;

    let last_g1 = h.platform.calls_in("g1").iter().map(|c| c.at).max().unwrap();
    let first_g3 = h.platform.calls_in("g3").iter().map(|c| c.at).min().unwrap();
    let last_g3 = h.platform.calls_in("g3").iter().map(|c| c.at).max().unwrap();
    let first_g2 = h.platform.calls_in("g2").iter().map(|c| c.at).min().unwrap();
    assert!(last_g1 <= first_g3);
    assert!(last_g3 <= first_g2);
}

#[tokio::test(start_paused = true)]
async fn test_soft_purge_lifts_bans() {
    let platform = FakePlatform::new().with_members("g1", ids("u", 5)).fail_reversal("u2");
    let presence = MemoryPresenceStore::new().with_group("g1", ids("u", 5));
    let h = harness(platform, presence, FakeAuth::new());

    let result = h.service.submit_job(purge("g1", true), None).await.unwrap().wait().await;
    let summary = result.summary.unwrap();

    assert_eq!(summary.snapshot.applied, 5);
    assert_eq!(h.platform.calls("unban").len(), 5);
    settle().await;
    assert!(h.sink.find("Kick members").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_propagate_removal_across_groups() {
    let platform = FakePlatform::new()
        .with_members("g1", ["spam".to_string()])
        .with_members("g2", ["spam".to_string()])
        .with_members("g3", ["spam".to_string()])
        .with_title("g2", "Cats");
    let presence = MemoryPresenceStore::new()
        .with_group("g1", ["spam", "x"])
        .with_group("g2", ["spam", "x"])
        .with_group("g3", ["spam"])
        .with_group("g4", ["spam"])
        .with_group("g5", ["spam"]);
    let auth = FakeAuth::new().with_admins("g3", &["spam"]).broken_group("g5");
    let h = harness(platform, presence, auth);

    let result = h
        .service
        .submit_job(propagate("spam", PropagationMode::Remove, Some("g1")), None)
        .await
        .unwrap()
        .wait()
        .await;
    let summary = result.summary.unwrap();

    assert_eq!(summary.snapshot.total, 4);
    assert_eq!(summary.outcome_for("g2").unwrap().result, OutcomeKind::Applied);
    assert_eq!(summary.outcome_for("g3").unwrap().result, OutcomeKind::SkippedProtected);
    assert_eq!(summary.outcome_for("g4").unwrap().result, OutcomeKind::AlreadyAbsent);
    assert_eq!(summary.outcome_for("g5").unwrap().result, OutcomeKind::SkippedProtected);
    assert!(h.platform.calls_in("g1").is_empty());
    assert!(h.platform.calls_in("g3").is_empty());

    let mut groups = h.presence.get_groups_for_identity("spam").await.unwrap();
    groups.sort();
    assert_eq!(groups, vec!["g1", "g3", "g5"]);

    settle().await;
    let report = h.sink.find("finished").unwrap();
    assert!(report.contains("• Cats: remove applied"));
    assert!(report.contains("• g3: skipped (protected)"));
    assert!(report.contains("• g4: already absent"));
}

#[tokio::test(start_paused = true)]
async fn test_propagate_mute_keeps_presence() {
    let platform = FakePlatform::new().with_members("g1", ["spam".to_string()]).with_members("g2", ["spam".to_string()]);
    let presence = MemoryPresenceStore::new().with_group("g1", ["spam"]).with_group("g2", ["spam"]);
    let h = harness(platform, presence, FakeAuth::new());

    let result = h
        .service
        .submit_job(propagate("spam", PropagationMode::Mute, None), Some(Priority::Critical))
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(result.summary.unwrap().snapshot.applied, 2);
    assert_eq!(h.platform.calls("restrict").len(), 2);
    assert!(h.platform.calls("ban").is_empty());
    assert_eq!(h.presence.get_groups_for_identity("spam").await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_propagating_own_identity_touches_nothing() {
    let platform = FakePlatform::new().with_members("g1", [BOT.to_string()]);
    let presence = MemoryPresenceStore::new().with_group("g1", [BOT]).with_group("g2", [BOT]);
    let h = harness(platform, presence, FakeAuth::new());

    let result = h
        .service
        .submit_job(propagate(BOT, PropagationMode::Remove, None), None)
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(result.summary.unwrap().snapshot.skipped_protected, 2);
    assert!(h.platform.calls.lock().unwrap().is_empty());
}
