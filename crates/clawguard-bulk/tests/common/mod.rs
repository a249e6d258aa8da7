//! Shared fakes for the job scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use clawguard_bulk::{Collaborators, ModerationService};
use clawguard_core::config::GuardConfig;
use clawguard_core::error::{GuardError, Result};
use clawguard_core::traits::{
    AuthorizationService, MemberPermissions, PlatformActionClient, PresenceStore, RemovalOptions, StatusError,
    StatusHandle, StatusSink,
};
use clawguard_core::types::ActionResult;
use clawguard_presence::MemoryPresenceStore;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const BOT: &str = "bot";
pub const OPERATOR: &str = "op";

#[derive(Debug, Clone)]
pub struct Call {
    pub op: &'static str,
    pub group: String,
    pub target: String,
    pub at: Instant,
}

/// Platform double: membership per group, scripted overrides keyed "group/target".
#[derive(Default)]
pub struct FakePlatform {
    members: Mutex<HashMap<String, HashSet<String>>>,
    script: Mutex<HashMap<String, VecDeque<ActionResult>>>,
    titles: HashMap<String, String>,
    failing_reversals: HashSet<String>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members<I: IntoIterator<Item = String>>(self, group: &str, ids: I) -> Self {
        self.members.lock().unwrap().entry(group.to_string()).or_default().extend(ids);
        self
    }

    pub fn with_title(mut self, group: &str, title: &str) -> Self {
        self.titles.insert(group.into(), title.into());
        self
    }

    pub fn script(self, group: &str, target: &str, results: Vec<ActionResult>) -> Self {
        self.script.lock().unwrap().insert(format!("{group}/{target}"), results.into());
        self
    }

    pub fn fail_reversal(mut self, target: &str) -> Self {
        self.failing_reversals.insert(target.into());
        self
    }

    pub fn calls(&self, op: &str) -> Vec<Call> {
        self.calls.lock().unwrap().iter().filter(|c| c.op == op).cloned().collect()
    }

    pub fn calls_in(&self, group: &str) -> Vec<Call> {
        self.calls.lock().unwrap().iter().filter(|c| c.group == group).cloned().collect()
    }

    pub fn calls_for(&self, group: &str, target: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.group == group && c.target == target && c.op != "unban")
            .cloned()
            .collect()
    }

    pub fn is_member(&self, group: &str, target: &str) -> bool {
        self.members.lock().unwrap().get(group).is_some_and(|m| m.contains(target))
    }

    fn log(&self, op: &'static str, group: &str, target: &str) {
        self.calls.lock().unwrap().push(Call {
            op,
            group: group.into(),
            target: target.into(),
            at: Instant::now(),
        });
    }

    fn scripted(&self, group: &str, target: &str) -> Option<ActionResult> {
        self.script.lock().unwrap().get_mut(&format!("{group}/{target}")).and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl PlatformActionClient for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    async fn own_identity(&self) -> Result<String> {
        Ok(BOT.into())
    }

    async fn apply_removal(&self, group_id: &str, target_id: &str, _opts: &RemovalOptions) -> ActionResult {
        self.log("ban", group_id, target_id);
        if let Some(result) = self.scripted(group_id, target_id) {
            return result;
        }
        let mut members = self.members.lock().unwrap();
        if members.get_mut(group_id).is_some_and(|m| m.remove(target_id)) {
            ActionResult::Applied
        } else {
            ActionResult::NotFound
        }
    }

    async fn apply_restriction(&self, group_id: &str, target_id: &str, _perms: &MemberPermissions) -> ActionResult {
        self.log("restrict", group_id, target_id);
        if let Some(result) = self.scripted(group_id, target_id) {
            return result;
        }
        if self.is_member(group_id, target_id) { ActionResult::Applied } else { ActionResult::NotFound }
    }

    async fn reverse_removal(&self, group_id: &str, target_id: &str) -> ActionResult {
        self.log("unban", group_id, target_id);
        if self.failing_reversals.contains(target_id) {
            ActionResult::Failed("Bad Request: method is available only for supergroups".into())
        } else {
            ActionResult::Applied
        }
    }

    async fn group_title(&self, group_id: &str) -> Option<String> {
        self.titles.get(group_id).cloned()
    }
}

#[derive(Default)]
pub struct FakeAuth {
    operators: HashSet<String>,
    admins: HashMap<String, HashSet<String>>,
    broken: HashSet<String>,
}

impl FakeAuth {
    pub fn new() -> Self {
        Self { operators: [OPERATOR.to_string()].into(), ..Self::default() }
    }

    pub fn with_admins(mut self, group: &str, ids: &[&str]) -> Self {
        self.admins.entry(group.into()).or_default().extend(ids.iter().map(|s| s.to_string()));
        self
    }

    /// Admin lookups for `group` fail.
    pub fn broken_group(mut self, group: &str) -> Self {
        self.broken.insert(group.into());
        self
    }
}

#[async_trait]
impl AuthorizationService for FakeAuth {
    async fn is_authorized_operator(&self, actor_id: &str) -> bool {
        self.operators.contains(actor_id)
    }

    async fn list_elevated_members(&self, group_id: &str) -> Result<HashSet<String>> {
        if self.broken.contains(group_id) {
            return Err(GuardError::platform("Bad Request: chat not found"));
        }
        Ok(self.admins.get(group_id).cloned().unwrap_or_default())
    }
}

/// Presence store whose first `n` target lookups panic.
pub struct PanickingPresence {
    inner: MemoryPresenceStore,
    panics_left: AtomicUsize,
}

impl PanickingPresence {
    pub fn new(inner: MemoryPresenceStore, n: usize) -> Self {
        Self { inner, panics_left: AtomicUsize::new(n) }
    }
}

#[async_trait]
impl PresenceStore for PanickingPresence {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn record_seen(&self, group_id: &str, identity: &str) -> Result<()> {
        self.inner.record_seen(group_id, identity).await
    }

    async fn get_known_targets(&self, group_id: &str) -> Result<Vec<String>> {
        if self.panics_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            panic!("presence index for {group_id} is corrupt");
        }
        self.inner.get_known_targets(group_id).await
    }

    async fn get_groups_for_identity(&self, identity: &str) -> Result<Vec<String>> {
        self.inner.get_groups_for_identity(identity).await
    }

    async fn prune_targets(&self, group_id: &str, targets: &[String]) -> Result<usize> {
        self.inner.prune_targets(group_id, targets).await
    }
}

/// Keeps the latest text of every posted message.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, String)>>,
    pub edits: Mutex<usize>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn texts_in(&self, chat: &str) -> Vec<String> {
        self.messages.lock().unwrap().iter().filter(|(c, _)| c == chat).map(|(_, t)| t.clone()).collect()
    }

    /// Current text of the message whose body mentions `needle`.
    pub fn find(&self, needle: &str) -> Option<String> {
        self.texts().into_iter().find(|t| t.contains(needle))
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn post(&self, chat_id: &str, text: &str) -> std::result::Result<StatusHandle, StatusError> {
        let mut messages = self.messages.lock().unwrap();
        messages.push((chat_id.into(), text.into()));
        Ok(StatusHandle { chat_id: chat_id.into(), message_id: (messages.len() - 1).to_string() })
    }

    async fn edit(&self, handle: &StatusHandle, text: &str) -> std::result::Result<(), StatusError> {
        let idx: usize = handle.message_id.parse().map_err(|_| StatusError::Gone)?;
        let mut messages = self.messages.lock().unwrap();
        let slot = messages.get_mut(idx).ok_or(StatusError::Gone)?;
        if slot.1 == text {
            return Err(StatusError::Unchanged);
        }
        slot.1 = text.into();
        *self.edits.lock().unwrap() += 1;
        Ok(())
    }
}

pub struct Harness {
    pub service: ModerationService,
    pub platform: Arc<FakePlatform>,
    pub presence: Arc<MemoryPresenceStore>,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(platform: FakePlatform, presence: MemoryPresenceStore, auth: FakeAuth) -> Harness {
    harness_with(GuardConfig::default(), platform, presence, auth)
}

pub fn harness_with(
    config: GuardConfig,
    platform: FakePlatform,
    presence: MemoryPresenceStore,
    auth: FakeAuth,
) -> Harness {
    let platform = Arc::new(platform);
    let presence = Arc::new(presence);
    let sink = Arc::new(RecordingSink::default());
    let collab = Collaborators {
        presence: presence.clone(),
        platform: platform.clone(),
        auth: Arc::new(auth),
        status: sink.clone(),
    };
    let service = ModerationService::new(&config, collab).unwrap();
    Harness { service, platform, presence, sink }
}

pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Let spawned status writes land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
