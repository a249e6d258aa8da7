//! Telegram Bot API client.
//!
//! One `reqwest::Client` behind three roles: moderation calls
//! (`PlatformActionClient`), operator and admin checks (`AuthorizationService`)
//! and the job status message (`StatusSink`).
//!
//! Every method is a POST to `{api_base}/bot{token}/{method}` with a JSON
//! body. Replies are `{"ok": bool, "result": ..., "error_code", "description",
//! "parameters": {"retry_after"}}`.

use async_trait::async_trait;
use clawguard_core::config::{GuardConfig, TelegramConfig};
use clawguard_core::error::{GuardError, Result};
use clawguard_core::traits::{
    AuthorizationService, MemberPermissions, PlatformActionClient, RemovalOptions, StatusError, StatusHandle,
    StatusSink,
};
use clawguard_core::types::ActionResult;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::OnceCell;

use crate::classify::{classify_action, classify_edit, ApiFailure};

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ReplyParameters>,
}

#[derive(Debug, Deserialize)]
struct ReplyParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

pub struct TelegramClient {
    config: TelegramConfig,
    client: reqwest::Client,
    operators: HashSet<String>,
    me: OnceCell<String>,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ClawGuard/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client, operators: HashSet::new(), me: OnceCell::new() }
    }

    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        if config.telegram.bot_token.trim().is_empty() {
            return Err(GuardError::config("telegram.bot_token is not set"));
        }
        Ok(Self::new(config.telegram.clone()).with_operators(config.operators.iter().cloned()))
    }

    /// Identities allowed to submit bulk jobs.
    pub fn with_operators<I: IntoIterator<Item = String>>(mut self, operators: I) -> Self {
        self.operators.extend(operators);
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.config.api_base.trim_end_matches('/'), self.config.bot_token)
    }

    /// Raw Bot API call. Returns `result` on success.
    pub async fn call(&self, method: &str, body: Value) -> std::result::Result<Value, ApiFailure> {
        let response = self
            .client
            .post(self.url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiFailure::transport(format!("{method} request failed: {e}")))?;

        let status = response.status().as_u16();
        let reply: ApiReply = response
            .json()
            .await
            .map_err(|e| ApiFailure { code: status, description: format!("{method}: invalid reply: {e}"), retry_after: None })?;

        if reply.ok {
            return Ok(reply.result);
        }
        let failure = ApiFailure {
            code: reply.error_code.unwrap_or(status),
            description: reply.description.unwrap_or_else(|| format!("{method} failed")),
            retry_after: reply.parameters.and_then(|p| p.retry_after),
        };
        tracing::debug!("Telegram {method} → {failure}");
        Err(failure)
    }

    async fn moderate(&self, method: &str, body: Value) -> ActionResult {
        match self.call(method, body).await {
            Ok(_) => ActionResult::Applied,
            Err(failure) => classify_action(&failure),
        }
    }
}

/// Telegram wants numeric ids; usernames like `@group` pass through as strings.
fn id_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(id),
    }
}

fn platform_err(failure: ApiFailure) -> GuardError {
    match failure.code {
        429 => GuardError::RateLimited { retry_after: failure.retry_after.map(std::time::Duration::from_secs) },
        _ => GuardError::Platform(failure.to_string()),
    }
}

#[async_trait]
impl PlatformActionClient for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn own_identity(&self) -> Result<String> {
        let id = self
            .me
            .get_or_try_init(|| async {
                let me = self.call("getMe", json!({})).await.map_err(platform_err)?;
                me["id"]
                    .as_i64()
                    .map(|id| id.to_string())
                    .ok_or_else(|| GuardError::platform("getMe reply has no id"))
            })
            .await?;
        Ok(id.clone())
    }

    async fn apply_removal(&self, group_id: &str, target_id: &str, opts: &RemovalOptions) -> ActionResult {
        let mut body = json!({
            "chat_id": id_value(group_id),
            "user_id": id_value(target_id),
            "revoke_messages": opts.revoke_messages,
        });
        if let Some(until) = opts.until {
            body["until_date"] = json!(until.timestamp());
        }
        self.moderate("banChatMember", body).await
    }

    async fn apply_restriction(&self, group_id: &str, target_id: &str, permissions: &MemberPermissions) -> ActionResult {
        let media = permissions.can_send_media;
        let body = json!({
            "chat_id": id_value(group_id),
            "user_id": id_value(target_id),
            "use_independent_chat_permissions": true,
            "permissions": {
                "can_send_messages": permissions.can_send_messages,
                "can_send_audios": media,
                "can_send_documents": media,
                "can_send_photos": media,
                "can_send_videos": media,
                "can_send_video_notes": media,
                "can_send_voice_notes": media,
                "can_send_polls": permissions.can_send_other,
                "can_send_other_messages": permissions.can_send_other,
                "can_add_web_page_previews": permissions.can_add_web_page_previews,
            },
        });
        self.moderate("restrictChatMember", body).await
    }

    async fn reverse_removal(&self, group_id: &str, target_id: &str) -> ActionResult {
        let body = json!({
            "chat_id": id_value(group_id),
            "user_id": id_value(target_id),
            "only_if_banned": true,
        });
        self.moderate("unbanChatMember", body).await
    }

    async fn group_title(&self, group_id: &str) -> Option<String> {
        match self.call("getChat", json!({ "chat_id": id_value(group_id) })).await {
            Ok(chat) => chat["title"].as_str().map(String::from),
            Err(e) => {
                tracing::debug!("No title for {group_id}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl AuthorizationService for TelegramClient {
    async fn is_authorized_operator(&self, actor_id: &str) -> bool {
        self.operators.contains(actor_id)
    }

    async fn list_elevated_members(&self, group_id: &str) -> Result<HashSet<String>> {
        let admins = self
            .call("getChatAdministrators", json!({ "chat_id": id_value(group_id) }))
            .await
            .map_err(platform_err)?;
        let list = admins
            .as_array()
            .ok_or_else(|| GuardError::platform("getChatAdministrators reply is not a list"))?;
        Ok(list
            .iter()
            .filter_map(|member| member["user"]["id"].as_i64())
            .map(|id| id.to_string())
            .collect())
    }
}

#[async_trait]
impl StatusSink for TelegramClient {
    async fn post(&self, chat_id: &str, text: &str) -> std::result::Result<StatusHandle, StatusError> {
        let message = self
            .call("sendMessage", json!({ "chat_id": id_value(chat_id), "text": text }))
            .await
            .map_err(|f| StatusError::Other(f.to_string()))?;
        let message_id = message["message_id"]
            .as_i64()
            .ok_or_else(|| StatusError::Other("sendMessage reply has no message_id".into()))?;
        Ok(StatusHandle { chat_id: chat_id.to_string(), message_id: message_id.to_string() })
    }

    async fn edit(&self, handle: &StatusHandle, text: &str) -> std::result::Result<(), StatusError> {
        let body = json!({
            "chat_id": id_value(&handle.chat_id),
            "message_id": id_value(&handle.message_id),
            "text": text,
        });
        self.call("editMessageText", body).await.map(|_| ()).map_err(|f| classify_edit(&f))
    }
}
