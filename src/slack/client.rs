//! Slack API client module
//!
//! Encapsulates the Slack Web API calls the bot needs, with retry logic and
//! error handling.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::SlackApiConversationsListRequest;
use slack_morphism::{SlackApiToken, SlackApiTokenValue, SlackCursorId};
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::{Retry, RetryIf, strategy::ExponentialBackoff};
use tracing::{debug, warn};

use crate::core::models::InboundEvent;
use crate::errors::BotError;

const SLACK_API_BASE: &str = "https://slack.com/api";
const CONVERSATIONS_PAGE_SIZE: u16 = 200;

// Build the Slack client connector safely without panicking.
// If connector construction fails, store None and surface a BotError at call sites.
static SLACK_CLIENT: std::sync::LazyLock<Option<SlackHyperClient>> =
    std::sync::LazyLock::new(|| match SlackClientHyperConnector::new() {
        Ok(connector) => Some(SlackHyperClient::new(connector)),
        Err(e) => {
            warn!("Failed to create Slack HTTP connector: {}", e);
            None
        }
    });

static HTTP_CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// A channel the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChannel {
    pub id: String,
    pub name: String,
}

/// One entry of a `conversations.history` or `conversations.replies` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryMessage {
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub latest_reply: Option<String>,
}

impl HistoryMessage {
    /// Converts into an inbound event for `channel_id`.
    ///
    /// Messages posted by any bot (including this one) carry `bot_id` but not
    /// always a subtype; they are tagged `bot_message` so they are never admitted.
    #[must_use]
    pub fn into_event(self, channel_id: &str) -> InboundEvent {
        let subtype = self
            .subtype
            .or_else(|| self.bot_id.map(|_| "bot_message".to_string()));
        InboundEvent {
            event_type: self.message_type,
            subtype,
            channel_id: channel_id.to_string(),
            text: self.text.unwrap_or_default(),
            timestamp: self.ts,
            thread_timestamp: self.thread_ts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<HistoryMessage>,
    error: Option<String>,
}

/// Parses a `conversations.history` / `conversations.replies` body.
///
/// # Errors
///
/// Returns `ApiError` when Slack answered `ok: false`, `ParseError` when the
/// body does not have the expected shape.
pub fn parse_messages_response(method: &str, body: Value) -> Result<Vec<HistoryMessage>, BotError> {
    let response: MessagesResponse = serde_json::from_value(body)?;
    if !response.ok {
        return Err(BotError::ApiError(format!(
            "{} error: {}",
            method,
            response.error.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(response.messages)
}

/// Build the JSON payload for a threaded `chat.postMessage`.
#[must_use]
pub fn build_thread_reply_payload(channel: &str, thread_ts: &str, text: &str) -> Value {
    json!({
        "channel": channel,
        "text": text,
        "thread_ts": thread_ts,
    })
}

/// Slack API client with retry logic and error handling
#[derive(Clone)]
pub struct SlackClient {
    token: SlackApiToken,
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
        }
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, BotError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, BotError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(5);

        Retry::spawn(strategy, operation).await
    }

    /// # Errors
    ///
    /// Returns an error if `auth.test` fails.
    pub async fn get_bot_user_id(&self) -> Result<String, BotError> {
        self.with_retry(|| async {
            let session = SLACK_CLIENT
                .as_ref()
                .ok_or_else(|| {
                    BotError::GeneralError("Slack HTTP connector not initialized".to_string())
                })?
                .open_session(&self.token);

            let test_resp = session.auth_test().await?;

            Ok(test_resp.user_id.0)
        })
        .await
    }

    /// Lists non-archived channels and keeps those the bot is a member of.
    ///
    /// # Errors
    ///
    /// Returns an error if any `conversations.list` page cannot be fetched.
    pub async fn list_member_channels(&self) -> Result<Vec<MemberChannel>, BotError> {
        let mut members = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let page_cursor = cursor.clone();
            let (channels, next_cursor) = self
                .with_retry(|| {
                    let page_cursor = page_cursor.clone();
                    async move {
                        let session = SLACK_CLIENT
                            .as_ref()
                            .ok_or_else(|| {
                                BotError::GeneralError(
                                    "Slack HTTP connector not initialized".to_string(),
                                )
                            })?
                            .open_session(&self.token);

                        let mut request = SlackApiConversationsListRequest::new()
                            .with_exclude_archived(true)
                            .with_limit(CONVERSATIONS_PAGE_SIZE);
                        if let Some(c) = page_cursor {
                            request = request.with_cursor(c);
                        }

                        let resp = session.conversations_list(&request).await?;
                        let next = resp
                            .response_metadata
                            .and_then(|m| m.next_cursor)
                            .filter(|c| !c.0.is_empty());
                        Ok((resp.channels, next))
                    }
                })
                .await?;

            members.extend(
                channels
                    .into_iter()
                    .filter(|c| c.flags.is_member.unwrap_or(false))
                    .map(|c| MemberChannel {
                        name: c.name.clone().unwrap_or_else(|| c.id.0.clone()),
                        id: c.id.0,
                    }),
            );

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(members)
    }

    async fn get_messages(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<HistoryMessage>, BotError> {
        let url = format!("{}/{}", SLACK_API_BASE, method);
        self.with_retry(|| async {
            let resp = HTTP_CLIENT
                .get(&url)
                .bearer_auth(&self.token.token_value.0)
                .query(query)
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(BotError::ApiError(format!(
                    "{} HTTP {}",
                    method,
                    resp.status()
                )));
            }

            let body: Value = resp
                .json()
                .await
                .map_err(|e| BotError::ParseError(format!("{} JSON parse error: {e}", method)))?;

            parse_messages_response(method, body)
        })
        .await
    }

    /// Most recent `limit` top-level messages of a channel, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or Slack returns an error.
    pub async fn fetch_history(
        &self,
        channel_id: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>, BotError> {
        debug!("Reading history of {} (limit {})", channel_id, limit);
        self.get_messages(
            "conversations.history",
            &[
                ("channel", channel_id.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Thread messages newer than `oldest`. Slack includes the parent as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or Slack returns an error.
    pub async fn fetch_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        oldest: &str,
    ) -> Result<Vec<HistoryMessage>, BotError> {
        self.get_messages(
            "conversations.replies",
            &[
                ("channel", channel_id.to_string()),
                ("ts", thread_ts.to_string()),
                ("oldest", oldest.to_string()),
            ],
        )
        .await
    }

    /// Post a plain-text reply into a specific thread.
    ///
    /// Only attempts Slack cannot have stored are retried, so a reply is never
    /// posted twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or Slack returns an error.
    pub async fn post_message_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        message: &str,
    ) -> Result<(), BotError> {
        let payload = build_thread_reply_payload(channel_id, thread_ts, message);
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(5);

        RetryIf::spawn(
            strategy,
            || async {
                let resp = HTTP_CLIENT
                    .post(format!("{}/chat.postMessage", SLACK_API_BASE))
                    .bearer_auth(&self.token.token_value.0)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(PostAttemptError::from_send)?;

                if !resp.status().is_success() {
                    return Err(PostAttemptError::from_status(resp.status()));
                }

                let body: Value = resp.json().await.map_err(|e| {
                    PostAttemptError::permanent(BotError::ParseError(format!(
                        "chat.postMessage JSON parse error: {e}"
                    )))
                })?;

                check_post_response(&body).map_err(PostAttemptError::permanent)
            },
            |e: &PostAttemptError| e.retryable,
        )
        .await
        .map_err(|e| e.error)
    }
}

/// Failure of one `chat.postMessage` attempt.
#[derive(Debug)]
struct PostAttemptError {
    error: BotError,
    retryable: bool,
}

impl PostAttemptError {
    fn permanent(error: BotError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    fn from_send(e: reqwest::Error) -> Self {
        Self {
            retryable: e.is_connect(),
            error: BotError::HttpError(format!("Failed to post thread message: {e}")),
        }
    }

    fn from_status(status: StatusCode) -> Self {
        Self {
            retryable: status == StatusCode::TOO_MANY_REQUESTS,
            error: BotError::ApiError(format!("chat.postMessage HTTP {}", status)),
        }
    }
}

fn check_post_response(body: &Value) -> Result<(), BotError> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }
    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
    Err(BotError::ApiError(format!("chat.postMessage error: {error}")))
}
