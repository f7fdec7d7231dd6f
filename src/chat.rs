//! Chat assistant grounded on the visible data summaries.
//!
//! Conversation history is kept per session id, never process-wide, and is
//! capped at `max_turns` messages with the oldest evicted first. A history
//! always starts on a user message. At most `max_sessions` sessions are
//! kept; the one idle longest goes first.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::config::{DomainConfig, LlmSettings};
use crate::errors::ChatError;
use crate::summary::render_context;
use crate::types::VisibleDataSummary;

pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    max_turns: usize,
    max_sessions: usize,
    sessions: HashMap<String, VecDeque<ChatTurn>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        ConversationStore {
            max_turns,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: HashMap::new(),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn push(&mut self, session: &str, role: Role, content: &str) {
        if !self.sessions.contains_key(session) {
            self.evict_idle_sessions();
        }
        let history = self.sessions.entry(session.to_string()).or_default();
        history.push_back(ChatTurn {
            role,
            content: content.to_string(),
            at: Utc::now(),
        });
        while history.len() > self.max_turns {
            history.pop_front();
        }
        // an answer without its question is dropped with it
        while history.front().is_some_and(|t| t.role != Role::User) {
            history.pop_front();
        }
    }

    fn evict_idle_sessions(&mut self) {
        while self.sessions.len() >= self.max_sessions {
            let idle = self
                .sessions
                .iter()
                .min_by_key(|(_, h)| h.back().map(|t| t.at))
                .map(|(k, _)| k.clone());
            match idle {
                Some(key) => {
                    debug!("chat {}: evicted idle session", key);
                    self.sessions.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn history(&self, session: &str) -> Vec<&ChatTurn> {
        self.sessions
            .get(session)
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    pub fn reset(&mut self, session: &str) {
        self.sessions.remove(session);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub send_history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompletionClient {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms.max(1)))
            .build()
            .map_err(|err| ChatError::BuildClient {
                message: err.to_string(),
            })?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl CompletionClient for OpenAiCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| ChatError::Http {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(ChatError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let response: ChatCompletionResponse = response.json().map_err(|err| ChatError::Decode {
            message: err.to_string(),
        })?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ChatError::EmptyChoice)
    }
}

/// Answers questions about a page, prefixed with that page's summary.
pub struct ChatAssistant<C: CompletionClient> {
    client: C,
    model: String,
    system_prompt: String,
    store: ConversationStore,
    contexts: HashMap<String, String>,
}

impl ChatAssistant<OpenAiCompletionClient> {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ChatError> {
        let client = OpenAiCompletionClient::from_settings(settings)?;
        Ok(Self::new(
            client,
            &settings.model,
            &settings.system_prompt,
            settings.max_turns,
        ))
    }
}

impl<C: CompletionClient> ChatAssistant<C> {
    pub fn new(client: C, model: &str, system_prompt: &str, max_turns: usize) -> Self {
        ChatAssistant {
            client,
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            store: ConversationStore::new(max_turns),
            contexts: HashMap::new(),
        }
    }

    /// Replace the grounding context for a page. `None` clears it.
    pub fn publish(&mut self, config: &DomainConfig, summary: Option<&VisibleDataSummary>) {
        match summary {
            Some(s) => {
                self.contexts
                    .insert(config.page_id.clone(), render_context(config, s));
            }
            None => {
                self.contexts.remove(&config.page_id);
            }
        }
    }

    pub fn context(&self, page_id: &str) -> Option<&str> {
        self.contexts.get(page_id).map(String::as_str)
    }

    pub fn history(&self, session: &str) -> Vec<&ChatTurn> {
        self.store.history(session)
    }

    pub fn reset(&mut self, session: &str) {
        self.store.reset(session);
    }

    /// Ask on behalf of `session` about `page_id`.
    ///
    /// Without `send_history` the session's history is dropped first. A
    /// failed completion leaves the history as it was.
    pub fn ask(&mut self, session: &str, page_id: &str, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        if !request.send_history {
            self.store.reset(session);
        }

        let mut messages = vec![ChatMessage {
            role: Role::System,
            content: self.system_prompt.clone(),
        }];
        messages.extend(self.store.history(session).into_iter().map(|t| ChatMessage {
            role: t.role,
            content: t.content.clone(),
        }));
        let grounded = match self.contexts.get(page_id) {
            Some(context) => format!("{}\n\nQuestion: {}", context, request.prompt),
            None => request.prompt.clone(),
        };
        messages.push(ChatMessage {
            role: Role::User,
            content: grounded,
        });
        debug!("chat {}: sending {} messages", session, messages.len());

        let completion = CompletionRequest {
            model: self.model.clone(),
            messages,
        };
        let answer = self.client.complete(&completion).map_err(|e| {
            warn!("chat {}: completion failed: {}", session, e);
            e
        })?;

        self.store.push(session, Role::User, &request.prompt);
        self.store.push(session, Role::Assistant, &answer);
        Ok(ChatResponse { response: answer })
    }
}
