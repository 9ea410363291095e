use serde::{Deserialize, Serialize};

pub const TITLE_CHARS: usize = 15;
pub const PREVIEW_CHARS: usize = 30;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Epoch millis.
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: i64) -> Self {
        Self { role: Role::User, content: content.into(), timestamp }
    }

    pub fn assistant(content: impl Into<String>, timestamp: i64) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Last update, epoch millis.
    pub timestamp: i64,
    #[serde(default)]
    pub last_message: String,
}

impl Conversation {
    /// Starts a conversation from the first user input. The id is the creation time.
    pub fn start(first_input: &str, now: i64) -> Self {
        Self {
            id: now.to_string(),
            title: truncate_chars(first_input, TITLE_CHARS),
            messages: Vec::new(),
            timestamp: now,
            last_message: truncate_chars(first_input, PREVIEW_CHARS),
        }
    }

    /// Replaces the message list and refreshes the recency fields.
    pub fn touch(&mut self, messages: Vec<Message>, now: i64) {
        if let Some(latest) = messages.iter().rev().find(|m| !m.content.is_empty()) {
            self.last_message = truncate_chars(&latest.content, PREVIEW_CHARS);
        }
        self.messages = messages;
        self.timestamp = now;
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl ModelSettings {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.base_url.trim().is_empty()
            && !self.api_key.trim().is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.name.is_empty() && self.base_url.is_empty() && self.api_key.is_empty()
    }

    /// Fills an empty API key from the key baked in at build time, if any.
    pub fn with_fallback_key(&self, fallback: Option<&str>) -> Self {
        let mut effective = self.clone();
        if effective.api_key.trim().is_empty() {
            if let Some(key) = fallback.filter(|k| !k.is_empty()) {
                effective.api_key = key.to_string();
            }
        }
        effective
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// API DTOs
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self { role: message.role, content: message.content.clone() }
    }
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Deserialize, Debug, Default)]
pub struct StreamDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ModelListResponse {
    pub data: Vec<ModelInfo>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: String,
}
