//! Common types used across Sidekick components

use serde::{Deserialize, Serialize};

/// Author of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// In-progress assistant reply, replaced when the stream ends
    AssistantProvisional,
}

impl Role {
    /// Map a role string from the history endpoint. Anything that is not
    /// `"assistant"` is shown as the user's.
    pub fn from_history(role: &str) -> Self {
        if role == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::AssistantProvisional => write!(f, "assistant-provisional"),
        }
    }
}

/// A single entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn provisional(text: impl Into<String>) -> Self {
        Self {
            role: Role::AssistantProvisional,
            text: text.into(),
        }
    }
}

/// Tone the backend should answer in, sent as `persona_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    #[serde(rename = "")]
    Neutral,
    Friendly,
    Mentor,
    Witty,
    Therapist,
    Formal,
}

impl Persona {
    /// Every persona in menu order
    pub const ALL: [Persona; 6] = [
        Persona::Neutral,
        Persona::Friendly,
        Persona::Mentor,
        Persona::Witty,
        Persona::Therapist,
        Persona::Formal,
    ];

    /// Wire key for `persona_mode`
    pub fn key(&self) -> &'static str {
        match self {
            Persona::Neutral => "",
            Persona::Friendly => "friendly",
            Persona::Mentor => "mentor",
            Persona::Witty => "witty",
            Persona::Therapist => "therapist",
            Persona::Formal => "formal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Persona::Neutral => "No Persona (Default)",
            Persona::Friendly => "Friendly Assistant",
            Persona::Mentor => "Calm Mentor",
            Persona::Witty => "Witty Friend",
            Persona::Therapist => "Calm Therapist",
            Persona::Formal => "Formal Assistant",
        }
    }

    /// Look up a persona by wire key or label, ignoring case.
    /// `none` and `default` also select the neutral persona.
    pub fn from_key(input: &str) -> Option<Self> {
        let wanted = input.trim().to_lowercase();
        if wanted == "none" || wanted == "default" {
            return Some(Persona::Neutral);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.key() == wanted || p.label().to_lowercase() == wanted)
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
