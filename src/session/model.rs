//! Per-identity conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::localization::Language;

/// The node of the conversation an identity is currently at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    MainMenu,
    AwaitingLink,
    AwaitingLinkFollowup,
    AwaitingProgram,
    AwaitingLanguage,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::MainMenu,
        Step::AwaitingLink,
        Step::AwaitingLinkFollowup,
        Step::AwaitingProgram,
        Step::AwaitingLanguage,
    ];

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainMenu => "main_menu",
            Self::AwaitingLink => "awaiting_link",
            Self::AwaitingLinkFollowup => "awaiting_link_followup",
            Self::AwaitingProgram => "awaiting_program",
            Self::AwaitingLanguage => "awaiting_language",
        }
    }

    /// Parse a stored value. Anything unrecognized maps to `MainMenu`.
    pub fn from_stored(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .unwrap_or_else(|| {
                tracing::warn!(stored = s, "Unknown session step, resetting to main menu");
                Self::MainMenu
            })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable conversation state for one sender identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Sender identity (phone number) without the channel prefix.
    pub phone_number: String,
    pub current_step: Step,
    pub language: Language,
    /// Scratch space for multi-turn flows.
    pub temp_data: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session with default step and language.
    pub fn new(phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            phone_number: phone_number.into(),
            current_step: Step::default(),
            language: Language::default(),
            temp_data: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Drop back to the main menu, keeping language and scratch data.
    pub fn reset(&mut self) {
        self.current_step = Step::MainMenu;
    }
}
