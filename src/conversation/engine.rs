//! Conversation engine: runs one turn of the state machine.
//!
//! A turn has two phases. [`plan_turn`] is pure: it decides the next step and
//! language, which the caller persists before anything is sent.
//! [`ConversationEngine::execute`] then performs the transition's action
//! (classification, directory lookup) and produces the outbound messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::input::InputClass;
use super::machine::{Action, transition};
use super::prompts;
use crate::classifier::ThreatClassifier;
use crate::config::ConversationConfig;
use crate::directory::ProgramDirectory;
use crate::localization::{Language, Localizer};
use crate::session::{Session, Step};

/// One outbound message. `delay` of `None` means send immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub text: String,
    pub delay: Option<Duration>,
}

impl Outbound {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: None,
        }
    }

    /// Send after `delay`; a zero delay is immediate.
    pub fn after(text: impl Into<String>, delay: Duration) -> Self {
        Self {
            text: text.into(),
            delay: (!delay.is_zero()).then_some(delay),
        }
    }
}

/// The decided transition for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub previous: Step,
    pub next: Step,
    /// Session language after the turn.
    pub language: Language,
    pub action: Action,
}

impl TurnPlan {
    /// Write the transition into `session`.
    pub fn apply(&self, session: &mut Session) {
        session.current_step = self.next;
        session.language = self.language;
        session.updated_at = Utc::now();
    }
}

/// Decide the transition for `text` in `session`. No side effects.
pub fn plan_turn(session: &Session, text: &str) -> TurnPlan {
    let input = InputClass::of(text);
    let t = transition(session.current_step, input);
    let language = match t.action {
        Action::SetLanguage(lang) => lang,
        _ => session.language,
    };
    TurnPlan {
        previous: session.current_step,
        next: t.next,
        language,
        action: t.action,
    }
}

pub struct ConversationEngine {
    classifier: Arc<ThreatClassifier>,
    directory: ProgramDirectory,
    localizer: Arc<Localizer>,
    config: ConversationConfig,
}

impl ConversationEngine {
    pub fn new(
        classifier: Arc<ThreatClassifier>,
        directory: ProgramDirectory,
        localizer: Arc<Localizer>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            classifier,
            directory,
            localizer,
            config,
        }
    }

    /// Immediate acknowledgment for actions that do network work.
    pub async fn acknowledgment(&self, plan: &TurnPlan) -> Option<String> {
        let text = match plan.action {
            Action::VerifyLink => prompts::LINK_ACK,
            Action::LookupProgram => prompts::PROGRAM_ACK,
            _ => return None,
        };
        Some(self.localizer.localize(text, plan.language).await)
    }

    /// Perform the plan's action. Never fails: internal errors become an
    /// apology plus a delayed main menu.
    pub async fn execute(&self, plan: &TurnPlan, text: &str) -> Vec<Outbound> {
        let cfg = &self.config;
        let messages = match plan.action {
            Action::ShowMenu => vec![Outbound::now(prompts::MAIN_MENU)],
            Action::PromptLink => vec![Outbound::now(prompts::LINK_PROMPT)],
            Action::PromptNextLink => vec![Outbound::now(prompts::NEXT_LINK_PROMPT)],
            Action::PromptProgram => vec![Outbound::now(prompts::PROGRAM_PROMPT)],
            Action::PromptLanguage => vec![Outbound::now(prompts::LANGUAGE_PROMPT)],
            Action::SetLanguage(lang) => vec![
                Outbound::now(prompts::language_set(lang)),
                Outbound::after(prompts::MAIN_MENU, cfg.menu_after_language),
            ],
            Action::InvalidLanguageChoice => vec![
                Outbound::now(prompts::INVALID_LANGUAGE_CHOICE),
                Outbound::now(prompts::LANGUAGE_PROMPT),
            ],
            Action::VerifyLink => {
                let result = self.classifier.classify(text).await;
                vec![
                    Outbound::now(prompts::render_classification(&result)),
                    Outbound::after(prompts::LINK_FOLLOWUP, cfg.link_followup),
                ]
            }
            Action::LookupProgram => {
                let query = text.trim();
                match self.directory.lookup(query).await {
                    Ok(lookup) => vec![
                        Outbound::now(prompts::render_program_lookup(query, &lookup)),
                        Outbound::after(prompts::MAIN_MENU, cfg.menu_after_program),
                    ],
                    Err(e) => {
                        warn!(query, error = %e, "Program lookup failed");
                        vec![
                            Outbound::now(prompts::ERROR_APOLOGY),
                            Outbound::after(prompts::MAIN_MENU, cfg.menu_after_error),
                        ]
                    }
                }
            }
        };

        self.localize_all(messages, plan.language).await
    }

    /// Plan, apply and execute in one call, acknowledgment first.
    ///
    /// The webhook persists between the phases; this is the whole turn for
    /// callers that do not.
    pub async fn step(&self, session: &mut Session, text: &str) -> Vec<Outbound> {
        let plan = plan_turn(session, text);
        plan.apply(session);
        info!(
            identity = %session.phone_number,
            from = %plan.previous,
            to = %plan.next,
            action = ?plan.action,
            "Conversation step"
        );

        let mut messages = Vec::new();
        if let Some(ack) = self.acknowledgment(&plan).await {
            messages.push(Outbound::now(ack));
        }
        messages.extend(self.execute(&plan, text).await);
        messages
    }

    /// Apology sent after an unrecoverable turn failure.
    pub async fn failure_messages(&self, language: Language) -> Vec<Outbound> {
        let messages = vec![
            Outbound::now(prompts::ERROR_APOLOGY),
            Outbound::after(prompts::MAIN_MENU, self.config.menu_after_error),
        ];
        self.localize_all(messages, language).await
    }

    /// Whether a new inbound message aborts the sender's scheduled sends.
    pub fn cancels_pending_on_inbound(&self) -> bool {
        self.config.cancel_pending_on_inbound
    }

    async fn localize_all(&self, messages: Vec<Outbound>, language: Language) -> Vec<Outbound> {
        if language == Language::En {
            return messages;
        }
        let mut localized = Vec::with_capacity(messages.len());
        for message in messages {
            localized.push(Outbound {
                text: self.localizer.localize(&message.text, language).await,
                delay: message.delay,
            });
        }
        localized
    }
}
