//! The conversation transition table.
//!
//! `(step, input class) -> (next step, action)`. Language keywords and
//! "menu" are global and take priority over every step.

use super::input::InputClass;
use crate::localization::Language;
use crate::session::Step;

/// Work attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowMenu,
    PromptLink,
    PromptNextLink,
    PromptProgram,
    PromptLanguage,
    SetLanguage(Language),
    /// Classify the inbound text as a URL.
    VerifyLink,
    /// Look the inbound text up in the program directory.
    LookupProgram,
    InvalidLanguageChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Step,
    pub action: Action,
}

const fn to(next: Step, action: Action) -> Transition {
    Transition { next, action }
}

pub fn transition(step: Step, input: InputClass) -> Transition {
    use Action::*;
    use InputClass as In;

    match (step, input) {
        (_, In::Language(lang)) => to(Step::MainMenu, SetLanguage(lang)),
        (_, In::Menu) => to(Step::MainMenu, ShowMenu),

        (Step::MainMenu, In::Choice(1) | In::Verify) => to(Step::AwaitingLink, PromptLink),
        (Step::MainMenu, In::Choice(2) | In::Program) => to(Step::AwaitingProgram, PromptProgram),
        (Step::MainMenu, In::Choice(3) | In::LanguagePicker) => {
            to(Step::AwaitingLanguage, PromptLanguage)
        }
        (Step::MainMenu, _) => to(Step::MainMenu, ShowMenu),

        (Step::AwaitingLink, In::Empty) => to(Step::AwaitingLink, PromptLink),
        (Step::AwaitingLink, _) => to(Step::AwaitingLinkFollowup, VerifyLink),

        (Step::AwaitingLinkFollowup, In::Choice(1) | In::Another | In::Verify) => {
            to(Step::AwaitingLink, PromptNextLink)
        }
        (Step::AwaitingLinkFollowup, In::Choice(2) | In::Program) => {
            to(Step::AwaitingProgram, PromptProgram)
        }
        (Step::AwaitingLinkFollowup, _) => to(Step::MainMenu, ShowMenu),

        (Step::AwaitingProgram, In::Empty) => to(Step::AwaitingProgram, PromptProgram),
        (Step::AwaitingProgram, _) => to(Step::MainMenu, LookupProgram),

        (Step::AwaitingLanguage, In::Choice(n)) => match Language::from_choice(n) {
            Some(lang) => to(Step::MainMenu, SetLanguage(lang)),
            None => to(Step::AwaitingLanguage, InvalidLanguageChoice),
        },
        (Step::AwaitingLanguage, _) => to(Step::AwaitingLanguage, InvalidLanguageChoice),
    }
}
