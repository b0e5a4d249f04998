//! Inbound text classification for the transition table.

use crate::localization::Language;

/// Normalized class of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    /// A language name or 2-letter code ("english", "yo", ...).
    Language(Language),
    Menu,
    /// A single digit, "0".."9".
    Choice(u8),
    /// "verify", "verify link", "link".
    Verify,
    /// "info", "information", "program".
    Program,
    /// "language", "change language".
    LanguagePicker,
    Another,
    Empty,
    /// Anything else.
    Free,
}

impl InputClass {
    /// Classify trimmed, case-folded text.
    pub fn of(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Self::Empty;
        }
        if let Some(lang) = Language::from_keyword(&text) {
            return Self::Language(lang);
        }

        match text.as_str() {
            "menu" => Self::Menu,
            "verify" | "verify link" | "link" => Self::Verify,
            "info" | "information" | "program" => Self::Program,
            "language" | "change language" => Self::LanguagePicker,
            "another" => Self::Another,
            s if s.len() == 1 && s.as_bytes()[0].is_ascii_digit() => {
                Self::Choice(s.as_bytes()[0] - b'0')
            }
            _ => Self::Free,
        }
    }
}
