//! Supported conversation languages.

use serde::{Deserialize, Serialize};

/// A language the conversation can be held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ig,
    Ha,
    Yo,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Ig, Language::Ha, Language::Yo];

    /// ISO 639-1 code, also the stored form.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ig => "ig",
            Self::Ha => "ha",
            Self::Yo => "yo",
        }
    }

    /// English display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ig => "Igbo",
            Self::Ha => "Hausa",
            Self::Yo => "Yoruba",
        }
    }

    /// Parse a 2-letter code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Match a typed keyword: the full English name or the 2-letter code.
    /// Expects already-normalized (trimmed, lower-cased) input.
    pub fn from_keyword(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| input == lang.code() || input == lang.display_name().to_lowercase())
    }

    /// Map a numbered menu choice ("1".."4") to a language.
    pub fn from_choice(choice: u8) -> Option<Self> {
        match choice {
            1 => Some(Self::En),
            2 => Some(Self::Ig),
            3 => Some(Self::Ha),
            4 => Some(Self::Yo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_cover_names_and_codes() {
        assert_eq!(Language::from_keyword("english"), Some(Language::En));
        assert_eq!(Language::from_keyword("igbo"), Some(Language::Ig));
        assert_eq!(Language::from_keyword("ha"), Some(Language::Ha));
        assert_eq!(Language::from_keyword("yoruba"), Some(Language::Yo));
        assert_eq!(Language::from_keyword("french"), None);
        assert_eq!(Language::from_keyword("1"), None);
    }

    #[test]
    fn choices_map_in_menu_order() {
        let mapped: Vec<_> = (1..=4).filter_map(Language::from_choice).collect();
        assert_eq!(mapped, Language::ALL.to_vec());
        assert_eq!(Language::from_choice(0), None);
        assert_eq!(Language::from_choice(5), None);
    }

    #[test]
    fn display_matches_serde() {
        for lang in Language::ALL {
            let json = serde_json::to_string(&lang).unwrap();
            assert_eq!(format!("\"{lang}\""), json);
        }
    }

    #[test]
    fn from_code_is_case_insensitive() {
        assert_eq!(Language::from_code("YO"), Some(Language::Yo));
        assert_eq!(Language::from_code("xx"), None);
    }
}
