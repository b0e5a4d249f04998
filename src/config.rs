//! Configuration types.
//!
//! Everything is read once at start-up into an [`AppConfig`] and handed to
//! component constructors. Optional credentials switch the matching tier off
//! instead of failing start-up.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Twilio API base.
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Default VirusTotal v3 API base.
pub const DEFAULT_VIRUSTOTAL_API_BASE: &str = "https://www.virustotal.com/api/v3";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// SQLite/libSQL database file.
    pub database_path: PathBuf,
    /// Optional JSON file used to (re)seed the program directory at start-up.
    pub programs_path: Option<PathBuf>,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub log_dir: Option<PathBuf>,
    pub twilio: Option<TwilioConfig>,
    pub reputation: Option<ReputationConfig>,
    pub translation: Option<TranslationConfig>,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Twilio WhatsApp credentials.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// The service's own WhatsApp number, without the `whatsapp:` prefix.
    pub whatsapp_number: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// VirusTotal credentials and limits.
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub api_key: SecretString,
    pub api_base: String,
    pub timeout: Duration,
}

/// LibreTranslate-compatible endpoint.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// Conversation pacing and delayed-send policy.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Delay before the main menu follows a language confirmation.
    pub menu_after_language: Duration,
    /// Delay before the main menu follows a program lookup result.
    pub menu_after_program: Duration,
    /// Delay before the follow-up options follow a link verdict.
    pub link_followup: Duration,
    /// Delay before the main menu follows an apology.
    pub menu_after_error: Duration,
    /// Abort an identity's scheduled sends when a new message arrives from it.
    pub cancel_pending_on_inbound: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            menu_after_language: Duration::from_secs(2),
            menu_after_program: Duration::from_secs(3),
            link_followup: Duration::from_secs(2),
            menu_after_error: Duration::from_secs(3),
            cancel_pending_on_inbound: false,
        }
    }
}

impl ConversationConfig {
    /// No delays at all (for tests).
    pub fn immediate() -> Self {
        Self {
            menu_after_language: Duration::ZERO,
            menu_after_program: Duration::ZERO,
            link_followup: Duration::ZERO,
            menu_after_error: Duration::ZERO,
            cancel_pending_on_inbound: false,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(&get, "VERIFIER_PORT", 8000u16)?;
        let database_path = get("VERIFIER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/verifier.db"));
        let programs_path = get("VERIFIER_PROGRAMS_PATH").map(PathBuf::from);
        let log_dir = get("VERIFIER_LOG_DIR").map(PathBuf::from);

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_WHATSAPP_NUMBER"),
        ) {
            (None, None, None) => None,
            (Some(account_sid), Some(token), Some(number)) => Some(TwilioConfig {
                account_sid,
                auth_token: SecretString::from(token),
                whatsapp_number: number
                    .strip_prefix("whatsapp:")
                    .unwrap_or(&number)
                    .to_string(),
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
                timeout: Duration::from_secs(parse_or(&get, "TWILIO_TIMEOUT_SECS", 15u64)?),
            }),
            (sid, token, _) => {
                let missing = if sid.is_none() {
                    "TWILIO_ACCOUNT_SID"
                } else if token.is_none() {
                    "TWILIO_AUTH_TOKEN"
                } else {
                    "TWILIO_WHATSAPP_NUMBER"
                };
                return Err(ConfigError::MissingEnvVar(missing.to_string()));
            }
        };

        let reputation = match get("VIRUSTOTAL_API_KEY") {
            Some(key) => Some(ReputationConfig {
                api_key: SecretString::from(key),
                api_base: get("VIRUSTOTAL_API_BASE")
                    .unwrap_or_else(|| DEFAULT_VIRUSTOTAL_API_BASE.to_string()),
                timeout: Duration::from_secs(parse_or(&get, "VIRUSTOTAL_TIMEOUT_SECS", 15u64)?),
            }),
            None => None,
        };

        let translation = match get("TRANSLATE_API_URL") {
            Some(api_url) => Some(TranslationConfig {
                api_url,
                api_key: get("TRANSLATE_API_KEY").map(SecretString::from),
                timeout: Duration::from_secs(parse_or(&get, "TRANSLATE_TIMEOUT_SECS", 10u64)?),
            }),
            None => None,
        };

        let conversation = ConversationConfig {
            cancel_pending_on_inbound: parse_or(&get, "VERIFIER_CANCEL_PENDING_ON_INBOUND", false)?,
            ..ConversationConfig::default()
        };

        Ok(Self {
            server: ServerConfig { port },
            database_path,
            programs_path,
            log_dir,
            twilio,
            reputation,
            translation,
            conversation,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
