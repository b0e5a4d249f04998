//! Localization adapter: best-effort translation of outbound text.
//!
//! Translation must never block or fail a conversation turn: every failure
//! path hands back the original English text.

pub mod language;

pub use language::Language;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::TranslationConfig;
use crate::error::TranslationError;

/// Cached translations kept before the cache is reset.
const MAX_CACHED_TRANSLATIONS: usize = 512;

/// A translation provider. Source text is always English.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError>;
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslateClient {
    config: TranslationConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslateClient {
    pub fn new(config: TranslationConfig) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TranslationError::RequestFailed(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
        let body = TranslateRequest {
            q: text,
            source: Language::En.code(),
            target: target.code(),
            format: "text",
            api_key: self.config.api_key.as_ref().map(|k| k.expose_secret()),
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslationError::RequestFailed(format!(
                        "timed out after {:?}",
                        self.config.timeout
                    ))
                } else {
                    TranslationError::RequestFailed(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslationError::ProviderStatus(status.as_u16()));
        }

        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        if parsed.translated_text.trim().is_empty() {
            return Err(TranslationError::InvalidResponse("empty translation".into()));
        }
        Ok(parsed.translated_text)
    }
}

/// Pass-through-on-failure wrapper around an optional [`Translator`], with a
/// small in-memory cache.
pub struct Localizer {
    translator: Option<Arc<dyn Translator>>,
    cache: RwLock<HashMap<(Language, String), String>>,
}

impl Localizer {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self {
            translator,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A localizer that never translates.
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    /// Translate to a language given by code. Unknown codes pass through.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        match Language::from_code(target) {
            Some(lang) => self.localize(text, lang).await,
            None => {
                debug!(target, "Unsupported translation target, passing text through");
                text.to_string()
            }
        }
    }

    /// Translate English text to `target`, or return it unchanged.
    pub async fn localize(&self, text: &str, target: Language) -> String {
        if target == Language::En || text.trim().is_empty() {
            return text.to_string();
        }
        let Some(translator) = &self.translator else {
            return text.to_string();
        };

        let key = (target, text.to_string());
        if let Some(hit) = self.cache.read().await.get(&key) {
            return hit.clone();
        }

        match translator.translate(text, target).await {
            Ok(translated) => {
                let mut cache = self.cache.write().await;
                if cache.len() >= MAX_CACHED_TRANSLATIONS {
                    cache.clear();
                }
                cache.insert(key, translated.clone());
                translated
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Translation failed, sending original text");
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _target: Language) -> Result<String, TranslationError> {
            Err(TranslationError::RequestFailed("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct CountingTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{target}] {text}"))
        }
    }

    #[tokio::test]
    async fn unsupported_target_passes_through() {
        let counting = Arc::new(CountingTranslator::default());
        let localizer = Localizer::new(Some(counting.clone()));
        assert_eq!(localizer.translate("Hello", "xx").await, "Hello");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_passes_through() {
        let localizer = Localizer::new(Some(Arc::new(FailingTranslator)));
        assert_eq!(localizer.translate("Hello", "yo").await, "Hello");
        assert_eq!(localizer.localize("Hello", Language::Ig).await, "Hello");
    }

    #[tokio::test]
    async fn english_is_never_sent_to_provider() {
        let counting = Arc::new(CountingTranslator::default());
        let localizer = Localizer::new(Some(counting.clone()));
        assert_eq!(localizer.localize("Hello", Language::En).await, "Hello");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_translations_are_cached() {
        let counting = Arc::new(CountingTranslator::default());
        let localizer = Localizer::new(Some(counting.clone()));

        assert_eq!(localizer.localize("Menu", Language::Ha).await, "[ha] Menu");
        assert_eq!(localizer.localize("Menu", Language::Ha).await, "[ha] Menu");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        localizer.localize("Menu", Language::Yo).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn passthrough_without_provider() {
        let localizer = Localizer::passthrough();
        assert_eq!(localizer.localize("Hello", Language::Yo).await, "Hello");
    }
}
