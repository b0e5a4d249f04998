//! URL reputation lookups against a VirusTotal-compatible v3 API.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use super::types::{AnalysisStats, ThreatType, Verdict};
use crate::config::ReputationConfig;
use crate::error::ReputationError;

/// Harmless vendor count at which an otherwise clean report is SAFE rather
/// than LIKELY_SAFE.
pub const SAFE_HARMLESS_THRESHOLD: u32 = 10;

/// Threat families in priority order, with the vendor label fragments that
/// identify them. The last entry is the generic fallback.
const THREAT_FAMILIES: &[(ThreatType, &[&str])] = &[
    (ThreatType::Phishing, &["phish"]),
    (ThreatType::Malware, &["malware", "trojan", "virus", "ransom"]),
    (ThreatType::Scam, &["scam", "fraud"]),
    (ThreatType::Spam, &["spam"]),
    (ThreatType::SuspiciousOther, &["suspicious", "malicious"]),
];

/// One vendor's verdict from the last analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorVerdict {
    pub engine: String,
    pub category: String,
    pub result: Option<String>,
}

impl VendorVerdict {
    fn label(&self) -> &str {
        self.result.as_deref().unwrap_or(&self.category)
    }
}

/// Last-analysis report for a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlReport {
    pub stats: AnalysisStats,
    pub vendors: Vec<VendorVerdict>,
}

impl UrlReport {
    /// Verdict and threat family implied by the report.
    pub fn assess(&self) -> (Verdict, ThreatType) {
        let stats = &self.stats;
        if stats.malicious > 0 {
            (Verdict::Dangerous, self.dominant_threat(&["malicious"]))
        } else if stats.suspicious > 0 {
            (
                Verdict::Suspicious,
                self.dominant_threat(&["suspicious", "malicious"]),
            )
        } else if stats.total() == 0 {
            (Verdict::Unknown, ThreatType::None)
        } else if stats.harmless >= SAFE_HARMLESS_THRESHOLD {
            (Verdict::Safe, ThreatType::None)
        } else {
            (Verdict::LikelySafe, ThreatType::None)
        }
    }

    /// Vendors that flagged the URL, most informative first.
    pub fn flagged(&self) -> impl Iterator<Item = &VendorVerdict> {
        self.vendors
            .iter()
            .filter(|v| v.category == "malicious")
            .chain(self.vendors.iter().filter(|v| v.category == "suspicious"))
    }

    /// Most frequent threat family among vendors in `categories`. Ties go to
    /// the higher-priority family.
    fn dominant_threat(&self, categories: &[&str]) -> ThreatType {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for vendor in self
            .vendors
            .iter()
            .filter(|v| categories.contains(&v.category.as_str()))
        {
            if let Some(idx) = family_index(vendor.label()) {
                *counts.entry(idx).or_default() += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|(ia, ca), (ib, cb)| ca.cmp(cb).then(ib.cmp(ia)))
            .map(|(idx, _)| THREAT_FAMILIES[idx].0)
            .unwrap_or(ThreatType::SuspiciousOther)
    }
}

fn family_index(label: &str) -> Option<usize> {
    let label = label.to_lowercase();
    THREAT_FAMILIES
        .iter()
        .position(|(_, fragments)| fragments.iter().any(|f| label.contains(f)))
}

/// Result of a reputation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReputationLookup {
    Found(UrlReport),
    /// The service has never analysed this URL.
    NotFound,
}

/// A URL reputation provider.
#[async_trait]
pub trait ReputationService: Send + Sync {
    /// Fetch the latest analysis for `url`.
    async fn lookup(&self, url: &str) -> Result<ReputationLookup, ReputationError>;

    /// Queue `url` for a fresh scan. Returns the provider's analysis id.
    async fn submit(&self, url: &str) -> Result<String, ReputationError>;
}

/// Identifier VirusTotal uses for a URL: unpadded URL-safe base64.
pub fn url_identifier(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

pub struct VirusTotalClient {
    config: ReputationConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct UrlObject {
    #[serde(default)]
    attributes: UrlAttributes,
}

#[derive(Deserialize, Default)]
struct UrlAttributes {
    #[serde(default)]
    last_analysis_stats: ApiStats,
    #[serde(default)]
    last_analysis_results: HashMap<String, ApiEngineResult>,
}

#[derive(Deserialize, Default)]
struct ApiStats {
    #[serde(default)]
    malicious: u32,
    #[serde(default)]
    suspicious: u32,
    #[serde(default)]
    harmless: u32,
    #[serde(default)]
    undetected: u32,
}

#[derive(Deserialize)]
struct ApiEngineResult {
    #[serde(default)]
    category: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    engine_name: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisRef {
    id: String,
}

impl VirusTotalClient {
    pub fn new(config: ReputationConfig) -> Result<Self, ReputationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReputationError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn transport_error(&self, e: reqwest::Error) -> ReputationError {
        if e.is_timeout() {
            ReputationError::Timeout(self.config.timeout)
        } else {
            ReputationError::Transport(e.to_string())
        }
    }

    fn status_error(status: reqwest::StatusCode) -> ReputationError {
        match status.as_u16() {
            401 | 403 => ReputationError::AuthFailed {
                status: status.as_u16(),
            },
            429 => ReputationError::RateLimited,
            other => ReputationError::UnexpectedStatus(other),
        }
    }
}

#[async_trait]
impl ReputationService for VirusTotalClient {
    async fn lookup(&self, url: &str) -> Result<ReputationLookup, ReputationError> {
        let resp = self
            .client
            .get(self.endpoint(&format!("urls/{}", url_identifier(url))))
            .header("x-apikey", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(url, "URL not known to reputation service");
            return Ok(ReputationLookup::NotFound);
        }
        if !status.is_success() {
            return Err(Self::status_error(status));
        }

        let body: ApiEnvelope<UrlObject> = resp
            .json()
            .await
            .map_err(|e| ReputationError::InvalidResponse(e.to_string()))?;
        let attrs = body.data.attributes;

        let mut vendors: Vec<VendorVerdict> = attrs
            .last_analysis_results
            .into_iter()
            .map(|(key, r)| VendorVerdict {
                engine: r.engine_name.unwrap_or(key),
                category: r.category,
                result: r.result.filter(|s| !s.is_empty()),
            })
            .collect();
        vendors.sort_by(|a, b| a.engine.cmp(&b.engine));

        let stats = AnalysisStats {
            malicious: attrs.last_analysis_stats.malicious,
            suspicious: attrs.last_analysis_stats.suspicious,
            harmless: attrs.last_analysis_stats.harmless,
            undetected: attrs.last_analysis_stats.undetected,
        };
        Ok(ReputationLookup::Found(UrlReport { stats, vendors }))
    }

    async fn submit(&self, url: &str) -> Result<String, ReputationError> {
        let resp = self
            .client
            .post(self.endpoint("urls"))
            .header("x-apikey", self.config.api_key.expose_secret())
            .form(&[("url", url)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::status_error(status));
        }

        let body: ApiEnvelope<AnalysisRef> = resp
            .json()
            .await
            .map_err(|e| ReputationError::InvalidResponse(e.to_string()))?;
        Ok(body.data.id)
    }
}
