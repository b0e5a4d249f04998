//! Threat classifier: tiered URL safety assessment.
//!
//! Tiers run in order and their verdicts combine by severity:
//! 1. normalization
//! 2. allow-list (SAFE / LIKELY_SAFE, skips the reputation tier)
//! 3. local heuristics (always run)
//! 4. reputation lookup (degrades to local-only on any failure)
//! 5. program directory enrichment (informational, never changes the verdict)

pub mod allowlist;
pub mod heuristics;
pub mod normalize;
pub mod reputation;
pub mod types;

pub use allowlist::{Allowlist, AllowlistMatch, DomainKind};
pub use heuristics::HeuristicScanner;
pub use normalize::{host_of, normalize_url};
pub use reputation::{ReputationLookup, ReputationService, UrlReport, VirusTotalClient};
pub use types::{
    AnalysisStats, ClassificationResult, Evidence, EvidenceSource, ReputationStatus, ThreatType,
    Verdict,
};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::directory::ProgramDirectory;
use crate::error::ReputationError;

/// Upper bound on a single reputation lookup, on top of the client's own
/// HTTP timeout.
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Vendor names quoted in evidence.
const MAX_VENDOR_EVIDENCE: usize = 3;

pub struct ThreatClassifier {
    allowlist: Allowlist,
    heuristics: HeuristicScanner,
    reputation: Option<Arc<dyn ReputationService>>,
    directory: Option<ProgramDirectory>,
    lookup_timeout: Duration,
}

impl ThreatClassifier {
    pub fn new(
        reputation: Option<Arc<dyn ReputationService>>,
        directory: Option<ProgramDirectory>,
    ) -> Self {
        Self {
            allowlist: Allowlist::default(),
            heuristics: HeuristicScanner::default_rules(),
            reputation,
            directory,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_allowlist(mut self, allowlist: Allowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Classify a user-supplied link. Never fails: service problems show up
    /// as [`ReputationStatus::Unavailable`] with local-only evidence.
    pub async fn classify(&self, raw: &str) -> ClassificationResult {
        let url = normalize_url(raw);
        let host = host_of(&url);
        let authority = normalize::raw_authority(&url);
        let mut result = ClassificationResult::new(url, host);

        let allowlisted = result.host.as_deref().and_then(|h| self.allowlist.check(h));
        if let Some(m) = &allowlisted {
            result.absorb(m.verdict(), ThreatType::None);
            result.add_evidence(EvidenceSource::Allowlist, m.describe());
        }

        let findings = self
            .heuristics
            .scan(&result.url, &authority, result.host.as_deref());
        if !findings.is_empty() {
            result.absorb(Verdict::Suspicious, ThreatType::SuspiciousOther);
            for finding in findings {
                result.add_evidence(EvidenceSource::Heuristic, finding.reason);
            }
        }

        if allowlisted.is_some() {
            result.reputation = ReputationStatus::Skipped;
        } else if result.host.is_none() {
            result.reputation = ReputationStatus::Skipped;
            result.add_evidence(EvidenceSource::Heuristic, "not a valid web address");
        } else {
            self.check_reputation(&mut result).await;
        }

        self.enrich(&mut result).await;

        info!(
            url = %result.url,
            verdict = %result.verdict,
            threat = ?result.primary_threat_type,
            reputation = ?result.reputation,
            "Classified link"
        );
        result
    }

    async fn check_reputation(&self, result: &mut ClassificationResult) {
        let Some(service) = &self.reputation else {
            result.reputation = ReputationStatus::NotConfigured;
            result.add_evidence(
                EvidenceSource::Reputation,
                "reputation service not configured; local checks only",
            );
            return;
        };

        let lookup = match tokio::time::timeout(self.lookup_timeout, service.lookup(&result.url)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ReputationError::Timeout(self.lookup_timeout)),
        };

        match lookup {
            Ok(ReputationLookup::Found(report)) => {
                let (verdict, threat) = report.assess();
                result.absorb(verdict, threat);
                result.reputation = ReputationStatus::Checked;
                result.stats = Some(report.stats);

                let s = report.stats;
                result.add_evidence(
                    EvidenceSource::Reputation,
                    format!(
                        "{} malicious, {} suspicious, {} harmless, {} undetected",
                        s.malicious, s.suspicious, s.harmless, s.undetected
                    ),
                );
                for vendor in report.flagged().take(MAX_VENDOR_EVIDENCE) {
                    let label = vendor.result.as_deref().unwrap_or(&vendor.category);
                    result.add_evidence(
                        EvidenceSource::Reputation,
                        format!("{}: {}", vendor.engine, label),
                    );
                }
            }
            Ok(ReputationLookup::NotFound) => {
                result.reputation = ReputationStatus::Submitted;
                result.add_evidence(
                    EvidenceSource::Reputation,
                    "not previously analysed; submitted for scanning",
                );
                spawn_submit(Arc::clone(service), result.url.clone());
            }
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(error = %e, "Reputation service misconfigured");
                } else {
                    warn!(url = %result.url, error = %e, "Reputation lookup failed, using local checks only");
                }
                result.add_evidence(
                    EvidenceSource::Reputation,
                    format!("reputation service unavailable ({}); local checks only", e.reason()),
                );
                result.reputation = ReputationStatus::Unavailable(e.to_string());
            }
        }
    }

    async fn enrich(&self, result: &mut ClassificationResult) {
        let (Some(directory), Some(host)) = (&self.directory, result.host.as_deref()) else {
            return;
        };
        match directory.match_host(host).await {
            Ok(Some(program)) => {
                result.add_evidence(
                    EvidenceSource::Directory,
                    format!("domain matches official program {}", program.name),
                );
                result.matched_program = Some(program);
            }
            Ok(None) => {}
            Err(e) => warn!(host, error = %e, "Program directory lookup failed"),
        }
    }
}

/// Fire-and-forget submission of an unknown URL for scanning.
fn spawn_submit(service: Arc<dyn ReputationService>, url: String) {
    tokio::spawn(async move {
        match service.submit(&url).await {
            Ok(analysis_id) => info!(url, analysis_id, "Submitted URL for analysis"),
            Err(e) => warn!(url, error = %e, "URL submission failed"),
        }
    });
}
