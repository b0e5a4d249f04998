//! Classification result types.

use serde::Serialize;

use crate::directory::Program;

/// Coarse safety verdict. Variants are declared in ascending severity so the
/// derived ordering is the combination rule: the most severe tier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Unknown,
    Safe,
    LikelySafe,
    Suspicious,
    Dangerous,
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe | Self::LikelySafe)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Safe => "SAFE",
            Self::LikelySafe => "LIKELY_SAFE",
            Self::Suspicious => "SUSPICIOUS",
            Self::Dangerous => "DANGEROUS",
        };
        write!(f, "{s}")
    }
}

/// Primary threat category attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatType {
    None,
    Phishing,
    Malware,
    Spam,
    Scam,
    SuspiciousOther,
}

impl ThreatType {
    /// Whether this names a concrete threat family.
    pub fn is_specific(&self) -> bool {
        !matches!(self, Self::None | Self::SuspiciousOther)
    }

    /// Lower-case label for user-facing text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Phishing => "phishing",
            Self::Malware => "malware",
            Self::Spam => "spam",
            Self::Scam => "scam",
            Self::SuspiciousOther => "suspicious activity",
        }
    }
}

/// Which tier produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Allowlist,
    Heuristic,
    Reputation,
    Directory,
}

impl std::fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Allowlist => "allowlist",
            Self::Heuristic => "heuristic",
            Self::Reputation => "reputation",
            Self::Directory => "directory",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    pub detail: String,
}

/// Aggregated vendor counts from the reputation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub undetected: u32,
}

impl AnalysisStats {
    pub fn total(&self) -> u32 {
        self.malicious + self.suspicious + self.harmless + self.undetected
    }
}

/// What happened at the reputation tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ReputationStatus {
    /// Not consulted (allow-listed, or not a checkable URL).
    Skipped,
    /// No API key configured.
    NotConfigured,
    /// An existing analysis was found.
    Checked,
    /// Unknown to the service; submitted for a fresh scan.
    Submitted,
    /// The service could not be used for this request.
    Unavailable(String),
}

impl ReputationStatus {
    /// Whether the result rests on local checks only because of a service
    /// problem.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::Unavailable(_))
    }
}

/// Output of [`ThreatClassifier::classify`](super::ThreatClassifier::classify).
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    /// Normalized URL that was evaluated.
    pub url: String,
    /// Parsed host, if the input was a valid URL.
    pub host: Option<String>,
    pub verdict: Verdict,
    pub primary_threat_type: ThreatType,
    pub evidence: Vec<Evidence>,
    pub matched_program: Option<Program>,
    pub reputation: ReputationStatus,
    pub stats: Option<AnalysisStats>,
}

impl ClassificationResult {
    pub fn new(url: String, host: Option<String>) -> Self {
        Self {
            url,
            host,
            verdict: Verdict::Unknown,
            primary_threat_type: ThreatType::None,
            evidence: Vec::new(),
            matched_program: None,
            reputation: ReputationStatus::Skipped,
            stats: None,
        }
    }

    /// Fold one tier's verdict into the net result.
    ///
    /// The more severe verdict wins. At equal severity a concrete threat
    /// family replaces a generic one.
    pub fn absorb(&mut self, verdict: Verdict, threat: ThreatType) {
        if verdict > self.verdict {
            self.verdict = verdict;
            self.primary_threat_type = threat;
        } else if verdict == self.verdict
            && threat.is_specific()
            && !self.primary_threat_type.is_specific()
        {
            self.primary_threat_type = threat;
        }
    }

    pub fn add_evidence(&mut self, source: EvidenceSource, detail: impl Into<String>) {
        self.evidence.push(Evidence {
            source,
            detail: detail.into(),
        });
    }

    /// Evidence details from one source, in order.
    pub fn evidence_from(&self, source: EvidenceSource) -> impl Iterator<Item = &str> {
        self.evidence
            .iter()
            .filter(move |e| e.source == source)
            .map(|e| e.detail.as_str())
    }
}
