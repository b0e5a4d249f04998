//! Local pattern checks for phishing-style URLs.
//!
//! Runs on every classification, including allow-listed hosts, and never
//! touches the network:
//! - credential/payment keywords anywhere in the URL
//! - punycode hosts, doubled dots or hyphens, raw IPv4 hosts, userinfo

use regex::Regex;
use tracing::debug;

/// Keywords that phishing pages tend to carry in their URL.
pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "login", "signin", "password", "bank", "verify", "secure", "account", "pay", "confirm",
    "update", "wallet", "bvn",
];

/// Which part of the URL a rule matches against.
#[derive(Debug, Clone, Copy)]
pub enum RuleField {
    /// The authority exactly as typed (`userinfo@host:port`).
    Authority,
    /// Parsed host, or the raw authority when parsing failed.
    Host,
    /// Authority with punycode `xn--` markers removed.
    Labels,
}

/// A single host-shape rule with a compiled regex.
#[derive(Debug, Clone)]
pub struct HostRule {
    pub regex: Regex,
    pub field: RuleField,
    pub reason: String,
}

/// One heuristic hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicFinding {
    pub reason: String,
}

pub struct HeuristicScanner {
    keywords: Regex,
    host_rules: Vec<HostRule>,
}

impl Default for HeuristicScanner {
    fn default() -> Self {
        Self::default_rules()
    }
}

impl HeuristicScanner {
    pub fn default_rules() -> Self {
        let keywords = Regex::new(&format!("(?i)({})", SUSPICIOUS_KEYWORDS.join("|"))).unwrap();

        let host_rules = vec![
            HostRule {
                regex: Regex::new(r"(^|[.@])xn--").unwrap(),
                field: RuleField::Host,
                reason: "internationalized (punycode) host name".into(),
            },
            HostRule {
                regex: Regex::new(r"\.\.").unwrap(),
                field: RuleField::Authority,
                reason: "doubled dots in host name".into(),
            },
            HostRule {
                regex: Regex::new(r"--").unwrap(),
                field: RuleField::Labels,
                reason: "doubled hyphens in host name".into(),
            },
            HostRule {
                regex: Regex::new(r"^(?:[^@]*@)?\d{1,3}(?:\.\d{1,3}){3}(?::\d+)?$").unwrap(),
                field: RuleField::Authority,
                reason: "raw IP address instead of a domain".into(),
            },
            HostRule {
                regex: Regex::new(r"@").unwrap(),
                field: RuleField::Authority,
                reason: "embedded credentials (@) before the host".into(),
            },
        ];

        Self {
            keywords,
            host_rules,
        }
    }

    /// Scan a normalized URL.
    ///
    /// `authority` is the raw authority text; `host` the parsed host, if any.
    pub fn scan(&self, url: &str, authority: &str, host: Option<&str>) -> Vec<HeuristicFinding> {
        let mut findings = Vec::new();

        let lowered = url.to_lowercase();
        let mut hits: Vec<&str> = Vec::new();
        for m in self.keywords.find_iter(&lowered) {
            if !hits.contains(&m.as_str()) {
                hits.push(m.as_str());
            }
        }
        if !hits.is_empty() {
            findings.push(HeuristicFinding {
                reason: format!("suspicious keywords in link: {}", hits.join(", ")),
            });
        }

        let labels = authority.replace("xn--", "");
        let host = host.unwrap_or(authority);
        for rule in &self.host_rules {
            let text = match rule.field {
                RuleField::Authority => authority,
                RuleField::Host => host,
                RuleField::Labels => labels.as_str(),
            };
            if rule.regex.is_match(text) {
                findings.push(HeuristicFinding {
                    reason: rule.reason.clone(),
                });
            }
        }

        if !findings.is_empty() {
            debug!(url, findings = findings.len(), "Heuristic findings");
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::normalize::{host_of, raw_authority};

    fn scan(url: &str) -> Vec<String> {
        let scanner = HeuristicScanner::default_rules();
        let authority = raw_authority(url);
        let host = host_of(url);
        scanner
            .scan(url, &authority, host.as_deref())
            .into_iter()
            .map(|f| f.reason)
            .collect()
    }

    #[test]
    fn clean_url_has_no_findings() {
        assert!(scan("https://example.com/about").is_empty());
    }

    #[test]
    fn keywords_are_reported_once_each() {
        let reasons = scan("https://Bank-Login.xyz/login/verify");
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0], "suspicious keywords in link: bank, login, verify");
    }

    #[test]
    fn keyword_match_is_substring() {
        let reasons = scan("https://shop.test/payment");
        assert_eq!(reasons, vec!["suspicious keywords in link: pay"]);
    }

    #[test]
    fn punycode_host_flagged() {
        let reasons = scan("https://xn--pple-43d.com");
        assert!(reasons.iter().any(|r| r.contains("punycode")));
        // The xn-- prefix alone is not a doubled hyphen.
        assert!(!reasons.iter().any(|r| r.contains("hyphens")));
    }

    #[test]
    fn unicode_host_flagged_as_punycode() {
        let reasons = scan("https://bücher.example");
        assert!(reasons.iter().any(|r| r.contains("punycode")));
    }

    #[test]
    fn doubled_separators_flagged() {
        assert!(scan("https://a..b.com").iter().any(|r| r.contains("dots")));
        assert!(scan("https://cbn--grants.com").iter().any(|r| r.contains("hyphens")));
    }

    #[test]
    fn ip_host_and_userinfo_flagged() {
        let reasons = scan("https://192.168.10.4:8080/x");
        assert!(reasons.iter().any(|r| r.contains("IP address")));

        let reasons = scan("https://google.com@evil.test/");
        assert!(reasons.iter().any(|r| r.contains("credentials")));
    }
}
