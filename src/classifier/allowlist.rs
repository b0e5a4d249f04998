//! Curated domain allow-lists.

use super::types::Verdict;

/// Government and official-program domains.
const GOVERNMENT_DOMAINS: &[&str] = &[
    "gov.ng",
    "boi.ng",
    "nirsal.com",
    "nasims.gov.ng",
    "cbn.gov.ng",
    "fmhds.gov.ng",
    "npower.gov.ng",
    "nsio.gov.ng",
    "firs.gov.ng",
    "nimc.gov.ng",
    "smedan.gov.ng",
];

/// Widely trusted global domains.
const GLOBAL_DOMAINS: &[&str] = &[
    "google.com",
    "youtube.com",
    "microsoft.com",
    "apple.com",
    "github.com",
    "wikipedia.org",
    "who.int",
    "un.org",
    "unicef.org",
    "worldbank.org",
    "imf.org",
    "afdb.org",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    Government,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistMatch {
    pub domain: String,
    pub kind: DomainKind,
}

impl AllowlistMatch {
    pub fn verdict(&self) -> Verdict {
        match self.kind {
            DomainKind::Government => Verdict::Safe,
            DomainKind::Global => Verdict::LikelySafe,
        }
    }

    pub fn describe(&self) -> String {
        match self.kind {
            DomainKind::Government => format!("{} is an official government domain", self.domain),
            DomainKind::Global => format!("{} is a widely trusted domain", self.domain),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Allowlist {
    government: Vec<String>,
    global: Vec<String>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new(
            GOVERNMENT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            GLOBAL_DOMAINS.iter().map(|d| d.to_string()).collect(),
        )
    }
}

impl Allowlist {
    pub fn new(government: Vec<String>, global: Vec<String>) -> Self {
        let clean = |v: Vec<String>| {
            v.into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        };
        Self {
            government: clean(government),
            global: clean(global),
        }
    }

    /// Match `host` against both lists.
    ///
    /// A host matches a domain when it equals it or is a subdomain of it. The
    /// longest matching domain wins; government wins a tie.
    pub fn check(&self, host: &str) -> Option<AllowlistMatch> {
        let host = host.trim_end_matches('.').to_lowercase();
        let gov = self
            .government
            .iter()
            .map(|d| (d, DomainKind::Government));
        let global = self.global.iter().map(|d| (d, DomainKind::Global));

        let mut best: Option<(&String, DomainKind)> = None;
        for (domain, kind) in gov.chain(global) {
            if !covers(domain, &host) {
                continue;
            }
            if best.is_none_or(|(b, _)| domain.len() > b.len()) {
                best = Some((domain, kind));
            }
        }

        best.map(|(domain, kind)| AllowlistMatch {
            domain: domain.clone(),
            kind,
        })
    }
}

/// `host` is `domain` itself or one of its subdomains.
pub(crate) fn covers(domain: &str, host: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
