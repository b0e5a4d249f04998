//! URL normalization and host extraction.

/// Normalize user input into the URL that gets classified.
///
/// Trims whitespace, prepends `https://` when no scheme is present and drops
/// a single trailing slash. Path, query and casing are otherwise preserved.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    if url.ends_with('/') {
        let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
        if url.len() - 1 > authority_start {
            url.pop();
        }
    }
    url
}

fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(0) | None => false,
        Some(idx) => {
            let scheme = &s[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

/// Raw authority text (`userinfo@host:port`) as typed, lower-cased.
///
/// Unlike [`host_of`] this does not go through the URL parser, so malformed
/// hosts survive for pattern checks.
pub fn raw_authority(url: &str) -> String {
    let rest = url.find("://").map(|i| &url[i + 3..]).unwrap_or(url);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    rest[..end].to_lowercase()
}

/// Parsed host, lower-cased with any trailing dot removed.
///
/// Internationalized names come back in their punycode (`xn--`) form.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    if host.is_empty() { None } else { Some(host) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_scheme_when_missing() {
        assert_eq!(normalize_url("  example.com "), "https://example.com");
        assert_eq!(normalize_url("example.com/path?q=1"), "https://example.com/path?q=1");
    }

    #[test]
    fn keeps_existing_scheme() {
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com/A"), "HTTPS://Example.com/A");
    }

    #[test]
    fn strips_one_trailing_slash() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("https://example.com/a//"), "https://example.com/a/");
        assert_eq!(normalize_url("https://"), "https://");
    }

    #[test]
    fn scheme_detection_rejects_garbage_prefix() {
        assert_eq!(normalize_url("://x.com"), "https://://x.com");
        assert_eq!(normalize_url("1ab://x.com"), "https://1ab://x.com");
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://WWW.Google.com/x").as_deref(), Some("www.google.com"));
        assert_eq!(host_of("https://example.com.").as_deref(), Some("example.com"));
        assert_eq!(host_of("https://user@1.2.3.4:8080/").as_deref(), Some("1.2.3.4"));
        assert_eq!(host_of("https://hello there"), None);
    }

    #[test]
    fn idn_hosts_become_punycode() {
        let host = host_of("https://bücher.example").unwrap();
        assert!(host.starts_with("xn--"), "{host}");
    }

    #[test]
    fn raw_authority_keeps_userinfo_and_port() {
        assert_eq!(raw_authority("https://Me@Bank.com:444/login"), "me@bank.com:444");
        assert_eq!(raw_authority("https://a..b.com?x=1"), "a..b.com");
    }
}
