//! Domain extraction and allow-list matching

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("domain regex is valid")
});

/// Public suffixes spanning two labels
const MULTI_LABEL_TLDS: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "ltd.uk", "plc.uk", "com.au", "net.au",
    "org.au", "edu.au", "gov.au", "co.nz", "org.nz", "net.nz", "co.jp", "ne.jp", "or.jp",
    "co.in", "net.in", "org.in", "co.za", "org.za", "com.br", "net.br", "org.br", "com.mx",
    "com.cn", "net.cn", "org.cn", "com.sg", "com.hk", "com.tr", "com.ar", "co.kr", "co.il",
];

/// Suffixes of hosts that only exist on developer machines or internal networks
const LOCAL_SUFFIXES: &[&str] = &[".localhost", ".local", ".test", ".internal", ".lan"];

const PRODUCTION_PREFIXES: &[&str] = &["www", "api", "app", "m", "cdn", "static"];
const TESTING_PREFIXES: &[&str] = &["stage", "staging", "test", "qa", "uat"];
const DEVELOPMENT_PREFIXES: &[&str] = &["dev", "local", "sandbox"];

/// Deployment environment the gateway runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Testing,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" | "staging" => Ok(Self::Testing),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || LOCAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

fn parse_ip(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
}

/// Registrable domain of `host`, stripping subdomains.
///
/// IP literals, single-label hosts and local development hosts are returned
/// unchanged (lowercased).
pub fn main_domain(host: &str) -> Result<String, DomainError> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() {
        return Err(DomainError::validation("Host cannot be empty"));
    }

    if parse_ip(&host).is_some() || is_local_host(&host) {
        return Ok(host);
    }

    if !DOMAIN_REGEX.is_match(&host) {
        return Err(DomainError::validation(format!("Invalid domain: {}", host)));
    }

    let labels: Vec<&str> = host.split('.').collect();

    if labels.len() <= 2 {
        return Ok(host);
    }

    let suffix = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_LABEL_TLDS.contains(&suffix.as_str()) {
        3
    } else {
        2
    };

    Ok(labels[labels.len() - keep..].join("."))
}

/// `candidate` strictly below `main` (never equal to it)
pub fn is_subdomain_of(candidate: &str, main: &str) -> bool {
    let candidate = candidate.trim().to_ascii_lowercase();
    let main = main.trim().to_ascii_lowercase();

    if main.is_empty() || candidate == main {
        return false;
    }

    candidate.ends_with(&format!(".{}", main))
}

/// Labels of `host` left of `main`; empty when they are equal
pub fn subdomain_prefix(host: &str, main: &str) -> Option<String> {
    let host = host.trim().to_ascii_lowercase();
    let main = main.trim().to_ascii_lowercase();

    if host == main {
        return Some(String::new());
    }

    if is_subdomain_of(&host, &main) {
        return Some(host[..host.len() - main.len() - 1].to_string());
    }

    None
}

/// Whether a subdomain prefix belongs to the environment's vocabulary.
///
/// Only the leftmost label is considered. An empty prefix (the bare main
/// domain) always matches.
pub fn matches_environment(prefix: &str, environment: Environment) -> bool {
    let prefix = prefix.trim().to_ascii_lowercase();

    if prefix.is_empty() {
        return true;
    }

    let label = prefix.split('.').next().unwrap_or_default();

    match environment {
        Environment::Production => PRODUCTION_PREFIXES.contains(&label),
        Environment::Testing => TESTING_PREFIXES.iter().any(|p| label.starts_with(p)),
        Environment::Development => DEVELOPMENT_PREFIXES.iter().any(|p| label.starts_with(p)),
    }
}

/// Host portion of an `Origin` or `Referer` value.
///
/// Strips scheme, credentials, path, port, IPv6 brackets and a trailing dot.
/// Returns `None` for empty and opaque (`null`) origins.
pub fn normalize_host(origin: &str) -> Option<String> {
    let mut rest = origin.trim();

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    }

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    rest = &rest[..end];

    if let Some(idx) = rest.rfind('@') {
        rest = &rest[idx + 1..];
    }

    let host = if let Some(stripped) = rest.strip_prefix('[') {
        stripped.split(']').next().unwrap_or_default()
    } else if rest.matches(':').count() == 1 {
        rest.split(':').next().unwrap_or_default()
    } else {
        rest
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() || host == "null" {
        return None;
    }

    Some(host)
}

/// Canonical form of a domain allow-list entry.
///
/// Accepts `*`, `*.host` and a bare host or origin (`https://app.example.com:8443/`
/// stores as `app.example.com`). Anything that is not a valid host is rejected.
pub fn normalize_allow_list_entry(entry: &str) -> Result<String, DomainError> {
    let entry = entry.trim();

    if entry == "*" {
        return Ok(entry.to_string());
    }

    let (wildcard, rest) = match entry.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, entry),
    };

    let host = normalize_host(rest)
        .ok_or_else(|| DomainError::validation(format!("Invalid domain allow-list entry: '{}'", entry)))?;

    let is_ip = parse_ip(&host).is_some();
    if main_domain(&host).is_err() || (!is_ip && !DOMAIN_REGEX.is_match(&host)) {
        return Err(DomainError::validation(format!(
            "Invalid domain allow-list entry: '{}'",
            entry
        )));
    }

    if wildcard && is_ip {
        return Err(DomainError::validation(format!(
            "Wildcard entries need a domain, not an IP: '{}'",
            entry
        )));
    }

    Ok(if wildcard { format!("*.{}", host) } else { host })
}

/// Whether `host` is covered by any allow-list entry.
///
/// Entry shapes:
/// - `*` matches every host
/// - `*.example.com` matches `example.com` and any subdomain
/// - `example.com` matches exactly, or a subdomain whose leftmost label fits
///   the deployment environment
pub fn matches_allow_list(host: &str, entries: &[String], environment: Environment) -> bool {
    let host = host.trim().to_ascii_lowercase();

    entries.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();

        if entry == "*" {
            return true;
        }

        if let Some(base) = entry.strip_prefix("*.") {
            return host == base || is_subdomain_of(&host, base);
        }

        if host == entry {
            return true;
        }

        subdomain_prefix(&host, &entry)
            .is_some_and(|prefix| matches_environment(&prefix, environment))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_entry_normalized() {
        assert_eq!(
            normalize_allow_list_entry("https://App.Example.com:8443/path").unwrap(),
            "app.example.com"
        );
        assert_eq!(normalize_allow_list_entry("*.Example.com.").unwrap(), "*.example.com");
        assert_eq!(normalize_allow_list_entry(" * ").unwrap(), "*");
        assert_eq!(normalize_allow_list_entry("localhost").unwrap(), "localhost");
    }

    #[test]
    fn test_allow_list_entry_rejected() {
        for entry in ["not a domain!!", "bad host!.local", "", "https://", "*.", "*.10.0.0.1", "null"] {
            assert!(
                matches!(normalize_allow_list_entry(entry), Err(DomainError::Validation { .. })),
                "{entry:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_main_domain_multi_label_tld() {
        assert_eq!(
            main_domain("api.staging.example.co.uk").unwrap(),
            "example.co.uk"
        );
        assert_eq!(main_domain("shop.example.com.au").unwrap(), "example.com.au");
    }

    #[test]
    fn test_main_domain_strips_subdomains() {
        assert_eq!(main_domain("a.b.example.com").unwrap(), "example.com");
        assert_eq!(main_domain("example.com").unwrap(), "example.com");
        assert_eq!(main_domain("WWW.Example.COM.").unwrap(), "example.com");
    }

    #[test]
    fn test_main_domain_passthrough() {
        assert_eq!(main_domain("localhost").unwrap(), "localhost");
        assert_eq!(main_domain("192.168.1.10").unwrap(), "192.168.1.10");
        assert_eq!(main_domain("::1").unwrap(), "::1");
        assert_eq!(main_domain("my_app.local").unwrap(), "my_app.local");
        assert_eq!(main_domain("intranet").unwrap(), "intranet");
    }

    #[test]
    fn test_main_domain_rejects_malformed() {
        assert!(main_domain("").is_err());
        assert!(main_domain("exa mple.com").is_err());
        assert!(main_domain("-bad.example.com").is_err());
        assert!(main_domain("bad..example.com").is_err());
    }

    #[test]
    fn test_is_subdomain_of() {
        assert!(!is_subdomain_of("example.com", "example.com"));
        assert!(is_subdomain_of("a.example.com", "example.com"));
        assert!(is_subdomain_of("a.b.example.com", "example.com"));
        assert!(!is_subdomain_of("badexample.com", "example.com"));
        assert!(!is_subdomain_of("example.com", ""));
    }

    #[test]
    fn test_subdomain_prefix() {
        assert_eq!(subdomain_prefix("example.com", "example.com"), Some(String::new()));
        assert_eq!(
            subdomain_prefix("dev.api.example.com", "example.com"),
            Some("dev.api".to_string())
        );
        assert_eq!(subdomain_prefix("other.com", "example.com"), None);
    }

    #[test]
    fn test_matches_environment() {
        assert!(matches_environment("", Environment::Production));
        assert!(matches_environment("", Environment::Development));

        assert!(matches_environment("www", Environment::Production));
        assert!(!matches_environment("dev", Environment::Production));

        assert!(matches_environment("staging2", Environment::Testing));
        assert!(matches_environment("qa", Environment::Testing));
        assert!(!matches_environment("www", Environment::Testing));

        assert!(matches_environment("dev-eu", Environment::Development));
        assert!(!matches_environment("stage", Environment::Development));
    }

    #[test]
    fn test_environment_vocabularies_do_not_overlap() {
        let samples = ["www", "api", "app", "stage", "test", "qa", "uat", "dev", "local", "sandbox"];
        for sample in samples {
            let hits = [
                Environment::Production,
                Environment::Testing,
                Environment::Development,
            ]
            .iter()
            .filter(|env| matches_environment(sample, **env))
            .count();
            assert_eq!(hits, 1, "{} matched {} environments", sample, hits);
        }
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("https://App.Example.com:8443/path?q=1").as_deref(),
            Some("app.example.com")
        );
        assert_eq!(normalize_host("example.com").as_deref(), Some("example.com"));
        assert_eq!(normalize_host("http://[::1]:3000").as_deref(), Some("::1"));
        assert_eq!(normalize_host("http://user:pw@host.io").as_deref(), Some("host.io"));
        assert_eq!(normalize_host("null"), None);
        assert_eq!(normalize_host("  "), None);
    }

    #[test]
    fn test_matches_allow_list_shapes() {
        let entries = vec!["*.shop.io".to_string(), "example.com".to_string()];

        assert!(matches_allow_list("shop.io", &entries, Environment::Production));
        assert!(matches_allow_list("eu.shop.io", &entries, Environment::Production));
        assert!(matches_allow_list("example.com", &entries, Environment::Production));
        assert!(matches_allow_list("www.example.com", &entries, Environment::Production));
        assert!(!matches_allow_list("dev.example.com", &entries, Environment::Production));
        assert!(matches_allow_list("dev.example.com", &entries, Environment::Development));
        assert!(!matches_allow_list("evil.com", &entries, Environment::Production));
    }

    #[test]
    fn test_matches_allow_list_wildcard_all() {
        let entries = vec!["*".to_string()];
        assert!(matches_allow_list("anything.net", &entries, Environment::Production));
        assert!(!matches_allow_list("anything.net", &[], Environment::Production));
    }
}
