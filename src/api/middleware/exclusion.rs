//! Requests that skip authentication entirely

use axum::http::{header, HeaderMap, Method};

/// A path exclusion: exact, `/prefix/*` (one segment) or `/prefix/**` (any suffix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// Stored with its trailing slash
    SingleSegment(String),
    Recursive(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let pattern = pattern.trim();

        if !pattern.starts_with('/') {
            return Err(format!("Path pattern '{}' must start with '/'", pattern));
        }

        let parsed = if let Some(base) = pattern.strip_suffix("/**") {
            PathPattern::Recursive(format!("{}/", base))
        } else if let Some(base) = pattern.strip_suffix("/*") {
            PathPattern::SingleSegment(format!("{}/", base))
        } else {
            PathPattern::Exact(pattern.to_string())
        };

        if parsed.base().contains('*') {
            return Err(format!(
                "Path pattern '{}' may only use a wildcard as its last segment",
                pattern
            ));
        }

        Ok(parsed)
    }

    fn base(&self) -> &str {
        match self {
            PathPattern::Exact(p) | PathPattern::SingleSegment(p) | PathPattern::Recursive(p) => p,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::SingleSegment(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/')),
            PathPattern::Recursive(prefix) => {
                path.starts_with(prefix.as_str()) || path == &prefix[..prefix.len() - 1]
            }
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::Exact(p) => write!(f, "{}", p),
            PathPattern::SingleSegment(p) => write!(f, "{}*", p),
            PathPattern::Recursive(p) => write!(f, "{}**", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Preflight,
    HealthProbe,
    ExcludedPath,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Preflight => "preflight",
            BypassReason::HealthProbe => "health_probe",
            BypassReason::ExcludedPath => "excluded_path",
        }
    }
}

/// Decides which requests pass through untouched
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    patterns: Vec<PathPattern>,
    probe_user_agents: Vec<String>,
}

impl ExclusionRules {
    pub fn new(paths: &[String], probe_user_agents: &[String]) -> Result<Self, String> {
        let patterns = paths
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            probe_user_agents: probe_user_agents
                .iter()
                .map(|ua| ua.to_ascii_lowercase())
                .filter(|ua| !ua.is_empty())
                .collect(),
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Preflight and probes win over path rules
    pub fn bypass(&self, method: &Method, path: &str, headers: &HeaderMap) -> Option<BypassReason> {
        if is_preflight(method, headers) {
            return Some(BypassReason::Preflight);
        }

        if self.is_health_probe(headers) {
            return Some(BypassReason::HealthProbe);
        }

        if self.is_excluded(path) {
            return Some(BypassReason::ExcludedPath);
        }

        None
    }

    fn is_health_probe(&self, headers: &HeaderMap) -> bool {
        let Some(agent) = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };

        let agent = agent.to_ascii_lowercase();
        self.probe_user_agents
            .iter()
            .any(|probe| agent.starts_with(probe.as_str()))
    }
}

/// CORS preflight: OPTIONS carrying Access-Control-Request-Method
pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn rules() -> ExclusionRules {
        ExclusionRules::new(
            &[
                "/health".to_string(),
                "/swagger-ui/**".to_string(),
                "/static/*".to_string(),
            ],
            &["kube-probe".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_pattern() {
        let p = PathPattern::parse("/health").unwrap();
        assert!(p.matches("/health"));
        assert!(!p.matches("/health/db"));
        assert!(!p.matches("/healthz"));
    }

    #[test]
    fn test_single_segment_pattern() {
        let p = PathPattern::parse("/static/*").unwrap();
        assert!(p.matches("/static/app.js"));
        assert!(!p.matches("/static/js/app.js"));
        assert!(!p.matches("/static/"));
        assert!(!p.matches("/static"));
    }

    #[test]
    fn test_recursive_pattern() {
        let p = PathPattern::parse("/swagger-ui/**").unwrap();
        assert!(p.matches("/swagger-ui/index.html"));
        assert!(p.matches("/swagger-ui/a/b/c.css"));
        assert!(p.matches("/swagger-ui"));
        assert!(!p.matches("/swagger-uix"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("health").is_err());
        assert!(PathPattern::parse("/a/*/b").is_err());
        assert!(PathPattern::parse("/a*").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["/health", "/static/*", "/docs/**"] {
            assert_eq!(PathPattern::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_preflight_bypass_ignores_path() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        );

        assert_eq!(
            rules().bypass(&Method::OPTIONS, "/v1/protected", &headers),
            Some(BypassReason::Preflight)
        );
        // Plain OPTIONS is not a preflight
        assert_eq!(
            rules().bypass(&Method::OPTIONS, "/v1/protected", &HeaderMap::new()),
            None
        );
    }

    #[test]
    fn test_probe_user_agent_bypass() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("kube-probe/1.29"));

        assert_eq!(
            rules().bypass(&Method::GET, "/v1/protected", &headers),
            Some(BypassReason::HealthProbe)
        );
    }

    #[test]
    fn test_excluded_path_bypass() {
        assert_eq!(
            rules().bypass(&Method::GET, "/swagger-ui/index.html", &HeaderMap::new()),
            Some(BypassReason::ExcludedPath)
        );
        assert_eq!(rules().bypass(&Method::GET, "/v1/keys", &HeaderMap::new()), None);
    }
}
