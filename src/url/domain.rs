use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or None if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use recipe_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EDA.RU/recepty").unwrap();
/// assert_eq!(extract_domain(&url), Some("eda.ru".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches a wildcard pattern
///
/// `"eda.ru"` matches only `eda.ru`; `"*.eda.ru"` matches `eda.ru` and any
/// subdomain of it. Both arguments are expected in lowercase.
///
/// # Examples
///
/// ```
/// use recipe_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("eda.ru", "eda.ru"));
/// assert!(matches_wildcard("*.eda.ru", "www.eda.ru"));
/// assert!(!matches_wildcard("*.eda.ru", "noteda.ru"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// The set of domains the fetcher is permitted to contact
#[derive(Debug, Clone)]
pub struct DomainAllowList {
    patterns: Vec<String>,
}

impl DomainAllowList {
    /// Creates an allow-list from domain patterns (case-insensitive)
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Returns true if the URL's host matches any pattern
    pub fn is_allowed(&self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(domain) => self
                .patterns
                .iter()
                .any(|pattern| matches_wildcard(pattern, &domain)),
            None => false,
        }
    }

    /// Returns the configured patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
