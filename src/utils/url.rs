//! URL utilities for consistent URL handling
//!
//! Helpers used when resolving app-shell paths against the upstream origin and
//! when logging URLs that may carry backend credentials.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SENSITIVE_PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:apikey|api_key|token|access_token|refresh_token|password|pass)=)[^&#]*")
        .expect("valid sensitive parameter pattern")
});

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Resolve a path (or absolute URL) against a base origin
    ///
    /// # Examples
    ///
    /// ```rust
    /// use estela_pod::utils::url::UrlUtils;
    /// use url::Url;
    ///
    /// let origin = Url::parse("https://pod.example.com/app/").unwrap();
    /// assert_eq!(
    ///     UrlUtils::resolve(&origin, "/index.html").unwrap().as_str(),
    ///     "https://pod.example.com/index.html"
    /// );
    /// ```
    pub fn resolve(base: &Url, path: &str) -> Result<Url, url::ParseError> {
        base.join(path)
    }

    /// Place a client-supplied path and query on a fixed origin
    ///
    /// Unlike [`UrlUtils::resolve`], the result always keeps the scheme, host
    /// and port of `origin`; a path such as `//other.host/x` stays a path.
    pub fn on_origin(origin: &Url, path: &str, query: Option<&str>) -> Url {
        let mut url = origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        url
    }

    /// Whether the URL uses a scheme the offline worker is allowed to handle
    pub fn is_http_scheme(url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    /// Obfuscate credentials in URLs for safe logging
    ///
    /// Replaces user info and well-known secret query parameters (API keys,
    /// tokens, passwords) with `****`.
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut new_url = parsed.clone();
            let _ = new_url.set_username("****");
            let _ = new_url.set_password(Some("****"));
            obfuscated = new_url.to_string();
        }

        SENSITIVE_PARAMS
            .replace_all(&obfuscated, "${1}****")
            .to_string()
    }
}
