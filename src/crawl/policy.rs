// src/crawl/policy.rs
// =============================================================================
// The URL policy filter.
//
// Two independent questions are answered here:
// - May this URL enter the frontier (be fetched and expanded)?
// - May this URL be yielded to consumers of the output stream?
//
// Both are pure functions of the URL and the run configuration, so they are
// evaluated outside any lock.
//
// Host matching is a suffix match against the start URL's host, which lets
// subdomains through ("blog.example.com" matches "example.com").
// =============================================================================

use url::Url;

use crate::config::CrawlConfig;

// Drops everything from the first '#' onwards
//
// Must be applied before any dedupe or filter decision, otherwise
// "page.html" and "page.html#top" would count as two URLs.
pub fn strip_fragment(link: &str) -> &str {
    match link.find('#') {
        Some(pos) => &link[..pos],
        None => link,
    }
}

// True when the URL's host ends with the start host
//
// URLs without a host (mailto:, data:, ...) are never internal.
pub fn is_internal(url: &Url, base_host: &str) -> bool {
    url.host_str()
        .map(|host| host.ends_with(base_host))
        .unwrap_or(false)
}

/// Decides whether `url` may be queued for fetching.
///
/// Returns `Err` when the URL does not parse as an absolute URL; callers skip
/// such links rather than treating them as fatal.
pub fn admit_to_frontier(url: &str, config: &CrawlConfig) -> Result<bool, url::ParseError> {
    let parsed = Url::parse(url)?;

    if !config.follow_external && !is_internal(&parsed, &config.base_host) {
        return Ok(false);
    }

    // "Is this a page, not an asset?"
    let path = parsed.path();
    if !config.extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
        return Ok(false);
    }

    Ok(!is_ignored(url, config))
}

// True when any ignore keyword occurs in the URL (case-insensitive)
pub fn is_ignored(url: &str, config: &CrawlConfig) -> bool {
    let lowered = url.to_lowercase();
    config
        .ignore
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// Decides whether `url` may be appended to the output stream.
///
/// Only the hide-external rule applies here. It is evaluated independently
/// of the frontier rules: an external URL can be fetched yet hidden, or
/// yielded without ever being fetched.
pub fn admit_to_output(url: &str, config: &CrawlConfig) -> bool {
    if !config.hide_external {
        return true;
    }

    match Url::parse(url) {
        Ok(parsed) => is_internal(&parsed, &config.base_host),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CrawlConfig {
        CrawlConfig::new("http://example.com/").unwrap()
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("http://example.com/a.html#top"), "http://example.com/a.html");
        assert_eq!(strip_fragment("http://example.com/a.html"), "http://example.com/a.html");
        assert_eq!(strip_fragment("#only"), "");
        assert_eq!(strip_fragment("http://x.com/#a#b"), "http://x.com/");
    }

    #[test]
    fn test_malformed_url_is_an_error() {
        assert!(admit_to_frontier("not a url", &config()).is_err());
        assert!(admit_to_frontier("/relative/page.html", &config()).is_err());
    }

    #[test]
    fn test_host_suffix_match() {
        let config = config();
        assert!(admit_to_frontier("http://example.com/a.html", &config).unwrap());
        assert!(admit_to_frontier("http://blog.example.com/", &config).unwrap());
        assert!(!admit_to_frontier("http://other.com/c.html", &config).unwrap());
    }

    #[test]
    fn test_follow_external_allows_other_hosts() {
        let config = config().with_follow_external(true);
        assert!(admit_to_frontier("http://other.com/c.html", &config).unwrap());
    }

    #[test]
    fn test_extension_whitelist() {
        let config = config();
        assert!(admit_to_frontier("http://example.com/b.php", &config).unwrap());
        assert!(admit_to_frontier("http://example.com/dir/", &config).unwrap());
        assert!(!admit_to_frontier("http://example.com/logo.png", &config).unwrap());
        assert!(!admit_to_frontier("http://example.com/style.css", &config).unwrap());
    }

    #[test]
    fn test_ignore_keywords_are_case_insensitive() {
        let config = config().with_ignore(vec!["LogOut".to_string()]);
        assert!(!admit_to_frontier("http://example.com/logout.php", &config).unwrap());
        assert!(!admit_to_frontier("http://example.com/LOGOUT/", &config).unwrap());
        assert!(admit_to_frontier("http://example.com/login.php", &config).unwrap());
    }

    #[test]
    fn test_is_ignored() {
        let config = config().with_ignore(vec!["admin".to_string()]);
        assert!(is_ignored("http://example.com/ADMIN/panel.php", &config));
        assert!(!is_ignored("http://example.com/index.php", &config));
        assert!(!is_ignored("http://example.com/admin/", &self::config()));
    }

    #[test]
    fn test_output_rule_is_independent_of_follow_external() {
        let visible = config();
        assert!(admit_to_output("http://other.com/c.html", &visible));

        let hidden = config().with_hide_external(true).with_follow_external(true);
        assert!(!admit_to_output("http://other.com/c.html", &hidden));
        assert!(admit_to_output("http://www.example.com/x.png", &hidden));
        assert!(!admit_to_output("garbage", &hidden));
    }
}
