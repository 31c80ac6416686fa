// src/fetch/html.rs
// =============================================================================
// Pulls categorized links and forms out of an HTML document.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// Links are grouped by the attribute they came from:
// - "href":   <a>, <area>, <link>
// - "src":    <img>, <script>, <iframe>, <frame>, <embed>, <source>
// - "action": <form>
//
// Every link is resolved against the page URL; only http/https results are
// kept. Document order is preserved inside each category.
//
// Note: scraper's Html is not Send, so parsing happens in plain (non-async)
// functions and only owned Strings come back out.
// =============================================================================

use std::collections::{BTreeMap, HashMap};

use scraper::{Html, Selector};
use url::Url;

use super::Form;

const LINK_SOURCES: [(&str, &str, &str); 3] = [
    ("href", "a[href], area[href], link[href]", "href"),
    (
        "src",
        "img[src], script[src], iframe[src], frame[src], embed[src], source[src]",
        "src",
    ),
    ("action", "form[action]", "action"),
];

// Parses a document and returns (links by category, forms)
pub(crate) fn parse_document(html: &str, page_url: &Url) -> (BTreeMap<String, Vec<String>>, Vec<Form>) {
    let document = Html::parse_document(html);
    (extract_links(&document, page_url), extract_forms(&document, page_url))
}

fn extract_links(document: &Html, base: &Url) -> BTreeMap<String, Vec<String>> {
    let mut links = BTreeMap::new();

    for (category, css, attribute) in LINK_SOURCES {
        // Constant selectors, known to be valid
        let selector = Selector::parse(css).unwrap();

        let found: Vec<String> = document
            .select(&selector)
            .filter_map(|element| element.value().attr(attribute))
            .filter_map(|raw| resolve_url(base, raw))
            .filter(|url| is_web_link(url))
            .collect();

        links.insert(category.to_string(), found);
    }

    links
}

fn extract_forms(document: &Html, base: &Url) -> Vec<Form> {
    let selector = Selector::parse("form").unwrap();

    document
        .select(&selector)
        .map(|element| {
            let attributes: HashMap<String, String> = element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_lowercase(), value.to_string()))
                .collect();

            let action = attributes
                .get("action")
                .map(|raw| resolve_url(base, raw).unwrap_or_else(|| raw.clone()))
                .unwrap_or_else(|| base.to_string());

            let method = attributes
                .get("method")
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "get".to_string());

            Form {
                action,
                method,
                attributes,
            }
        })
        .collect()
}

// Resolves a possibly-relative URL to an absolute URL
//
// Examples:
//   base = "https://example.com/page"
//   href = "/docs" -> Some("https://example.com/docs")
//   href = "../other" -> Some("https://example.com/other")
//   href = "https://other.com" -> Some("https://other.com/")
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.join(href).ok().map(|url| url.to_string()),
    }
}

// Skips mailto:, tel:, javascript:, data: and friends
fn is_web_link(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn test_links_are_categorized() {
        let html = r#"
            <a href="/docs">Docs</a>
            <link href="style.css" rel="stylesheet">
            <img src="../logo.png">
            <script src="https://cdn.other.com/app.js"></script>
            <form action="login.php" method="POST"></form>
        "#;
        let (links, _) = parse_document(html, &base());

        assert_eq!(
            links["href"],
            vec!["https://example.com/docs", "https://example.com/dir/style.css"]
        );
        assert_eq!(
            links["src"],
            vec!["https://example.com/logo.png", "https://cdn.other.com/app.js"]
        );
        assert_eq!(links["action"], vec!["https://example.com/dir/login.php"]);
    }

    #[test]
    fn test_fragments_are_kept_for_the_caller() {
        let html = r##"<a href="#top">Top</a><a href="other.html#part">Other</a>"##;
        let (links, _) = parse_document(html, &base());
        assert_eq!(
            links["href"],
            vec![
                "https://example.com/dir/page.html#top",
                "https://example.com/dir/other.html#part"
            ]
        );
    }

    #[test]
    fn test_skip_non_web_schemes() {
        let html = r#"
            <a href="mailto:test@example.com">Email</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:+123">Call</a>
        "#;
        let (links, _) = parse_document(html, &base());
        assert!(links["href"].is_empty());
    }

    #[test]
    fn test_forms() {
        let html = r#"
            <form action="/search" method="GET"><input name="q"></form>
            <form id="bare"></form>
        "#;
        let (_, forms) = parse_document(html, &base());

        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].action, "https://example.com/search");
        assert_eq!(forms[0].method, "get");
        assert_eq!(forms[1].method, "get");
        assert_eq!(forms[1].action, "https://example.com/dir/page.html");
        assert_eq!(forms[1].attr("id"), Some("bare"));
    }
}
