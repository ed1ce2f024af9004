//! HTML reference extraction
//!
//! Pulls the raw `href` of every `<a>` and the raw `src` of every `<img>`
//! out of a page. Values are returned exactly as written in the markup;
//! resolving and filtering them is the job of [`crate::url::resolve`].

use scraper::{Html, Selector};

/// Raw references found on an HTML page, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRefs {
    /// `href` values of `<a>` elements
    pub links: Vec<String>,

    /// `src` values of `<img>` elements
    pub image_srcs: Vec<String>,
}

impl ExtractedRefs {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.image_srcs.is_empty()
    }
}

/// Extracts anchor hrefs and image sources from HTML
///
/// The parser is error-tolerant: unclosed tags, stray end tags and
/// truncated documents never abort extraction, everything recognizable up
/// to the point of damage is returned. Elements missing the attribute
/// (`<a name="top">`, `<img alt="">`) are skipped.
///
/// # Example
///
/// ```
/// use sumi_swarm::crawler::extract_refs;
///
/// let refs = extract_refs(r#"<a href="/next">Next</a><img src="cat.png">"#);
/// assert_eq!(refs.links, vec!["/next".to_string()]);
/// assert_eq!(refs.image_srcs, vec!["cat.png".to_string()]);
/// ```
pub fn extract_refs(html: &str) -> ExtractedRefs {
    let document = Html::parse_document(html);
    let mut refs = ExtractedRefs::default();

    let Ok(selector) = Selector::parse("a[href], img[src]") else {
        return refs;
    };

    for element in document.select(&selector) {
        let element = element.value();
        match element.name() {
            "a" => {
                if let Some(href) = element.attr("href") {
                    refs.links.push(href.to_string());
                }
            }
            "img" => {
                if let Some(src) = element.attr("src") {
                    refs.image_srcs.push(src.to_string());
                }
            }
            _ => {}
        }
    }

    refs
}
