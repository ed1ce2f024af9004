use crate::url::normalize::canonicalize;
use std::collections::HashSet;
use url::Url;

/// Resolves raw `href`/`src` values found on a page into canonical absolute URLs
///
/// Each raw link is resolved against `base`. Links are dropped when:
/// - they are empty or cannot be parsed
/// - `restrict_to_same_origin` is set and the resolved URL is not
///   `http`/`https` (`javascript:`, `mailto:`, `tel:` ...) or its hostname
///   differs from the base hostname (ports and trailing host dots are not
///   compared)
///
/// Unrestricted resolution keeps every scheme, so `data:` image sources
/// survive.
///
/// Survivors are canonicalized and duplicates within one call are collapsed.
/// Output order follows first appearance but carries no meaning.
///
/// # Examples
///
/// ```
/// use sumi_swarm::url::resolve;
///
/// let links = vec!["/about".to_string(), "https://other.com/".to_string()];
/// let resolved = resolve("https://example.com/index.html", &links, true);
/// assert_eq!(resolved, vec!["https://example.com/about".to_string()]);
/// ```
pub fn resolve<S: AsRef<str>>(
    base: &str,
    raw_links: &[S],
    restrict_to_same_origin: bool,
) -> Vec<String> {
    let base_url = match Url::parse(base) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Cannot resolve links against invalid base {}: {}", base, e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for raw in raw_links {
        let Some(canonical) = resolve_one(&base_url, raw.as_ref(), restrict_to_same_origin) else {
            continue;
        };
        if seen.insert(canonical.clone()) {
            resolved.push(canonical);
        }
    }

    resolved
}

fn resolve_one(base_url: &Url, raw: &str, restrict_to_same_origin: bool) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let absolute = match base_url.join(raw) {
        Ok(url) => url,
        Err(e) => {
            tracing::trace!("Dropping malformed link {:?}: {}", raw, e);
            return None;
        }
    };

    if restrict_to_same_origin {
        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }
        if origin_host(&absolute) != origin_host(base_url) {
            return None;
        }
    }

    Some(canonicalize(absolute))
}

/// Hostname as it will appear once canonicalized
fn origin_host(url: &Url) -> Option<&str> {
    url.host_str().map(|host| host.trim_end_matches('.'))
}
