use crate::{UrlError, UrlResult};
use url::{Host, Url};

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Canonicalizes an absolute URL into the string used as the dedup key
///
/// # Normalization Steps
///
/// Parsing already lowercases the scheme and host, drops default ports and
/// removes `.`/`..` path segments. On top of that:
///
/// 1. Remove the fragment
/// 2. Remove trailing dots from the host
/// 3. Collapse runs of `/` in the path into one
/// 4. Uppercase percent-escapes and decode those that encode unreserved
///    characters (`A-Z a-z 0-9 - . _ ~`)
/// 5. Sort query parameters by key (stable, so repeated keys keep their order)
/// 6. Remove an empty query string (trailing `?`)
///
/// Trailing slashes are kept: `/dir/` and `/dir` can be different resources,
/// and the canonical form is also the base URL for relative links.
///
/// # Examples
///
/// ```
/// use sumi_swarm::url::canonicalize;
/// use url::Url;
///
/// let url = Url::parse("HTTP://A.com//x/%7euser?b=2&a=1#frag").unwrap();
/// assert_eq!(canonicalize(url), "http://a.com/x/~user?a=1&b=2");
/// ```
pub fn canonicalize(mut url: Url) -> String {
    url.set_fragment(None);

    let trimmed_host = match url.host() {
        Some(Host::Domain(domain)) if domain.ends_with('.') => {
            Some(domain.trim_end_matches('.').to_string())
        }
        _ => None,
    };
    if let Some(host) = trimmed_host.filter(|h| !h.is_empty()) {
        // The trimmed name is a prefix of an already valid host
        let _ = url.set_host(Some(&host));
    }

    if !url.cannot_be_a_base() {
        let path = normalize_path(url.path());
        url.set_path(&path);
    }

    if let Some(query) = url.query().map(normalize_query) {
        if query.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&query));
        }
    }

    url.into()
}

/// Parses and canonicalizes a URL string, accepting only `http` and `https`
pub fn canonicalize_str(url_str: &str) -> UrlResult<String> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(canonicalize(url))
}

/// Collapses duplicate separators and normalizes percent-escapes
fn normalize_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;

    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() {
        return "/".to_string();
    }

    normalize_percent_encoding(&collapsed)
}

/// Drops empty pairs, normalizes escapes and sorts pairs by key
fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(normalize_percent_encoding)
        .collect();

    pairs.sort_by(|a, b| query_key(a).cmp(query_key(b)));
    pairs.join("&")
}

fn query_key(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(key, _)| key)
}

/// Uppercases every `%xx` escape and decodes those that encode unreserved
/// characters. Malformed escapes are left untouched.
fn normalize_percent_encoding(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = high * 16 + low;
                if is_unreserved(decoded) {
                    out.push(decoded);
                } else {
                    out.extend_from_slice(&[
                        b'%',
                        UPPER_HEX[high as usize],
                        UPPER_HEX[low as usize],
                    ]);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    // Only ASCII sequences were rewritten, so the output stays valid UTF-8
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}
