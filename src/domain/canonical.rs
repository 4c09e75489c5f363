//! Canonical URL form used as the dedup key.
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Query parameters stripped before comparison; matched on the lowercased name.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "fbclid",
    "gclid",
    "igshid",
    "mc_cid",
    "mc_eid",
    "ref",
    "ref_src",
    "spm",
];

/// Produces the deterministic canonical string form of a URL, or `None` when
/// the input cannot be canonicalized. Two URLs differing only in tracking
/// params, fragment, default port, scheme/host case, or a trailing slash map
/// to the same output, and the function is idempotent over its own results.
pub fn canonicalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let input: String = trimmed.nfc().collect();

    let absolute = if has_http_scheme(&input) {
        input
    } else {
        format!("https://{input}")
    };
    let parsed = Url::parse(&absolute).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();

    let query = parsed.query().map(normalize_query).filter(|q| !q.is_empty());

    let path = parsed.path();
    let path = if path == "/" {
        // A bare root path only survives when a query follows it.
        if query.is_some() {
            "/"
        } else {
            ""
        }
    } else {
        path.strip_suffix('/').unwrap_or(path)
    };

    let mut out = format!("{scheme}://{host}");
    if let Some(port) = parsed.port() {
        // `Url::port` is `None` for the scheme default, so anything left here
        // is an explicit non-default port.
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(path);
    if let Some(q) = query {
        out.push('?');
        out.push_str(&q);
    }
    Some(out)
}

fn has_http_scheme(s: &str) -> bool {
    let head: String = s.chars().take(8).collect::<String>().to_ascii_lowercase();
    head.starts_with("http://") || head.starts_with("https://")
}

/// Drops tracking params and sorts the survivors by key, keeping each
/// raw `key=value` chunk verbatim.
fn normalize_query(query: &str) -> String {
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .filter(|p| !TRACKING_PARAMS.contains(&key_of(p).to_ascii_lowercase().as_str()))
        .collect();
    params.sort_by(|a, b| key_of(a).cmp(key_of(b)));
    params.join("&")
}

fn key_of(param: &str) -> &str {
    param.split('=').next().unwrap_or(param)
}
