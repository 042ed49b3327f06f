use url::Url;

/// Tracking parameters to strip from URLs.
///
/// Voucher parameters such as `couponCode` are deliberately absent: they are
/// what makes a link worth validating.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "gclsrc",
    "dclid",
    "igshid",
    "ref",
    "ref_src",
    "ref_url",
    "referer",
    "referrer",
    "share",
    "si",
    // Udemy affiliate attribution
    "ranmid",
    "raneaid",
    "ransiteid",
    "lsnpubid",
    "subid",
];

/// Normalize a URL so the same course link compares equal across posts.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.to_string();
    };

    // Skip non-HTTP URLs
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return url.to_string();
    }

    // Scheme is kept as posted; the parser already drops its default port.
    let mut normalized = parsed;

    let kept: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        normalized.set_query(None);
    } else {
        normalized.query_pairs_mut().clear().extend_pairs(kept);
    }

    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.ends_with('/') && path.len() > 1 {
        normalized.set_path(path.trim_end_matches('/'));
    }

    normalized.to_string()
}

/// Host of a URL, without a leading `www.`, lowercased.
#[must_use]
pub fn bare_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str()) || lower.starts_with("utm_")
}
