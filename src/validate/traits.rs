use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::fetch::FetchedPage;
use crate::db::ValidationStatus;

/// A validator's judgement on one fetched link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: ValidationStatus,
    pub reason: String,
}

impl Verdict {
    #[must_use]
    pub fn valid(reason: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Valid,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Invalid,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Unknown,
            reason: reason.into(),
        }
    }
}

/// Site-specific link validation.
///
/// Implementations only interpret an already-fetched page; fetching, timeouts
/// and network errors are handled by [`super::Validator`].
pub trait LinkValidator: Send + Sync {
    /// Unique identifier for this validator.
    fn site_id(&self) -> &'static str;

    /// URL patterns this validator matches.
    fn url_patterns(&self) -> &[Regex];

    /// Check if this validator can handle the given URL.
    fn can_handle(&self, url: &str) -> bool {
        self.url_patterns().iter().any(|p| p.is_match(url))
    }

    /// Priority for validator selection (higher = preferred).
    fn priority(&self) -> i32 {
        0
    }

    /// Judge the page fetched for `url`.
    fn assess(&self, url: &str, page: &FetchedPage) -> Verdict;
}

/// Query parameters that mark a link as a voucher.
const VOUCHER_PARAMS: &[&str] = &[
    "couponcode",
    "coupon_code",
    "coupon",
    "voucher",
    "promo",
    "promocode",
    "discountcode",
];

/// Final URLs that mean the offer is gone, whatever the site.
static CLOSED_REDIRECT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(
            r"(?i)/(enrollment[-_]closed|enrolment[-_]closed|course[-_]unavailable|coupon[-_]expired|expired|not[-_]found|404)(/|\?|#|$)",
        )
        .expect("closed pattern is valid"),
        Regex::new(r"(?i)[?&](error|reason)=(expired|closed|not_found|unavailable)")
            .expect("closed pattern is valid"),
    ]
});

/// Whether the link carries a coupon/voucher parameter.
#[must_use]
pub fn is_voucher_link(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| {
        u.query_pairs()
            .any(|(k, v)| !v.is_empty() && VOUCHER_PARAMS.contains(&k.to_lowercase().as_str()))
    })
}

/// Whether the page ended up somewhere that announces a closed/expired offer.
#[must_use]
pub fn redirected_to_closed_page(final_url: &str) -> bool {
    CLOSED_REDIRECT_PATTERNS
        .iter()
        .any(|p| p.is_match(final_url))
}

/// Verdict implied by the HTTP status alone, if any.
///
/// 404 and 410 (and other client errors) mean the link is dead. Rate limits,
/// auth walls and server errors only mean the check could not be completed.
#[must_use]
pub fn status_verdict(status: u16) -> Option<Verdict> {
    match status {
        200..=399 => None,
        404 => Some(Verdict::invalid("HTTP 404 - Page not found")),
        410 => Some(Verdict::invalid("HTTP 410 - Gone")),
        429 => Some(Verdict::unknown("HTTP 429 - Rate limited")),
        401 | 403 => Some(Verdict::unknown(format!(
            "HTTP {status} - Requires authentication"
        ))),
        400..=499 => Some(Verdict::invalid(format!("HTTP {status} - Client error"))),
        500..=599 => Some(Verdict::unknown(format!("HTTP {status} - Server error"))),
        _ => Some(Verdict::unknown(format!("HTTP {status} - Unexpected status"))),
    }
}

/// First keyword from `keywords` found in `haystack` (already lowercased).
#[must_use]
pub fn find_keyword<'a>(haystack: &str, keywords: &[&'a str]) -> Option<&'a str> {
    keywords.iter().copied().find(|k| haystack.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_voucher_link() {
        assert!(is_voucher_link(
            "https://www.udemy.com/course/x?couponCode=FREE"
        ));
        assert!(is_voucher_link("https://example.com/c?COUPON=abc"));
        assert!(!is_voucher_link("https://www.udemy.com/course/x"));
        assert!(!is_voucher_link("https://www.udemy.com/course/x?couponCode="));
        assert!(!is_voucher_link("not a url"));
    }

    #[test]
    fn test_redirected_to_closed_page() {
        assert!(redirected_to_closed_page(
            "https://www.udemy.com/enrollment-closed"
        ));
        assert!(redirected_to_closed_page(
            "http://127.0.0.1:8080/enrollment_closed?course=x"
        ));
        assert!(redirected_to_closed_page("https://site.com/course/x?error=expired"));
        assert!(!redirected_to_closed_page(
            "https://www.udemy.com/course/expired-python-tricks/"
        ));
        assert!(!redirected_to_closed_page("https://www.udemy.com/course/x"));
    }

    #[test]
    fn test_status_verdict() {
        assert_eq!(status_verdict(200), None);
        assert_eq!(status_verdict(301), None);
        assert_eq!(
            status_verdict(404).map(|v| v.status),
            Some(ValidationStatus::Invalid)
        );
        assert_eq!(
            status_verdict(410).map(|v| v.status),
            Some(ValidationStatus::Invalid)
        );
        assert_eq!(
            status_verdict(429).map(|v| v.status),
            Some(ValidationStatus::Unknown)
        );
        assert_eq!(
            status_verdict(403).map(|v| v.status),
            Some(ValidationStatus::Unknown)
        );
        assert_eq!(
            status_verdict(400).map(|v| v.status),
            Some(ValidationStatus::Invalid)
        );
        assert_eq!(
            status_verdict(503).map(|v| v.status),
            Some(ValidationStatus::Unknown)
        );
    }

    #[test]
    fn test_find_keyword() {
        assert_eq!(
            find_keyword("sorry, this course is no longer available", &["no longer available"]),
            Some("no longer available")
        );
        assert_eq!(find_keyword("all good", &["expired"]), None);
    }
}
