use once_cell::sync::Lazy;
use regex::Regex;

use super::fetch::FetchedPage;
use super::traits::{
    find_keyword, is_voucher_link, redirected_to_closed_page, status_verdict, LinkValidator,
    Verdict,
};

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new(r"(?i)^https?://([a-z0-9-]+\.)?udemy\.com/").expect("Udemy pattern is valid")]
});

/// Landing spots Udemy redirects dead course and coupon links to.
static UDEMY_DEAD_ENDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^https?://(www\.)?udemy\.com/?(\?.*)?$").expect("pattern is valid"),
        Regex::new(r"(?i)^https?://(www\.)?udemy\.com/courses/search").expect("pattern is valid"),
    ]
});

const UNAVAILABLE_KEYWORDS: &[&str] = &[
    "course is no longer available",
    "we couldn't find the page",
    "we could not find the page",
    "not found",
    "enrollment closed",
    "enrollment is closed",
];

const EXPIRED_COUPON_KEYWORDS: &[&str] = &[
    "coupon has expired",
    "coupon code has expired",
    "coupon is expired",
    "coupon code is not valid",
    "coupon is no longer valid",
    "coupon code entered is not valid",
];

const AUTH_KEYWORDS: &[&str] = &["please log in", "access denied"];

/// Markers of an applied, active coupon on a course page.
const ACTIVE_COUPON_KEYWORDS: &[&str] = &[
    "100% off",
    "is applied",
    "coupon applied",
    "coupon code applied",
];

pub struct UdemyValidator {
    patterns: Vec<Regex>,
}

impl UdemyValidator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: PATTERNS.clone(),
        }
    }

    /// Match other URL patterns, e.g. a mirror or a local test server.
    #[must_use]
    pub fn with_patterns(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }
}

impl Default for UdemyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkValidator for UdemyValidator {
    fn site_id(&self) -> &'static str {
        "udemy"
    }

    fn url_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn priority(&self) -> i32 {
        100
    }

    fn assess(&self, url: &str, page: &FetchedPage) -> Verdict {
        if let Some(verdict) = status_verdict(page.status) {
            return verdict;
        }

        if page.final_url != url
            && (redirected_to_closed_page(&page.final_url)
                || UDEMY_DEAD_ENDS.iter().any(|p| p.is_match(&page.final_url)))
        {
            return Verdict::invalid(format!("Redirected to closed page: {}", page.final_url));
        }

        let text = page.text_lower();

        if let Some(keyword) = find_keyword(&text, UNAVAILABLE_KEYWORDS) {
            return Verdict::invalid(format!("Page indicates unavailability: '{keyword}'"));
        }

        if let Some(keyword) = find_keyword(&text, AUTH_KEYWORDS) {
            return Verdict::unknown(format!("Requires authentication: '{keyword}'"));
        }

        if !is_voucher_link(url) {
            return Verdict::valid("Course page accessible");
        }

        if let Some(keyword) = find_keyword(&text, EXPIRED_COUPON_KEYWORDS) {
            return Verdict::invalid(format!("Coupon expired: '{keyword}'"));
        }

        match find_keyword(&text, ACTIVE_COUPON_KEYWORDS) {
            Some(keyword) => Verdict::valid(format!("Active coupon: '{keyword}'")),
            None => Verdict::invalid("Coupon indicator absent"),
        }
    }
}
