use once_cell::sync::Lazy;
use regex::Regex;

use super::fetch::FetchedPage;
use super::traits::{
    find_keyword, is_voucher_link, redirected_to_closed_page, status_verdict, LinkValidator,
    Verdict,
};

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Match any HTTP(S) URL as fallback
        Regex::new(r"^https?://").expect("fallback pattern is valid"),
    ]
});

const CLOSED_KEYWORDS: &[&str] = &[
    "page not found",
    "no longer available",
    "enrollment closed",
    "enrollment is closed",
    "coupon has expired",
    "offer has expired",
];

/// Fallback for sites without a dedicated validator.
///
/// It can tell a dead link from a live one but cannot read a voucher, so a
/// live voucher link on an unsupported site stays UNKNOWN.
pub struct GenericValidator;

impl GenericValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for GenericValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkValidator for GenericValidator {
    fn site_id(&self) -> &'static str {
        "generic"
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        -100 // Lowest priority, fallback validator
    }

    fn assess(&self, url: &str, page: &FetchedPage) -> Verdict {
        if let Some(verdict) = status_verdict(page.status) {
            return verdict;
        }

        if page.final_url != url && redirected_to_closed_page(&page.final_url) {
            return Verdict::invalid(format!("Redirected to closed page: {}", page.final_url));
        }

        if let Some(keyword) = find_keyword(&page.text_lower(), CLOSED_KEYWORDS) {
            return Verdict::invalid(format!("Page indicates unavailability: '{keyword}'"));
        }

        if is_voucher_link(url) {
            return Verdict::unknown("Unsupported platform: voucher cannot be verified");
        }

        Verdict::valid("Link reachable")
    }
}
