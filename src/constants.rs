//! Shared constants used across the application.

/// User agent for course page fetches.
///
/// Course platforms serve stripped or blocked pages to obvious bots, which
/// would turn every check into UNKNOWN, so validation looks like a browser.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Maximum characters of page text kept for keyword matching.
pub const PAGE_TEXT_LIMIT: usize = 2000;

/// Maximum characters of post text sent to the classifier.
pub const CLASSIFIER_INPUT_LIMIT: usize = 4000;

/// Maximum candidate posts processed in one run; the rest wait for the next.
pub const CANDIDATE_BATCH_LIMIT: i64 = 200;
