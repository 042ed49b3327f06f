use serde::{Deserialize, Serialize};

/// A post collected from a source such as a subreddit.
///
/// Identity is `(source, source_id)`. Rows are written once and never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub community: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub permalink: Option<String>,
    /// JSON array of normalized URLs.
    pub links_json: String,
    pub published_at: Option<String>,
    pub discovered_at: String,
}

impl Post {
    /// Links extracted at collection time.
    #[must_use]
    pub fn links(&self) -> Vec<String> {
        serde_json::from_str(&self.links_json).unwrap_or_default()
    }

    /// Text handed to the classifier: title followed by body.
    #[must_use]
    pub fn text(&self) -> String {
        match (self.title.as_deref(), self.body.as_deref()) {
            (Some(title), Some(body)) if !body.trim().is_empty() => format!("{title}\n\n{body}"),
            (Some(title), _) => title.to_string(),
            (None, Some(body)) => body.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Human-readable identity, e.g. `reddit:abc123`.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}:{}", self.source, self.source_id)
    }
}

/// Data for upserting a collected post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub source: String,
    pub source_id: String,
    pub community: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub permalink: Option<String>,
    pub links: Vec<String>,
    pub published_at: Option<String>,
}

/// Outcome of a link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    /// The check could not be completed. Never treated as a final verdict.
    Unknown,
}

impl ValidationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Unknown => "UNKNOWN",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "VALID" => Some(Self::Valid),
            "INVALID" => Some(Self::Invalid),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A stored link check. Appended on every check, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ValidationResult {
    pub id: i64,
    pub post_id: i64,
    pub url: String,
    pub status: String,
    pub reason: String,
    pub final_url: Option<String>,
    pub http_status: Option<i64>,
    pub checked_at: String,
}

impl ValidationResult {
    #[must_use]
    pub fn status_enum(&self) -> Option<ValidationStatus> {
        ValidationStatus::from_str(&self.status)
    }
}

/// Data for appending a validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValidationResult {
    pub url: String,
    pub status: ValidationStatus,
    pub reason: String,
    pub final_url: Option<String>,
    pub http_status: Option<u16>,
}

/// Topic categories a post can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Programming Languages")]
    ProgrammingLanguages,
    #[serde(rename = "DevOps/Cloud")]
    DevOpsCloud,
    #[serde(rename = "Certifications")]
    Certifications,
    #[serde(rename = "Data Structures & Algorithms")]
    DataStructuresAlgorithms,
    #[serde(rename = "AI/ML")]
    AiMl,
    #[serde(rename = "Interview Prep")]
    InterviewPrep,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::ProgrammingLanguages,
        Self::DevOpsCloud,
        Self::Certifications,
        Self::DataStructuresAlgorithms,
        Self::AiMl,
        Self::InterviewPrep,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProgrammingLanguages => "Programming Languages",
            Self::DevOpsCloud => "DevOps/Cloud",
            Self::Certifications => "Certifications",
            Self::DataStructuresAlgorithms => "Data Structures & Algorithms",
            Self::AiMl => "AI/ML",
            Self::InterviewPrep => "Interview Prep",
            Self::Other => "Other",
        }
    }

    /// Match a label case-insensitively, ignoring surrounding whitespace.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
    }

    /// Like [`Category::from_str`] but unknown labels fall back to `Other`.
    #[must_use]
    pub fn from_label(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Other)
    }
}

/// AI-assigned usefulness and category for a post. One per post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Score {
    pub post_id: i64,
    pub usefulness: f64,
    pub category: String,
    pub model: String,
    pub produced_at: String,
}

impl Score {
    #[must_use]
    pub fn category_enum(&self) -> Category {
        Category::from_label(&self.category)
    }
}

/// Data for setting a post's score.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScore {
    pub usefulness: f64,
    pub category: Category,
    pub model: String,
}

/// Notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Email,
}

impl Channel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Email => "email",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "telegram" => Some(Self::Telegram),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof that a post was alerted on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub post_id: i64,
    pub channel: String,
    pub sent_at: String,
}

/// Result of upserting one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub post_id: i64,
    pub inserted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: Option<&str>, body: Option<&str>) -> Post {
        Post {
            id: 1,
            source: "reddit".to_string(),
            source_id: "abc123".to_string(),
            community: Some("udemyfreebies".to_string()),
            title: title.map(ToString::to_string),
            body: body.map(ToString::to_string),
            author: None,
            permalink: None,
            links_json: r#"["https://www.udemy.com/course/x?couponCode=FREE"]"#.to_string(),
            published_at: None,
            discovered_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_post_text_and_links() {
        let p = post(Some("Rust course"), Some("100% off today"));
        assert_eq!(p.text(), "Rust course\n\n100% off today");
        assert_eq!(p.identity(), "reddit:abc123");
        assert_eq!(
            p.links(),
            vec!["https://www.udemy.com/course/x?couponCode=FREE"]
        );

        assert_eq!(post(Some("Title only"), Some("  ")).text(), "Title only");
        assert_eq!(post(None, Some("Body")).text(), "Body");
    }

    #[test]
    fn test_corrupt_links_json_is_empty() {
        let mut p = post(None, None);
        p.links_json = "not json".to_string();
        assert!(p.links().is_empty());
    }

    #[test]
    fn test_category_labels() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
        }
        assert_eq!(
            Category::from_str(" devops/cloud "),
            Some(Category::DevOpsCloud)
        );
        assert_eq!(Category::from_label("Cooking"), Category::Other);
    }

    #[test]
    fn test_category_serde_uses_labels() {
        let json = serde_json::to_string(&Category::DataStructuresAlgorithms).unwrap();
        assert_eq!(json, r#""Data Structures & Algorithms""#);
        let parsed: Category = serde_json::from_str(r#""AI/ML""#).unwrap();
        assert_eq!(parsed, Category::AiMl);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ValidationStatus::Valid,
            ValidationStatus::Invalid,
            ValidationStatus::Unknown,
        ] {
            assert_eq!(ValidationStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ValidationStatus::from_str("valid"), None);
    }
}
