//! Environment-driven configuration tests. These mutate process env, so they
//! run serially.

use std::time::Duration;

use course_scout::config::{Config, ConfigError};
use course_scout::db::Channel;
use serial_test::serial;

const VARS: &[&str] = &[
    "DATABASE_PATH",
    "REDDIT_BASE_URL",
    "REDDIT_SUBREDDITS",
    "REDDIT_POST_LIMIT",
    "REDDIT_USER_AGENT",
    "FETCH_RETRIES",
    "COLLECT_TIMEOUT_SECS",
    "VALIDATION_TIMEOUT_SECS",
    "AI_API_KEY",
    "AI_API_BASE",
    "AI_MODEL",
    "AI_TIMEOUT_SECS",
    "USEFULNESS_THRESHOLD",
    "NOTIFY_CHANNELS",
    "TELEGRAM_API_BASE",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
    "NOTIFY_EMAIL_FROM",
    "NOTIFY_EMAIL_TO",
    "NOTIFY_TIMEOUT_SECS",
    "LOOKBACK_DAYS",
    "CLAIM_STALE_SECS",
];

fn reset_env(vars: &[(&str, &str)]) {
    for name in VARS {
        std::env::remove_var(name);
    }
    for (name, value) in vars {
        std::env::set_var(name, value);
    }
}

const MINIMAL: &[(&str, &str)] = &[
    ("AI_API_KEY", "sk-test"),
    ("TELEGRAM_BOT_TOKEN", "123:ABC"),
    ("TELEGRAM_CHAT_ID", "42"),
];

#[test]
#[serial]
fn test_defaults() {
    reset_env(MINIMAL);

    let config = Config::from_env().expect("Minimal env should load");
    config.validate().expect("Defaults should validate");

    assert_eq!(config.subreddits, vec!["udemyfreebies", "FreeUdemyCoupons"]);
    assert_eq!(config.reddit_post_limit, 50);
    assert_eq!(config.reddit_user_agent, "CourseScoutAgent/0.1");
    assert_eq!(config.reddit_base_url, "https://www.reddit.com");
    assert_eq!(config.ai_model, "gpt-4o-mini");
    assert!((config.usefulness_threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.channels, vec![Channel::Telegram]);
    assert!(config.email.is_none());
    assert_eq!(config.lookback, Duration::from_secs(7 * 86_400));
    let telegram = config.telegram.expect("Telegram should be configured");
    assert_eq!(telegram.api_base, "https://api.telegram.org");
    assert_eq!(telegram.chat_id, "42");
}

#[test]
#[serial]
fn test_missing_ai_key_is_fatal() {
    reset_env(&[("TELEGRAM_BOT_TOKEN", "123:ABC"), ("TELEGRAM_CHAT_ID", "42")]);

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::MissingEnvVar(name)) if name == "AI_API_KEY"
    ));
}

#[test]
#[serial]
fn test_email_requires_smtp_settings() {
    reset_env(&[("AI_API_KEY", "sk-test"), ("NOTIFY_CHANNELS", "email")]);

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::MissingEnvVar(name)) if name == "SMTP_HOST"
    ));

    reset_env(&[
        ("AI_API_KEY", "sk-test"),
        ("NOTIFY_CHANNELS", "email"),
        ("SMTP_HOST", "smtp.example.com"),
        ("SMTP_PORT", "465"),
        ("SMTP_USER", "user"),
        ("SMTP_PASS", "pass"),
        ("NOTIFY_EMAIL_FROM", "scout@example.com"),
        ("NOTIFY_EMAIL_TO", "me@example.com"),
    ]);
    let config = Config::from_env().expect("Email env should load");
    assert_eq!(config.channels, vec![Channel::Email]);
    assert!(config.telegram.is_none());
    assert_eq!(config.email.unwrap().smtp_port, 465);
}

#[test]
#[serial]
fn test_overrides_and_parse_errors() {
    let mut vars = MINIMAL.to_vec();
    vars.extend([
        ("REDDIT_SUBREDDITS", "learnprogramming, udemyfreebies"),
        ("USEFULNESS_THRESHOLD", "0.75"),
        ("LOOKBACK_DAYS", "2"),
    ]);
    reset_env(&vars);

    let config = Config::from_env().unwrap();
    assert_eq!(config.subreddits, vec!["learnprogramming", "udemyfreebies"]);
    assert!((config.usefulness_threshold - 0.75).abs() < f64::EPSILON);
    assert_eq!(config.lookback, Duration::from_secs(2 * 86_400));

    std::env::set_var("REDDIT_POST_LIMIT", "lots");
    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::ParseInt { .. })
    ));

    std::env::set_var("REDDIT_POST_LIMIT", "500");
    let config = Config::from_env().unwrap();
    assert!(config.validate().is_err());

    reset_env(&[]);
}

#[test]
#[serial]
fn test_unknown_channel_rejected() {
    let mut vars = MINIMAL.to_vec();
    vars.push(("NOTIFY_CHANNELS", "telegram,pager"));
    reset_env(&vars);

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidValue { .. })
    ));
    reset_env(&[]);
}

#[test]
#[serial]
fn test_claim_window_must_exceed_send_timeout() {
    let mut vars = MINIMAL.to_vec();
    vars.extend([("CLAIM_STALE_SECS", "0"), ("NOTIFY_TIMEOUT_SECS", "15")]);
    reset_env(&vars);

    let config = Config::from_env().expect("Values parse");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { name, .. }) if name == "CLAIM_STALE_SECS"
    ));

    std::env::set_var("CLAIM_STALE_SECS", "10");
    assert!(Config::from_env().unwrap().validate().is_err());

    std::env::set_var("CLAIM_STALE_SECS", "16");
    assert!(Config::from_env().unwrap().validate().is_ok());

    reset_env(&[]);
}

#[test]
#[serial]
fn test_huge_lookback_rejected() {
    let mut vars = MINIMAL.to_vec();
    vars.push(("LOOKBACK_DAYS", "18446744073709551615"));
    reset_env(&vars);

    assert!(matches!(
        Config::from_env(),
        Err(ConfigError::InvalidValue { name, .. }) if name == "LOOKBACK_DAYS"
    ));
    reset_env(&[]);
}
