use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::db::Channel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as number: {source}")]
    ParseFloat {
        name: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Telegram bot credentials.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
}

/// SMTP relay and addressing for email alerts.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
    pub to: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Reddit collector
    pub reddit_base_url: String,
    pub subreddits: Vec<String>,
    pub reddit_post_limit: u32,
    pub reddit_user_agent: String,
    pub collect_timeout: Duration,

    // Link validation
    pub fetch_retries: u32,
    pub validation_timeout: Duration,

    // AI scoring
    pub ai_api_key: String,
    pub ai_api_base: String,
    pub ai_model: String,
    pub ai_timeout: Duration,
    pub usefulness_threshold: f64,

    // Notifications
    pub channels: Vec<Channel>,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub notify_timeout: Duration,

    // Run policy
    pub lookback: Duration,
    pub claim_stale_after: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Credentials for a notification channel are only required when that
    /// channel is listed in `NOTIFY_CHANNELS`.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let channels = parse_channels(&env_or_default("NOTIFY_CHANNELS", "telegram"))?;

        let telegram = if channels.contains(&Channel::Telegram) {
            Some(TelegramConfig {
                api_base: env_or_default("TELEGRAM_API_BASE", "https://api.telegram.org"),
                bot_token: required_env("TELEGRAM_BOT_TOKEN")?,
                chat_id: required_env("TELEGRAM_CHAT_ID")?,
            })
        } else {
            None
        };

        let email = if channels.contains(&Channel::Email) {
            Some(EmailConfig {
                smtp_host: required_env("SMTP_HOST")?,
                smtp_port: parse_env_u16("SMTP_PORT", 587)?,
                smtp_user: required_env("SMTP_USER")?,
                smtp_pass: required_env("SMTP_PASS")?,
                from: required_env("NOTIFY_EMAIL_FROM")?,
                to: required_env("NOTIFY_EMAIL_TO")?,
            })
        } else {
            None
        };

        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/coursescout.sqlite",
            )),

            // Reddit collector
            reddit_base_url: env_or_default("REDDIT_BASE_URL", "https://www.reddit.com"),
            subreddits: parse_list(&env_or_default(
                "REDDIT_SUBREDDITS",
                "udemyfreebies,FreeUdemyCoupons",
            )),
            reddit_post_limit: parse_env_u32("REDDIT_POST_LIMIT", 50)?,
            reddit_user_agent: env_or_default("REDDIT_USER_AGENT", "CourseScoutAgent/0.1"),
            collect_timeout: Duration::from_secs(parse_env_u64("COLLECT_TIMEOUT_SECS", 10)?),

            // Link validation
            fetch_retries: parse_env_u32("FETCH_RETRIES", 2)?,
            validation_timeout: Duration::from_secs(parse_env_u64("VALIDATION_TIMEOUT_SECS", 10)?),

            // AI scoring
            ai_api_key: required_env("AI_API_KEY")?,
            ai_api_base: env_or_default("AI_API_BASE", "https://api.openai.com/v1"),
            ai_model: env_or_default("AI_MODEL", "gpt-4o-mini"),
            ai_timeout: Duration::from_secs(parse_env_u64("AI_TIMEOUT_SECS", 20)?),
            usefulness_threshold: parse_env_f64("USEFULNESS_THRESHOLD", 0.5)?,

            // Notifications
            channels,
            telegram,
            email,
            notify_timeout: Duration::from_secs(parse_env_u64("NOTIFY_TIMEOUT_SECS", 15)?),

            // Run policy
            lookback: parse_lookback_days()?,
            claim_stale_after: Duration::from_secs(parse_env_u64("CLAIM_STALE_SECS", 600)?),
        })
    }

    /// A configuration with inert defaults, for tests that override a few fields.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            reddit_base_url: "http://127.0.0.1:9".to_string(),
            subreddits: vec!["udemyfreebies".to_string()],
            reddit_post_limit: 50,
            reddit_user_agent: "CourseScoutAgent/0.1".to_string(),
            collect_timeout: Duration::from_secs(5),
            fetch_retries: 0,
            validation_timeout: Duration::from_secs(5),
            ai_api_key: "test-key".to_string(),
            ai_api_base: "http://127.0.0.1:9".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ai_timeout: Duration::from_secs(5),
            usefulness_threshold: 0.5,
            channels: vec![Channel::Telegram],
            telegram: Some(TelegramConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                bot_token: "123:TEST".to_string(),
                chat_id: "42".to_string(),
            }),
            email: None,
            notify_timeout: Duration::from_secs(5),
            lookback: Duration::from_secs(7 * 86_400),
            claim_stale_after: Duration::from_secs(600),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subreddits.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "REDDIT_SUBREDDITS".to_string(),
                message: "must list at least one subreddit".to_string(),
            });
        }
        if self.reddit_post_limit == 0 || self.reddit_post_limit > 100 {
            return Err(ConfigError::InvalidValue {
                name: "REDDIT_POST_LIMIT".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.ai_api_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "AI_API_KEY".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.usefulness_threshold) {
            return Err(ConfigError::InvalidValue {
                name: "USEFULNESS_THRESHOLD".to_string(),
                message: format!("must be within 0.0..=1.0, got {}", self.usefulness_threshold),
            });
        }
        if self.channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "NOTIFY_CHANNELS".to_string(),
                message: "must enable at least one channel".to_string(),
            });
        }
        for (name, timeout) in [
            ("COLLECT_TIMEOUT_SECS", self.collect_timeout),
            ("VALIDATION_TIMEOUT_SECS", self.validation_timeout),
            ("AI_TIMEOUT_SECS", self.ai_timeout),
            ("NOTIFY_TIMEOUT_SECS", self.notify_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        // A claim must outlive the send it guards, or an overlapping run takes it over mid-send.
        if self.claim_stale_after <= self.notify_timeout {
            return Err(ConfigError::InvalidValue {
                name: "CLAIM_STALE_SECS".to_string(),
                message: format!(
                    "must exceed NOTIFY_TIMEOUT_SECS ({}s), got {}s",
                    self.notify_timeout.as_secs(),
                    self.claim_stale_after.as_secs()
                ),
            });
        }
        if self.channels.contains(&Channel::Telegram) && self.telegram.is_none() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()));
        }
        if self.channels.contains(&Channel::Email) && self.email.is_none() {
            return Err(ConfigError::MissingEnvVar("SMTP_HOST".to_string()));
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_lookback_days() -> Result<Duration, ConfigError> {
    let days = parse_env_u64("LOOKBACK_DAYS", 7)?;
    days.checked_mul(86_400)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: "LOOKBACK_DAYS".to_string(),
            message: format!("{days} days is out of range"),
        })
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseFloat {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_channels(value: &str) -> Result<Vec<Channel>, ConfigError> {
    let mut channels = Vec::new();
    for name in parse_list(value) {
        let channel = Channel::from_str(&name.to_lowercase()).ok_or_else(|| {
            ConfigError::InvalidValue {
                name: "NOTIFY_CHANNELS".to_string(),
                message: format!("unknown channel '{name}', expected 'telegram' or 'email'"),
            }
        })?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    Ok(channels)
}
