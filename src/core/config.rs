use std::env;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_MEMBERSHIP_REFRESH_SECS: u64 = 300;
const DEFAULT_HISTORY_WINDOW: u16 = 50;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack_bot_token: String,
    /// Extraction pattern; the first capture group is the value linked to.
    pub match_pattern: String,
    /// Link template, every `{}` is replaced by a match value.
    pub link_url: String,
    pub poll_interval: Duration,
    pub membership_refresh: Duration,
    pub history_window: u16,
    pub thread_context_limit: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("{}: environment variable not found", key))
        };

        Ok(Self {
            slack_bot_token: required("SLACK_BOT_TOKEN")?,
            match_pattern: required("MATCH_PATTERN")?,
            link_url: required("LINK_URL")?,
            poll_interval: Duration::from_secs(
                parse_positive(&lookup, "POLL_INTERVAL_SECS")?
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            membership_refresh: Duration::from_secs(
                parse_positive(&lookup, "MEMBERSHIP_REFRESH_SECS")?
                    .unwrap_or(DEFAULT_MEMBERSHIP_REFRESH_SECS),
            ),
            history_window: parse_positive(&lookup, "HISTORY_WINDOW")?
                .unwrap_or(DEFAULT_HISTORY_WINDOW),
            thread_context_limit: parse_positive(&lookup, "THREAD_CONTEXT_LIMIT")?,
        })
    }
}

fn parse_positive<F, T>(lookup: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|e| format!("{}: {}", key, e))?;
    if value == T::default() {
        return Err(format!("{}: must be greater than zero", key));
    }
    Ok(Some(value))
}
