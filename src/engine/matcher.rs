use regex::Regex;

use crate::core::models::MatchSet;
use crate::errors::BotError;

/// Extracts the first capture group of every occurrence of a configured pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `BotError::PatternError` if the pattern does not compile or has
    /// no capture group. Both are startup-time failures.
    pub fn new(pattern: &str) -> Result<Self, BotError> {
        let regex = Regex::new(pattern)?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 2 {
            return Err(BotError::PatternError(format!(
                "pattern `{}` has no capture group",
                pattern
            )));
        }
        Ok(Self { regex })
    }

    /// Scans `text` left to right over non-overlapping occurrences.
    ///
    /// An occurrence whose first group did not participate contributes nothing.
    #[must_use]
    pub fn extract(&self, text: &str) -> MatchSet {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}
