use crate::core::models::{MatchSet, OutgoingMessage, ThreadKey};
use crate::errors::BotError;

/// Placeholder replaced by the match value in a link template.
pub const PLACEHOLDER: &str = "{}";

/// Link template such as `https://jira.example.com/browse/{}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    template: String,
}

impl LinkTemplate {
    /// # Errors
    ///
    /// Returns `BotError::TemplateError` when the template is blank or has no
    /// `{}` placeholder.
    pub fn new(template: &str) -> Result<Self, BotError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(BotError::TemplateError("template is empty".to_string()));
        }
        if !template.contains(PLACEHOLDER) {
            return Err(BotError::TemplateError(format!(
                "`{}` has no {} placeholder",
                template, PLACEHOLDER
            )));
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Substitutes `value` for every placeholder.
    #[must_use]
    pub fn render(&self, value: &str) -> String {
        self.template.replace(PLACEHOLDER, value)
    }
}

/// Builds the thread reply for `matches`, one formatted link per line.
///
/// Returns `None` for an empty match set so no empty reply is ever posted.
#[must_use]
pub fn compose(
    channel_id: &str,
    thread_key: &ThreadKey,
    matches: &MatchSet,
    template: &LinkTemplate,
) -> Option<OutgoingMessage> {
    if matches.is_empty() {
        return None;
    }

    let formatted_text = matches
        .iter()
        .map(|value| template.render(value))
        .collect::<Vec<_>>()
        .join("\n");

    Some(OutgoingMessage {
        channel_id: channel_id.to_string(),
        thread_key: thread_key.clone(),
        match_values: matches.as_slice().to_vec(),
        formatted_text,
    })
}
