use anyhow::Result;
use tracing::{error, info};

use linkbot::core::config::AppConfig;
use linkbot::BotError;
use linkbot::engine::LinkEngine;
use linkbot::slack::{HistoryEventSource, SlackBot};
use linkbot::worker::Poller;

#[tokio::main]
async fn main() -> Result<()> {
    linkbot::setup_logging();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        BotError::ConfigError(e)
    })?;

    // A bad pattern or template must stop us before any polling starts.
    let engine = LinkEngine::from_config(&config).inspect_err(|e| error!("{}", e))?;

    let bot = SlackBot::new(&config);
    bot.connect().await?;

    let source = HistoryEventSource::new(bot.slack_client().clone(), config.history_window);
    let mut poller = Poller::new(engine, source, bot.clone(), bot).configured(&config);

    info!("Link bot running, pattern `{}`", config.match_pattern);
    poller.run().await;

    Ok(())
}
