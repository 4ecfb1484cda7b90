use std::time::Duration;

use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use teloxide::Bot;

use crate::command;
use crate::config::AppConfig;
use crate::error::{BotResult, HandlerResult};
use crate::handler::get_handler;
use crate::state::AppState;
use crate::utils::http;

const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(60 * 60);

pub struct BotService {
    pub bot: Throttle<Bot>,
    pub state: AppState,
}

impl BotService {
    pub async fn new() -> BotResult<Self> {
        info!("Initializing AppState...");
        let config = AppConfig::from_env()?;
        let bot = http::create_telegram_bot(&config.telegram.0)?;

        let state = AppState::new(config).await?;
        info!("AppState initialized");

        Ok(Self { bot, state })
    }

    pub async fn start(&self) -> HandlerResult<()> {
        info!("Testing connection to Telegram API...");
        match self.bot.get_me().await {
            Ok(me) => info!("Successfully connected to Telegram API as @{}", me.username()),
            Err(e) => {
                error!("Failed to connect to Telegram API: {:?}", e);
                return Err(anyhow::anyhow!("Failed to connect to Telegram API: {}", e).into());
            }
        }

        let bot = self.bot.clone();
        let state = self.state.clone();

        command::setup_user_commands(&bot).await?;

        self.start_session_cleanup_job();

        let handler = get_handler();

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![state])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }

    fn start_session_cleanup_job(&self) {
        let sessions = self.state.services.session.clone();
        let period = sessions
            .idle_ttl()
            .to_std()
            .unwrap_or(SESSION_CLEANUP_PERIOD)
            .clamp(Duration::from_secs(1), SESSION_CLEANUP_PERIOD);

        info!("Starting session cleanup job every {}s", period.as_secs());
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sessions.evict_idle();
            }
        });
    }
}
