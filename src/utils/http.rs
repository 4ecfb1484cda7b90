use std::time::Duration;

use reqwest::Client;
use teloxide::{
    adaptors::{throttle::Limits, Throttle},
    requests::RequesterExt,
    Bot,
};

pub const DEFAULT_USER_AGENT: &str = "relaybot/0.1";

/// Builds the throttled bot on top of teloxide's own HTTP client settings.
pub fn create_telegram_bot(token: &str) -> anyhow::Result<Throttle<Bot>> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(DEFAULT_USER_AGENT)
        .build()?;

    Ok(Bot::with_client(token, client).throttle(Limits::default()))
}

/// Client for generation and speech APIs. Long completions and synchronous
/// predictions can take well over a minute.
pub fn create_api_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(180))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(DEFAULT_USER_AGENT)
        .build()
}
