use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::{
    types::{Message, UserId},
    Bot,
};

use crate::command::{self, Command};
use crate::error::{BotError, HandlerResult};
use crate::service::{ledger::LedgerError, purchase::PurchaseStage};
use crate::state::AppState;

use super::keyboard::{get_main_menu_keyboard, get_packages_keyboard};
use super::sender_id;

/// Renders a ledger-backed reply. A failed ledger call is logged with the user and
/// operation and turned into the retry-later notice.
fn ledger_reply<T, F>(user_id: UserId, operation: &str, result: Result<T, LedgerError>, render: F) -> String
where
    F: FnOnce(T) -> String,
{
    match result {
        Ok(value) => render(value),
        Err(e) => {
            error!("Ledger {} failed for user {}: {}", operation, user_id, e);
            t!("messages.try_again_later").to_string()
        }
    }
}

pub(super) async fn handle_start(bot: Throttle<Bot>, msg: Message, state: AppState) -> HandlerResult<()> {
    let user = msg.from.as_ref().ok_or(BotError::MissingField("sender"))?;
    let services = &state.services;

    let free_allowance = services.meter.free_interactions();

    let welcome_text = ledger_reply(user.id, "get", services.ledger.get(user.id).await, |account| {
        t!(
            "commands.start",
            first_name = user.first_name,
            free_left = account.free_left(free_allowance),
            credits = account.credit_balance
        )
        .to_string()
    });

    bot.send_message(msg.chat.id, welcome_text)
        .reply_markup(get_main_menu_keyboard())
        .await?;

    if state.config.is_admin(user.id) {
        command::setup_admin_commands(&bot, msg.chat.id).await?;
    }

    debug!("Sent welcome message to user {}", user.id);
    Ok(())
}

pub(super) async fn handle_help(bot: Throttle<Bot>, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("commands.help"))
        .reply_markup(get_main_menu_keyboard())
        .await?;

    Ok(())
}

pub(super) async fn handle_balance(bot: Throttle<Bot>, msg: Message, state: AppState) -> HandlerResult<()> {
    let user_id = sender_id(&msg)?;
    let services = &state.services;

    let free_allowance = services.meter.free_interactions();

    let text = ledger_reply(user_id, "get", services.ledger.get(user_id).await, |account| {
        t!(
            "commands.balance",
            free_left = account.free_left(free_allowance),
            credits = account.credit_balance
        )
        .to_string()
    });

    bot.send_message(msg.chat.id, text)
        .reply_markup(get_main_menu_keyboard())
        .await?;

    debug!("Displayed balance to user {}", user_id);
    Ok(())
}

pub(super) async fn handle_audio(bot: Throttle<Bot>, msg: Message, state: AppState) -> HandlerResult<()> {
    let user_id = sender_id(&msg)?;
    let services = &state.services;

    let text = if services.session.toggle_audio(user_id) {
        if services.reply.speech_available() {
            t!("commands.audio.enabled")
        } else {
            t!("commands.audio.unavailable")
        }
    } else {
        t!("commands.audio.disabled")
    };

    bot.send_message(msg.chat.id, text)
        .reply_markup(get_main_menu_keyboard())
        .await?;

    Ok(())
}

pub(super) async fn handle_buy(bot: Throttle<Bot>, msg: Message, state: AppState) -> HandlerResult<()> {
    let user_id = sender_id(&msg)?;
    let packages = state.services.purchase.list_packages();

    bot.send_message(msg.chat.id, t!("commands.buy"))
        .reply_markup(get_packages_keyboard(packages))
        .await?;

    info!("[{}] user={}", PurchaseStage::OfferShown, user_id);
    Ok(())
}

async fn handle_reset(bot: Throttle<Bot>, msg: Message, state: AppState) -> HandlerResult<()> {
    let user_id = sender_id(&msg)?;

    if !state.config.is_admin(user_id) {
        warn!("User {} tried to reset free interactions", user_id);
        bot.send_message(msg.chat.id, t!("commands.unknown_command")).await?;
        return Ok(());
    }

    let free_allowance = state.services.meter.free_interactions();
    let text = ledger_reply(
        user_id,
        "reset_free_used",
        state.services.ledger.reset_free_used(user_id).await,
        |()| {
            info!("Reset free interactions for user {}", user_id);
            t!("commands.reset", free_left = free_allowance).to_string()
        },
    );

    bot.send_message(msg.chat.id, text)
        .reply_markup(get_main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_command(bot: Throttle<Bot>, msg: Message, cmd: Command, state: AppState) -> HandlerResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await?,
        Command::Help => handle_help(bot, msg).await?,
        Command::Balance => handle_balance(bot, msg, state).await?,
        Command::Audio => handle_audio(bot, msg, state).await?,
        Command::Buy => handle_buy(bot, msg, state).await?,
        Command::Reset => handle_reset(bot, msg, state).await?,
    }

    Ok(())
}

pub fn get_command_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(handle_command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ledger::tests::test_ledger;

    const USER: UserId = UserId(4004);

    fn balance_text(user_id: UserId, result: Result<crate::service::ledger::UserAccount, LedgerError>) -> String {
        ledger_reply(user_id, "get", result, |account| {
            t!(
                "commands.balance",
                free_left = account.free_left(10),
                credits = account.credit_balance
            )
            .to_string()
        })
    }

    #[tokio::test]
    async fn test_balance_reply_reads_ledger() {
        let (_dir, ledger) = test_ledger().await;
        ledger.add_credits(USER, 50).await.unwrap();
        ledger.set_free_used(USER, 4).await.unwrap();

        let text = balance_text(USER, ledger.get(USER).await);

        assert!(text.contains('6'));
        assert!(text.contains("50"));
        assert_ne!(text, t!("messages.try_again_later"));
    }

    #[tokio::test]
    async fn test_storage_failure_replies_try_again_later() {
        let (_dir, ledger) = test_ledger().await;
        let conn = ledger.connection().await.unwrap();
        conn.execute("DROP TABLE users", ()).await.unwrap();

        let text = balance_text(USER, ledger.get(USER).await);
        assert_eq!(text, t!("messages.try_again_later"));

        let text = ledger_reply(USER, "reset_free_used", ledger.reset_free_used(USER).await, |()| {
            "reset".to_string()
        });
        assert_eq!(text, t!("messages.try_again_later"));
    }
}
