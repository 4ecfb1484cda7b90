mod chat;

use teloxide::{
    adaptors::Throttle,
    dispatching::UpdateHandler,
    prelude::*,
};

use crate::{error::HandlerResult, state::AppState};

use super::{
    command::{handle_audio, handle_balance, handle_buy, handle_help, handle_start},
    keyboard::{get_main_menu_keyboard, MenuAction},
};

#[derive(Debug, PartialEq, Eq)]
enum TextRoute {
    Menu(MenuAction),
    UnknownCommand,
    Chat,
}

/// Menu labels win over commands, everything else is relayed.
fn route_text(text: &str) -> TextRoute {
    if let Some(action) = MenuAction::from_text(text) {
        TextRoute::Menu(action)
    } else if text.starts_with('/') {
        TextRoute::UnknownCommand
    } else {
        TextRoute::Chat
    }
}

async fn handle_text(bot: Throttle<Bot>, msg: Message, text: String, state: AppState) -> HandlerResult<()> {
    match route_text(&text) {
        TextRoute::Menu(action) => {
            debug!("Menu button {:?} pressed in chat {}", action, msg.chat.id);
            match action {
                MenuAction::Home => handle_start(bot, msg, state).await,
                MenuAction::Help => handle_help(bot, msg).await,
                MenuAction::Buy => handle_buy(bot, msg, state).await,
                MenuAction::Balance => handle_balance(bot, msg, state).await,
                MenuAction::Audio => handle_audio(bot, msg, state).await,
            }
        }
        TextRoute::UnknownCommand => {
            bot.send_message(msg.chat.id, t!("commands.unknown_command"))
                .reply_markup(get_main_menu_keyboard())
                .await?;
            Ok(())
        }
        TextRoute::Chat => chat::handle_chat(bot, msg, text, state).await,
    }
}

async fn handle_message_unknown(bot: Throttle<Bot>, msg: Message) -> HandlerResult<()> {
    bot.send_message(msg.chat.id, t!("messages.unknown_message"))
        .reply_markup(get_main_menu_keyboard())
        .await?;
    Ok(())
}

pub fn get_message_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_message()
        .branch(Message::filter_text().endpoint(handle_text))
        .branch(dptree::endpoint(handle_message_unknown))
}
