use teloxide::{
    adaptors::Throttle,
    macros::BotCommands,
    payloads::SetMyCommandsSetters,
    prelude::Requester,
    types::{BotCommand, BotCommandScope, ChatId, Recipient},
    Bot,
};

use crate::error::HandlerResult;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
    Balance,
    Audio,
    Buy,
    Reset,
}

impl Command {
    pub fn user_commands() -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", t!("commands.description.start")),
            BotCommand::new("help", t!("commands.description.help")),
            BotCommand::new("balance", t!("commands.description.balance")),
            BotCommand::new("audio", t!("commands.description.audio")),
            BotCommand::new("buy", t!("commands.description.buy")),
        ]
    }

    pub fn admin_commands() -> Vec<BotCommand> {
        let mut commands = Self::user_commands();
        commands.push(BotCommand::new("reset", t!("commands.description.reset")));
        commands
    }
}

pub async fn setup_user_commands(bot: &Throttle<Bot>) -> HandlerResult<()> {
    bot.set_my_commands(Command::user_commands()).await?;
    Ok(())
}

pub async fn setup_admin_commands(bot: &Throttle<Bot>, chat_id: ChatId) -> HandlerResult<()> {
    bot.set_my_commands(Command::admin_commands())
        .scope(BotCommandScope::Chat {
            chat_id: Recipient::Id(chat_id),
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::utils::command::BotCommands as _;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "relaybot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/balance", "relaybot").unwrap(), Command::Balance);
        assert_eq!(Command::parse("/reset@relaybot", "relaybot").unwrap(), Command::Reset);
        assert!(Command::parse("/unknown", "relaybot").is_err());
    }

    #[test]
    fn test_reset_is_admin_only() {
        let user: Vec<String> = Command::user_commands().into_iter().map(|c| c.command).collect();
        let admin: Vec<String> = Command::admin_commands().into_iter().map(|c| c.command).collect();

        assert!(!user.contains(&"reset".to_string()));
        assert!(admin.contains(&"reset".to_string()));
    }
}
