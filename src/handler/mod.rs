mod callback;
mod command;
mod keyboard;
mod message;
mod payment;

use callback::get_callback_handler;
use command::get_command_handler;
use message::get_message_handler;
use payment::get_payment_handler;
use teloxide::{
    dispatching::UpdateHandler,
    dptree,
    types::{Message, UserId},
};

use crate::error::BotError;

pub fn get_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(get_payment_handler())
        .branch(get_command_handler())
        .branch(get_callback_handler())
        .branch(get_message_handler())
}

fn sender_id(msg: &Message) -> Result<UserId, BotError> {
    msg.from.as_ref().map(|user| user.id).ok_or(BotError::MissingField("sender"))
}
