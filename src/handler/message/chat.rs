use teloxide::{
    adaptors::Throttle,
    prelude::*,
    types::{ChatAction, InputFile, ReplyMarkup},
};

use crate::{
    error::HandlerResult,
    handler::{
        keyboard::{get_main_menu_keyboard, get_packages_keyboard},
        sender_id,
    },
    service::{
        purchase::{CreditPackage, PurchaseStage},
        MeterDecision, Reply,
    },
    state::AppState,
};

/// What the user is told instead of a reply when the meter turns them away.
#[derive(Debug)]
struct Refusal {
    text: String,
    markup: ReplyMarkup,
}

/// Maps a refusing meter decision to its reply. `None` means the request is served.
fn refusal_for(decision: MeterDecision, packages: &[CreditPackage]) -> Option<Refusal> {
    match decision {
        MeterDecision::Free { .. } | MeterDecision::Paid { .. } => None,
        MeterDecision::Contended => Some(Refusal {
            text: t!("messages.contended").to_string(),
            markup: get_main_menu_keyboard().into(),
        }),
        MeterDecision::InsufficientBalance => Some(Refusal {
            text: t!("messages.insufficient_balance").to_string(),
            markup: get_packages_keyboard(packages).into(),
        }),
    }
}

/// Charges the user for one interaction, then relays `text` to the providers.
/// Usage is charged on attempt: a failed generation is not refunded.
pub(super) async fn handle_chat(bot: Throttle<Bot>, msg: Message, text: String, state: AppState) -> HandlerResult<()> {
    let user_id = sender_id(&msg)?;
    let services = &state.services;

    services.session.touch(user_id);

    let decision = match services.meter.authorize(user_id).await {
        Ok(decision) => decision,
        Err(e) => {
            error!("Failed to meter request from user {}: {}", user_id, e);
            bot.send_message(msg.chat.id, t!("messages.try_again_later"))
                .reply_markup(get_main_menu_keyboard())
                .await?;
            return Ok(());
        }
    };

    if let Some(refusal) = refusal_for(decision, services.purchase.list_packages()) {
        bot.send_message(msg.chat.id, refusal.text)
            .reply_markup(refusal.markup)
            .await?;
        if decision == MeterDecision::InsufficientBalance {
            info!("[{}] user={} reason=insufficient_balance", PurchaseStage::OfferShown, user_id);
        }
        return Ok(());
    }

    match decision {
        MeterDecision::Free { remaining_free } => {
            debug!(
                "Serving user {} on the {:?} tier, {} free interactions left",
                user_id,
                decision.tier(),
                remaining_free
            );
        }
        MeterDecision::Paid { remaining_credits } => {
            debug!(
                "Serving user {} on the {:?} tier, {} credits left",
                user_id,
                decision.tier(),
                remaining_credits
            );
        }
        MeterDecision::Contended | MeterDecision::InsufficientBalance => {}
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    let audio = services.session.audio_enabled(user_id);
    match services.reply.respond(user_id, &text, audio).await {
        Reply::Voice(audio) => {
            bot.send_voice(msg.chat.id, InputFile::memory(audio))
                .reply_markup(get_main_menu_keyboard())
                .await?;
            debug!("Sent voice reply to user {}", user_id);
        }
        Reply::Text { chunks, audio_failed } => {
            if audio_failed {
                bot.send_message(msg.chat.id, t!("messages.audio_failed")).await?;
            }
            for chunk in chunks {
                bot.send_message(msg.chat.id, chunk)
                    .reply_markup(get_main_menu_keyboard())
                    .await?;
            }
            debug!("Sent text reply to user {}", user_id);
        }
    }

    Ok(())
}
