use teloxide::{
    adaptors::Throttle,
    dispatching::UpdateHandler,
    prelude::*,
    types::{PreCheckoutQuery, SuccessfulPayment},
};

use crate::{
    error::HandlerResult,
    service::purchase::{CreditOutcome, PaymentConfirmation, PurchaseError},
    state::AppState,
};

use super::{keyboard::get_main_menu_keyboard, sender_id};

async fn handle_pre_checkout(bot: Throttle<Bot>, q: PreCheckoutQuery, state: AppState) -> HandlerResult<()> {
    if state.services.purchase.validate_precheckout(&q.invoice_payload) {
        debug!("Approved pre-checkout for user {} payload={}", q.from.id, q.invoice_payload);
        bot.answer_pre_checkout_query(&q.id, true).await?;
    } else {
        warn!(
            "Rejected pre-checkout for user {} payload={}",
            q.from.id, q.invoice_payload
        );
        bot.answer_pre_checkout_query(&q.id, false)
            .error_message(t!("payments.rejected"))
            .await?;
    }

    Ok(())
}

async fn handle_successful_payment(
    bot: Throttle<Bot>,
    msg: Message,
    payment: SuccessfulPayment,
    state: AppState,
) -> HandlerResult<()> {
    let confirmation = PaymentConfirmation {
        user_id: sender_id(&msg)?,
        payload: payment.invoice_payload,
        charge_id: payment.telegram_payment_charge_id,
    };

    let text = match state.services.purchase.on_payment_confirmed(&confirmation).await {
        Ok(CreditOutcome::Credited { credits, balance }) => t!("payments.credited", credits = credits, balance = balance),
        Ok(CreditOutcome::AlreadyCredited { credits }) => t!("payments.already_credited", credits = credits),
        Err(PurchaseError::MalformedPayload(_)) => t!("payments.unreconciled"),
        Err(e) => {
            error!(
                "Failed to credit payment for user {} payload={} charge_id={}: {}",
                confirmation.user_id, confirmation.payload, confirmation.charge_id, e
            );
            bot.send_message(msg.chat.id, t!("payments.unreconciled")).await?;
            return Err(e.into());
        }
    };

    bot.send_message(msg.chat.id, text)
        .reply_markup(get_main_menu_keyboard())
        .await?;

    Ok(())
}

pub fn get_payment_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    dptree::entry()
        .branch(Update::filter_pre_checkout_query().endpoint(handle_pre_checkout))
        .branch(
            Update::filter_message().branch(Message::filter_successful_payment().endpoint(handle_successful_payment)),
        )
}
