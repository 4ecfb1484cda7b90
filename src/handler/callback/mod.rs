use teloxide::{
    adaptors::Throttle,
    dispatching::UpdateHandler,
    prelude::*,
    types::{CallbackQuery, ChatId, LabeledPrice},
};

use crate::{
    error::HandlerResult,
    service::purchase::{CreditPackage, PurchaseStage},
    state::AppState,
};

use super::keyboard::PACKAGE_CALLBACK_PREFIX;

/// Smallest-currency-unit price of a package.
fn package_price(package: &CreditPackage, unit_price: u32) -> Option<u32> {
    u32::try_from(package.credit_amount).ok()?.checked_mul(unit_price)
}

async fn handle_package_selected(
    bot: &Throttle<Bot>,
    q: &CallbackQuery,
    state: &AppState,
    package_id: &str,
) -> HandlerResult<()> {
    let user_id = q.from.id;
    let purchase = &state.services.purchase;
    let payment = &state.config.payment;

    let invoice = match purchase.build_invoice(package_id) {
        Ok(invoice) => invoice,
        Err(e) => {
            warn!("User {} made an invalid purchase selection {}: {}", user_id, package_id, e);
            bot.answer_callback_query(&q.id)
                .text(t!("messages.invalid_selection"))
                .await?;
            return Ok(());
        }
    };

    let Some(amount) = package_price(&invoice.package, payment.unit_price) else {
        error!("Price of package {} overflows", invoice.package.package_id);
        bot.answer_callback_query(&q.id)
            .text(t!("messages.invalid_selection"))
            .await?;
        return Ok(());
    };

    let credits = invoice.package.credit_amount;
    let chat_id = q.message.as_ref().map(|m| m.chat().id).unwrap_or(ChatId::from(user_id));

    bot.answer_callback_query(&q.id).await?;

    bot.send_invoice(
        chat_id,
        t!("invoice.title", credits = credits),
        t!("invoice.description", credits = credits),
        invoice.payload.clone(),
        payment.provider_token.clone(),
        payment.currency.clone(),
        [LabeledPrice::new(t!("invoice.label", credits = credits), amount)],
    )
    .await?;

    info!(
        "[{}] user={} payload={} amount={} {}",
        PurchaseStage::InvoiceSent,
        user_id,
        invoice.payload,
        amount,
        payment.currency
    );

    Ok(())
}

async fn handle_callback(bot: Throttle<Bot>, q: CallbackQuery, state: AppState) -> HandlerResult<()> {
    let data = q.data.clone().unwrap_or_default();

    match data.strip_prefix(PACKAGE_CALLBACK_PREFIX) {
        Some(package_id) => handle_package_selected(&bot, &q, &state, package_id).await?,
        None => {
            warn!("User {} sent unknown callback data: {}", q.from.id, data);
            bot.answer_callback_query(&q.id)
                .text(t!("messages.invalid_selection"))
                .await?;
        }
    }

    Ok(())
}

pub fn get_callback_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    Update::filter_callback_query().endpoint(handle_callback)
}
