mod model;

pub use model::*;

use chrono::Utc;
use teloxide::types::UserId;

use super::ledger::{self, LedgerError, LedgerService};

#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Malformed purchase payload: {0}")]
    MalformedPayload(String),
    #[error("Unknown credit package: {0}")]
    UnknownPackage(String),
}

impl From<libsql::Error> for PurchaseError {
    fn from(e: libsql::Error) -> Self {
        PurchaseError::Ledger(e.into())
    }
}

#[derive(Clone)]
pub struct PurchaseService {
    ledger: LedgerService,
}

impl PurchaseService {
    pub fn new(ledger: LedgerService) -> Self {
        info!("Initializing PurchaseService...");
        Self { ledger }
    }

    pub fn list_packages(&self) -> &'static [CreditPackage] {
        &CATALOG
    }

    pub fn package(&self, package_id: &str) -> Option<CreditPackage> {
        CATALOG.iter().copied().find(|p| p.package_id == package_id)
    }

    pub fn build_invoice(&self, package_id: &str) -> Result<Invoice, PurchaseError> {
        let package = self
            .package(package_id)
            .ok_or_else(|| PurchaseError::UnknownPackage(package_id.to_string()))?;

        Ok(Invoice {
            package,
            payload: PurchasePayload {
                credits: package.credit_amount,
            }
            .to_string(),
        })
    }

    /// Approves only payloads this bot could have issued: the exact payload shape
    /// and an amount from the catalog.
    pub fn validate_precheckout(&self, payload: &str) -> bool {
        match payload.parse::<PurchasePayload>() {
            Ok(parsed) => CATALOG.iter().any(|p| p.credit_amount == parsed.credits),
            Err(_) => false,
        }
    }

    /// Credits a confirmed payment exactly once per charge id.
    ///
    /// A payload that cannot be parsed credits nothing; the payment is stored as
    /// unreconciled and `MalformedPayload` is returned so the caller can tell the user.
    pub async fn on_payment_confirmed(&self, confirmation: &PaymentConfirmation) -> Result<CreditOutcome, PurchaseError> {
        let PaymentConfirmation {
            user_id,
            payload,
            charge_id,
        } = confirmation;

        info!(
            "[{}] user={} charge_id={} payload={}",
            PurchaseStage::PaymentConfirmed,
            user_id,
            charge_id,
            payload
        );

        let parsed = match payload.parse::<PurchasePayload>() {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(
                    "Payment needs manual reconciliation: user={} charge_id={} payload={:?}",
                    user_id, charge_id, payload
                );
                self.record_payment(*user_id, payload, charge_id, 0, PaymentStatus::Unreconciled)
                    .await?;
                return Err(e);
            }
        };

        let conn = self.ledger.connection().await?;
        let tx = conn.transaction().await?;

        let inserted = tx
            .execute(
                "INSERT INTO payments (charge_id, user_id, payload, credited, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(charge_id) DO NOTHING",
                (
                    charge_id.as_str(),
                    ledger::to_db_id(*user_id)?,
                    payload.as_str(),
                    parsed.credits as i64,
                    PaymentStatus::Credited.as_str(),
                    Utc::now().to_rfc3339(),
                ),
            )
            .await?;

        if inserted == 0 {
            tx.rollback().await?;
            warn!(
                "Duplicate payment confirmation ignored: user={} charge_id={}",
                user_id, charge_id
            );
            return Ok(CreditOutcome::AlreadyCredited {
                credits: parsed.credits,
            });
        }

        let balance = ledger::add_credits_on(&tx, *user_id, parsed.credits).await?;
        tx.commit().await?;

        info!(
            "[{}] user={} credits={} balance={}",
            PurchaseStage::Credited,
            user_id,
            parsed.credits,
            balance
        );

        Ok(CreditOutcome::Credited {
            credits: parsed.credits,
            balance,
        })
    }

    async fn record_payment(
        &self,
        user_id: UserId,
        payload: &str,
        charge_id: &str,
        credited: u64,
        status: PaymentStatus,
    ) -> Result<(), PurchaseError> {
        let conn = self.ledger.connection().await?;
        conn.execute(
            "INSERT INTO payments (charge_id, user_id, payload, credited, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(charge_id) DO NOTHING",
            (
                charge_id,
                ledger::to_db_id(user_id)?,
                payload,
                credited as i64,
                status.as_str(),
                Utc::now().to_rfc3339(),
            ),
        )
        .await?;
        Ok(())
    }
}
