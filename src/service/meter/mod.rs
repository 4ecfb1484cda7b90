use teloxide::types::UserId;

use super::ledger::{LedgerError, LedgerService};

/// Credits charged for one interaction once the free allowance is used up.
pub const COST_PER_INTERACTION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterDecision {
    /// Counted against the free allowance.
    Free { remaining_free: u64 },
    /// One credit was taken from the balance.
    Paid { remaining_credits: u64 },
    /// The balance looked sufficient but a concurrent request took the last credit.
    Contended,
    /// Free allowance exhausted and no credits left.
    InsufficientBalance,
}

impl MeterDecision {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            MeterDecision::Free { .. } => Some(Tier::Free),
            MeterDecision::Paid { .. } => Some(Tier::Paid),
            MeterDecision::Contended | MeterDecision::InsufficientBalance => None,
        }
    }
}

#[derive(Clone)]
pub struct UsageMeter {
    ledger: LedgerService,
    free_interactions: u64,
}

impl UsageMeter {
    pub fn new(ledger: LedgerService, free_interactions: u64) -> Self {
        info!("Initializing UsageMeter with {} free interactions", free_interactions);
        Self {
            ledger,
            free_interactions,
        }
    }

    pub fn free_interactions(&self) -> u64 {
        self.free_interactions
    }

    /// Decides whether `user_id` may make one more request and charges for it.
    ///
    /// The free allowance is always drawn down before any credit is spent. The charge
    /// is applied before the request is served and is not refunded if serving fails.
    pub async fn authorize(&self, user_id: UserId) -> Result<MeterDecision, LedgerError> {
        let mut account = self.ledger.get(user_id).await?;

        if account.free_interactions_used < self.free_interactions {
            if let Some(used) = self.ledger.try_consume_free(user_id, self.free_interactions).await? {
                return Ok(MeterDecision::Free {
                    remaining_free: self.free_interactions - used,
                });
            }

            // Another request took the last free slot in the meantime.
            account = self.ledger.get(user_id).await?;
        }

        if account.credit_balance >= COST_PER_INTERACTION {
            return match self.ledger.try_consume_credit(user_id).await? {
                Some(remaining_credits) => Ok(MeterDecision::Paid { remaining_credits }),
                None => {
                    warn!("User {} lost a race for their last credit", user_id);
                    Ok(MeterDecision::Contended)
                }
            };
        }

        debug!("User {} has no free interactions or credits left", user_id);
        Ok(MeterDecision::InsufficientBalance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ledger::tests::test_ledger;

    const USER: UserId = UserId(2002);

    #[tokio::test]
    async fn test_last_free_interaction_then_denied() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 10);
        ledger.set_free_used(USER, 9).await.unwrap();

        let decision = meter.authorize(USER).await.unwrap();
        assert_eq!(decision, MeterDecision::Free { remaining_free: 0 });
        let account = ledger.get(USER).await.unwrap();
        assert_eq!(account.free_interactions_used, 10);
        assert_eq!(account.credit_balance, 0);

        let decision = meter.authorize(USER).await.unwrap();
        assert_eq!(decision, MeterDecision::InsufficientBalance);
        assert!(decision.tier().is_none());
        assert_eq!(ledger.get(USER).await.unwrap().free_interactions_used, 10);
    }

    #[tokio::test]
    async fn test_exactly_allowance_requests_are_free() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger, 10);

        for i in 0..10 {
            let decision = meter.authorize(USER).await.unwrap();
            assert_eq!(decision, MeterDecision::Free { remaining_free: 9 - i });
        }

        assert_eq!(meter.authorize(USER).await.unwrap(), MeterDecision::InsufficientBalance);
    }

    #[tokio::test]
    async fn test_free_tier_used_before_credits() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 2);
        ledger.add_credits(USER, 5).await.unwrap();

        assert_eq!(meter.authorize(USER).await.unwrap().tier(), Some(Tier::Free));
        assert_eq!(meter.authorize(USER).await.unwrap().tier(), Some(Tier::Free));
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 5);

        assert_eq!(
            meter.authorize(USER).await.unwrap(),
            MeterDecision::Paid { remaining_credits: 4 }
        );
    }

    #[tokio::test]
    async fn test_purchased_credit_is_spent() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 10);
        ledger.set_free_used(USER, 10).await.unwrap();
        ledger.add_credits(USER, 50).await.unwrap();

        assert_eq!(
            meter.authorize(USER).await.unwrap(),
            MeterDecision::Paid { remaining_credits: 49 }
        );
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 49);
    }

    #[tokio::test]
    async fn test_concurrent_requests_on_single_credit() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 0);
        ledger.add_credits(USER, 1).await.unwrap();

        let (a, b) = tokio::join!(meter.authorize(USER), meter.authorize(USER));
        let decisions = [a.unwrap(), b.unwrap()];

        assert_eq!(decisions.iter().filter(|d| d.tier().is_some()).count(), 1);
        assert!(decisions.contains(&MeterDecision::Paid { remaining_credits: 0 }));
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 0);
    }

    async fn fail_user_updates(ledger: &LedgerService, fail: bool) {
        let conn = ledger.connection().await.unwrap();
        let sql = if fail {
            "CREATE TRIGGER fail_user_updates BEFORE UPDATE ON users BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END"
        } else {
            "DROP TRIGGER fail_user_updates"
        };
        conn.execute(sql, ()).await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_account_untouched() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 10);
        ledger.set_free_used(USER, 3).await.unwrap();

        fail_user_updates(&ledger, true).await;
        assert!(matches!(meter.authorize(USER).await, Err(LedgerError::Storage(_))));
        fail_user_updates(&ledger, false).await;

        let account = ledger.get(USER).await.unwrap();
        assert_eq!(account.free_interactions_used, 3);
        assert_eq!(account.credit_balance, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_spend_credit() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 10);
        ledger.set_free_used(USER, 10).await.unwrap();
        ledger.add_credits(USER, 5).await.unwrap();

        fail_user_updates(&ledger, true).await;
        assert!(meter.authorize(USER).await.is_err());
        fail_user_updates(&ledger, false).await;

        let account = ledger.get(USER).await.unwrap();
        assert_eq!(account.free_interactions_used, 10);
        assert_eq!(account.credit_balance, 5);
    }

    #[tokio::test]
    async fn test_missing_table_is_a_storage_error() {
        let (_dir, ledger) = test_ledger().await;
        let meter = UsageMeter::new(ledger.clone(), 10);
        let conn = ledger.connection().await.unwrap();
        conn.execute("DROP TABLE users", ()).await.unwrap();

        assert!(matches!(meter.authorize(USER).await, Err(LedgerError::Storage(_))));
    }
}
