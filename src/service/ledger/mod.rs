mod error;
mod model;

pub use error::LedgerError;
pub use model::UserAccount;

use libsql::{Connection, Row};
use teloxide::types::UserId;

use crate::storage::{StorageError, TursoClient};

/// Per-user usage ledger backed by the `users` table.
///
/// Every mutation is a single statement, conditional where a bound must hold, so
/// concurrent handlers for the same user never lose an update.
#[derive(Clone)]
pub struct LedgerService {
    client: TursoClient,
}

impl LedgerService {
    pub fn new(client: TursoClient) -> Self {
        info!("Initializing LedgerService...");
        Self { client }
    }

    pub(crate) async fn connection(&self) -> Result<Connection, LedgerError> {
        Ok(self.client.get_connection().await?)
    }

    /// Returns the account for `user_id`, creating a zeroed row on first access.
    pub async fn get(&self, user_id: UserId) -> Result<UserAccount, LedgerError> {
        let id = to_db_id(user_id)?;
        let conn = self.connection().await?;

        conn.execute(
            "INSERT INTO users (user_id) VALUES (?1) ON CONFLICT(user_id) DO NOTHING",
            [id],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT free_interactions_used, credit_balance FROM users WHERE user_id = ?1 LIMIT 1",
                [id],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| StorageError::Corrupt(format!("user {} vanished after insert", user_id)))?;

        let account = UserAccount {
            user_id,
            free_interactions_used: read_counter(&row, 0)?,
            credit_balance: read_counter(&row, 1)?,
        };

        debug!("Retrieved user {}: {:?}", user_id, account);
        Ok(account)
    }

    pub async fn set_free_used(&self, user_id: UserId, n: u64) -> Result<(), LedgerError> {
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO users (user_id, free_interactions_used) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET free_interactions_used = excluded.free_interactions_used",
            [to_db_id(user_id)?, to_db_amount(n)?],
        )
        .await?;

        debug!("Set free interactions for user {} to {}", user_id, n);
        Ok(())
    }

    pub async fn set_credits(&self, user_id: UserId, n: u64) -> Result<(), LedgerError> {
        let conn = self.connection().await?;
        conn.execute(
            "INSERT INTO users (user_id, credit_balance) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET credit_balance = excluded.credit_balance",
            [to_db_id(user_id)?, to_db_amount(n)?],
        )
        .await?;

        debug!("Set credit balance for user {} to {}", user_id, n);
        Ok(())
    }

    pub async fn reset_free_used(&self, user_id: UserId) -> Result<(), LedgerError> {
        self.set_free_used(user_id, 0).await
    }

    /// Adds `delta` credits and returns the new balance.
    pub async fn add_credits(&self, user_id: UserId, delta: u64) -> Result<u64, LedgerError> {
        let conn = self.connection().await?;
        add_credits_on(&conn, user_id, delta).await
    }

    /// Takes one credit if the balance allows it. Returns the remaining balance, or
    /// `None` when the balance was already zero.
    pub async fn try_consume_credit(&self, user_id: UserId) -> Result<Option<u64>, LedgerError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                "UPDATE users SET credit_balance = credit_balance - 1
                 WHERE user_id = ?1 AND credit_balance >= 1
                 RETURNING credit_balance",
                [to_db_id(user_id)?],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let remaining = read_counter(&row, 0)?;
                debug!("Consumed 1 credit from user {}. Remaining: {}", user_id, remaining);
                Ok(Some(remaining))
            }
            None => {
                debug!("User {} has no credits to consume", user_id);
                Ok(None)
            }
        }
    }

    /// Counts one free interaction while fewer than `allowance` have been used.
    /// Returns the new counter, or `None` when the allowance is exhausted.
    pub async fn try_consume_free(&self, user_id: UserId, allowance: u64) -> Result<Option<u64>, LedgerError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                "UPDATE users SET free_interactions_used = free_interactions_used + 1
                 WHERE user_id = ?1 AND free_interactions_used < ?2
                 RETURNING free_interactions_used",
                [to_db_id(user_id)?, to_db_amount(allowance)?],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let used = read_counter(&row, 0)?;
                debug!("Incremented free interactions for user {}. Total used: {}", user_id, used);
                Ok(Some(used))
            }
            None => Ok(None),
        }
    }
}

/// Credit increment usable inside a caller's transaction.
pub(crate) async fn add_credits_on(conn: &Connection, user_id: UserId, delta: u64) -> Result<u64, LedgerError> {
    if delta == 0 {
        return Err(LedgerError::InvalidAmount(delta));
    }

    let mut rows = conn
        .query(
            "INSERT INTO users (user_id, credit_balance) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET credit_balance = credit_balance + excluded.credit_balance
             RETURNING credit_balance",
            [to_db_id(user_id)?, to_db_amount(delta)?],
        )
        .await?;

    let row = rows
        .next()
        .await?
        .ok_or_else(|| StorageError::Corrupt(format!("no balance returned for user {}", user_id)))?;
    let balance = read_counter(&row, 0)?;

    debug!("Added {} credits to user {}. New balance: {}", delta, user_id, balance);
    Ok(balance)
}

pub(crate) fn to_db_id(user_id: UserId) -> Result<i64, LedgerError> {
    i64::try_from(user_id.0).map_err(|_| LedgerError::InvalidUserId(user_id.0))
}

fn to_db_amount(n: u64) -> Result<i64, LedgerError> {
    i64::try_from(n).map_err(|_| LedgerError::InvalidAmount(n))
}

fn read_counter(row: &Row, idx: i32) -> Result<u64, LedgerError> {
    let raw = row.get::<i64>(idx)?;
    u64::try_from(raw).map_err(|_| StorageError::Corrupt(format!("negative counter {} in column {}", raw, idx)).into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Ledger on a throwaway local database. Keep the directory alive for the test.
    pub(crate) async fn test_ledger() -> (TempDir, LedgerService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let client = TursoClient::new(path.to_str().unwrap(), None).await.unwrap();
        (dir, LedgerService::new(client))
    }

    const USER: UserId = UserId(1001);

    #[tokio::test]
    async fn test_fresh_user_starts_at_zero() {
        let (_dir, ledger) = test_ledger().await;

        let account = ledger.get(USER).await.unwrap();

        assert_eq!(account.user_id, USER);
        assert_eq!(account.free_interactions_used, 0);
        assert_eq!(account.credit_balance, 0);
    }

    #[tokio::test]
    async fn test_add_credits_is_additive() {
        let (_dir, ledger) = test_ledger().await;

        assert_eq!(ledger.add_credits(USER, 50).await.unwrap(), 50);
        assert_eq!(ledger.add_credits(USER, 100).await.unwrap(), 150);
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 150);
    }

    #[tokio::test]
    async fn test_add_zero_credits_is_rejected() {
        let (_dir, ledger) = test_ledger().await;

        assert!(matches!(
            ledger.add_credits(USER, 0).await,
            Err(LedgerError::InvalidAmount(0))
        ));
    }

    #[tokio::test]
    async fn test_absolute_writes() {
        let (_dir, ledger) = test_ledger().await;

        ledger.set_free_used(USER, 7).await.unwrap();
        ledger.set_credits(USER, 3).await.unwrap();
        ledger.set_credits(USER, 3).await.unwrap();

        let account = ledger.get(USER).await.unwrap();
        assert_eq!(account.free_interactions_used, 7);
        assert_eq!(account.credit_balance, 3);

        ledger.reset_free_used(USER).await.unwrap();
        let account = ledger.get(USER).await.unwrap();
        assert_eq!(account.free_interactions_used, 0);
        assert_eq!(account.credit_balance, 3);
    }

    #[tokio::test]
    async fn test_consume_never_goes_negative() {
        let (_dir, ledger) = test_ledger().await;
        ledger.add_credits(USER, 2).await.unwrap();

        assert_eq!(ledger.try_consume_credit(USER).await.unwrap(), Some(1));
        assert_eq!(ledger.try_consume_credit(USER).await.unwrap(), Some(0));
        assert_eq!(ledger.try_consume_credit(USER).await.unwrap(), None);
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 0);
    }

    #[tokio::test]
    async fn test_consume_unknown_user_fails() {
        let (_dir, ledger) = test_ledger().await;

        assert_eq!(ledger.try_consume_credit(UserId(404)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_consumers_single_credit() {
        let (_dir, ledger) = test_ledger().await;
        ledger.add_credits(USER, 1).await.unwrap();

        let (a, b) = tokio::join!(ledger.try_consume_credit(USER), ledger.try_consume_credit(USER));
        let successes = [a.unwrap(), b.unwrap()].iter().filter(|r| r.is_some()).count();

        assert_eq!(successes, 1);
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 0);
    }

    #[tokio::test]
    async fn test_many_concurrent_consumers() {
        let (_dir, ledger) = test_ledger().await;
        ledger.add_credits(USER, 5).await.unwrap();

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_consume_credit(USER).await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        assert_eq!(ledger.get(USER).await.unwrap().credit_balance, 0);
    }

    #[tokio::test]
    async fn test_free_allowance_is_bounded() {
        let (_dir, ledger) = test_ledger().await;
        ledger.set_free_used(USER, 9).await.unwrap();

        assert_eq!(ledger.try_consume_free(USER, 10).await.unwrap(), Some(10));
        assert_eq!(ledger.try_consume_free(USER, 10).await.unwrap(), None);
        assert_eq!(ledger.get(USER).await.unwrap().free_interactions_used, 10);
    }

    #[test]
    fn test_free_left() {
        let account = UserAccount {
            user_id: USER,
            free_interactions_used: 12,
            credit_balance: 0,
        };
        assert_eq!(account.free_left(10), 0);
        assert_eq!(account.free_left(20), 8);
    }
}
