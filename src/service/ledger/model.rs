use teloxide::types::UserId;

/// Ledger row for a single chat user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAccount {
    pub user_id: UserId,
    pub free_interactions_used: u64,
    pub credit_balance: u64,
}

impl UserAccount {
    pub fn free_left(&self, allowance: u64) -> u64 {
        allowance.saturating_sub(self.free_interactions_used)
    }
}
