use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use teloxide::types::UserId;

use super::PurchaseError;

static PAYLOAD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^purchase_(\d{1,9})_credits$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPackage {
    pub package_id: &'static str,
    pub credit_amount: u64,
}

pub const CATALOG: [CreditPackage; 4] = [
    CreditPackage {
        package_id: "credits_50",
        credit_amount: 50,
    },
    CreditPackage {
        package_id: "credits_100",
        credit_amount: 100,
    },
    CreditPackage {
        package_id: "credits_500",
        credit_amount: 500,
    },
    CreditPackage {
        package_id: "credits_1000",
        credit_amount: 1000,
    },
];

/// Invoice payload round-tripped through the payment processor, `purchase_<amount>_credits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchasePayload {
    pub credits: u64,
}

impl fmt::Display for PurchasePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "purchase_{}_credits", self.credits)
    }
}

impl FromStr for PurchasePayload {
    type Err = PurchaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let credits = PAYLOAD_REGEX
            .captures(s)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .filter(|credits| *credits > 0)
            .ok_or_else(|| PurchaseError::MalformedPayload(s.to_string()))?;

        Ok(Self { credits })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub package: CreditPackage,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub user_id: UserId,
    pub payload: String,
    pub charge_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    Credited { credits: u64, balance: u64 },
    /// The charge id was already processed, nothing was added.
    AlreadyCredited { credits: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStage {
    OfferShown,
    InvoiceSent,
    PaymentConfirmed,
    Credited,
}

impl fmt::Display for PurchaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            PurchaseStage::OfferShown => "offer_shown",
            PurchaseStage::InvoiceSent => "invoice_sent",
            PurchaseStage::PaymentConfirmed => "payment_confirmed",
            PurchaseStage::Credited => "credited",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaymentStatus {
    Credited,
    Unreconciled,
}

impl PaymentStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Credited => "credited",
            PaymentStatus::Unreconciled => "unreconciled",
        }
    }
}
