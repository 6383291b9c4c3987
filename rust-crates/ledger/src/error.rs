use thiserror::Error;

pub const REVERT_NO_TAPS: &str = "no taps";
pub const REVERT_NOT_ENOUGH_TOKENS: &str = "not enough tokens";
pub const REVERT_NOT_OWNER: &str = "not owner";
pub const REVERT_WITHDRAW_FAILED: &str = "withdraw failed";
pub const REVERT_DEPOSIT_FAILED: &str = "deposit failed";
pub const REVERT_REWARD_OVERFLOW: &str = "reward overflow";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("request rejected by the wallet holder")]
    UserRejected,
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("reverted: {0}")]
    Reverted(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger storage: {0}")]
    Storage(String),
}

/// Coarse failure categories the client turns into user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UserRejected,
    InsufficientFunds,
    LedgerUnderfunded,
    InvalidClaim,
    NotOwner,
    Unavailable,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::UserRejected => "Transaction rejected in wallet",
            FailureKind::InsufficientFunds => "Not enough funds to pay the network fee",
            FailureKind::LedgerUnderfunded => {
                "Reward pool cannot cover this claim right now"
            }
            FailureKind::InvalidClaim => "Claim was rejected by the contract",
            FailureKind::NotOwner => "Only the contract owner may do that",
            FailureKind::Unavailable => "Ledger is unreachable, try again later",
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LedgerError::UserRejected => FailureKind::UserRejected,
            LedgerError::InsufficientFunds(_) => FailureKind::InsufficientFunds,
            LedgerError::Reverted(reason) => match reason.as_str() {
                REVERT_NOT_ENOUGH_TOKENS => FailureKind::LedgerUnderfunded,
                REVERT_NOT_OWNER => FailureKind::NotOwner,
                _ => FailureKind::InvalidClaim,
            },
            LedgerError::Unavailable(_) | LedgerError::Storage(_) => {
                FailureKind::Unavailable
            }
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

/// Maps free-form node/wallet error text onto a [`LedgerError`].
pub fn classify_message(message: &str) -> LedgerError {
    let lower = message.to_ascii_lowercase();
    for reason in [
        REVERT_NOT_ENOUGH_TOKENS,
        REVERT_NOT_OWNER,
        REVERT_NO_TAPS,
        REVERT_WITHDRAW_FAILED,
        REVERT_DEPOSIT_FAILED,
        REVERT_REWARD_OVERFLOW,
    ] {
        if lower.contains(reason) {
            return LedgerError::Reverted(reason.to_string());
        }
    }
    if lower.contains("rejected") || lower.contains("denied") || lower.contains("cancel")
    {
        return LedgerError::UserRejected;
    }
    if lower.contains("insufficientfeeamount")
        || lower.contains("insufficient fee")
        || lower.contains("not enough coins")
        || lower.contains("insufficient funds")
    {
        return LedgerError::InsufficientFunds(message.to_string());
    }
    if lower.contains("revert") || lower.contains("panic") {
        return LedgerError::Reverted(message.to_string());
    }
    LedgerError::Unavailable(message.to_string())
}
