use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    future::Future,
};

pub mod amount;
pub mod error;
#[cfg(feature = "fuel")]
pub mod fuel;
pub mod local;

pub use amount::{
    MAX_DECIMALS,
    TokenAmount,
    TokenInfo,
};
pub use error::{
    FailureKind,
    LedgerError,
    classify_message,
};
#[cfg(feature = "fuel")]
pub use fuel::{
    FUEL_TOKEN_DECIMALS,
    FuelLedger,
};
pub use local::{
    LedgerState,
    LocalLedger,
    LocalPendingClaim,
};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Account identifier on the ledger, normalized to lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim().to_ascii_lowercase();
        if trimmed.starts_with("0x") {
            Self(trimmed)
        } else {
            Self(format!("0x{trimmed}"))
        }
    }

    /// Deterministic 32-byte address for a named local profile.
    pub fn for_profile(profile: &str) -> Self {
        Self::new(hex::encode(Sha256::digest(profile.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// "0x1234...abcd"
    pub fn short(&self) -> String {
        let body = &self.0[2..];
        if body.len() <= 8 {
            return self.0.clone();
        }
        format!("0x{}...{}", &body[..4], &body[body.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub tx_id: String,
    pub taps: u64,
    pub reward: TokenAmount,
}

/// The reward contract as seen by a player.
///
/// A claim happens in two steps: `submit_claim` hands the request to the
/// ledger and yields a pending handle, `confirm` waits for it to settle.
/// A claim either pays `taps × unit_reward` in full or pays nothing.
pub trait RewardLedger: Send + Sync {
    type Pending: Send + 'static;

    fn token(&self) -> &TokenInfo;

    fn pool_balance(&self) -> impl Future<Output = LedgerResult<TokenAmount>> + Send;

    fn submit_claim(
        &self,
        claimant: &Address,
        taps: u64,
    ) -> impl Future<Output = LedgerResult<Self::Pending>> + Send;

    fn confirm(
        &self,
        pending: Self::Pending,
    ) -> impl Future<Output = LedgerResult<ClaimReceipt>> + Send;
}

/// Owner-only funding operations. Each returns the new pool balance.
pub trait LedgerAdmin: Send + Sync {
    fn owner(&self) -> impl Future<Output = LedgerResult<Address>> + Send;

    fn deposit(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> impl Future<Output = LedgerResult<TokenAmount>> + Send;

    fn withdraw(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> impl Future<Output = LedgerResult<TokenAmount>> + Send;
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn address__normalizes_case_and_prefix() {
        assert_eq!(Address::new("ABCDEF").as_str(), "0xabcdef");
        assert_eq!(Address::new(" 0xAbCd ").as_str(), "0xabcd");
    }

    #[test]
    fn for_profile__is_stable_per_name() {
        assert_eq!(Address::for_profile("alice"), Address::for_profile("alice"));
        assert_ne!(Address::for_profile("alice"), Address::for_profile("bob"));
        assert_eq!(Address::for_profile("alice").as_str().len(), 66);
    }

    #[test]
    fn short__elides_the_middle() {
        let address = Address::new("0x1234567890abcdef1234567890abcdef");

        assert_eq!(address.short(), "0x1234...cdef");
        assert_eq!(Address::new("0x12").short(), "0x12");
    }
}
