use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Largest number of decimals a token may declare; keeps `10^decimals` inside u128.
pub const MAX_DECIMALS: u32 = 30;

/// Token quantity in base units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub const fn new(base_units: u128) -> Self {
        Self(base_units)
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `10^decimals` base units, i.e. a single whole token.
    pub fn one_token(decimals: u32) -> Self {
        Self(10u128.pow(decimals.min(MAX_DECIMALS)))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn checked_mul(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(u128::from(factor)).map(Self)
    }

    /// Renders the amount in whole tokens with exactly `places` fractional digits
    /// (truncated, never rounded up).
    pub fn format_units(self, decimals: u32, places: usize) -> String {
        let decimals = decimals.min(MAX_DECIMALS);
        let one = 10u128.pow(decimals);
        let whole = self.0 / one;
        if places == 0 {
            return whole.to_string();
        }
        let mut fraction = if decimals == 0 {
            String::new()
        } else {
            format!("{:0width$}", self.0 % one, width = decimals as usize)
        };
        fraction.truncate(places);
        while fraction.len() < places {
            fraction.push('0');
        }
        format!("{whole}.{fraction}")
    }

    /// Parses a decimal string of whole tokens ("12", "0.5") into base units.
    pub fn parse_units(raw: &str, decimals: u32) -> Option<Self> {
        let decimals = decimals.min(MAX_DECIMALS);
        let raw = raw.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if fraction.len() > decimals as usize {
            return None;
        }
        let all_digits =
            |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return None;
        }
        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut padded = fraction.to_string();
        while padded.len() < decimals as usize {
            padded.push('0');
        }
        let fraction: u128 = if padded.is_empty() { 0 } else { padded.parse().ok()? };
        whole
            .checked_mul(10u128.pow(decimals))?
            .checked_add(fraction)
            .map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the ledger pays out in, and how much per tap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u32,
    pub unit_reward: TokenAmount,
}

impl TokenInfo {
    /// A token paying exactly one whole token per tap.
    pub fn whole_token_per_tap(symbol: impl Into<String>, decimals: u32) -> Self {
        let decimals = decimals.min(MAX_DECIMALS);
        Self {
            symbol: symbol.into(),
            decimals,
            unit_reward: TokenAmount::one_token(decimals),
        }
    }

    /// `taps × unit_reward`, or `None` on overflow.
    pub fn reward_for(&self, taps: u64) -> Option<TokenAmount> {
        self.unit_reward.checked_mul(taps)
    }

    pub fn format(&self, amount: TokenAmount, places: usize) -> String {
        amount.format_units(self.decimals, places)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_units__truncates_to_requested_places() {
        let amount = TokenAmount::new(1_234_567_890_123_456_789);

        assert_eq!(amount.format_units(18, 3), "1.234");
        assert_eq!(amount.format_units(18, 0), "1");
        assert_eq!(TokenAmount::new(5).format_units(0, 2), "5.00");
    }

    #[test]
    fn format_units__pads_small_fractions() {
        let amount = TokenAmount::new(1_000_000);

        assert_eq!(amount.format_units(9, 4), "0.0010");
    }

    #[test]
    fn parse_units__reads_whole_and_fractional_tokens() {
        assert_eq!(
            TokenAmount::parse_units("12", 9),
            Some(TokenAmount::new(12_000_000_000))
        );
        assert_eq!(
            TokenAmount::parse_units("0.5", 9),
            Some(TokenAmount::new(500_000_000))
        );
        assert_eq!(TokenAmount::parse_units(".25", 2), Some(TokenAmount::new(25)));
    }

    #[test]
    fn parse_units__rejects_garbage_and_excess_precision() {
        assert_eq!(TokenAmount::parse_units("", 9), None);
        assert_eq!(TokenAmount::parse_units("1.2.3", 9), None);
        assert_eq!(TokenAmount::parse_units("-1", 9), None);
        assert_eq!(TokenAmount::parse_units("0.001", 2), None);
    }

    #[test]
    fn reward_for__pays_one_whole_token_per_tap() {
        let token = TokenInfo::whole_token_per_tap("TAP", 18);

        let reward = token.reward_for(5).unwrap();

        assert_eq!(reward, TokenAmount::new(5 * 10u128.pow(18)));
        assert_eq!(token.format(reward, 3), "5.000");
    }

    proptest! {
        #[test]
        fn reward_for__is_linear_in_taps(taps in 0u64..=u64::MAX) {
            let token = TokenInfo::whole_token_per_tap("TAP", 18);
            let reward = token.reward_for(taps).unwrap();
            prop_assert_eq!(reward.base_units(), u128::from(taps) * 10u128.pow(18));
        }
    }
}
