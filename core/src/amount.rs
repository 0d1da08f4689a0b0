use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Wei per ETH.
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

const MAX_FRAC_DIGITS: usize = 18;

/// An ETH amount held as wei. Parsed from decimal ETH strings and formatted
/// canonically (no trailing fractional zeros) so that generated module text
/// is byte-identical across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EthAmount(u128);

impl EthAmount {
    pub const ZERO: EthAmount = EthAmount(0);

    pub fn from_wei(wei: u128) -> Self {
        EthAmount(wei)
    }

    pub fn wei(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole-ETH part.
    pub fn whole(&self) -> u128 {
        self.0 / WEI_PER_ETH
    }

    /// Canonical fractional digits with trailing zeros trimmed, `"0"` for a
    /// whole amount. `0.5` -> `"5"`, `0.05` -> `"05"`, `12` -> `"0"`.
    pub fn frac_digits(&self) -> String {
        let frac = self.0 % WEI_PER_ETH;
        if frac == 0 {
            return "0".to_string();
        }
        let padded = format!("{:018}", frac);
        padded.trim_end_matches('0').to_string()
    }

    pub fn checked_add(&self, other: EthAmount) -> Option<EthAmount> {
        self.0.checked_add(other.0).map(EthAmount)
    }
}

impl FromStr for EthAmount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason: &str| ConfigError::InvalidAmount {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("empty"));
        }

        let (whole_str, frac_str) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(invalid("no digits"));
        }
        if frac_str.len() > MAX_FRAC_DIGITS {
            return Err(invalid("more than 18 fractional digits"));
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a non-negative decimal"));
        }

        let whole: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| invalid("whole part overflow"))?
        };

        let frac: u128 = if frac_str.is_empty() {
            0
        } else {
            let scale = 10u128.pow((MAX_FRAC_DIGITS - frac_str.len()) as u32);
            let digits: u128 = frac_str.parse().map_err(|_| invalid("fraction overflow"))?;
            digits * scale
        };

        whole
            .checked_mul(WEI_PER_ETH)
            .and_then(|w| w.checked_add(frac))
            .map(EthAmount)
            .ok_or_else(|| invalid("amount overflow"))
    }
}

impl fmt::Display for EthAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frac = self.0 % WEI_PER_ETH;
        if frac == 0 {
            write!(f, "{}", self.whole())
        } else {
            write!(f, "{}.{}", self.whole(), self.frac_digits())
        }
    }
}

impl Serialize for EthAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EthAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
