use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An amount of coins. Amounts are signed so that the validator can detect
/// negative outputs and negative fees instead of silently wrapping, and all
/// arithmetic is checked: transaction amounts arrive from untrusted peers,
/// so overflow yields `None` rather than panicking or wrapping.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Coin(i64);

impl Coin {
    pub const fn new(amount: i64) -> Self {
        Coin(amount)
    }

    pub fn zero() -> Self {
        Self::new(0)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Coin) -> Option<Coin> {
        self.0.checked_add(rhs.0).map(Coin)
    }

    pub fn checked_sub(self, rhs: Coin) -> Option<Coin> {
        self.0.checked_sub(rhs.0).map(Coin)
    }
}

impl From<i64> for Coin {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} FKC", self.0)
    }
}
