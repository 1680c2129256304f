//! Deposit offers and active deposits.

use crate::components::OutputOwners;
use crate::ids::Id;
use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};

/// Seconds in a (365 day) year.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;

/// Fixed denominator for interest rate nominators: a nominator of
/// `1_000_000` pays 100% per year.
pub const INTEREST_RATE_DENOMINATOR: u128 = 1_000_000 * SECONDS_PER_YEAR as u128;

/// `floor(amount * seconds * nominator / INTEREST_RATE_DENOMINATOR)`.
///
/// Fails with [`TypesError::Overflow`] if the product or the result does not fit.
pub fn interest(amount: u64, seconds: u64, nominator: u64) -> TypesResult<u64> {
    let reward = (amount as u128)
        .checked_mul(seconds as u128)
        .and_then(|v| v.checked_mul(nominator as u128))
        .ok_or(TypesError::Overflow)?
        / INTEREST_RATE_DENOMINATOR;
    u64::try_from(reward).map_err(|_| TypesError::Overflow)
}

/// Terms under which funds may be deposited.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DepositOffer {
    /// Offer ID; the ID of the transaction that added it.
    pub id: Id,
    /// Per-year rate over [`INTEREST_RATE_DENOMINATOR`].
    pub interest_rate_nominator: u64,
    /// Unix time from which deposits may start.
    pub start: u64,
    /// Unix time by which deposits must end.
    pub end: u64,
    pub min_amount: u64,
    pub min_duration: u64,
    pub max_duration: u64,
    /// Leading part of every deposit that earns nothing.
    pub no_rewards_period_duration: u64,
    /// Cap on the sum of all deposits, 0 for unlimited.
    pub total_max_amount: u64,
    /// Sum currently deposited under this offer.
    pub deposited_amount: u64,
    pub memo: Vec<u8>,
    /// Reserved; non-zero flags disable the offer.
    pub flags: u64,
}

impl DepositOffer {
    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        if self.start >= self.end {
            return Err(TypesError::InvalidDepositOffer(format!(
                "start {} not before end {}",
                self.start, self.end
            )));
        }
        if self.min_duration == 0 {
            return Err(TypesError::InvalidDepositOffer(
                "zero minimum duration".to_string(),
            ));
        }
        if self.min_duration > self.max_duration {
            return Err(TypesError::InvalidDepositOffer(format!(
                "min duration {} exceeds max duration {}",
                self.min_duration, self.max_duration
            )));
        }
        if self.no_rewards_period_duration >= self.min_duration {
            return Err(TypesError::InvalidDepositOffer(
                "no-rewards period must be shorter than the minimum duration".to_string(),
            ));
        }
        if self.max_duration > self.end - self.start {
            return Err(TypesError::InvalidDepositOffer(
                "max duration longer than the offer window".to_string(),
            ));
        }
        if self.deposited_amount != 0 {
            return Err(TypesError::InvalidDepositOffer(
                "new offer must have nothing deposited".to_string(),
            ));
        }
        Ok(())
    }

    /// True if the offer accepts new deposits.
    pub fn is_enabled(&self) -> bool {
        self.flags == 0
    }

    /// Amount still depositable under `total_max_amount`.
    pub fn remaining_amount(&self) -> u64 {
        if self.total_max_amount == 0 {
            u64::MAX
        } else {
            self.total_max_amount.saturating_sub(self.deposited_amount)
        }
    }
}

/// Funds locked under an offer.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub offer_id: Id,
    /// Chain time at which the deposit was made.
    pub start: u64,
    pub duration: u64,
    pub amount: u64,
    /// Who receives the interest.
    pub reward_owner: OutputOwners,
}

impl Deposit {
    /// Unlock time.
    pub fn end_time(&self) -> u64 {
        self.start.saturating_add(self.duration)
    }

    /// Interest accrued over the whole duration.
    pub fn total_reward(&self, offer: &DepositOffer) -> TypesResult<u64> {
        let earning = self.duration.saturating_sub(offer.no_rewards_period_duration);
        interest(self.amount, earning, offer.interest_rate_nominator)
    }
}
