//! Checked narrowing of 256-bit chain values and common denominations.

use alloy::primitives::{I256, U256};

/// One wei.
pub const WEI: U256 = U256::from_limbs([1, 0, 0, 0]);
/// 10^9 wei.
pub const GWEI: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);
/// 10^18 wei.
pub const ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Returns `value` as `u64` if it fits.
#[must_use]
pub fn u256_as_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

#[must_use]
pub fn u256_as_u64_or(value: U256, default: u64) -> u64 {
    u256_as_u64(value).unwrap_or(default)
}

#[must_use]
pub fn u256_as_u64_or_zero(value: U256) -> u64 {
    u256_as_u64_or(value, 0)
}

/// Returns `value` as `i64` if it fits.
#[must_use]
pub fn i256_as_i64(value: I256) -> Option<i64> {
    i64::try_from(value).ok()
}

#[must_use]
pub fn i256_as_i64_or(value: I256, default: i64) -> i64 {
    i256_as_i64(value).unwrap_or(default)
}

#[must_use]
pub fn i256_as_i64_or_zero(value: I256) -> i64 {
    i256_as_i64_or(value, 0)
}
