//! Checked fixed-point arithmetic and the two index primitives.
//!
//! `advance_pool_index` and `rewards_from_index` are the only places integer
//! division enters the reward path between pool and stake balances; both
//! truncate toward zero, and that rounding is canonical: any replica of this
//! ledger must reproduce it bit-for-bit.
//!
//! Products of two scaled `u128` values need up to 256 bits, so `mul_div_floor`
//! widens through a `(hi, lo)` limb pair rather than saturating.

use crate::types::UNIT;
use crate::{PoolError, Result};

pub fn add_u128(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(PoolError::Overflow)
}

pub fn sub_u128(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(PoolError::Underflow)
}

const MASK64: u128 = (1u128 << 64) - 1;

/// Full 128×128→256 multiplication over 64-bit limbs.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let a_lo = a & MASK64;
    let a_hi = a >> 64;
    let b_lo = b & MASK64;
    let b_hi = b >> 64;

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    let mid = (p0 >> 64) + (p1 & MASK64) + (p2 & MASK64);
    let lo = (p0 & MASK64) | ((mid & MASK64) << 64);
    let hi = p3 + (p1 >> 64) + (p2 >> 64) + (mid >> 64);
    (hi, lo)
}

/// Divide the 256-bit value `hi·2^128 + lo` by `d`, truncating.
///
/// Preconditions: `d != 0` and `hi < d` (quotient must fit in 128 bits).
fn div_wide(hi: u128, lo: u128, d: u128) -> u128 {
    debug_assert!(d != 0 && hi < d);
    let mut rem = hi;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        // rem < 2d at this point; one restoring step keeps rem < d.
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1 << i;
        }
    }
    quot
}

/// `a * b / denom`, truncating toward zero, exact through a 256-bit
/// intermediate. Fails closed on a zero denominator or a quotient that does
/// not fit in `u128`.
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> Result<u128> {
    if denom == 0 {
        return Err(PoolError::InvalidAmount);
    }
    match a.checked_mul(b) {
        Some(p) => Ok(p / denom),
        None => {
            let (hi, lo) = mul_wide(a, b);
            if hi >= denom {
                return Err(PoolError::Overflow);
            }
            Ok(div_wide(hi, lo, denom))
        }
    }
}

/// Advance the pool index from `last_ts` to `now`.
///
/// Returns `(next_index, effective_ts, emitted)`. When emission is inert
/// (zero rate, zero allocation, no elapsed time, or the schedule already
/// ended) the triple is `(current_index, last_ts, 0)`. Otherwise time is
/// clamped to `end_time` and the index grows by `emitted · UNIT /
/// total_alloc`.
pub fn advance_pool_index(
    current_index: u128,
    eps: u128,
    last_ts: u64,
    total_alloc: u128,
    now: u64,
    end_time: u64,
) -> Result<(u128, u64, u128)> {
    if eps == 0 || total_alloc == 0 || last_ts >= now || last_ts >= end_time {
        return Ok((current_index, last_ts, 0));
    }
    let effective_ts = now.min(end_time);
    let dt = (effective_ts - last_ts) as u128;
    let emitted = eps.checked_mul(dt).ok_or(PoolError::Overflow)?;
    let next = add_u128(current_index, mul_div_floor(emitted, UNIT, total_alloc)?)?;
    Ok((next, effective_ts, emitted))
}

/// Reward owed to `balance` for the index interval `[prior_index, cur_index]`.
pub fn rewards_from_index(balance: u128, cur_index: u128, prior_index: u128) -> Result<u128> {
    let delta = sub_u128(cur_index, prior_index)?;
    mul_div_floor(balance, delta, UNIT)
}
