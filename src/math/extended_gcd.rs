// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bezout identities for the form-composition algorithms.
//!
//! NUCOMP and NUDUPL consume more than a plain gcd: they need the Bezout
//! coefficients together with both inputs divided by the gcd, and they run
//! a second, bounded remainder sequence whose length is capped by
//! `|discriminant|^{1/4}`. Both iterations are provided here over the
//! remainder/coefficient recurrences directly, so the cofactors fall out of
//! the final coefficient pair instead of requiring extra divisions.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::mem;

/// A solution of `a * u + b * v = gcd(a, b)` with `gcd >= 0`, together with
/// the cofactors `a / gcd` and `b / gcd`.
pub struct BezoutIdentity {
    pub gcd: BigInt,
    pub u: BigInt,
    pub v: BigInt,
    pub a_over_gcd: BigInt,
    pub b_over_gcd: BigInt,
}

/// Run the extended Euclidean algorithm on `a` and `b`.
///
/// The remainder sequence `r` and the coefficient sequences `u`, `v` follow
/// the invariant `r_k = a * u_k + b * v_k`. When the sequence terminates the
/// previous entries solve the identity, and the magnitudes of the final
/// entries are `|b| / gcd` and `|a| / gcd`, which only need their signs
/// aligned with the inputs.
pub(crate) fn bezout(a: &BigInt, b: &BigInt) -> BezoutIdentity {
    let mut r_prev = a.clone();
    let mut r_cur = b.clone();
    let mut u_prev = BigInt::one();
    let mut u_cur = BigInt::zero();
    let mut v_prev = BigInt::zero();
    let mut v_cur = BigInt::one();

    while !r_cur.is_zero() {
        let (quotient, remainder) = r_prev.div_rem(&r_cur);
        r_prev = mem::replace(&mut r_cur, remainder);
        let u_next = &u_prev - &quotient * &u_cur;
        u_prev = mem::replace(&mut u_cur, u_next);
        let v_next = &v_prev - &quotient * &v_cur;
        v_prev = mem::replace(&mut v_cur, v_next);
    }

    // Truncated division can leave the terminal remainder negative.
    if r_prev.is_negative() {
        r_prev = -r_prev;
        u_prev = -u_prev;
        v_prev = -v_prev;
    }

    BezoutIdentity {
        gcd: r_prev,
        u: u_prev,
        v: v_prev,
        a_over_gcd: align_sign(v_cur, a),
        b_over_gcd: align_sign(u_cur, b),
    }
}

/// Give `value` the sign of `reference`, leaving zero untouched.
fn align_sign(value: BigInt, reference: &BigInt) -> BigInt {
    if !value.is_zero() && value.sign() != reference.sign() {
        -value
    } else {
        value
    }
}

/// The truncated remainder sequence computed by [partial_bezout]: the last
/// two remainders `bx` and `by` and the coefficients of the second input
/// that produced them. `iterated` is false when the bound already covered
/// the inputs and nothing was computed.
pub(crate) struct PartialBezout {
    pub bx: BigInt,
    pub by: BigInt,
    pub x: BigInt,
    pub y: BigInt,
    pub iterated: bool,
}

/// Run the Euclidean iteration on `a` and `b`, stopping as soon as the
/// second remainder is at most `bound` in absolute value. After an odd
/// number of steps the remainder and its coefficient are negated, matching
/// the sign convention the composition formulas expect.
pub(crate) fn partial_bezout(a: BigInt, b: BigInt, bound: &BigInt) -> PartialBezout {
    let mut bx = a;
    let mut by = b;
    let mut x = BigInt::one();
    let mut y = BigInt::zero();
    let mut steps = 0u32;

    while by.abs() > *bound && !bx.is_zero() {
        let (quotient, remainder) = by.div_rem(&bx);
        by = mem::replace(&mut bx, remainder);
        let x_next = &y - &quotient * &x;
        y = mem::replace(&mut x, x_next);
        steps += 1;
    }

    if steps % 2 == 1 {
        by = -by;
        y = -y;
    }

    PartialBezout {
        bx,
        by,
        x,
        y,
        iterated: steps > 0,
    }
}
