// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exponentiation over quadratic forms.

use crate::class_group::{Discriminant, QuadraticForm, Reducer};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Compute `base` raised to `exponent` under composition, reduced.
///
/// Left-to-right binary ladder: one squaring per exponent bit and one
/// composition per set bit. The whole exponentiation shares the caller's
/// [Reducer] so the scratch temporaries are allocated once. The exponent
/// must be non-negative; an exponent of zero yields the principal form.
pub fn fast_pow(
    base: &QuadraticForm,
    discriminant: &Discriminant,
    exponent: &BigInt,
    reducer: &mut Reducer,
) -> QuadraticForm {
    debug_assert!(!exponent.is_negative());
    if exponent.is_zero() {
        return QuadraticForm::principal(discriminant);
    }

    let mut result = base.clone();
    for i in (0..exponent.bits() - 1).rev() {
        result = result.square(reducer);
        if exponent.bit(i) {
            result = result.compose(base, reducer);
        }
    }
    result
}
