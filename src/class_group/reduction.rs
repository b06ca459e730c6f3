// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Normalization and reduction of binary quadratic forms.
//!
//! The [Reducer] owns the scratch integers used by the reduction loop and is
//! threaded explicitly through every operation that produces a non-reduced
//! form. A single reducer must only be used from one thread at a time; the
//! worker keeps one for the lifetime of a computation so the hot loop does
//! not reallocate its temporaries.

use crate::class_group::QuadraticForm;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;
use std::mem::swap;

/// Scratch state for the reduction loop. See section 5 in
/// <https://github.com/Chia-Network/chiavdf/blob/main/classgroups.pdf>.
#[derive(Debug, Default)]
pub struct Reducer {
    s: BigInt,
    r: BigInt,
}

impl Reducer {
    pub fn new() -> Self {
        Self {
            s: BigInt::zero(),
            r: BigInt::zero(),
        }
    }

    /// Bring `form` to normal form: -a < b <= a.
    fn normalize(&mut self, form: &mut QuadraticForm) {
        if form.is_normal() {
            return;
        }
        self.s = (&form.a - &form.b).div_floor(&form.a) >> 1;
        self.r = &self.s * &form.a;
        form.c += (&self.r + &form.b) * &self.s;
        form.b += &self.r << 1;
    }

    /// Replace `form` with the unique reduced representative of its class:
    /// normal, a <= c, and b >= 0 when a = c. Idempotent.
    pub fn reduce(&mut self, form: &mut QuadraticForm) {
        self.normalize(form);
        while !form.is_reduced_assuming_normal() {
            self.s = (&form.b + &form.c).div_floor(&form.c) >> 1;
            self.r = &form.c * &self.s;
            swap(&mut form.a, &mut form.c);
            form.c += (&self.r - &form.b) * &self.s;
            form.b = (&self.r << 1) - &form.b;
        }
    }
}
