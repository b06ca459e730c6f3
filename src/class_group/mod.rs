// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Imaginary class groups represented by binary quadratic forms. The forms
//! form a group under composition, computed here with the NUCOMP and NUDUPL
//! algorithms of Jacobson and van der Poorten, with Pulmark-style reduction
//! driven by an explicit [Reducer].

use crate::error::{VdfError, VdfResult};
use crate::math::extended_gcd::{bezout, partial_bezout, PartialBezout};
use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_traits::{One, Signed, Zero};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

mod bigint_serde;
pub mod discriminant;
mod multiplier;
mod reduction;

pub use discriminant::Discriminant;
pub use multiplier::fast_pow;
pub use reduction::Reducer;


/// A binary quadratic form, (a, b, c) for arbitrary integers a, b, and c.
///
/// The `partial_gcd_limit` variable is equal to `|discriminant|^{1/4}` and is
/// used to terminate the partial extended Euclidean algorithm early in the
/// composition algorithms.
#[derive(Debug, Clone)]
pub struct QuadraticForm {
    pub(crate) a: BigInt,
    pub(crate) b: BigInt,
    pub(crate) c: BigInt,
    partial_gcd_limit: BigInt,
}

impl PartialEq for QuadraticForm {
    fn eq(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b && self.c == other.c
    }
}

impl Eq for QuadraticForm {}

impl QuadraticForm {
    /// Create a new quadratic form given only the a and b coefficients and the
    /// discriminant.
    pub fn from_a_b_discriminant(a: BigInt, b: BigInt, discriminant: &Discriminant) -> VdfResult<Self> {
        if !a.is_positive() {
            return Err(VdfError::InvalidForm);
        }
        let numerator = &b * &b - discriminant.as_bigint();
        let denominator = &a << 2;
        if !numerator.is_multiple_of(&denominator) {
            return Err(VdfError::InvalidForm);
        }
        let c = numerator / denominator;
        Ok(Self {
            a,
            b,
            c,
            partial_gcd_limit: partial_gcd_limit(discriminant),
        })
    }

    /// Create a quadratic form from all three coefficients, checking that it
    /// is valid for the given discriminant: b^2 - 4ac = D, a > 0 and c > 0.
    pub fn from_coefficients(
        a: BigInt,
        b: BigInt,
        c: BigInt,
        discriminant: &Discriminant,
    ) -> VdfResult<Self> {
        let form = Self {
            a,
            b,
            c,
            partial_gcd_limit: partial_gcd_limit(discriminant),
        };
        if !form.is_valid(discriminant) {
            return Err(VdfError::InvalidForm);
        }
        Ok(form)
    }

    /// Return a generator (or, more precisely, an element with a presumed
    /// large order) in a class group with a given discriminant. We use the
    /// element `(2, 1, c)` where `c` is determined from the discriminant.
    ///
    /// This fails with [VdfError::InvalidDiscriminant] when the discriminant
    /// is 5 mod 8, since no form with a = 2 and b = 1 exists in that case.
    /// Discriminants produced by [Discriminant::generate] are always 1 mod 8.
    pub fn generator(discriminant: &Discriminant) -> VdfResult<Self> {
        Self::from_a_b_discriminant(BigInt::from(2), BigInt::one(), discriminant)
            .map_err(|_| VdfError::InvalidDiscriminant)
    }

    /// Return the principal form `(1, 1, c)`. This is the identity of the
    /// class group.
    pub fn principal(discriminant: &Discriminant) -> Self {
        Self::from_a_b_discriminant(BigInt::one(), BigInt::one(), discriminant)
            .expect("1 - D is divisible by 4 for D = 1 mod 4")
    }

    /// Compute the discriminant `b^2 - 4ac` for this quadratic form.
    pub fn discriminant(&self) -> VdfResult<Discriminant> {
        Discriminant::try_from(&self.b * &self.b - ((&self.a * &self.c) << 2))
    }

    /// The a coefficient.
    pub fn a(&self) -> &BigInt {
        &self.a
    }

    /// The b coefficient.
    pub fn b(&self) -> &BigInt {
        &self.b
    }

    /// The c coefficient.
    pub fn c(&self) -> &BigInt {
        &self.c
    }

    /// Check that this form is valid for the given discriminant:
    /// b^2 - 4ac = D, a > 0 and c > 0.
    pub fn is_valid(&self, discriminant: &Discriminant) -> bool {
        self.a.is_positive()
            && self.c.is_positive()
            && &self.b * &self.b - ((&self.a * &self.c) << 2) == *discriminant.as_bigint()
    }

    /// Return true if this form is in normal form: -a < b <= a.
    pub(crate) fn is_normal(&self) -> bool {
        match self.b.magnitude().cmp(self.a.magnitude()) {
            Ordering::Less => true,
            Ordering::Equal => !self.b.is_negative(),
            Ordering::Greater => false,
        }
    }

    /// Return true if this form is reduced, assuming it is already normal:
    /// a <= c, and b >= 0 when a = c.
    pub(crate) fn is_reduced_assuming_normal(&self) -> bool {
        match self.a.cmp(&self.c) {
            Ordering::Less => true,
            Ordering::Equal => !self.b.is_negative(),
            Ordering::Greater => false,
        }
    }

    /// Return true if this form is reduced: -a < b <= a <= c, and b >= 0 when
    /// a = c.
    pub fn is_reduced(&self) -> bool {
        self.is_normal() && self.is_reduced_assuming_normal()
    }

    /// The inverse of this form under composition, `(a, -b, c)` reduced.
    pub fn inverse(&self, reducer: &mut Reducer) -> Self {
        let mut result = Self {
            a: self.a.clone(),
            b: -&self.b,
            c: self.c.clone(),
            partial_gcd_limit: self.partial_gcd_limit.clone(),
        };
        reducer.reduce(&mut result);
        result
    }

    /// Compute the composition of this quadratic form with another one and
    /// reduce the result.
    pub fn compose(&self, rhs: &QuadraticForm, reducer: &mut Reducer) -> QuadraticForm {
        // Slightly optimised version of Algorithm 1 from Jacobson, Jr, Michael & Poorten, Alfred
        // (2002). "Computational aspects of NUCOMP", Lecture Notes in Computer Science.
        // (https://www.researchgate.net/publication/221451638_Computational_aspects_of_NUCOMP)
        // The paragraph numbers and variable names follow the paper.

        let u1 = &self.a;
        let v1 = &self.b;
        let w1 = &self.c;
        let u2 = &rhs.a;
        let v2 = &rhs.b;
        let w2 = &rhs.c;

        // 1.
        if w1 < w2 {
            return rhs.compose(self, reducer);
        }
        let s: BigInt = (v1 + v2) >> 1;
        let m = v2 - &s;

        // 2.
        let xgcd = bezout(u2, u1);
        let f = xgcd.gcd;
        let b = xgcd.u;
        let c = xgcd.v;

        let g: BigInt;
        let capital_bx: BigInt;
        let capital_by: BigInt;
        let capital_cy: BigInt;
        let capital_dy: BigInt;

        if s.is_multiple_of(&f) {
            g = f;
            capital_bx = &m * &b;
            capital_by = xgcd.b_over_gcd;
            capital_cy = xgcd.a_over_gcd;
            capital_dy = &s / &g;
        } else {
            // 3.
            let xgcd_prime = bezout(&f, &s);
            g = xgcd_prime.gcd;
            let y = xgcd_prime.v;
            let h = xgcd_prime.a_over_gcd;
            capital_by = u1 / &g;
            capital_cy = u2 / &g;
            capital_dy = xgcd_prime.b_over_gcd;

            // 4.
            let l = (&y * (&b * w1.mod_floor(&h) + &c * w2.mod_floor(&h))).mod_floor(&h);
            capital_bx = &b * (&m / &h) + &l * (&capital_by / &h);
        }

        // 5. (partial xgcd)
        let PartialBezout {
            bx,
            by,
            x,
            y,
            iterated,
        } = partial_bezout(
            capital_bx.mod_floor(&capital_by),
            capital_by.clone(),
            &self.partial_gcd_limit,
        );

        let u3: BigInt;
        let v3: BigInt;
        let w3: BigInt;

        if !iterated {
            // 6.
            let q = &capital_cy * &bx;
            let cx = (&q - &m) / &capital_by;
            let dx = (&bx * &capital_dy - w2) / &capital_by;
            u3 = &by * &capital_cy;
            w3 = &bx * &cx - &g * &dx;
            v3 = v2 - (&q << 1);
        } else {
            // 7.
            let cx = (&capital_cy * &bx - &m * &x) / &capital_by;
            let q1 = &by * &cx;
            let q2 = &q1 + &m;
            let dx = (&capital_dy * &bx - w2 * &x) / &capital_by;
            let q3 = &y * &dx;
            let q4 = &q3 + &capital_dy;
            let dy = &q4 / &x;
            let cy = if !b.is_zero() {
                &q2 / &bx
            } else {
                (&cx * &dy - w1) / &dx
            };
            u3 = &by * &cy - &g * (&y * &dy);
            w3 = &bx * &cx - &g * (&x * &dx);
            v3 = &g * (&q3 + &q4) - &q1 - &q2;
        }

        let mut result = QuadraticForm {
            a: u3,
            b: v3,
            c: w3,
            partial_gcd_limit: self.partial_gcd_limit.clone(),
        };
        reducer.reduce(&mut result);
        result
    }

    /// Compute the square of this form under composition and reduce the
    /// result. This is the sequential unit of work of the delay function.
    pub fn square(&self, reducer: &mut Reducer) -> QuadraticForm {
        // Slightly optimised version of Algorithm 2 from Jacobson, Jr, Michael & Poorten, Alfred
        // (2002). "Computational aspects of NUCOMP", Lecture Notes in Computer Science.
        // (https://www.researchgate.net/publication/221451638_Computational_aspects_of_NUCOMP)
        // The paragraph numbers and variable names follow the paper.

        let xgcd = bezout(&self.b, &self.a);
        let g = xgcd.gcd;
        let u = xgcd.b_over_gcd;
        let initial_bx = (&xgcd.u * &self.c).mod_floor(&u);

        let PartialBezout {
            bx,
            by,
            x,
            y,
            iterated,
        } = partial_bezout(initial_bx, u.clone(), &self.partial_gcd_limit);

        let u3: BigInt;
        let v3: BigInt;
        let w3: BigInt;

        if !iterated {
            let dx = (&bx * &self.b - &self.c * &g) / &u;
            u3 = &u * &by;
            v3 = &self.b - ((&bx * &by) << 1);
            w3 = &bx * &bx - dx;
        } else {
            let dx = (&bx * &self.b - (&self.c * &x) * &g) / &u;
            let q = &y * &dx;
            u3 = &by * &by - &y * ((&q + &self.b) / &x);
            v3 = &self.b - ((&bx * &by - &q) << 1);
            w3 = &bx * &bx - &x * &dx;
        }

        let mut result = QuadraticForm {
            a: u3,
            b: v3,
            c: w3,
            partial_gcd_limit: self.partial_gcd_limit.clone(),
        };
        reducer.reduce(&mut result);
        result
    }
}

/// The bound used by the partial extended Euclidean algorithm inside NUCOMP
/// and NUDUPL: floor(|D|^{1/4}).
fn partial_gcd_limit(discriminant: &Discriminant) -> BigInt {
    BigInt::from(discriminant.as_bigint().magnitude().nth_root(4))
}

/// Serialized representation: the signed big-endian bytes of the three
/// coefficients. The partial gcd limit is recomputed from the discriminant
/// on deserialization.
#[derive(Serialize, Deserialize)]
struct QuadraticFormRepr {
    a: Vec<u8>,
    b: Vec<u8>,
    c: Vec<u8>,
}

impl Serialize for QuadraticForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        QuadraticFormRepr {
            a: self.a.to_signed_bytes_be(),
            b: self.b.to_signed_bytes_be(),
            c: self.c.to_signed_bytes_be(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuadraticForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = QuadraticFormRepr::deserialize(deserializer)?;
        let a = BigInt::from_signed_bytes_be(&repr.a);
        let b = BigInt::from_signed_bytes_be(&repr.b);
        let c = BigInt::from_signed_bytes_be(&repr.c);
        let discriminant = Discriminant::try_from(&b * &b - ((&a * &c) << 2))
            .map_err(D::Error::custom)?;
        QuadraticForm::from_coefficients(a, b, c, &discriminant).map_err(D::Error::custom)
    }
}
