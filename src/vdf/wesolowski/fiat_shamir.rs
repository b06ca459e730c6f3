// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fiat-Shamir derivation of the Wesolowski challenge prime.
//!
//! The challenge is derived from the full statement (discriminant, input
//! form, output form and iteration count), so the proof is bound to all
//! public parameters. The serialization fed to the hash is consensus
//! critical: unsigned big-endian magnitudes concatenated without length
//! prefixes, followed by the iteration count as 8 big-endian bytes.

use crate::class_group::{Discriminant, QuadraticForm};
use crate::hash::{HashFunction32, Sha256};
use crate::math::prime::next_prime;
use num_bigint::{BigInt, BigUint};

/// The bit which is set in the hash output before the prime search, so the
/// challenge prime is at least 2^263.
const CHALLENGE_PRIME_BIT: u64 = 263;

/// Compute the challenge prime for the statement `output = input^(2^iterations)`.
pub fn challenge_prime(
    discriminant: &Discriminant,
    input: &QuadraticForm,
    output: &QuadraticForm,
    iterations: u64,
) -> BigInt {
    challenge_prime_with_hash::<Sha256>(discriminant, input, output, iterations)
}

pub(crate) fn challenge_prime_with_hash<H: HashFunction32>(
    discriminant: &Discriminant,
    input: &QuadraticForm,
    output: &QuadraticForm,
    iterations: u64,
) -> BigInt {
    let mut seed = discriminant.to_be_bytes();
    absorb_form(&mut seed, input);
    absorb_form(&mut seed, output);
    seed.extend_from_slice(&iterations.to_be_bytes());

    let digest = H::digest(&seed);
    let mut candidate = BigUint::from_bytes_be(&digest);
    candidate.set_bit(CHALLENGE_PRIME_BIT, true);
    BigInt::from(next_prime(&candidate))
}

fn absorb_form(seed: &mut Vec<u8>, form: &QuadraticForm) {
    seed.extend_from_slice(&form.a().magnitude().to_bytes_be());
    seed.extend_from_slice(&form.b().magnitude().to_bytes_be());
    seed.extend_from_slice(&form.c().magnitude().to_bytes_be());
}
