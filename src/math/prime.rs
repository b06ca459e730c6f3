// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probable-prime testing and prime search as needed by discriminant
//! generation and the Fiat-Shamir challenge derivation.

use num_bigint::BigUint;
use num_integer::Integer;
use num_prime::nt_funcs::is_prime;
use num_prime::PrimalityTestConfig;
use num_traits::One;

/// Number of random-base Miller-Rabin rounds. Matches the 25 rounds the
/// consensus protocol was defined with.
const MILLER_RABIN_ROUNDS: usize = 25;

/// Check whether the input is a probable prime using 25 random-base
/// Miller-Rabin rounds on top of num-prime's default base tests.
pub fn is_probable_prime(x: &BigUint) -> bool {
    let mut config = PrimalityTestConfig::default();
    config.sprp_random_trials = MILLER_RABIN_ROUNDS;
    is_prime(x, Some(config)).probably()
}

/// Return the smallest probable prime greater than or equal to `n`,
/// stepping over odd candidates.
pub fn next_prime(n: &BigUint) -> BigUint {
    let two = BigUint::from(2u8);
    if n <= &two {
        return two;
    }
    let mut candidate = n.clone();
    if candidate.is_even() {
        candidate += BigUint::one();
    }
    while !is_probable_prime(&candidate) {
        candidate += &two;
    }
    candidate
}
