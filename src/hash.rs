// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The 32-byte hash collaborator used for Fiat-Shamir challenges and
//! discriminant generation.
//!
//! Both uses are consensus-critical, so the hash is a real cryptographic
//! hash (SHA-256) rather than a placeholder. The trait exists so that a
//! deployment can substitute another 32-byte hash without touching the
//! callers.

use sha2::{Digest, Sha256 as Sha256Impl};

/// A hash function with a fixed 32-byte output.
pub trait HashFunction32 {
    fn digest(data: &[u8]) -> [u8; 32];
}

/// The default [HashFunction32], backed by SHA-256.
pub struct Sha256 {}

impl HashFunction32 for Sha256 {
    fn digest(data: &[u8]) -> [u8; 32] {
        let mut output = [0u8; 32];
        output.copy_from_slice(&Sha256Impl::digest(data));
        output
    }
}

/// Expand a seed into `length_in_bytes` deterministic bytes by hashing the
/// seed with an incrementing 32-bit big-endian block counter appended.
pub(crate) fn expand_seed<H: HashFunction32>(seed: &[u8], length_in_bytes: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(length_in_bytes);
    let mut counter = 0u32;
    while output.len() < length_in_bytes {
        let mut block = seed.to_vec();
        block.extend_from_slice(&counter.to_be_bytes());
        let digest = H::digest(&block);
        let remaining = length_in_bytes - output.len();
        output.extend_from_slice(&digest[..digest.len().min(remaining)]);
        counter += 1;
    }
    output
}
