// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{VdfError, VdfResult};
use crate::hash::{expand_seed, HashFunction32, Sha256};
use crate::math::prime::is_probable_prime;
use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed};
use serde::{Deserialize, Deserializer, Serialize};
use std::ops::Neg;

/// The smallest discriminant size we accept. Anything below this gives a
/// class group too small to be meaningful as a delay function.
pub const MIN_DISCRIMINANT_SIZE_IN_BITS: u64 = 64;

/// A discriminant for an imaginary class group. The discriminant is a negative
/// integer congruent to 1 mod 4.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Discriminant(#[serde(with = "crate::class_group::bigint_serde")] BigInt);

impl TryFrom<BigInt> for Discriminant {
    type Error = VdfError;

    fn try_from(value: BigInt) -> VdfResult<Self> {
        if !value.is_negative() || value.mod_floor(&BigInt::from(4)) != BigInt::one() {
            return Err(VdfError::InvalidDiscriminant);
        }
        Ok(Self(value))
    }
}

impl Discriminant {
    /// Return the number of bits needed to represent this discriminant, not
    /// including the sign bit.
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    /// The big-endian byte representation of the absolute value of this
    /// discriminant. This is the canonical wire form.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.0.magnitude().to_bytes_be()
    }

    /// Borrow a reference to the underlying big integer.
    pub(crate) fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    /// Import a discriminant from the big-endian bytes of its absolute value.
    ///
    /// The resulting value must be strictly negative and congruent to 1 mod 4;
    /// anything else is rejected. No adjustment is performed. This is the
    /// import the verifier uses.
    pub fn try_from_be_bytes(bytes: &[u8]) -> VdfResult<Self> {
        if bytes.is_empty() {
            return Err(VdfError::InvalidDiscriminant);
        }
        Self::try_from(BigInt::from_bytes_be(Sign::Plus, bytes).neg())
    }

    /// Import a discriminant from the big-endian bytes of its absolute value,
    /// forcing it to 1 mod 4 as the engine's start path does: subtract the
    /// residue and add 1, then step down by 4 if the adjustment made the
    /// value non-negative. Fails with [VdfError::InvalidDiscriminant] only
    /// when the value cannot be made strictly negative.
    pub fn from_be_bytes_adjusted(bytes: &[u8]) -> VdfResult<Self> {
        if bytes.is_empty() {
            return Err(VdfError::InvalidDiscriminant);
        }
        let mut value = BigInt::from_bytes_be(Sign::Plus, bytes).neg();
        let residue = value.mod_floor(&BigInt::from(4));
        if residue != BigInt::one() {
            value = value - residue + BigInt::one();
            if !value.is_negative() {
                value -= BigInt::from(4);
            }
        }
        Self::try_from(value)
    }

    /// Deterministically generate a discriminant of the given bit length from
    /// a seed.
    ///
    /// The seed is expanded with the hash collaborator into a candidate of
    /// exactly `size_in_bits` bits with the lower three bits set, so that the
    /// candidate is 7 mod 8 and the discriminant 1 mod 8. The candidate is
    /// then stepped (preserving the residue) until it passes the Miller-Rabin
    /// test, and its negation is returned.
    pub fn generate(size_in_bits: u64, seed: &[u8]) -> VdfResult<Self> {
        Self::generate_with_hash::<Sha256>(size_in_bits, seed)
    }

    pub(crate) fn generate_with_hash<H: HashFunction32>(
        size_in_bits: u64,
        seed: &[u8],
    ) -> VdfResult<Self> {
        if size_in_bits < MIN_DISCRIMINANT_SIZE_IN_BITS {
            return Err(VdfError::InvalidParameters);
        }
        let length_in_bytes = (size_in_bits as usize + 7) / 8;
        let mut bytes = expand_seed::<H>(seed, length_in_bytes);

        // Truncate to the requested bit length and pin the top bit.
        let excess_bits = (8 * length_in_bytes) as u64 - size_in_bits;
        bytes[0] &= 0xffu8 >> excess_bits;
        bytes[0] |= 1u8 << (7 - excess_bits);
        // Candidate = 7 mod 8.
        let last = bytes.len() - 1;
        bytes[last] |= 0x07;

        let mut candidate = BigUint::from_bytes_be(&bytes);
        let step = BigUint::from(8u8);
        while !is_probable_prime(&candidate) {
            candidate += &step;
        }
        Self::try_from(BigInt::from(candidate).neg())
    }

    /// Derive a discriminant from a 32-byte challenge: the first four bytes,
    /// read as a big-endian integer, seed the generation.
    pub fn from_challenge(challenge: &[u8; 32], size_in_bits: u64) -> VdfResult<Self> {
        let seed = u32::from_be_bytes(
            challenge[..4]
                .try_into()
                .expect("challenge has at least 4 bytes"),
        );
        Self::generate(size_in_bits, &seed.to_be_bytes())
    }
}

impl<'de> Deserialize<'de> for Discriminant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::try_from(crate::class_group::bigint_serde::deserialize(deserializer)?)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminant_validation() {
        let discriminant = Discriminant::try_from(BigInt::from(-223)).unwrap();
        assert_eq!(discriminant.bits(), 8);
        assert_eq!(discriminant.as_bigint(), &BigInt::from(-223));

        // Not 1 mod 4.
        assert_eq!(
            Discriminant::try_from(BigInt::from(-30)),
            Err(VdfError::InvalidDiscriminant)
        );

        // Not negative.
        let candidate = BigInt::from(17);
        assert_eq!(candidate.mod_floor(&BigInt::from(4)), BigInt::one());
        assert_eq!(
            Discriminant::try_from(candidate),
            Err(VdfError::InvalidDiscriminant)
        );
    }

    #[test]
    fn test_from_bytes_rejects_invalid() {
        assert_eq!(
            Discriminant::try_from_be_bytes(&[]),
            Err(VdfError::InvalidDiscriminant)
        );
        assert_eq!(
            Discriminant::try_from_be_bytes(&[0]),
            Err(VdfError::InvalidDiscriminant)
        );
        // 30 = 2 mod 4, so -30 = 2 mod 4: rejected rather than adjusted.
        assert_eq!(
            Discriminant::try_from_be_bytes(&[30]),
            Err(VdfError::InvalidDiscriminant)
        );
        assert!(Discriminant::try_from_be_bytes(&[223]).is_ok());
    }

    #[test]
    fn test_from_bytes_adjusted_forces_residue() {
        // Every residue class lands on the nearest valid value at or below.
        for magnitude in [29u8, 30, 31, 32] {
            assert_eq!(
                Discriminant::from_be_bytes_adjusted(&[magnitude])
                    .unwrap()
                    .as_bigint(),
                &BigInt::from(-31)
            );
        }
        // Zero is stepped down past the sign change.
        assert_eq!(
            Discriminant::from_be_bytes_adjusted(&[0]).unwrap().as_bigint(),
            &BigInt::from(-3)
        );
        assert_eq!(
            Discriminant::from_be_bytes_adjusted(&[]),
            Err(VdfError::InvalidDiscriminant)
        );
    }

    #[test]
    fn test_bytes_round_trip() {
        let discriminant = Discriminant::generate(256, b"discriminant seed").unwrap();
        let bytes = discriminant.to_be_bytes();
        let reimported = Discriminant::try_from_be_bytes(&bytes).unwrap();
        assert_eq!(discriminant, reimported);
    }

    #[test]
    fn test_generate() {
        for size in [64, 256, 512] {
            let discriminant = Discriminant::generate(size, b"seed").unwrap();
            assert_eq!(discriminant.bits(), size);
            assert!(discriminant.as_bigint().is_negative());
            assert_eq!(
                discriminant.as_bigint().mod_floor(&BigInt::from(8)),
                BigInt::one()
            );
            assert!(is_probable_prime(discriminant.as_bigint().magnitude()));
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = Discriminant::generate(256, b"seed").unwrap();
        let b = Discriminant::generate(256, b"seed").unwrap();
        let c = Discriminant::generate(256, b"other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generate_rejects_small_sizes() {
        assert_eq!(
            Discriminant::generate(63, b"seed"),
            Err(VdfError::InvalidParameters)
        );
        assert_eq!(
            Discriminant::generate(0, b"seed"),
            Err(VdfError::InvalidParameters)
        );
    }

    #[test]
    fn test_from_challenge_uses_first_four_bytes() {
        let mut challenge = [0u8; 32];
        for (i, byte) in challenge.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let discriminant = Discriminant::from_challenge(&challenge, 128).unwrap();

        // Only the first four bytes matter.
        let mut other = challenge;
        other[20] = 0xff;
        assert_eq!(
            discriminant,
            Discriminant::from_challenge(&other, 128).unwrap()
        );

        let mut other = challenge;
        other[3] ^= 1;
        assert_ne!(
            discriminant,
            Discriminant::from_challenge(&other, 128).unwrap()
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let discriminant = Discriminant::generate(256, &[1, 2, 3]).unwrap();
        let bytes = bcs::to_bytes(&discriminant).unwrap();
        let discriminant2: Discriminant = bcs::from_bytes(&bytes).unwrap();
        assert_eq!(discriminant, discriminant2);

        // A positive value must not deserialize.
        assert!(bcs::from_bytes::<Discriminant>(&bcs::to_bytes(&vec![0x11u8]).unwrap()).is_err());
    }
}
