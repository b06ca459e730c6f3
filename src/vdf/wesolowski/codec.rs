// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bit-exact serialization of the proof blobs. All integers are big-endian.
//!
//! Final proof (version 0x02):
//! ```text
//! 0x02 | recursion_level | T:8 | len(l):1 | l | (len:2 | bytes) for pi.a, pi.b, pi.c
//! ```
//!
//! Checkpoint proof (version 0x03):
//! ```text
//! 0x03 | t:8 | (len:2 | bytes) for cp.a, cp.b, cp.c, pi.a, pi.b, pi.c | len(l):1 | l
//! ```
//!
//! Sentinel initial checkpoint (version 0x04): the single version byte.
//!
//! Form coordinates are encoded as signed big-endian two's complement so
//! that the sign of b round-trips; the challenge prime is encoded as an
//! unsigned magnitude. Length fields are exact. Parsers consume the whole
//! input and reject truncated or oversized blobs without partial state.

use crate::class_group::QuadraticForm;
use crate::error::{VdfError, VdfResult};
use num_bigint::{BigInt, Sign};

/// Version byte of a full Wesolowski proof.
pub const FINAL_PROOF_VERSION: u8 = 0x02;

/// Version byte of a checkpoint (segment) proof.
pub const CHECKPOINT_PROOF_VERSION: u8 = 0x03;

/// Version byte of the sentinel blob stored for the initial checkpoint.
pub const INITIAL_CHECKPOINT_VERSION: u8 = 0x04;

/// A parsed full Wesolowski proof. The proof form is kept as raw
/// coefficients; the verifier rebuilds and validates the form against the
/// discriminant it trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalProof {
    pub recursion_level: u8,
    pub iterations: u64,
    pub challenge: BigInt,
    pub proof: [BigInt; 3],
}

/// A parsed checkpoint proof for the segment ending at `iteration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointProof {
    pub iteration: u64,
    pub form: [BigInt; 3],
    pub proof: [BigInt; 3],
    pub challenge: BigInt,
}

/// The sentinel blob recorded for the checkpoint at iteration 0.
pub fn sentinel_blob() -> Vec<u8> {
    vec![INITIAL_CHECKPOINT_VERSION]
}

/// Serialize a full Wesolowski proof.
pub fn encode_final(
    recursion_level: u8,
    iterations: u64,
    challenge: &BigInt,
    proof: &QuadraticForm,
) -> VdfResult<Vec<u8>> {
    let mut blob = vec![FINAL_PROOF_VERSION, recursion_level];
    blob.extend_from_slice(&iterations.to_be_bytes());
    put_challenge(&mut blob, challenge)?;
    put_coefficient(&mut blob, proof.a())?;
    put_coefficient(&mut blob, proof.b())?;
    put_coefficient(&mut blob, proof.c())?;
    Ok(blob)
}

/// Parse a full Wesolowski proof, rejecting any malformed or truncated input.
pub fn decode_final(blob: &[u8]) -> VdfResult<FinalProof> {
    let mut reader = Reader::new(blob);
    if reader.u8()? != FINAL_PROOF_VERSION {
        return Err(VdfError::VerificationFailed);
    }
    let recursion_level = reader.u8()?;
    let iterations = reader.u64()?;
    let challenge = reader.challenge()?;
    let proof = [
        reader.coefficient()?,
        reader.coefficient()?,
        reader.coefficient()?,
    ];
    reader.finish()?;
    Ok(FinalProof {
        recursion_level,
        iterations,
        challenge,
        proof,
    })
}

/// Serialize a checkpoint proof for the segment ending at the given absolute
/// iteration.
pub fn encode_checkpoint(
    iteration: u64,
    form: &QuadraticForm,
    proof: &QuadraticForm,
    challenge: &BigInt,
) -> VdfResult<Vec<u8>> {
    let mut blob = vec![CHECKPOINT_PROOF_VERSION];
    blob.extend_from_slice(&iteration.to_be_bytes());
    for coefficient in [form.a(), form.b(), form.c(), proof.a(), proof.b(), proof.c()] {
        put_coefficient(&mut blob, coefficient)?;
    }
    put_challenge(&mut blob, challenge)?;
    Ok(blob)
}

/// Parse a checkpoint proof, rejecting any malformed or truncated input.
/// The sentinel blob is not a checkpoint proof and is rejected here.
pub fn decode_checkpoint(blob: &[u8]) -> VdfResult<CheckpointProof> {
    let mut reader = Reader::new(blob);
    if reader.u8()? != CHECKPOINT_PROOF_VERSION {
        return Err(VdfError::VerificationFailed);
    }
    let iteration = reader.u64()?;
    let form = [
        reader.coefficient()?,
        reader.coefficient()?,
        reader.coefficient()?,
    ];
    let proof = [
        reader.coefficient()?,
        reader.coefficient()?,
        reader.coefficient()?,
    ];
    let challenge = reader.challenge()?;
    reader.finish()?;
    Ok(CheckpointProof {
        iteration,
        form,
        proof,
        challenge,
    })
}

fn put_coefficient(blob: &mut Vec<u8>, value: &BigInt) -> VdfResult<()> {
    let bytes = value.to_signed_bytes_be();
    let length =
        u16::try_from(bytes.len()).map_err(|_| VdfError::ProofGenerationFailed)?;
    blob.extend_from_slice(&length.to_be_bytes());
    blob.extend_from_slice(&bytes);
    Ok(())
}

fn put_challenge(blob: &mut Vec<u8>, challenge: &BigInt) -> VdfResult<()> {
    let bytes = challenge.magnitude().to_bytes_be();
    let length = u8::try_from(bytes.len()).map_err(|_| VdfError::ProofGenerationFailed)?;
    blob.push(length);
    blob.extend_from_slice(&bytes);
    Ok(())
}

/// Cursor over a blob. Every read is bounds checked; [Reader::finish]
/// rejects trailing bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, length: usize) -> VdfResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(length)
            .ok_or(VdfError::VerificationFailed)?;
        if end > self.bytes.len() {
            return Err(VdfError::VerificationFailed);
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> VdfResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> VdfResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_be_bytes(
            bytes.try_into().expect("take returned 8 bytes"),
        ))
    }

    fn coefficient(&mut self) -> VdfResult<BigInt> {
        let length = u16::from_be_bytes(
            self.take(2)?.try_into().expect("take returned 2 bytes"),
        ) as usize;
        Ok(BigInt::from_signed_bytes_be(self.take(length)?))
    }

    fn challenge(&mut self) -> VdfResult<BigInt> {
        let length = self.u8()? as usize;
        Ok(BigInt::from_bytes_be(Sign::Plus, self.take(length)?))
    }

    fn finish(self) -> VdfResult<()> {
        if self.offset != self.bytes.len() {
            return Err(VdfError::VerificationFailed);
        }
        Ok(())
    }
}
