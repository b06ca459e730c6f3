// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! An implementation of Wesolowski's VDF construction
//! (<https://eprint.iacr.org/2018/623>) over an imaginary class group.
//!
//! For `output = input^(2^T)` the prover reveals `pi = input^q` where
//! `q = floor(2^T / l)` and `l` is the Fiat-Shamir challenge prime derived
//! from the statement. The verifier checks `pi^l * input^r = output` with
//! `r = 2^T mod l`. The same construction applied between two consecutive
//! checkpoints over their iteration distance gives the streaming checkpoint
//! proofs.

use crate::class_group::{fast_pow, Discriminant, QuadraticForm, Reducer};
use crate::error::{VdfError, VdfResult};
use fiat_shamir::challenge_prime;
use num_bigint::BigInt;
use num_traits::One;

pub mod codec;
pub mod fiat_shamir;

/// Generate the full Wesolowski proof for `output = input^(2^iterations)`.
///
/// The recursion level is carried verbatim in the blob; no recursion is
/// performed here, the byte is reserved for proof-of-proof schemes layered
/// on top.
pub fn prove_final(
    input: &QuadraticForm,
    output: &QuadraticForm,
    iterations: u64,
    discriminant: &Discriminant,
    recursion_level: u8,
) -> VdfResult<Vec<u8>> {
    let (challenge, proof) = prove(input, output, iterations, discriminant)?;
    codec::encode_final(recursion_level, iterations, &challenge, &proof)
}

/// Generate a checkpoint proof for the segment of `delta_t` squarings ending
/// with `output` at the given absolute iteration.
pub fn prove_checkpoint(
    input: &QuadraticForm,
    output: &QuadraticForm,
    iteration: u64,
    delta_t: u64,
    discriminant: &Discriminant,
) -> VdfResult<Vec<u8>> {
    let (challenge, proof) = prove(input, output, delta_t, discriminant)?;
    codec::encode_checkpoint(iteration, output, &proof, &challenge)
}

fn prove(
    input: &QuadraticForm,
    output: &QuadraticForm,
    iterations: u64,
    discriminant: &Discriminant,
) -> VdfResult<(BigInt, QuadraticForm)> {
    if !input.is_valid(discriminant) || !output.is_valid(discriminant) {
        return Err(VdfError::InvalidForm);
    }
    let challenge = challenge_prime(discriminant, input, output, iterations);
    let quotient: BigInt = (BigInt::one() << iterations) / &challenge;
    let mut reducer = Reducer::new();
    let proof = fast_pow(input, discriminant, &quotient, &mut reducer);
    Ok((challenge, proof))
}

/// Verify a full Wesolowski proof blob against a discriminant given as the
/// big-endian bytes of its absolute value. The input form defaults to the
/// generator. The output is recomputed by `iterations` sequential squarings,
/// so this is as expensive as the evaluation itself.
pub fn verify_final(
    discriminant_bytes: &[u8],
    input: Option<&QuadraticForm>,
    blob: &[u8],
    iterations: u64,
    recursion_level: u8,
) -> VdfResult<()> {
    let discriminant = Discriminant::try_from_be_bytes(discriminant_bytes)?;
    verify_final_with_discriminant(&discriminant, input, blob, iterations, recursion_level)
}

/// Verify a full Wesolowski proof blob, deriving the discriminant from a
/// 32-byte challenge as the engine does.
pub fn verify_final_with_challenge(
    challenge: &[u8; 32],
    discriminant_size_in_bits: u64,
    input: Option<&QuadraticForm>,
    blob: &[u8],
    iterations: u64,
    recursion_level: u8,
) -> VdfResult<()> {
    let discriminant = Discriminant::from_challenge(challenge, discriminant_size_in_bits)?;
    verify_final_with_discriminant(&discriminant, input, blob, iterations, recursion_level)
}

pub fn verify_final_with_discriminant(
    discriminant: &Discriminant,
    input: Option<&QuadraticForm>,
    blob: &[u8],
    iterations: u64,
    recursion_level: u8,
) -> VdfResult<()> {
    let parsed = codec::decode_final(blob)?;
    if parsed.recursion_level != recursion_level || parsed.iterations != iterations {
        return Err(VdfError::VerificationFailed);
    }

    let input = match input {
        Some(form) => form.clone(),
        None => QuadraticForm::generator(discriminant)?,
    };

    let mut reducer = Reducer::new();
    let mut output = input.clone();
    for _ in 0..iterations {
        output = output.square(&mut reducer);
    }

    verify_equation(discriminant, &input, &output, &parsed.proof, &parsed.challenge, iterations, &mut reducer)
}

/// Verify a checkpoint proof blob for the segment starting at `previous` and
/// spanning `delta_t` iterations. On success the verified checkpoint form is
/// returned so the caller can chain to the next segment.
pub fn verify_checkpoint(
    discriminant: &Discriminant,
    previous: &QuadraticForm,
    blob: &[u8],
    delta_t: u64,
) -> VdfResult<QuadraticForm> {
    let parsed = codec::decode_checkpoint(blob)?;
    let [form_a, form_b, form_c] = parsed.form;
    let form = QuadraticForm::from_coefficients(form_a, form_b, form_c, discriminant)
        .map_err(|_| VdfError::VerificationFailed)?;

    let mut reducer = Reducer::new();
    verify_equation(discriminant, previous, &form, &parsed.proof, &parsed.challenge, delta_t, &mut reducer)?;
    Ok(form)
}

/// Check `proof^l * input^r = output` with `r = 2^iterations mod l`, after
/// confirming that `l` matches the Fiat-Shamir derivation for the statement.
fn verify_equation(
    discriminant: &Discriminant,
    input: &QuadraticForm,
    output: &QuadraticForm,
    proof_coefficients: &[BigInt; 3],
    challenge: &BigInt,
    iterations: u64,
    reducer: &mut Reducer,
) -> VdfResult<()> {
    if !input.is_valid(discriminant) || !output.is_valid(discriminant) {
        return Err(VdfError::VerificationFailed);
    }
    let proof = QuadraticForm::from_coefficients(
        proof_coefficients[0].clone(),
        proof_coefficients[1].clone(),
        proof_coefficients[2].clone(),
        discriminant,
    )
    .map_err(|_| VdfError::VerificationFailed)?;

    // The encoded challenge is redundant; requiring it to match the
    // derivation makes any tampering with the challenge field detectable.
    let expected_challenge = challenge_prime(discriminant, input, output, iterations);
    if challenge != &expected_challenge {
        return Err(VdfError::VerificationFailed);
    }

    let r = BigInt::from(2).modpow(&BigInt::from(iterations), challenge);
    let lhs = fast_pow(&proof, discriminant, challenge, reducer).compose(
        &fast_pow(input, discriminant, &r, reducer),
        reducer,
    );

    if &lhs != output {
        return Err(VdfError::VerificationFailed);
    }
    Ok(())
}
