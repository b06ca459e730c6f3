// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Collection of errors used throughout the crate.
//!
//! Every error carries a stable integer code so that embedders bridging to a
//! foreign ABI can translate outcomes without string matching. The codes are
//! part of the public contract and must not be renumbered.

use thiserror::Error;

pub type VdfResult<T> = Result<T, VdfError>;

/// Errors produced by the VDF engine, the class-group arithmetic and the
/// proof codec.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VdfError {
    /// The engine configuration is inconsistent.
    #[error("Invalid configuration")]
    InvalidConfig,

    /// An argument failed validation (zero iterations, bad sizes, ...).
    #[error("Invalid parameters")]
    InvalidParameters,

    /// An allocation required for proof emission failed.
    #[error("Memory allocation failed")]
    MemoryAllocation,

    /// The computation is not in a state that allows the requested operation.
    #[error("Computation failed or not completed")]
    ComputationFailed,

    /// The worker thread could not be created or joined.
    #[error("Thread creation or management error")]
    ThreadError,

    /// The discriminant is not negative or not congruent to 1 mod 4.
    #[error("Invalid discriminant")]
    InvalidDiscriminant,

    /// The quadratic form does not satisfy b^2 - 4ac = D with a > 0, c > 0.
    #[error("Invalid form")]
    InvalidForm,

    /// Proof generation failed.
    #[error("Proof generation failed")]
    ProofGenerationFailed,

    /// Proof verification failed.
    #[error("Verification failed")]
    VerificationFailed,

    /// The engine has not been initialized.
    #[error("Context not initialized")]
    NotInitialized,

    /// A computation is already running on this engine.
    #[error("Computation already running")]
    AlreadyRunning,
}

impl VdfError {
    /// The stable integer code for this error. `0` is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            VdfError::InvalidConfig => -1,
            VdfError::InvalidParameters => -2,
            VdfError::MemoryAllocation => -3,
            VdfError::ComputationFailed => -4,
            VdfError::ThreadError => -5,
            VdfError::InvalidDiscriminant => -6,
            VdfError::InvalidForm => -7,
            VdfError::ProofGenerationFailed => -8,
            VdfError::VerificationFailed => -9,
            VdfError::NotInitialized => -10,
            VdfError::AlreadyRunning => -11,
        }
    }
}
