// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A verifiable delay function (VDF) over imaginary class groups, for
//! protocols that need a sequential, non-parallelizable delay with cheap
//! verification.
//!
//! The delay is evaluated by repeated squaring of a binary quadratic form
//! with a negative discriminant; correctness is proven with Wesolowski's
//! construction (<https://eprint.iacr.org/2018/623>), both for the full run
//! and, when checkpoints are enabled, for every intermediate segment, so a
//! consumer can verify the stream as it is produced.
//!
//! The [engine::VdfEngine] drives a long-running computation on a dedicated
//! worker thread with progress reporting, cooperative cancellation and
//! periodic checkpoints:
//!
//! ```no_run
//! use classvdf::engine::{EngineConfig, VdfEngine, verify_proof_with_challenge};
//!
//! let challenge = [7u8; 32];
//! let iterations = 100_000;
//!
//! let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
//! engine.start(&challenge, None, iterations, 1024).unwrap();
//! engine.wait_completion(None).unwrap();
//!
//! let proof = engine.generate_proof(0).unwrap();
//! assert!(verify_proof_with_challenge(&challenge, 1024, None, &proof, iterations, 0));
//! ```

pub mod class_group;
pub mod engine;
pub mod error;
pub mod hash;
pub mod math;
pub mod vdf;

pub use class_group::{Discriminant, QuadraticForm, Reducer};
pub use engine::{EngineConfig, EngineStatus, Phase, VdfEngine};
pub use error::{VdfError, VdfResult};

/// The crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
