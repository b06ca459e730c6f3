// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wesolowski proofs of correct repeated squaring over imaginary class
//! groups, including the segmented checkpoint proofs used for streaming
//! verification of a long-running computation.

pub mod wesolowski;
