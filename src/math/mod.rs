// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Number-theoretic support for the class-group arithmetic and the
//! Fiat-Shamir challenge derivation.

pub mod extended_gcd;
pub mod prime;
