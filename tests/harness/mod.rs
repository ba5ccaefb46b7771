// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for exercising the submission client without a network.

#![allow(dead_code)]

pub mod transport;
pub mod window;
