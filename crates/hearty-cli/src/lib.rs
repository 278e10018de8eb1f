// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared configuration and logging setup for the `hearty`, `hearty-server`,
//! and `hearty-evictd` binaries.

pub mod config;
pub mod logger;
