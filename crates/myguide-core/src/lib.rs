// ABOUTME: Core types shared across the MyGuide workspace
// ABOUTME: Exposes the unified error type and the domain models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # myguide-core
//!
//! Domain models and the [`errors::AppError`] type used by the server crate,
//! the operator CLI and the integration tests.

/// Unified error handling
pub mod errors;
/// Domain models
pub mod models;
