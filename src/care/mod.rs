// ABOUTME: Pure care-coordination rules with no I/O
// ABOUTME: Task priority, shift workflow, interactions, consent, permissions, compliance, nutrition, documents
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Care rules
//!
//! Every function here takes its inputs as values and an explicit `now`, so
//! route handlers and the maintenance job share the same rules and tests can
//! pin the clock.

/// Dose adherence and trends
pub mod compliance;
/// AI consent gate
pub mod consent;
/// Deferred account deletion
pub mod deletion;
/// Document summary prompts and previews
pub mod documents;
/// Drug-interaction and allergy flagging
pub mod interactions;
/// Diet totals and AI nutrition parsing
pub mod nutrition;
/// Access resolution for elders and groups
pub mod permissions;
/// Shift state machine and offer cascade
pub mod shifts;
/// Due-dose task priority engine
pub mod tasks;
