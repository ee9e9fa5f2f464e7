// ABOUTME: Subcommand implementations for myguide-cli
// ABOUTME: One module per command group
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

pub mod labels;
pub mod maintenance;
pub mod user;
