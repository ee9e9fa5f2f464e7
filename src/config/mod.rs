// ABOUTME: Configuration module root
// ABOUTME: Environment-driven server configuration with typed sub-configs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

/// Environment variable parsing into `ServerConfig`
pub mod environment;

pub use environment::{
    AuthConfig, CareConfig, DatabaseConfig, Environment, ExternalServicesConfig, GeminiConfig,
    RateLimitConfig, SecurityHeadersConfig, ServerConfig,
};
