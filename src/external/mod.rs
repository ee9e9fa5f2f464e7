// ABOUTME: Clients for third-party services consumed over HTTP
// ABOUTME: openFDA drug labels, the Gemini LLM and outgoing notification delivery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

/// Outgoing email for high-priority notifications
pub mod delivery;
/// openFDA drug label client with database-backed caching
pub mod fda_client;
/// LLM provider seam and the Gemini implementation
pub mod llm;

pub use delivery::{channel_from_config, DeliveryChannel, LogOnlyDelivery, ResendDelivery};
pub use fda_client::{FdaClient, FdaClientConfig};
pub use llm::{
    provider_from_config, ChatMessage, ChatRequest, ChatResponse, GeminiProvider, LlmProvider,
    UnconfiguredProvider,
};
