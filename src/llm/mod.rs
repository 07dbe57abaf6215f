//! Reasoning-service client abstraction
//!
//! Arbitration talks to an external model through the [`LLMClient`] trait so
//! that the genai-backed client and the scripted mock are interchangeable.

mod client;
mod error;
mod genai;
mod mock;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::{GenAIClient, API_BASE_URL_ENV};
pub use mock::{MockLLMClient, MockResponse};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
