//! LLM text generation over the Anthropic Messages API.

pub mod client;
pub mod config;

pub use client::AnthropicClient;
pub use config::LlmConfig;
