//! LLM-assisted decisions.
//!
//! Provider abstraction, the HTTP provider, the output grammar and parser,
//! and the batching manager that keeps model latency off the tick thread.

pub mod provider;
pub mod http;
pub mod grammar;
pub mod prompt;
pub mod parse;
pub mod manager;

pub use provider::{LlmProvider, LlmError};
pub use http::HttpLlmProvider;
pub use parse::{parse_llm_action, ParseError};
pub use manager::{LlmManager, LlmStats, ManagerSettings, DecisionReceiver};
