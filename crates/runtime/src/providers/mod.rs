//! LLM provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod ollama;

pub use ollama::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, OllamaBackend, OllamaBackendBuilder,
};
