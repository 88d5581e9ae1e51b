//! LLM protocol types, backend trait and gateway.

pub mod errors;
mod gateway;
pub mod types;

pub use errors::ModelError;
pub use gateway::{DEFAULT_QUERY_TIMEOUT, ModelGateway};
pub use types::{Backend, Message, ModelRequest, ModelResponse, ModelTurn, Role};
