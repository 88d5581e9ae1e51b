//! Tool types and catalog translation.

pub mod errors;
mod schema;
mod types;

pub use errors::SchemaError;
pub use schema::{translate, translate_catalog};
pub use types::{ParamType, Parameter, ToolCallRequest, ToolCallResult, ToolDescriptor};
