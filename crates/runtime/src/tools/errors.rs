use thiserror::Error;

/// Errors translating a server's tool catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("tool `{tool}`: input schema must be a JSON object")]
    NotAnObject { tool: String },

    #[error("tool `{tool}`: input schema type must be \"object\", found {found}")]
    NotObjectType { tool: String, found: String },

    #[error("tool `{tool}`: `properties` must be an object")]
    InvalidProperties { tool: String },

    #[error("tool `{tool}`: `required` must be an array of strings")]
    InvalidRequired { tool: String },

    #[error("tool `{tool}`: property `{property}` has no type")]
    MissingType { tool: String, property: String },

    #[error("tool `{tool}`: property `{property}` has unsupported type {found}")]
    UnsupportedType {
        tool: String,
        property: String,
        found: String,
    },

    #[error("tool `{tool}`: required parameter `{property}` is not a declared property")]
    UnknownRequired { tool: String, property: String },

    #[error("tool `{tool}` is advertised more than once")]
    DuplicateTool { tool: String },
}
