use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    #[error("Field '{field}' does not exist on type '{type_name}'")]
    SchemaReference { type_name: String, field: String },

    #[error("Type '{0}' does not exist in the schema model")]
    UnknownType(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    /// Message follows graphql-js scalar coercion wording
    #[error("{0}")]
    ValueCoercion(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported selection: {0}")]
    UnsupportedSelection(String),

    #[error("No populatedBy callback registered under '{0}'")]
    MissingCallback(String),

    #[error("Maximum translation depth of {0} exceeded")]
    MaxDepthExceeded(usize),
}

impl TranslateError {
    pub fn unknown_field(type_name: &str, field: &str) -> Self {
        TranslateError::SchemaReference {
            type_name: type_name.to_string(),
            field: field.to_string(),
        }
    }

    pub fn unsupported_filter(message: impl Into<String>) -> Self {
        TranslateError::UnsupportedFilter(message.into())
    }

    pub fn is_schema_reference(&self) -> bool {
        matches!(
            self,
            TranslateError::SchemaReference { .. } | TranslateError::UnknownType(_)
        )
    }
}
