use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Malformed version: {0}")]
    Malformed(String),

    #[error("Numeric field '{field}' has {digits} digits (max {max})", max = crate::version::sort_key::NUMERIC_WIDTH)]
    FieldTooLong { field: String, digits: usize },

    #[error("Unknown version type '{0}'")]
    UnknownType(String),
}
