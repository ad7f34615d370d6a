use std::fmt;

/// Errors that can occur while building or validating a parameter table.
///
/// Lookups of unknown field names are not errors; accessors return `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A field's value buffer could not be grown to absorb a chunk.
    GrowthFailure {
        /// Name of the field being reconstructed.
        name: String,
        /// Buffer size (in bytes) that was requested.
        requested: usize,
    },
    /// The operation needs a scalar field but the name holds an array.
    NotScalar(String),
    /// The validation pass already ran for this request.
    AlreadyValidated,
    /// The request's table was validated and no longer accepts input.
    Sealed,
    /// A textual validation rule could not be parsed.
    InvalidRule(String),
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GrowthFailure { name, requested } => {
                write!(f, "cannot grow value of '{name}' to {requested} bytes")
            }
            Self::NotScalar(name) => write!(f, "parameter '{name}' is multi-valued"),
            Self::AlreadyValidated => write!(f, "parameters have already been validated"),
            Self::Sealed => write!(f, "parameter table is sealed after validation"),
            Self::InvalidRule(r) => write!(f, "invalid validation rule: '{r}'"),
        }
    }
}

impl std::error::Error for ParamError {}
