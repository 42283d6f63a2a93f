//! Error surface of the shield.
//!
//! Each variant carries a stable code.  Codes are append-only: an assigned
//! code is never reused for a different failure.

use crate::object_model::{ObjectError, PropertyKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShieldError {
    /// Raw read of a key the object does not own.
    #[error("no own property '{key}'")]
    MissingProperty { key: PropertyKey },
    /// `wrap` on a value that is not a live object.
    #[error("cannot wrap a {type_name} value; target must be an object")]
    InvalidTarget { type_name: &'static str },
    /// A write or soft delete rejected by the target's own
    /// extensibility/configurability rules, surfaced as an error because the
    /// shield is configured to throw.
    #[error("TypeError: '{operation}' of '{key}' rejected by target")]
    RejectedWrite {
        key: PropertyKey,
        operation: &'static str,
    },
    /// `clense` of a value whose template cannot receive properties.
    #[error("cannot overlay properties onto a {category} template")]
    OverlayTarget { category: &'static str },
    #[error("invalid shield config: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error(transparent)]
    Object(#[from] ObjectError),
}

impl ShieldError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingProperty { .. } => "FE-SHIELD-0001",
            Self::InvalidTarget { .. } => "FE-SHIELD-0002",
            Self::RejectedWrite { .. } => "FE-SHIELD-0003",
            Self::OverlayTarget { .. } => "FE-SHIELD-0004",
            Self::InvalidConfig { .. } => "FE-SHIELD-0005",
            Self::Object(_) => "FE-SHIELD-0006",
        }
    }
}
