//! Shield configuration.

use serde::{Deserialize, Serialize};

use crate::error::ShieldError;

/// Default trace id stamped on interception events.
pub const DEFAULT_TRACE_ID: &str = "franken-shield";

/// Default cap on buffered interception events.
pub const DEFAULT_MAX_EVENTS: usize = 4096;

/// How a write or soft delete rejected by the target is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRejection {
    /// `Ok(false)`, like a sloppy-mode assignment.
    #[default]
    ReturnFalse,
    /// `Err(ShieldError::RejectedWrite)`, like a strict-mode TypeError.
    Throw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub trace_id: String,
    pub write_rejection: WriteRejection,
    pub record_events: bool,
    pub max_events: usize,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            trace_id: DEFAULT_TRACE_ID.to_string(),
            write_rejection: WriteRejection::ReturnFalse,
            record_events: true,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl ShieldConfig {
    /// Parse and validate a JSON config.  Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ShieldError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ShieldError::InvalidConfig {
            field: "<root>",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShieldError> {
        if self.trace_id.trim().is_empty() {
            return Err(ShieldError::InvalidConfig {
                field: "trace_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.record_events && self.max_events == 0 {
            return Err(ShieldError::InvalidConfig {
                field: "max_events",
                reason: "must be at least 1 when recording events".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_write_rejection(mut self, write_rejection: WriteRejection) -> Self {
        self.write_rejection = write_rejection;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }
}
