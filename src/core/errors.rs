//! Errors reported to the operator by the scan loop and the session controller

use thiserror::Error;

use crate::core::bluetooth::TransportError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("selection {index} is out of range (valid: {})", valid_range(.len))]
    SelectionOutOfRange { index: usize, len: usize },

    #[error("no actionable characteristics on this device")]
    NoActionableCharacteristics,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// True when the operator should see the characteristic listing again to re-select
    pub fn wants_listing(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::SelectionOutOfRange { .. }
        )
    }
}

fn valid_range(len: &usize) -> String {
    match *len {
        0 => "none".to_string(),
        1 => "0".to_string(),
        n => format!("0-{}", n - 1),
    }
}
