//! Session state
//! This module defines the states the console moves through, from scanning
//! to a connected session and back.

use crate::core::bluetooth::Transport;
use crate::core::session::{Session, SessionOutcome};

/// Exactly one of these is live at a time
pub enum SessionState<T: Transport> {
    /// Running a discovery scan
    Scanning,
    /// Waiting for the operator to pick a device
    AwaitingSelection,
    /// Connecting to the chosen address
    Connecting(String),
    /// Connected with an index and subscription set
    Connected(Session<T>),
    /// Releasing subscriptions and the link, then moving on according to the outcome
    Disconnecting(Session<T>, SessionOutcome),
    Terminated,
}

impl<T: Transport> SessionState<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scanning => "Scanning",
            Self::AwaitingSelection => "AwaitingSelection",
            Self::Connecting(_) => "Connecting",
            Self::Connected(_) => "Connected",
            Self::Disconnecting(..) => "Disconnecting",
            Self::Terminated => "Terminated",
        }
    }
}
