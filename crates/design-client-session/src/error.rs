//! Session-fatal errors.

use design_client_core::ChannelError;
use thiserror::Error;

/// Error that ends a session.
///
/// Operation failures never show up here; they are reported to the server
/// as results.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Could not establish connection with design server")]
    Establishment,
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Session aborted: {0}")]
    Aborted(String),
}

impl SessionError {
    /// Unwrap to the cause worth reporting.
    ///
    /// A channel call interrupted by cancellation is reported as
    /// [`SessionError::Cancelled`].
    #[must_use]
    pub fn innermost(self) -> Self {
        match self {
            Self::Channel(ChannelError::Cancelled) => Self::Cancelled,
            other => other,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Channel(ChannelError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_channel_call_unwraps_to_cancelled() {
        let err = SessionError::from(ChannelError::Cancelled);
        assert!(err.is_cancelled());
        assert!(matches!(err.innermost(), SessionError::Cancelled));
    }

    #[test]
    fn other_errors_are_kept() {
        let err = SessionError::from(ChannelError::Status {
            status: 503,
            body: "maintenance".into(),
        })
        .innermost();
        assert!(matches!(err, SessionError::Channel(ChannelError::Status { status: 503, .. })));
        assert_eq!(
            SessionError::Establishment.to_string(),
            "Could not establish connection with design server"
        );
    }
}
