use crate::negotiation::NegotiationState;
use std::sync::Arc;
use tokio_tungstenite::tungstenite;

/// Errors produced by the relay, the signaling client and the peer connection driver.
///
/// Sources are kept behind [Arc] so that an error can be cloned into every waiter observing a
/// failed peer connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    WebRtc(Arc<webrtc::Error>),
    #[error("websocket transport failed: {0}")]
    Transport(Arc<tungstenite::Error>),
    #[error(transparent)]
    Io(Arc<std::io::Error>),
    #[error("malformed signaling message: {0}")]
    Protocol(Arc<serde_json::Error>),
    #[error("email `{0}` is already joined from another connection")]
    DuplicateEmail(String),
    #[error("joining requires both an email and a room code")]
    InvalidJoin,
    #[error("cannot {action} while negotiation is {state}")]
    InvalidTransition {
        action: &'static str,
        state: NegotiationState,
    },
    #[error("peer connection closed")]
    Closed,
    #[error("relay connection closed")]
    RelayClosed,
}

impl Error {
    pub fn invalid_transition(action: &'static str, state: NegotiationState) -> Self {
        Error::InvalidTransition { action, state }
    }
}

impl From<webrtc::Error> for Error {
    fn from(value: webrtc::Error) -> Self {
        Error::WebRtc(Arc::new(value))
    }
}

impl From<tungstenite::Error> for Error {
    fn from(value: tungstenite::Error) -> Self {
        Error::Transport(Arc::new(value))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Protocol(Arc::new(value))
    }
}
