//! Wire format shared by the relay and its clients.
//!
//! Every WebSocket text frame carries one JSON object of the form
//! `{"event": "<name>", "data": {...}}`. Session descriptions and ICE candidates travel as opaque
//! [Payload]s: the relay never looks inside them.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Opaque WebRTC structure (session description or ICE candidate) forwarded unchanged.
pub type Payload = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    CallUser(CallUser),
    CallAccepted(CallAccepted),
    IceCandidate(IceCandidate),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::CallUser(_) => "call-user",
            ClientEvent::CallAccepted(_) => "call-accepted",
            ClientEvent::IceCandidate(_) => "ice-candidate",
        }
    }

    pub fn from_text(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[serde(default)]
    pub room_id: String,
    #[serde(default, alias = "email")]
    pub email_id: String,
}

impl JoinRoom {
    pub fn new<R: Into<String>, E: Into<String>>(room_id: R, email_id: E) -> Self {
        JoinRoom {
            room_id: room_id.into(),
            email_id: email_id.into(),
        }
    }

    /// Both the room code and the email must be present.
    pub fn validate(&self) -> Result<(), Error> {
        if self.room_id.trim().is_empty() || self.email_id.trim().is_empty() {
            Err(Error::InvalidJoin)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUser {
    pub offer: Payload,
    #[serde(alias = "email")]
    pub email_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAccepted {
    pub answer: Payload,
    #[serde(alias = "email")]
    pub email_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: Payload,
    #[serde(alias = "email")]
    pub email_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RelayEvent {
    /// Acknowledges a join to the joining connection.
    #[serde(rename_all = "camelCase")]
    JoinedRoom { room_id: String },
    /// Someone else entered one of the rooms this connection is in.
    #[serde(rename_all = "camelCase")]
    UserJoined { email_id: String },
    /// `from` is absent when the caller never joined a room.
    IncomingCall { from: Option<String>, offer: Payload },
    CallAccepted { answer: Payload },
    IceCandidate { candidate: Payload },
    /// A forwarded event could not be delivered because its recipient is not connected.
    #[serde(rename_all = "camelCase")]
    DeliveryFailed { event: String, email_id: String },
    #[serde(rename_all = "camelCase")]
    JoinRejected {
        room_id: String,
        email_id: String,
        reason: String,
    },
    InvalidMessage { reason: String },
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::JoinedRoom { .. } => "joined-room",
            RelayEvent::UserJoined { .. } => "user-joined",
            RelayEvent::IncomingCall { .. } => "incoming-call",
            RelayEvent::CallAccepted { .. } => "call-accepted",
            RelayEvent::IceCandidate { .. } => "ice-candidate",
            RelayEvent::DeliveryFailed { .. } => "delivery-failed",
            RelayEvent::JoinRejected { .. } => "join-rejected",
            RelayEvent::InvalidMessage { .. } => "invalid-message",
        }
    }

    pub fn from_text(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}
