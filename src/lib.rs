//! `callroom` is a toolkit for two-party WebRTC calls built around a room code:
//! - A signaling [Relay] which pairs participants joined under an email and forwards their
//!   offers, answers and ICE candidates without looking inside them.
//! - A WebSocket front for it ([RelayServer]) speaking the same JSON events as the browser
//!   client (`join-room`, `user-joined`, `call-user`, `incoming-call`, `call-accepted`,
//!   `ice-candidate`).
//! - A [PeerConnection] wrapper around [webrtc](https://webrtc.rs) which drives the offer/answer
//!   exchange through an explicit [Negotiation] state machine and buffers ICE candidates that
//!   arrive before the remote description.
//! - A [CallSession] tying the two together on the client side.
//!
//! Undeliverable messages are not dropped silently: every forwarding operation returns a
//! [Delivery] and the sender is told with a `delivery-failed` event.
//!
//! # Examples
//!
//! ```rust
//! use callroom::{Delivery, Error, Relay, RelayEvent};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let relay = Relay::default();
//!     let (alice, mut alice_rx) = relay.connect().await;
//!     let (bob, mut bob_rx) = relay.connect().await;
//!
//!     relay.join_room(alice, "R7", "a@x.com").await?;
//!     relay.join_room(bob, "R7", "b@x.com").await?;
//!
//!     // alice got her acknowledgement and then heard about bob
//!     assert!(matches!(alice_rx.recv().await, Some(RelayEvent::JoinedRoom { .. })));
//!     assert_eq!(
//!         alice_rx.recv().await,
//!         Some(RelayEvent::UserJoined { email_id: "b@x.com".into() })
//!     );
//!
//!     let offer = json!({"type": "offer", "sdp": "v=0"});
//!     let delivery = relay.forward_call_offer(alice, "b@x.com", offer.clone()).await;
//!     assert_eq!(delivery, Delivery::Delivered);
//!
//!     assert!(matches!(bob_rx.recv().await, Some(RelayEvent::JoinedRoom { .. })));
//!     assert_eq!(
//!         bob_rx.recv().await,
//!         Some(RelayEvent::IncomingCall { from: Some("a@x.com".into()), offer })
//!     );
//!
//!     // nobody is joined as carol
//!     let delivery = relay.forward_ice_candidate(bob, "c@x.com", json!({})).await;
//!     assert_eq!(delivery, Delivery::RecipientUnresolved);
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod config;
pub mod directory;
pub mod error;
pub mod negotiation;
pub mod peer_connection;
pub mod protocol;
pub mod relay;
pub mod rooms;
pub mod server;

pub use call::{CallSession, SignalingClient};
pub use config::{CallConfig, RelayConfig};
pub use directory::{ConnectionId, DuplicatePolicy, JoinOutcome, SessionDirectory};
pub use error::Error;
pub use negotiation::{Negotiation, NegotiationState};
pub use peer_connection::{MediaOptions, Options, PeerConnection, Signal};
pub use protocol::{ClientEvent, RelayEvent};
pub use relay::{Delivery, JoinReport, Relay};
pub use rooms::RoomMembership;
pub use server::RelayServer;
