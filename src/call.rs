//! Client side of a call: a WebSocket connection to the relay and the session logic that turns
//! relay events into negotiation steps on a [PeerConnection].

use crate::error::Error;
use crate::negotiation::NegotiationState;
use crate::peer_connection::{Options, PeerConnection, Signal};
use crate::protocol::{CallAccepted, CallUser, ClientEvent, IceCandidate, JoinRoom, RelayEvent};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-over-WebSocket connection to a signaling relay.
pub struct SignalingClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (ws, _) = connect_async(url).await?;
        log::info!("connected to relay at {url}");
        let (sink, stream) = ws.split();
        Ok(SignalingClient { sink, stream })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), Error> {
        log::debug!("sending `{}`", event.name());
        self.sink.send(Message::Text(event.to_text()?)).await?;
        Ok(())
    }

    /// Next event from the relay, `None` once the relay closed the connection.
    pub async fn next(&mut self) -> Result<Option<RelayEvent>, Error> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => return RelayEvent::from_text(&text).map(Some),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(&mut self) -> Result<(), Error> {
        self.sink.close().await?;
        Ok(())
    }
}

/// One participant of a two-party call.
///
/// The session joins a room and then follows the relay: it offers to whoever joins after it,
/// answers whoever calls it and trickles ICE candidates both ways. Negotiation failures, including
/// descriptions that cannot be decoded, are logged and leave the [PeerConnection] stalled; only
/// transport failures end [CallSession::run].
pub struct CallSession {
    signaling: SignalingClient,
    peer: Arc<PeerConnection>,
    email: String,
    room_id: String,
    remote_email: Option<String>,
}

impl CallSession {
    /// Connects to the relay at `url` and joins the room described by `join`.
    ///
    /// An empty email or room code is refused with [Error::InvalidJoin] before anything is sent.
    pub async fn join(url: &str, join: JoinRoom, options: Options) -> Result<Self, Error> {
        join.validate()?;
        let peer = Arc::new(PeerConnection::start(options).await?);
        let mut signaling = SignalingClient::connect(url).await?;
        let email = join.email_id.clone();
        let room_id = join.room_id.clone();
        signaling.send(&ClientEvent::JoinRoom(join)).await?;
        Ok(CallSession {
            signaling,
            peer,
            email,
            room_id,
            remote_email: None,
        })
    }

    pub fn peer(&self) -> Arc<PeerConnection> {
        self.peer.clone()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Email of the participant this session negotiates with, once known.
    pub fn remote_email(&self) -> Option<&str> {
        self.remote_email.as_deref()
    }

    pub async fn state(&self) -> NegotiationState {
        self.peer.state().await
    }

    /// Processes relay events and local signals until `shutdown` is cancelled or the relay
    /// goes away.
    ///
    /// The [PeerConnection] outlives the loop: close it through [CallSession::peer] once `run`
    /// returns.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), Error> {
        let peer = self.peer.clone();
        loop {
            tokio::select! {
                event = self.signaling.next() => match event? {
                    Some(event) => self.on_relay_event(event).await?,
                    None => return Err(Error::RelayClosed),
                },
                signal = peer.listen() => match signal {
                    Some(signal) => self.on_local_signal(signal).await?,
                    None => return Ok(()),
                },
                _ = shutdown.cancelled() => {
                    log::info!("leaving room {}", self.room_id);
                    if let Err(cause) = self.signaling.close().await {
                        log::debug!("relay connection did not close cleanly: {cause}");
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn on_relay_event(&mut self, event: RelayEvent) -> Result<(), Error> {
        match event {
            RelayEvent::JoinedRoom { room_id } => {
                log::info!("joined room {room_id} as {}", self.email);
            }
            RelayEvent::UserJoined { email_id } => {
                log::info!("{email_id} joined the room, calling");
                self.remote_email = Some(email_id.clone());
                match self.peer.create_offer().await {
                    Ok(offer) => {
                        let offer = serde_json::to_value(offer)?;
                        self.send(ClientEvent::CallUser(CallUser { offer, email_id }))
                            .await?;
                    }
                    Err(cause) => log::error!("error creating offer: {cause}"),
                }
            }
            RelayEvent::IncomingCall { from, offer } => {
                let from = match from {
                    Some(from) => from,
                    None => {
                        log::warn!("ignoring incoming call from a caller without email");
                        return Ok(());
                    }
                };
                log::info!("incoming call from {from}");
                self.remote_email = Some(from.clone());
                let offer: RTCSessionDescription = match serde_json::from_value(offer) {
                    Ok(offer) => offer,
                    Err(cause) => {
                        let reason = format!("unreadable offer from {from}: {cause}");
                        self.peer.fail_negotiation(reason).await;
                        return Ok(());
                    }
                };
                match self.peer.accept_offer(offer).await {
                    Ok(answer) => {
                        let answer = serde_json::to_value(answer)?;
                        self.send(ClientEvent::CallAccepted(CallAccepted {
                            answer,
                            email_id: from,
                        }))
                        .await?;
                    }
                    Err(cause) => log::error!("error creating answer: {cause}"),
                }
            }
            RelayEvent::CallAccepted { answer } => {
                log::info!("call got accepted");
                let answer: RTCSessionDescription = match serde_json::from_value(answer) {
                    Ok(answer) => answer,
                    Err(cause) => {
                        let reason = format!("unreadable answer: {cause}");
                        self.peer.fail_negotiation(reason).await;
                        return Ok(());
                    }
                };
                if let Err(cause) = self.peer.apply_answer(answer).await {
                    log::error!("error setting remote answer: {cause}");
                }
            }
            RelayEvent::IceCandidate { candidate } => {
                let candidate: RTCIceCandidateInit = match serde_json::from_value(candidate) {
                    Ok(candidate) => candidate,
                    Err(cause) => {
                        log::warn!("dropping unreadable remote ICE candidate: {cause}");
                        return Ok(());
                    }
                };
                if let Err(cause) = self.peer.add_ice_candidate(candidate).await {
                    log::warn!("error adding remote ICE candidate: {cause}");
                }
            }
            RelayEvent::DeliveryFailed { event, email_id } => {
                log::warn!("relay could not deliver `{event}` to {email_id}");
            }
            RelayEvent::JoinRejected { reason, .. } => {
                log::error!("relay rejected join: {reason}");
            }
            RelayEvent::InvalidMessage { reason } => {
                log::error!("relay could not read our message: {reason}");
            }
        }
        Ok(())
    }

    async fn on_local_signal(&mut self, signal: Signal) -> Result<(), Error> {
        let email_id = match &self.remote_email {
            Some(email) => email.clone(),
            None => {
                log::debug!("no remote participant yet, dropping local signal");
                return Ok(());
            }
        };
        let event = match signal {
            Signal::Offer(offer) => ClientEvent::CallUser(CallUser {
                offer: serde_json::to_value(offer)?,
                email_id,
            }),
            Signal::Candidate(candidate) => ClientEvent::IceCandidate(IceCandidate {
                candidate: serde_json::to_value(candidate)?,
                email_id,
            }),
        };
        self.send(event).await
    }

    async fn send(&mut self, event: ClientEvent) -> Result<(), Error> {
        self.signaling.send(&event).await
    }
}
