use crate::error::Error;
use crate::negotiation::{CandidateAction, Negotiation, NegotiationState};
use arc_swap::{ArcSwap, Guard};
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// STUN servers used when nothing else is configured.
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:global.stun.twilio.com:3478",
];

/// WebRTC peer connection driven by an explicit [Negotiation] state machine.
///
/// The caller is responsible for moving signals between the two sides of a call: offers and
/// answers are returned from [PeerConnection::create_offer] and [PeerConnection::accept_offer],
/// while renegotiation offers and local ICE candidates come out of [PeerConnection::listen].
pub struct PeerConnection {
    pc: Arc<RTCPeerConnection>,
    shared: Arc<Shared>,
    signal_receiver: Mutex<UnboundedReceiver<Signal>>,
    remote_tracks: RemoteTracks,
}

struct Shared {
    status: PeerConnectionState,
    negotiation: Mutex<Negotiation>,
    /// Set by [PeerConnection::add_track] until an offer carries the change.
    media_changed: AtomicBool,
    signal_sender: UnboundedSender<Signal>,
}

impl PeerConnection {
    /// Starts a new instance of [PeerConnection] with local media slots described by `options`.
    ///
    /// Use [PeerConnection::connected] in order to await for connection to be established.
    /// Use [PeerConnection::close] in order to gracefully close the connection.
    pub async fn start(options: Options) -> Result<Self, Error> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        // An InterceptorRegistry must be created for each PeerConnection: it provides NACKs,
        // RTCP reports and the rest of the RTP/RTCP pipeline.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(options.rtc_config).await?);
        let (signal_sender, signal_receiver) = unbounded_channel();
        let (tracks_tx, tracks) = unbounded_channel();
        let shared = Arc::new(Shared {
            status: PeerConnectionState::default(),
            negotiation: Mutex::new(Negotiation::new()),
            media_changed: AtomicBool::new(false),
            signal_sender,
        });

        {
            let shared = Arc::downgrade(&shared);
            let pc = Arc::downgrade(&peer_connection);
            peer_connection.on_peer_connection_state_change(Box::new(move |s| {
                let shared = shared.clone();
                let pc = pc.clone();
                Box::pin(async move {
                    if let Some(shared) = shared.upgrade() {
                        log::debug!("peer connection state changed to {s}");
                        match s {
                            RTCPeerConnectionState::Connected => {
                                shared.negotiation.lock().await.transport_connected();
                                let _ = shared.status.set_ready();
                                if shared.media_changed.load(Ordering::Acquire) {
                                    // media added while the first round was still going
                                    if let Some(pc) = pc.upgrade() {
                                        tokio::spawn(async move {
                                            renegotiate(&pc, &shared).await;
                                        });
                                    }
                                }
                            }
                            RTCPeerConnectionState::Failed => {
                                let _ = shared
                                    .status
                                    .set_failed(webrtc::Error::ErrConnectionClosed.into());
                            }
                            RTCPeerConnectionState::Closed => {
                                let _ = shared.status.set_closed();
                            }
                            RTCPeerConnectionState::Disconnected => {}
                            RTCPeerConnectionState::Unspecified => {}
                            RTCPeerConnectionState::New => {}
                            RTCPeerConnectionState::Connecting => {}
                        }
                    }
                })
            }));
        }
        {
            let shared = Arc::downgrade(&shared);
            peer_connection.on_ice_connection_state_change(Box::new(move |s| {
                if let Some(shared) = shared.upgrade() {
                    if s == RTCIceConnectionState::Failed {
                        let _ = shared
                            .status
                            .set_failed(webrtc::Error::ErrICEConnectionNotStarted.into());
                    }
                }
                Box::pin(async move {})
            }));
        }
        {
            let shared = Arc::downgrade(&shared);
            peer_connection.on_ice_candidate(Box::new(move |candidate| {
                let shared = shared.clone();
                Box::pin(async move {
                    if let Some(shared) = shared.upgrade() {
                        match candidate {
                            Some(candidate) => match candidate.to_json() {
                                Ok(candidate) => {
                                    let _ = shared.signal_sender.send(Signal::Candidate(candidate));
                                }
                                Err(cause) => {
                                    log::warn!("unable to encode local candidate: {cause}")
                                }
                            },
                            None => shared.negotiation.lock().await.gathering_complete(),
                        }
                    }
                })
            }));
        }
        {
            let shared = Arc::downgrade(&shared);
            let pc = Arc::downgrade(&peer_connection);
            peer_connection.on_negotiation_needed(Box::new(move || {
                let shared = shared.clone();
                let pc = pc.clone();
                Box::pin(async move {
                    if let (Some(shared), Some(pc)) = (shared.upgrade(), pc.upgrade()) {
                        renegotiate(&pc, &shared).await;
                    }
                })
            }));
        }
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            log::info!("remote track arrived");
            let _ = tracks_tx.send(track);
            Box::pin(async move {})
        }));

        if options.media.audio {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Audio, None)
                .await?;
        }
        if options.media.video {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Video, None)
                .await?;
        }

        Ok(PeerConnection {
            pc: peer_connection,
            shared,
            signal_receiver: Mutex::new(signal_receiver),
            remote_tracks: RemoteTracks::new(tracks),
        })
    }

    /// Current state of the offer/answer negotiation.
    pub async fn state(&self) -> NegotiationState {
        self.shared.negotiation.lock().await.state().clone()
    }

    /// Check if current peer connection is in process of being negotiated with its remote
    /// counterpart.
    pub async fn is_negotiating(&self) -> bool {
        matches!(
            self.shared.negotiation.lock().await.state(),
            NegotiationState::OfferPending | NegotiationState::AnswerPending
        )
    }

    /// Creates the local offer sent to a peer that just joined the room.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription, Error> {
        self.ensure_open()?;
        let mut negotiation = self.shared.negotiation.lock().await;
        negotiation.begin_offer()?;
        // the offer covers every track attached so far
        self.shared.media_changed.store(false, Ordering::Release);
        let offer = stall(&mut negotiation, self.pc.create_offer(None).await)?;
        stall(
            &mut negotiation,
            self.pc.set_local_description(offer.clone()).await,
        )?;
        Ok(offer)
    }

    /// Applies a remote offer and produces the answer to be sent back.
    pub async fn accept_offer(
        &self,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription, Error> {
        self.ensure_open()?;
        let mut negotiation = self.shared.negotiation.lock().await;
        negotiation.offer_received()?;
        stall(&mut negotiation, self.pc.set_remote_description(offer).await)?;
        let early = negotiation.remote_description_applied();
        let answer = stall(&mut negotiation, self.pc.create_answer(None).await)?;
        stall(
            &mut negotiation,
            self.pc.set_local_description(answer.clone()).await,
        )?;
        if self.shared.status.get().is_ready() {
            // renegotiation of a call whose transport is already up
            negotiation.transport_connected();
        }
        self.apply_candidates(early).await;
        Ok(answer)
    }

    /// Applies the remote answer to an offer created by this side.
    pub async fn apply_answer(&self, answer: RTCSessionDescription) -> Result<(), Error> {
        self.ensure_open()?;
        let mut negotiation = self.shared.negotiation.lock().await;
        negotiation.answer_received()?;
        stall(&mut negotiation, self.pc.set_remote_description(answer).await)?;
        let early = negotiation.remote_description_applied();
        self.apply_candidates(early).await;
        Ok(())
    }

    /// Adds a remote ICE candidate, or keeps it until a remote description is available.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), Error> {
        let mut negotiation = self.shared.negotiation.lock().await;
        match negotiation.candidate_received(candidate) {
            CandidateAction::Apply(candidate) => {
                self.pc.add_ice_candidate(candidate).await?;
            }
            CandidateAction::Buffered => {
                log::debug!(
                    "remote description not set yet, {} candidate(s) buffered",
                    negotiation.pending_candidates()
                );
            }
        }
        Ok(())
    }

    /// Stalls the negotiation for a reason found outside of the WebRTC connection, such as a
    /// remote description that could not be decoded.
    pub async fn fail_negotiation<S: Into<String>>(&self, reason: S) {
        self.shared.negotiation.lock().await.fail(reason);
    }

    /// Number of remote ICE candidates waiting for a remote description.
    pub async fn pending_candidates(&self) -> usize {
        self.shared.negotiation.lock().await.pending_candidates()
    }

    async fn apply_candidates(&self, candidates: Vec<RTCIceCandidateInit>) {
        for candidate in candidates {
            if let Err(cause) = self.pc.add_ice_candidate(candidate).await {
                log::warn!("failed to apply buffered ICE candidate: {cause}");
            }
        }
    }

    /// Attaches a local media track. On a connected call this triggers a renegotiation whose
    /// offer is published through [PeerConnection::listen]. A track attached earlier is either
    /// part of the next [PeerConnection::create_offer] or offered once the transport is up.
    pub async fn add_track(
        &self,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<Arc<RTCRtpSender>, Error> {
        self.ensure_open()?;
        // raised first: webrtc fires negotiationneeded before add_track returns
        self.shared.media_changed.store(true, Ordering::Release);
        Ok(self.pc.add_track(track).await?)
    }

    /// Returns the reference to stream of remote media tracks.
    pub fn remote_tracks(&self) -> &RemoteTracks {
        &self.remote_tracks
    }

    /// This method allows to await until the transport between both peers is established.
    pub async fn connected(&self) -> Result<(), Error> {
        status_connected(&self.shared.status).await
    }

    /// Listen to the next [Signal] produced locally. It should be passed over to the remote
    /// counterpart through the relay.
    pub async fn listen(&self) -> Option<Signal> {
        if self.shared.status.get().is_closed() {
            None
        } else {
            let mut signals = self.signal_receiver.lock().await;
            signals.recv().await
        }
    }

    /// Gracefully close current [PeerConnection].
    pub async fn close(&self) -> Result<(), Error> {
        self.shared.status.set_closed()?;
        self.pc.close().await?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.shared.status.get().is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

impl AsRef<RTCPeerConnection> for PeerConnection {
    fn as_ref(&self) -> &RTCPeerConnection {
        &self.pc
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("status", &**self.shared.status.get())
            .finish()
    }
}

/// Starts a new offer round when local media changed on an established call.
///
/// webrtc fires negotiationneeded for the start-up transceivers and again every time signaling
/// returns to stable. Those triggers carry no change of ours and are ignored; the first offer
/// goes out when the remote peer joins.
async fn renegotiate(pc: &RTCPeerConnection, shared: &Shared) {
    let mut negotiation = shared.negotiation.lock().await;
    if !shared.media_changed.load(Ordering::Acquire) {
        log::trace!("negotiation needed without a local media change, ignored");
        return;
    }
    if negotiation.state() != &NegotiationState::Connected {
        log::debug!("media changed while {}, offer deferred", negotiation.state());
        return;
    }
    if negotiation.begin_offer().is_err() {
        return;
    }
    shared.media_changed.store(false, Ordering::Release);
    let offer = match pc.create_offer(None).await {
        Ok(offer) => offer,
        Err(cause) => return negotiation.fail(cause.to_string()),
    };
    if let Err(cause) = pc.set_local_description(offer.clone()).await {
        return negotiation.fail(cause.to_string());
    }
    log::info!("negotiation needed, sending a new offer");
    let _ = shared.signal_sender.send(Signal::Offer(offer));
}

/// Moves the negotiation into [NegotiationState::Stalled] when a WebRTC step fails.
fn stall<T>(negotiation: &mut Negotiation, result: Result<T, webrtc::Error>) -> Result<T, Error> {
    result.map_err(|cause| {
        negotiation.fail(cause.to_string());
        Error::from(cause)
    })
}

/// Which local media slots to negotiate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MediaOptions {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaOptions {
    fn default() -> Self {
        MediaOptions {
            audio: true,
            video: true,
        }
    }
}

#[derive(Clone)]
pub struct Options {
    pub media: MediaOptions,
    pub rtc_config: RTCConfiguration,
}

impl Options {
    pub fn with_ice_servers<S: AsRef<str>>(urls: &[S]) -> Self {
        let ice_servers = if urls.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: urls.iter().map(|url| url.as_ref().to_owned()).collect(),
                ..Default::default()
            }]
        };
        Options {
            media: MediaOptions::default(),
            rtc_config: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
        }
    }

    pub fn with_media(mut self, media: MediaOptions) -> Self {
        self.media = media;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::with_ice_servers(DEFAULT_STUN_SERVERS)
    }
}

async fn status_connected(status: &PeerConnectionState) -> Result<(), Error> {
    loop {
        let s = status.0.load_full();
        match &*s {
            InnerState::Waiting(ready) => {
                // registered before the re-check, so a concurrent update cannot be missed
                let notified = ready.notified();
                if status.get().is_waiting() {
                    notified.await;
                }
            }
            InnerState::Ready => return Ok(()),
            InnerState::Closed(err) => {
                return if let Some(e) = err {
                    Err(e.clone())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RemoteTracks(Mutex<UnboundedReceiver<Arc<TrackRemote>>>);

impl RemoteTracks {
    fn new(receiver: UnboundedReceiver<Arc<TrackRemote>>) -> Self {
        RemoteTracks(Mutex::new(receiver))
    }

    pub async fn next(&self) -> Option<Arc<TrackRemote>> {
        let mut guard = self.0.lock().await;
        guard.recv().await
    }
}

/// Locally produced message that has to reach the remote peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Signal {
    /// Offer created by a renegotiation.
    Offer(RTCSessionDescription),
    Candidate(RTCIceCandidateInit),
}

#[repr(transparent)]
#[derive(Debug, Clone)]
struct PeerConnectionState(Arc<ArcSwap<InnerState>>);

impl PeerConnectionState {
    fn get(&self) -> Guard<Arc<InnerState>> {
        self.0.load()
    }

    fn set_ready(&self) -> Result<(), Error> {
        self.update(InnerState::ready())
    }

    fn set_closed(&self) -> Result<(), Error> {
        self.update(InnerState::closed_gracefully())
    }

    fn set_failed(&self, cause: Error) -> Result<(), Error> {
        self.update(InnerState::failed(cause))
    }

    fn update(&self, new_state: Arc<InnerState>) -> Result<(), Error> {
        let old = self.0.rcu(move |old| {
            if old.is_closed() {
                old.clone()
            } else {
                new_state.clone()
            }
        });
        match &*old {
            InnerState::Waiting(ready) => ready.notify_waiters(),
            InnerState::Ready => {}
            InnerState::Closed(cause) => {
                if let Some(cause) = cause {
                    return Err(cause.clone());
                }
            }
        }
        Ok(())
    }
}

impl Default for PeerConnectionState {
    fn default() -> Self {
        PeerConnectionState(Arc::new(ArcSwap::new(InnerState::waiting())))
    }
}

#[derive(Debug)]
enum InnerState {
    Waiting(Notify),
    Ready,
    Closed(Option<Error>),
}

impl InnerState {
    fn waiting() -> Arc<Self> {
        Arc::new(InnerState::Waiting(Notify::new()))
    }

    fn ready() -> Arc<Self> {
        Arc::new(InnerState::Ready)
    }

    fn closed_gracefully() -> Arc<Self> {
        Arc::new(InnerState::Closed(None))
    }

    fn failed(e: Error) -> Arc<Self> {
        Arc::new(InnerState::Closed(Some(e)))
    }

    fn is_waiting(&self) -> bool {
        matches!(self, InnerState::Waiting(_))
    }

    fn is_ready(&self) -> bool {
        matches!(self, InnerState::Ready)
    }

    fn is_closed(&self) -> bool {
        matches!(self, InnerState::Closed(_))
    }
}

#[cfg(test)]
mod test {
    use crate::error::Error;
    use crate::negotiation::NegotiationState;
    use crate::peer_connection::{MediaOptions, Options, PeerConnection, Signal};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::spawn;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};
    use webrtc::api::media_engine::MIME_TYPE_VP8;
    use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
    use webrtc::peer_connection::RTCPeerConnection;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

    fn local_options() -> Options {
        Options::with_ice_servers::<&str>(&[]).with_media(MediaOptions {
            audio: true,
            video: false,
        })
    }

    fn exchange(
        from: Arc<PeerConnection>,
        to: Arc<PeerConnection>,
    ) -> JoinHandle<Result<(), Error>> {
        spawn(async move {
            while let Some(signal) = from.listen().await {
                match signal {
                    Signal::Candidate(candidate) => to.add_ice_candidate(candidate).await?,
                    Signal::Offer(offer) => {
                        let answer = to.accept_offer(offer).await?;
                        from.apply_answer(answer).await?;
                    }
                }
            }
            Ok(())
        })
    }

    #[tokio::test]
    async fn connection_negotiation() -> Result<(), Error> {
        let p1 = Arc::new(PeerConnection::start(local_options()).await?);
        let p2 = Arc::new(PeerConnection::start(local_options()).await?);

        let offer = p1.create_offer().await?;
        assert_eq!(p1.state().await, NegotiationState::OfferPending);
        assert!(p1.is_negotiating().await);

        let answer = p2.accept_offer(offer).await?;
        assert_eq!(p2.state().await, NegotiationState::AnswerPending);

        p1.apply_answer(answer).await?;
        assert_eq!(p1.state().await, NegotiationState::Connected);

        let _ = exchange(p1.clone(), p2.clone());
        let _ = exchange(p2.clone(), p1.clone());

        p1.connected().await?;
        p2.connected().await?;

        p1.close().await?;
        p2.close().await?;

        Ok(())
    }

    async fn both_connected(p1: &PeerConnection, p2: &PeerConnection) -> bool {
        p1.state().await == NegotiationState::Connected
            && p2.state().await == NegotiationState::Connected
    }

    async fn remote_sdp_has(p: &PeerConnection, needle: &str) -> bool {
        let pc: &RTCPeerConnection = p.as_ref();
        match pc.remote_description().await {
            Some(desc) => desc.sdp.contains(needle),
            None => false,
        }
    }

    #[tokio::test]
    async fn track_added_on_connected_call_is_renegotiated() -> Result<(), Error> {
        let p1 = Arc::new(PeerConnection::start(local_options()).await?);
        let p2 = Arc::new(PeerConnection::start(local_options()).await?);

        let offer = p1.create_offer().await?;
        let answer = p2.accept_offer(offer).await?;
        p1.apply_answer(answer).await?;

        let _ = exchange(p1.clone(), p2.clone());
        let _ = exchange(p2.clone(), p1.clone());
        p1.connected().await?;
        p2.connected().await?;

        // stable signaling alone must not start another round on either side
        sleep(Duration::from_millis(300)).await;
        assert!(both_connected(&p1, &p2).await);
        assert!(!remote_sdp_has(&p2, "m=video").await);

        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            "callroom".to_owned(),
        ));
        p1.add_track(video).await?;

        timeout(Duration::from_secs(10), async {
            loop {
                let renegotiated =
                    remote_sdp_has(&p2, "m=video").await && remote_sdp_has(&p1, "m=video").await;
                if renegotiated && both_connected(&p1, &p2).await {
                    break;
                }
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("renegotiation did not complete");

        p1.close().await?;
        p2.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn candidates_before_remote_description_are_applied_later() -> Result<(), Error> {
        let p1 = Arc::new(PeerConnection::start(local_options()).await?);
        let p2 = Arc::new(PeerConnection::start(local_options()).await?);

        let offer = p1.create_offer().await?;
        // p2 has no remote description yet
        let early = RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2130706431 192.0.2.1 9 typ host".to_owned(),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            ..Default::default()
        };
        p2.add_ice_candidate(early).await?;
        assert_eq!(p2.pending_candidates().await, 1);

        // trickle real candidates both ways before either side has the other's description
        let _ = exchange(p1.clone(), p2.clone());
        let _ = exchange(p2.clone(), p1.clone());

        let answer = p2.accept_offer(offer).await?;
        assert_eq!(p2.pending_candidates().await, 0);
        p1.apply_answer(answer).await?;
        assert_eq!(p1.pending_candidates().await, 0);

        p1.connected().await?;
        p2.connected().await?;
        assert!(both_connected(&p1, &p2).await);

        p1.close().await?;
        p2.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn answerer_accepts_second_offer_before_transport_is_up() -> Result<(), Error> {
        let p1 = PeerConnection::start(local_options()).await?;
        let p2 = PeerConnection::start(local_options()).await?;

        let offer = p1.create_offer().await?;
        let answer = p2.accept_offer(offer).await?;
        p1.apply_answer(answer).await?;
        assert_eq!(p1.state().await, NegotiationState::Connected);

        let offer = p1.create_offer().await?;
        let answer = p2.accept_offer(offer).await?;
        assert!(matches!(
            p2.state().await,
            NegotiationState::AnswerPending | NegotiationState::Connected
        ));
        p1.apply_answer(answer).await?;
        assert_eq!(p1.state().await, NegotiationState::Connected);

        p1.close().await?;
        p2.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn answer_without_offer_is_rejected() -> Result<(), Error> {
        let p1 = PeerConnection::start(local_options()).await?;
        let p2 = PeerConnection::start(local_options()).await?;
        let offer = p1.create_offer().await?;
        let answer = p2.accept_offer(offer).await?;

        // p2 never offered anything, so an answer makes no sense there
        let res = p2.apply_answer(answer).await;
        assert!(matches!(res, Err(Error::InvalidTransition { .. })));

        p1.close().await?;
        p2.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn closed_connection_refuses_offers() -> Result<(), Error> {
        let p1 = PeerConnection::start(local_options()).await?;
        p1.close().await?;
        assert!(matches!(p1.create_offer().await, Err(Error::Closed)));
        assert!(p1.listen().await.is_none());
        Ok(())
    }
}
