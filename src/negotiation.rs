//! Offer/answer bookkeeping for one side of a call.
//!
//! [Negotiation] does no I/O: [crate::PeerConnection] consults it before every step it performs
//! on the underlying WebRTC connection and reports the results back.

use crate::error::Error;
use std::fmt::Formatter;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing has been exchanged yet.
    Idle,
    /// A local offer was created and is waiting for the remote answer.
    OfferPending,
    /// A remote offer was answered and the transport has not come up yet.
    AnswerPending,
    Connected,
    /// A negotiation step failed. Nothing moves the machine out of this state.
    Stalled(String),
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NegotiationState::Idle => f.write_str("idle"),
            NegotiationState::OfferPending => f.write_str("offer-pending"),
            NegotiationState::AnswerPending => f.write_str("answer-pending"),
            NegotiationState::Connected => f.write_str("connected"),
            NegotiationState::Stalled(reason) => write!(f, "stalled ({reason})"),
        }
    }
}

/// What to do with a remote ICE candidate that just arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateAction {
    /// The remote description is in place, the candidate can be added right away.
    Apply(RTCIceCandidateInit),
    /// Kept until [Negotiation::remote_description_applied].
    Buffered,
}

#[derive(Debug)]
pub struct Negotiation {
    state: NegotiationState,
    gathering: bool,
    has_remote_description: bool,
    pending_candidates: Vec<RTCIceCandidateInit>,
}

impl Negotiation {
    pub fn new() -> Self {
        Negotiation {
            state: NegotiationState::Idle,
            gathering: false,
            has_remote_description: false,
            pending_candidates: Vec::new(),
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn is_gathering(&self) -> bool {
        self.gathering
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self.state, NegotiationState::Stalled(_))
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// We are about to create a local offer, either for a peer that just joined or to
    /// renegotiate an established call.
    pub fn begin_offer(&mut self) -> Result<(), Error> {
        match self.state {
            NegotiationState::Idle | NegotiationState::Connected => {
                self.state = NegotiationState::OfferPending;
                self.gathering = true;
                self.has_remote_description = false;
                Ok(())
            }
            _ => Err(Error::invalid_transition("create an offer", self.state.clone())),
        }
    }

    /// A remote offer arrived and is about to be answered. An answerer still waiting for its
    /// transport is already back in a stable signaling state, so it may take a new offer too.
    pub fn offer_received(&mut self) -> Result<(), Error> {
        match self.state {
            NegotiationState::Idle
            | NegotiationState::AnswerPending
            | NegotiationState::Connected => {
                self.state = NegotiationState::AnswerPending;
                self.gathering = true;
                Ok(())
            }
            _ => Err(Error::invalid_transition("accept an offer", self.state.clone())),
        }
    }

    /// The remote answer to our offer arrived.
    pub fn answer_received(&mut self) -> Result<(), Error> {
        match self.state {
            NegotiationState::OfferPending => {
                self.state = NegotiationState::Connected;
                Ok(())
            }
            _ => Err(Error::invalid_transition("apply an answer", self.state.clone())),
        }
    }

    /// The remote description was set on the connection: returns the candidates that arrived
    /// too early, in arrival order.
    pub fn remote_description_applied(&mut self) -> Vec<RTCIceCandidateInit> {
        self.has_remote_description = true;
        std::mem::take(&mut self.pending_candidates)
    }

    pub fn candidate_received(&mut self, candidate: RTCIceCandidateInit) -> CandidateAction {
        if self.has_remote_description {
            CandidateAction::Apply(candidate)
        } else {
            self.pending_candidates.push(candidate);
            CandidateAction::Buffered
        }
    }

    /// The local ICE agent emitted its end-of-candidates marker.
    pub fn gathering_complete(&mut self) {
        self.gathering = false;
    }

    /// The transport reported an established connection.
    pub fn transport_connected(&mut self) {
        if matches!(
            self.state,
            NegotiationState::AnswerPending | NegotiationState::OfferPending
        ) {
            self.state = NegotiationState::Connected;
        }
    }

    pub fn fail<S: Into<String>>(&mut self, reason: S) {
        let reason = reason.into();
        log::error!("negotiation stalled in state {}: {reason}", self.state);
        self.state = NegotiationState::Stalled(reason);
        self.gathering = false;
    }
}

impl Default for Negotiation {
    fn default() -> Self {
        Negotiation::new()
    }
}

#[cfg(test)]
mod test {
    use crate::error::Error;
    use crate::negotiation::{CandidateAction, Negotiation, NegotiationState};
    use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

    fn candidate(n: u16) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: format!("candidate:{n} 1 udp 2130706431 192.168.1.{n} 5000 typ host"),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn offerer_path() -> Result<(), Error> {
        let mut n = Negotiation::new();
        n.begin_offer()?;
        assert_eq!(n.state(), &NegotiationState::OfferPending);
        assert!(n.is_gathering());
        n.answer_received()?;
        assert_eq!(n.state(), &NegotiationState::Connected);
        Ok(())
    }

    #[test]
    fn answerer_path() -> Result<(), Error> {
        let mut n = Negotiation::new();
        n.offer_received()?;
        assert_eq!(n.state(), &NegotiationState::AnswerPending);
        n.transport_connected();
        assert_eq!(n.state(), &NegotiationState::Connected);
        Ok(())
    }

    #[test]
    fn renegotiation_from_connected() -> Result<(), Error> {
        let mut n = Negotiation::new();
        n.begin_offer()?;
        n.remote_description_applied();
        n.answer_received()?;
        n.begin_offer()?;
        assert_eq!(n.state(), &NegotiationState::OfferPending);
        assert!(!n.has_remote_description());
        Ok(())
    }

    #[test]
    fn answerer_takes_a_new_offer_before_transport_is_up() -> Result<(), Error> {
        let mut n = Negotiation::new();
        n.offer_received()?;
        n.remote_description_applied();
        assert_eq!(n.state(), &NegotiationState::AnswerPending);

        n.offer_received()?;
        assert_eq!(n.state(), &NegotiationState::AnswerPending);
        n.transport_connected();
        assert_eq!(n.state(), &NegotiationState::Connected);
        Ok(())
    }

    #[test]
    fn guards_reject_out_of_order_steps() -> Result<(), Error> {
        let mut n = Negotiation::new();
        assert!(matches!(
            n.answer_received(),
            Err(Error::InvalidTransition { .. })
        ));

        n.begin_offer()?;
        // glare: remote offer while ours is outstanding
        assert!(n.offer_received().is_err());
        assert!(n.begin_offer().is_err());
        assert_eq!(n.state(), &NegotiationState::OfferPending);
        Ok(())
    }

    #[test]
    fn early_candidates_are_buffered_in_order() -> Result<(), Error> {
        let mut n = Negotiation::new();
        n.begin_offer()?;
        assert_eq!(n.candidate_received(candidate(1)), CandidateAction::Buffered);
        assert_eq!(n.candidate_received(candidate(2)), CandidateAction::Buffered);
        assert_eq!(n.pending_candidates(), 2);

        let flushed = n.remote_description_applied();
        assert_eq!(flushed, vec![candidate(1), candidate(2)]);
        assert_eq!(n.pending_candidates(), 0);

        assert_eq!(
            n.candidate_received(candidate(3)),
            CandidateAction::Apply(candidate(3))
        );
        Ok(())
    }

    #[test]
    fn stalled_machine_stays_stalled() {
        let mut n = Negotiation::new();
        n.fail("permission denied");
        assert!(n.is_stalled());
        assert!(n.begin_offer().is_err());
        assert!(n.offer_received().is_err());
        n.transport_connected();
        assert!(n.is_stalled());
        assert_eq!(n.state().to_string(), "stalled (permission denied)");
    }

    #[test]
    fn gathering_flag_follows_local_description() -> Result<(), Error> {
        let mut n = Negotiation::new();
        assert!(!n.is_gathering());
        n.offer_received()?;
        assert!(n.is_gathering());
        n.gathering_complete();
        assert!(!n.is_gathering());
        Ok(())
    }
}
