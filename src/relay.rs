use crate::directory::{ConnectionId, DuplicatePolicy, JoinOutcome, SessionDirectory};
use crate::error::Error;
use crate::protocol::{ClientEvent, JoinRoom, Payload, RelayEvent};
use crate::rooms::RoomMembership;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Outcome of forwarding a signaling payload to a named participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nobody is joined under the target email, or the target is the sender itself.
    RecipientUnresolved,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        *self == Delivery::Delivered
    }
}

/// Summary of a successful [Relay::join_room].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReport {
    pub outcome: JoinOutcome,
    /// Number of other room members told about the newcomer.
    pub notified: usize,
}

/// Routes signaling events between connections that joined under an email.
///
/// A [Relay] knows nothing about sockets: every connection is represented by an outbox of
/// [RelayEvent]s obtained from [Relay::connect]. One relay is created per process and shared
/// between connection handlers behind an `Arc`.
#[derive(Debug)]
pub struct Relay {
    policy: DuplicatePolicy,
    next_id: AtomicU64,
    state: Mutex<RelayState>,
}

#[derive(Debug, Default)]
struct RelayState {
    directory: SessionDirectory,
    rooms: RoomMembership,
    outboxes: HashMap<ConnectionId, UnboundedSender<RelayEvent>>,
}

impl RelayState {
    fn send(&self, connection: ConnectionId, event: RelayEvent) -> Delivery {
        match self.outboxes.get(&connection) {
            Some(outbox) if outbox.send(event).is_ok() => Delivery::Delivered,
            _ => Delivery::RecipientUnresolved,
        }
    }

    fn forward(&self, from: ConnectionId, target_email: &str, event: RelayEvent) -> Delivery {
        let name = event.name();
        match self.directory.resolve(target_email) {
            Some(target) if target == from => {
                log::warn!("{from} tried to send `{name}` to itself as {target_email}");
                Delivery::RecipientUnresolved
            }
            Some(target) => {
                let delivery = self.send(target, event);
                if delivery.is_delivered() {
                    log::debug!("{from} -> {target}: `{name}`");
                } else {
                    log::warn!("{target} for {target_email} has no open outbox, `{name}` dropped");
                }
                delivery
            }
            None => {
                log::warn!("no connection found for {target_email}, `{name}` from {from} dropped");
                Delivery::RecipientUnresolved
            }
        }
    }
}

impl Relay {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Relay {
            policy,
            next_id: AtomicU64::new(1),
            state: Mutex::new(RelayState::default()),
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Registers a new connection and returns its id with the receiving end of its outbox.
    pub async fn connect(&self) -> (ConnectionId, UnboundedReceiver<RelayEvent>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = unbounded_channel();
        let mut state = self.state.lock().await;
        state.outboxes.insert(id, tx);
        log::info!("new connection {id}");
        (id, rx)
    }

    /// Joins `connection` to `room_id` as `email`.
    ///
    /// The joiner receives `joined-room`, every other member of the room receives `user-joined`.
    pub async fn join_room(
        &self,
        connection: ConnectionId,
        room_id: &str,
        email: &str,
    ) -> Result<JoinReport, Error> {
        JoinRoom::new(room_id, email).validate()?;
        let mut state = self.state.lock().await;
        let outcome = state.directory.record_join(email, connection, self.policy)?;
        if let JoinOutcome::Evicted(previous) = outcome {
            log::warn!("{email} moved from {previous} to {connection}, {previous} evicted");
        }
        log::info!("user {email} ({connection}) joined room {room_id}");

        let others = state.rooms.join(room_id, connection);
        state.send(
            connection,
            RelayEvent::JoinedRoom {
                room_id: room_id.to_owned(),
            },
        );
        let mut notified = 0;
        for member in others {
            let event = RelayEvent::UserJoined {
                email_id: email.to_owned(),
            };
            if state.send(member, event).is_delivered() {
                notified += 1;
            }
        }
        Ok(JoinReport { outcome, notified })
    }

    pub async fn forward_call_offer(
        &self,
        from: ConnectionId,
        target_email: &str,
        offer: Payload,
    ) -> Delivery {
        let state = self.state.lock().await;
        let sender = state.directory.email_of(from).map(str::to_owned);
        state.forward(
            from,
            target_email,
            RelayEvent::IncomingCall {
                from: sender,
                offer,
            },
        )
    }

    pub async fn forward_call_acceptance(
        &self,
        from: ConnectionId,
        target_email: &str,
        answer: Payload,
    ) -> Delivery {
        let state = self.state.lock().await;
        state.forward(from, target_email, RelayEvent::CallAccepted { answer })
    }

    pub async fn forward_ice_candidate(
        &self,
        from: ConnectionId,
        target_email: &str,
        candidate: Payload,
    ) -> Delivery {
        let state = self.state.lock().await;
        state.forward(from, target_email, RelayEvent::IceCandidate { candidate })
    }

    /// Sends `event` straight to `connection`.
    pub async fn notify(&self, connection: ConnectionId, event: RelayEvent) -> Delivery {
        let state = self.state.lock().await;
        state.send(connection, event)
    }

    /// Dispatches a client event received on `connection`.
    ///
    /// Failures that concern the sender (rejected join, undeliverable forward) are reported back
    /// to it through its outbox as well as returned.
    pub async fn handle(
        &self,
        connection: ConnectionId,
        event: ClientEvent,
    ) -> Result<Delivery, Error> {
        let name = event.name();
        let (target, delivery) = match event {
            ClientEvent::JoinRoom(join) => {
                return match self.join_room(connection, &join.room_id, &join.email_id).await {
                    Ok(_) => Ok(Delivery::Delivered),
                    Err(cause) => {
                        log::warn!(
                            "{connection} failed to join room {:?}: {cause}",
                            join.room_id
                        );
                        let rejection = RelayEvent::JoinRejected {
                            room_id: join.room_id,
                            email_id: join.email_id,
                            reason: cause.to_string(),
                        };
                        self.notify(connection, rejection).await;
                        Err(cause)
                    }
                };
            }
            ClientEvent::CallUser(call) => {
                let delivery = self
                    .forward_call_offer(connection, &call.email_id, call.offer)
                    .await;
                (call.email_id, delivery)
            }
            ClientEvent::CallAccepted(accepted) => {
                let delivery = self
                    .forward_call_acceptance(connection, &accepted.email_id, accepted.answer)
                    .await;
                (accepted.email_id, delivery)
            }
            ClientEvent::IceCandidate(ice) => {
                let delivery = self
                    .forward_ice_candidate(connection, &ice.email_id, ice.candidate)
                    .await;
                (ice.email_id, delivery)
            }
        };
        if delivery == Delivery::RecipientUnresolved {
            let failure = RelayEvent::DeliveryFailed {
                event: name.to_owned(),
                email_id: target,
            };
            self.notify(connection, failure).await;
        }
        Ok(delivery)
    }

    /// Drops every trace of `connection`. Other room members are not notified.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut state = self.state.lock().await;
        state.outboxes.remove(&connection);
        state.rooms.leave_all(connection);
        match state.directory.forget(connection) {
            Some(email) => log::info!("user {email} ({connection}) disconnected"),
            None => log::info!("{connection} disconnected"),
        }
    }

    pub async fn resolve(&self, email: &str) -> Option<ConnectionId> {
        self.state.lock().await.directory.resolve(email)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.outboxes.len()
    }
}

impl Default for Relay {
    fn default() -> Self {
        Relay::new(DuplicatePolicy::default())
    }
}
