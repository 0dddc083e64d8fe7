use crate::config::RelayConfig;
use crate::directory::ConnectionId;
use crate::error::Error;
use crate::protocol::{ClientEvent, RelayEvent};
use crate::relay::Relay;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// WebSocket front of a [Relay]: one task per accepted socket.
#[derive(Debug)]
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
}

impl RelayServer {
    pub async fn bind(config: &RelayConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.addr()).await?;
        let relay = Arc::new(Relay::new(config.duplicate_email));
        Ok(RelayServer { listener, relay })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn relay(&self) -> Arc<Relay> {
        self.relay.clone()
    }

    /// Accepts connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Error> {
        log::info!("signaling relay listening on ws://{}", self.local_addr()?);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let relay = self.relay.clone();
                        let shutdown = shutdown.child_token();
                        tokio::spawn(async move {
                            if let Err(cause) = serve_connection(relay, stream, shutdown).await {
                                log::warn!("connection from {peer_addr} ended with error: {cause}");
                            }
                        });
                    }
                    Err(cause) => log::error!("failed to accept connection: {cause}"),
                },
                _ = shutdown.cancelled() => {
                    log::info!("signaling relay shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn serve_connection(
    relay: Arc<Relay>,
    stream: TcpStream,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let ws = accept_async(stream).await?;
    let (connection, outbox) = relay.connect().await;
    let res = pump(&relay, connection, ws, outbox, shutdown).await;
    relay.disconnect(connection).await;
    res
}

async fn pump(
    relay: &Relay,
    connection: ConnectionId,
    ws: WebSocketStream<TcpStream>,
    mut outbox: UnboundedReceiver<RelayEvent>,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            incoming = stream.next() => {
                let msg = match incoming {
                    Some(msg) => msg?,
                    None => return Ok(()),
                };
                match msg {
                    Message::Text(text) => match ClientEvent::from_text(&text) {
                        Ok(event) => {
                            // failures have already been reported to the sender
                            let _ = relay.handle(connection, event).await;
                        }
                        Err(cause) => {
                            log::warn!("{connection} sent an unreadable message: {cause}");
                            let reason = cause.to_string();
                            relay.notify(connection, RelayEvent::InvalidMessage { reason }).await;
                        }
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
            outgoing = outbox.recv() => match outgoing {
                Some(event) => sink.send(Message::Text(event.to_text()?)).await?,
                None => return Ok(()),
            },
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}
