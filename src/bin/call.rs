use callroom::{CallConfig, CallSession, Error};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = CallConfig::parse();

    let mut session =
        CallSession::join(&config.relay, config.join_request(), config.options()).await?;
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }
    {
        let peer = session.peer();
        tokio::spawn(async move {
            match peer.connected().await {
                Ok(()) => log::info!("call connected"),
                Err(cause) => log::error!("call failed: {cause}"),
            }
            while let Some(_track) = peer.remote_tracks().next().await {
                log::info!("receiving remote media");
            }
        });
    }
    let res = session.run(shutdown).await;
    session.peer().close().await?;
    res
}
