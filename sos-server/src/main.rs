use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::game::GameRegistry;
use crate::lifecycle::Lifecycle;
use crate::persistence::Store;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::*;

mod codec;
mod config;
mod dispatcher;
mod game;
mod lifecycle;
mod permutation;
mod persistence;

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::parse();
    let listen_addr = SocketAddr::from((config.host, config.port));

    let store = Arc::new(Store::open(&config.db_path).expect("failed to open storage"));
    let lifecycle = Arc::new(Lifecycle::new());
    let games = GameRegistry::new();

    info!(%listen_addr, db_path = %config.db_path.display(), "starting SOS game server");

    let dispatcher = Arc::new(Dispatcher::new(store, lifecycle, games));
    if let Err(err) = dispatcher.run(listen_addr).await {
        error!(%err, "accept loop exited with an error");
    }
}
