//! Per-connection listener: owns the read half of a player's socket and
//! turns incoming packets into calls against the runner's proxy. Never
//! writes to the socket itself, preserving the single-writer-per-socket
//! discipline the runner relies on.

use super::runner::GameRunnerProxy;
use crate::codec::{CodecError, FrameCodec};
use futures::stream::SplitStream;
use futures::StreamExt;
use sos_shared::messages::MyTurnRequest;
use sos_shared::AccountId;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

type Reader = SplitStream<Framed<TcpStream, FrameCodec>>;

pub async fn run(mut reader: Reader, mut proxy: GameRunnerProxy, account: AccountId) {
    loop {
        match reader.next().await {
            Some(Ok(packet)) => match packet.command.as_str() {
                "game_runner_disconnect" => {
                    let _ = proxy.disconnect_player(account).await;
                    return;
                }
                "game_runner_my_turn" => match packet.parse_data::<MyTurnRequest>() {
                    Ok(turn) => {
                        let _ = proxy
                            .player_turn_done(account, turn.row, turn.column, turn.letter)
                            .await;
                    }
                    Err(err) => warn!(%account, %err, "malformed game_runner_my_turn payload"),
                },
                "game_runner_hint" => {
                    let _ = proxy.please_help(account).await;
                }
                other => debug!(%account, command = other, "ignoring unrecognized runner command"),
            },
            Some(Err(CodecError::Io(err))) => {
                debug!(%account, %err, "connection closed");
                let _ = proxy.disconnect_player(account).await;
                return;
            }
            Some(Err(err)) => {
                warn!(%account, %err, "malformed frame from player, disconnecting");
                let _ = proxy.disconnect_player(account).await;
                return;
            }
            None => {
                let _ = proxy.disconnect_player(account).await;
                return;
            }
        }
    }
}
