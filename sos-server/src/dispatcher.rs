//! C5: accept loop and per-connection short-RPC handling. Ported from
//! `ClientTask.__call__`: each accepted socket is handed to its own task,
//! which reads exactly one packet and either answers it directly or
//! transfers the socket to a game runner.

use crate::codec::FrameCodec;
use crate::game::GameRegistry;
use crate::lifecycle::Lifecycle;
use crate::persistence::{Store, StoreError};
use anyhow::Context;
use futures::SinkExt;
use sos_shared::messages::{
    EditAccountRequest, EditPasswordRequest, EditProfileRequest, EditUsernameRequest,
    GetAccountRequest, JoinGameRequest, LoginRequest, NewGameRequest, RemoveAccountRequest,
    SignoutRequest, SignupRequest,
};
use sos_shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{info, instrument, warn};

pub struct Dispatcher {
    store: Arc<Store>,
    lifecycle: Arc<Lifecycle>,
    games: Arc<GameRegistry>,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, lifecycle: Arc<Lifecycle>, games: Arc<GameRegistry>) -> Self {
        Self {
            store,
            lifecycle,
            games,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self: Arc<Self>, listen_addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;
        info!(%listen_addr, "accept loop listening");

        loop {
            let (stream, peer_addr) = listener.accept().await.context("accept failed")?;

            if self.lifecycle.is_stopped() {
                info!("stop signal observed, shutting down accept loop");
                return Ok(());
            }

            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.handle_connection(stream, peer_addr).await;
            });
        }
    }

    #[instrument(skip(self, stream))]
    async fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let mut framed = Framed::new(stream, FrameCodec::new());

        let packet = match futures::StreamExt::next(&mut framed).await {
            Some(Ok(packet)) => packet,
            Some(Err(err)) => {
                warn!(%peer_addr, %err, "malformed opening frame, closing");
                return;
            }
            None => return,
        };

        if !self.lifecycle.is_running() {
            let reason = if self.lifecycle.is_stopped() {
                "server is stopped"
            } else {
                "server is paused"
            };
            let mut response = Packet::new(Packet::response_command_for(&packet.command));
            response.set_error(reason);
            let _ = framed.send(response).await;
            return;
        }

        match packet.command.as_str() {
            "login_request" => self.handle_login(&mut framed, &packet).await,
            "signup_request" => self.handle_signup(&mut framed, &packet).await,
            "signout_request" => self.handle_signout(&mut framed, &packet).await,
            "get_account_request" => self.handle_get_account(&mut framed, &packet).await,
            "edit_account_request" => self.handle_edit_account(&mut framed, &packet).await,
            "edit_profile_request" => self.handle_edit_profile(&mut framed, &packet).await,
            "edit_username_request" => self.handle_edit_username(&mut framed, &packet).await,
            "edit_password_request" => self.handle_edit_password(&mut framed, &packet).await,
            "remove_account_request" => self.handle_remove_account(&mut framed, &packet).await,
            "new_game_request" => self.handle_new_game(framed, &packet, peer_addr).await,
            "join_game_request" => self.handle_join_game(framed, &packet, peer_addr).await,
            other => {
                warn!(%peer_addr, command = other, "unrecognized command, closing");
            }
        }
    }

    async fn respond(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        command: &str,
        result: Result<serde_json::Map<String, serde_json::Value>, StoreError>,
    ) {
        let mut response = Packet::new(Packet::response_command_for(command));
        match result {
            Ok(data) => response.data = data,
            Err(err) => response.set_error(err.to_string()),
        };
        if let Err(err) = framed.send(response).await {
            warn!(%err, "failed to write response");
        }
    }

    async fn handle_login(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: LoginRequest = packet
                .parse_data()
                .map_err(|_| StoreError::WrongUsernamePassword)?;
            let token = self.store.authenticate(&request.username, &request.password)?;
            let mut data = serde_json::Map::new();
            data.insert("session_id".into(), token.into());
            Ok(data)
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_signup(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: SignupRequest = packet
                .parse_data()
                .map_err(|_| StoreError::ExistingUsername)?;
            self.store.register(
                &request.username,
                &request.password,
                &request.firstname,
                &request.lastname,
                false,
            )?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_signout(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: SignoutRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store.invalidate(&request.session_id)?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_get_account(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: GetAccountRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            let profile = self.store.get_account(&request.session_id)?;
            match serde_json::to_value(profile).unwrap() {
                serde_json::Value::Object(data) => Ok(data),
                _ => unreachable!("AccountProfile always serializes to an object"),
            }
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_edit_account(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: EditAccountRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store.edit_account(
                &request.session_id,
                &request.current_password,
                &request.username,
                &request.password,
                &request.first_name,
                &request.last_name,
                request.is_admin,
            )?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_edit_profile(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: EditProfileRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store.edit_profile(
                &request.session_id,
                &request.current_password,
                &request.first_name,
                &request.last_name,
            )?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_edit_username(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: EditUsernameRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store.change_username(
                &request.session_id,
                &request.current_password,
                &request.username,
            )?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_edit_password(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: EditPasswordRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store.change_password(
                &request.session_id,
                &request.current_password,
                &request.new_password,
            )?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    async fn handle_remove_account(&self, framed: &mut Framed<TcpStream, FrameCodec>, packet: &Packet) {
        let result = (|| -> Result<_, StoreError> {
            let request: RemoveAccountRequest = packet
                .parse_data()
                .map_err(|_| StoreError::InvalidSessionToken)?;
            self.store
                .remove_account(&request.session_id, &request.current_password)?;
            Ok(serde_json::Map::new())
        })();
        self.respond(framed, &packet.command, result).await;
    }

    #[instrument(skip(self, framed, packet))]
    async fn handle_new_game(
        &self,
        mut framed: Framed<TcpStream, FrameCodec>,
        packet: &Packet,
        peer_addr: SocketAddr,
    ) {
        let request: NewGameRequest = match packet.parse_data() {
            Ok(request) => request,
            Err(_) => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(StoreError::InvalidSessionToken.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };

        let created = self.store.new_game(
            &request.session_id,
            request.board_size,
            request.player_count,
            request.is_public,
            request.max_hint,
        );

        let (game_id, account_id) = match created {
            Ok(pair) => pair,
            Err(err) => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(err.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };

        let info = match self.store.get_game_information(game_id) {
            Ok(info) => info,
            Err(err) => {
                warn!(%err, "failed to read back just-created game");
                return;
            }
        };

        let proxy = match self.games.get_or_create(game_id, &info, self.store.clone()) {
            Some(proxy) => proxy,
            None => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(StoreError::GameHasEnded.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };
        let _ = proxy
            .clone()
            .new_player_connection(account_id, peer_addr, framed, proxy)
            .await;
    }

    #[instrument(skip(self, framed, packet))]
    async fn handle_join_game(
        &self,
        mut framed: Framed<TcpStream, FrameCodec>,
        packet: &Packet,
        peer_addr: SocketAddr,
    ) {
        let request: JoinGameRequest = match packet.parse_data() {
            Ok(request) => request,
            Err(_) => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(StoreError::InvalidSessionToken.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };

        let account_id = match self.store.join_game(
            &request.session_id,
            request.game_id,
            &request.creator_username,
        ) {
            Ok(account_id) => account_id,
            Err(err) => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(err.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };

        let info = match self.store.get_game_information(request.game_id) {
            Ok(info) => info,
            Err(err) => {
                warn!(%err, "failed to read back game information on join");
                return;
            }
        };

        let proxy = match self
            .games
            .get_or_create(request.game_id, &info, self.store.clone())
        {
            Some(proxy) => proxy,
            None => {
                let mut response = Packet::new(Packet::response_command_for(&packet.command));
                response.set_error(StoreError::GameHasEnded.to_string());
                let _ = framed.send(response).await;
                return;
            }
        };
        let _ = proxy
            .clone()
            .new_player_connection(account_id, peer_addr, framed, proxy)
            .await;
    }
}
