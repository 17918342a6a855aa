//! C6: one actor per live game. State here is touched only from inside
//! these methods — thespian's generated mailbox is the task queue from
//! spec §4.6/§5, giving FIFO, single-consumer delivery without a hand-rolled
//! locked queue or a `sleep(0.01)` poll.

use super::board::{Board, TripleMode};
use super::color;
use super::listener;
use super::registry::GameRegistry;
use crate::codec::FrameCodec;
use crate::persistence::{GameInfo, Store};
use futures::stream::SplitSink;
use futures::SinkExt;
use rand::seq::SliceRandom;
use sos_shared::messages::{BoardStatus, GameDetails, PlayersStatus};
use sos_shared::{AccountId, GameId, Letter, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thespian::Actor;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, instrument, warn};

/// How often the idle ticker (see [`spawn_idle_ticker`]) checks for a
/// deserted, inactive game.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// How long a game may sit with no connected players before it is reclaimed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

type GameSocket = Framed<TcpStream, FrameCodec>;
type Writer = SplitSink<GameSocket, Packet>;

#[derive(Actor)]
pub struct GameRunner {
    game_id: GameId,
    store: Arc<Store>,
    registry: Arc<GameRegistry>,

    board: Board,
    player_count: usize,
    max_hint: u32,
    creator_username: String,

    roster: Vec<AccountId>,
    players_conn: HashMap<AccountId, Option<Writer>>,
    players_score: HashMap<AccountId, i64>,
    players_hints: HashMap<AccountId, u32>,
    players_color: HashMap<AccountId, String>,

    turn_order: Vec<AccountId>,
    turn_index: Option<usize>,

    online_players: usize,
    last_activity: Instant,
    has_winner: bool,
}

impl GameRunner {
    pub fn new(
        game_id: GameId,
        info: &GameInfo,
        store: Arc<Store>,
        registry: Arc<GameRegistry>,
    ) -> Self {
        Self {
            game_id,
            store,
            registry,
            board: Board::new(info.board_size as usize),
            player_count: info.player_count as usize,
            max_hint: info.max_hint,
            creator_username: info.creator_username.clone(),
            roster: Vec::new(),
            players_conn: HashMap::new(),
            players_score: HashMap::new(),
            players_hints: HashMap::new(),
            players_color: HashMap::new(),
            turn_order: Vec::new(),
            turn_index: None,
            online_players: 0,
            last_activity: Instant::now(),
            has_winner: false,
        }
    }

    fn username(&self, account: AccountId) -> String {
        self.store
            .get_username_from_account_id(account)
            .unwrap_or_else(|_| format!("account_{}", account.raw()))
    }

    async fn send_to(&mut self, account: AccountId, packet: Packet) {
        if let Some(Some(writer)) = self.players_conn.get_mut(&account) {
            if let Err(err) = writer.send(packet).await {
                warn!(%account, %err, "failed writing to player socket");
            }
        }
    }

    async fn broadcast(&mut self, packet: Packet) {
        let accounts: Vec<AccountId> = self
            .players_conn
            .iter()
            .filter(|(_, conn)| conn.is_some())
            .map(|(account, _)| *account)
            .collect();
        for account in accounts {
            self.send_to(account, packet.clone()).await;
        }
    }

    async fn broadcast_players_status(&mut self) {
        let mut scores = HashMap::new();
        let mut colors = HashMap::new();
        let mut hints = HashMap::new();
        let mut status = HashMap::new();

        for &account in &self.roster {
            let username = self.username(account);
            scores.insert(username.clone(), self.players_score.get(&account).copied().unwrap_or(0).to_string());
            colors.insert(username.clone(), self.players_color.get(&account).cloned().unwrap_or_default());
            hints.insert(username.clone(), self.players_hints.get(&account).copied().unwrap_or(0).to_string());
            let online = matches!(self.players_conn.get(&account), Some(Some(_)));
            status.insert(username, if online { "online".to_string() } else { "offline".to_string() });
        }

        let mut packet = Packet::new("game_runner_players_status");
        packet
            .set_data(&PlayersStatus { scores, colors, hints, status })
            .expect("PlayersStatus always serializes to an object");
        self.broadcast(packet).await;
    }

    async fn broadcast_board_status(&mut self) {
        let colors = self.players_color.clone();
        let board = self.board.render(|owner| colors.get(&owner).cloned().unwrap_or_default());
        let mut packet = Packet::new("game_runner_board_status");
        packet
            .set_data(&BoardStatus { board })
            .expect("BoardStatus always serializes to an object");
        self.broadcast(packet).await;
    }

    async fn send_your_turn(&mut self, account: AccountId) {
        let packet = Packet::new("game_runner_your_turn");
        self.send_to(account, packet).await;
    }

    fn start_game_if_ready(&mut self) {
        if self.turn_index.is_some() || self.roster.len() < self.player_count {
            return;
        }

        self.turn_order = self.roster.clone();
        self.turn_order.shuffle(&mut rand::thread_rng());
        self.turn_index = Some(0);
        self.last_activity = Instant::now();
    }

    fn current_player(&self) -> Option<AccountId> {
        self.turn_index.map(|idx| self.turn_order[idx])
    }

    fn advance_turn(&mut self) {
        if let Some(idx) = self.turn_index {
            self.turn_index = Some((idx + 1) % self.turn_order.len());
        }
    }
}

#[thespian::actor]
impl GameRunner {
    #[instrument(skip(self, socket, proxy))]
    pub async fn new_player_connection(
        &mut self,
        account: AccountId,
        peer_addr: SocketAddr,
        socket: GameSocket,
        proxy: GameRunnerProxy,
    ) {
        info!(%account, %peer_addr, game_id = %self.game_id, "new player connection");

        if self.has_winner {
            let (mut writer, _) = futures::StreamExt::split(socket);
            let mut packet = Packet::new("game_runner_new_player_banned");
            packet.set_error("Game has been finished.");
            let _ = writer.send(packet).await;
            return;
        }

        if matches!(self.players_conn.get(&account), Some(Some(_))) {
            let (mut writer, _) = futures::StreamExt::split(socket);
            let mut packet = Packet::new("game_runner_new_player_banned");
            packet.set_error("another session");
            let _ = writer.send(packet).await;
            return;
        }

        let (writer, reader) = futures::StreamExt::split(socket);

        if !self.roster.contains(&account) {
            self.roster.push(account);
            self.players_score.insert(account, 0);
            self.players_hints.insert(account, 0);
            self.players_color
                .insert(account, color::assign(self.roster.len() - 1, self.player_count));
        }

        self.players_conn.insert(account, Some(writer));
        self.online_players += 1;
        self.last_activity = Instant::now();

        tokio::spawn(listener::run(reader, proxy, account));

        let details = GameDetails {
            game_id: self.game_id,
            board_size: self.board.size() as u32,
            player_count: self.player_count as u32,
            creator_username: self.creator_username.clone(),
            color: self.players_color.get(&account).cloned().unwrap_or_default(),
            max_hint: self.max_hint,
        };
        let mut packet = Packet::new("game_runner_game_details");
        packet
            .set_data(&details)
            .expect("GameDetails always serializes to an object");
        self.send_to(account, packet).await;

        self.broadcast_players_status().await;
        self.broadcast_board_status().await;

        if self.turn_index.is_some() && self.current_player() == Some(account) {
            self.send_your_turn(account).await;
        } else if self.turn_index.is_none() && self.roster.len() == self.player_count {
            self.start_game_if_ready();
            if let Some(first) = self.current_player() {
                self.send_your_turn(first).await;
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn disconnect_player(&mut self, account: AccountId) {
        let packet = Packet::new("game_runner_abort");
        self.send_to(account, packet).await;
        self.players_conn.insert(account, None);
        self.broadcast_players_status().await;
        self.online_players = self.online_players.saturating_sub(1);
        if self.online_players == 0 {
            self.last_activity = Instant::now();
        }
    }

    #[instrument(skip(self))]
    pub async fn player_turn_done(&mut self, account: AccountId, row: usize, column: usize, letter: Letter) {
        if self.current_player() != Some(account) {
            return;
        }
        if row >= self.board.size() || column >= self.board.size() || !self.board.is_empty_at(row, column) {
            return;
        }

        self.board.place(row, column, letter, account);
        if let Err(err) = self.store.add_game_log(self.game_id, account, letter, row, column) {
            warn!(%err, "failed to persist game log entry");
        }

        let scored = self.board.check_triples(row, column, letter, account, TripleMode::Apply);
        self.last_activity = Instant::now();

        if scored > 0 {
            *self.players_score.entry(account).or_insert(0) += scored as i64;
        } else {
            self.advance_turn();
        }

        self.broadcast_players_status().await;
        self.broadcast_board_status().await;

        if self.board.is_full() {
            self.announce_winner().await;
        } else if let Some(next) = self.current_player() {
            self.send_your_turn(next).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn please_help(&mut self, account: AccountId) {
        let mut packet = Packet::new("game_runner_hint_result");

        if self.current_player() != Some(account) {
            packet.set_error("It is not your turn.");
            self.send_to(account, packet).await;
            self.broadcast_players_status().await;
            return;
        }

        let hints = self.players_hints.entry(account).or_insert(0);
        if *hints >= self.max_hint {
            packet.set_error("You have used all your hints.");
            self.send_to(account, packet).await;
            self.broadcast_players_status().await;
            return;
        }

        *hints += 1;
        let finished = *hints >= self.max_hint;

        let found = self.board.find_good_place(account);

        let score = self.players_score.entry(account).or_insert(0);
        *score = (*score - 1).max(0);

        if let Err(err) = self.store.add_game_hint(self.game_id, account, found) {
            warn!(%err, "failed to persist game hint");
        }

        match found {
            Some((row, column, letter)) => {
                packet.data.insert(
                    "result".into(),
                    format!("row {}, column {}, letter {}", row + 1, column + 1, letter).into(),
                );
            }
            None => {
                packet.set_error("no hint available");
            }
        }
        if finished {
            packet.set("finished", true);
        }
        self.send_to(account, packet).await;
        self.broadcast_players_status().await;
    }

    /// Periodic self-check driven by [`spawn_idle_ticker`]; folds idle
    /// reclamation into the same task-queue model as every other operation
    /// instead of a `sleep(0.01)` spin inside a locked loop. Returns whether
    /// the ticker should keep running.
    #[instrument(skip(self))]
    pub async fn check_idle(&mut self) -> bool {
        if self.has_winner {
            self.registry.deregister(self.game_id);
            return false;
        }

        if self.online_players == 0 && self.last_activity.elapsed() >= IDLE_TIMEOUT {
            if let Err(err) = self.store.set_game_ended(self.game_id, None) {
                warn!(%err, "failed to mark idle game as ended");
            }
            self.registry.deregister(self.game_id);
            return false;
        }

        true
    }
}

impl GameRunner {
    async fn announce_winner(&mut self) {
        let mut ranked: Vec<(AccountId, i64)> = self
            .roster
            .iter()
            .map(|&account| (account, self.players_score.get(&account).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let draw = ranked.len() >= 2 && ranked[0].1 == ranked[1].1;
        let winner = if draw { None } else { ranked.first().map(|(account, _)| *account) };

        if let Err(err) = self.store.set_game_ended(self.game_id, winner) {
            warn!(%err, "failed to persist game end");
        }
        for &account in &self.roster {
            let delta_wins = if Some(account) == winner { 1 } else { 0 };
            if let Err(err) = self.store.update_account_games_and_wins(account, 1, delta_wins) {
                warn!(%err, "failed to update account games/wins");
            }
        }

        let mut packet = Packet::new("game_runner_winner_announced");
        match winner {
            Some(account) => {
                packet.set("winner", self.username(account));
            }
            None => {
                packet.set("draw", true);
            }
        }
        self.broadcast(packet).await;

        self.has_winner = true;
        self.registry.deregister(self.game_id);
    }
}

/// Spawned alongside a freshly created runner: periodically calls
/// `check_idle` through the proxy until it reports the game is done.
pub fn spawn_idle_ticker(proxy: GameRunnerProxy) {
    tokio::spawn(async move {
        let mut proxy = proxy;
        loop {
            tokio::time::sleep(IDLE_CHECK_INTERVAL).await;
            match proxy.check_idle().await {
                Ok(true) => continue,
                Ok(false) | Err(_) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Store;

    /// Registers two accounts, creates a 2-player game, and joins the second
    /// account, returning the store and both account ids alongside a runner
    /// built directly from the same persisted game (bypassing the actor
    /// mailbox, so tests call these methods exactly as written).
    fn two_player_runner() -> (Arc<Store>, GameId, AccountId, AccountId, GameRunner) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.register("alice", "pw", "Alice", "A", false).unwrap();
        store.register("bob", "pw", "Bob", "B", false).unwrap();

        let alice_token = store.authenticate("alice", "pw").unwrap();
        let (game_id, p1) = store.new_game(&alice_token, 3, 2, true, 0).unwrap();

        let bob_token = store.authenticate("bob", "pw").unwrap();
        let p2 = store.join_game(&bob_token, game_id, "alice").unwrap();

        let info = store.get_game_information(game_id).unwrap();
        let registry = GameRegistry::new();
        let runner = GameRunner::new(game_id, &info, store.clone(), registry);

        (store, game_id, p1, p2, runner)
    }

    #[tokio::test]
    async fn player_turn_done_advances_the_turn_on_a_non_scoring_move() {
        let (_store, _game_id, p1, p2, mut runner) = two_player_runner();
        runner.roster = vec![p1, p2];
        runner.players_score.insert(p1, 0);
        runner.players_score.insert(p2, 0);
        runner.turn_order = vec![p1, p2];
        runner.turn_index = Some(0);

        runner.player_turn_done(p1, 0, 0, Letter::S).await;

        assert_eq!(runner.current_player(), Some(p2));
        assert_eq!(runner.players_score[&p1], 0);
    }

    #[tokio::test]
    async fn player_turn_done_retains_the_turn_on_a_scoring_move() {
        let (_store, _game_id, p1, p2, mut runner) = two_player_runner();
        runner.roster = vec![p1, p2];
        runner.players_score.insert(p1, 0);
        runner.players_score.insert(p2, 0);
        runner.turn_order = vec![p1, p2];
        runner.turn_index = Some(0);

        runner.board.place(0, 0, Letter::S, p1);
        runner.board.place(0, 1, Letter::O, p1);

        runner.player_turn_done(p1, 0, 2, Letter::S).await;

        assert_eq!(runner.current_player(), Some(p1));
        assert_eq!(runner.players_score[&p1], 1);
    }

    #[tokio::test]
    async fn announce_winner_detects_a_draw_on_tied_top_scores() {
        let (store, game_id, p1, p2, mut runner) = two_player_runner();
        runner.roster = vec![p1, p2];
        runner.players_score.insert(p1, 2);
        runner.players_score.insert(p2, 2);

        runner.announce_winner().await;

        assert!(runner.has_winner);
        assert_eq!(store.game_winner(game_id).unwrap(), None);
    }

    #[tokio::test]
    async fn announce_winner_picks_the_highest_scorer_when_not_tied() {
        let (store, game_id, p1, p2, mut runner) = two_player_runner();
        runner.roster = vec![p1, p2];
        runner.players_score.insert(p1, 3);
        runner.players_score.insert(p2, 1);

        runner.announce_winner().await;

        assert_eq!(store.game_winner(game_id).unwrap(), Some(p1));
    }

    #[tokio::test]
    async fn check_idle_deregisters_once_the_timeout_elapses_with_nobody_connected() {
        let (_store, _game_id, _p1, _p2, mut runner) = two_player_runner();
        runner.online_players = 0;
        runner.last_activity = Instant::now() - Duration::from_secs(31);

        assert!(!runner.check_idle().await);
    }

    #[tokio::test]
    async fn check_idle_keeps_running_while_within_the_timeout() {
        let (_store, _game_id, _p1, _p2, mut runner) = two_player_runner();
        runner.online_players = 0;
        runner.last_activity = Instant::now();

        assert!(runner.check_idle().await);
    }
}
