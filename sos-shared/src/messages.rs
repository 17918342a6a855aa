//! Typed request/response payloads carried in [`crate::Packet::data`].
//!
//! These mirror the `data` dictionaries the original server reads field by
//! field (`data["username"]`, `data["session_id"]`, ...); giving them a name
//! and a `Deserialize`/`Serialize` impl is the idiomatic-Rust analogue of
//! that dynamic dictionary access.

use crate::{AccountId, GameId, Letter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignoutRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAccountRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditAccountRequest {
    pub session_id: String,
    pub current_password: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditProfileRequest {
    pub session_id: String,
    pub current_password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditUsernameRequest {
    pub session_id: String,
    pub current_password: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPasswordRequest {
    pub session_id: String,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAccountRequest {
    pub session_id: String,
    pub current_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameRequest {
    pub session_id: String,
    pub board_size: u32,
    pub player_count: u32,
    pub is_public: bool,
    pub max_hint: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameRequest {
    pub session_id: String,
    pub game_id: GameId,
    pub creator_username: String,
}

/// Response payload for `get_account_response` (and the account data echoed
/// back by `edit_*` flows when useful to a caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub rating: i64,
    pub wins: i64,
    pub games_played: i64,
    pub is_admin: bool,
}

/// Payload of `game_runner_game_details`, sent once as the first frame on a
/// newly upgraded socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDetails {
    pub game_id: GameId,
    pub board_size: u32,
    pub player_count: u32,
    pub creator_username: String,
    pub color: String,
    pub max_hint: u32,
}

/// Payload of `game_runner_players_status`, keyed by username per spec §4.6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersStatus {
    pub scores: HashMap<String, String>,
    pub colors: HashMap<String, String>,
    pub hints: HashMap<String, String>,
    pub status: HashMap<String, String>,
}

/// One board cell as seen by a client: `(color, letter-or-empty)`.
pub type CellView = (String, String);

/// Payload of `game_runner_board_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStatus {
    pub board: Vec<Vec<CellView>>,
}

/// Payload of the client's `game_runner_my_turn` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyTurnRequest {
    pub row: usize,
    pub column: usize,
    pub letter: Letter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoringMove {
    pub account: AccountId,
    pub row: usize,
    pub column: usize,
    pub letter: Letter,
}
