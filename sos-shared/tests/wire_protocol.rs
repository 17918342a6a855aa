//! End-to-end checks of the `Packet` envelope against the typed request/response
//! payloads, independent of any transport.

use pretty_assertions::assert_eq;
use sos_shared::messages::{JoinGameRequest, NewGameRequest, PlayersStatus};
use sos_shared::{GameId, Packet};
use std::collections::HashMap;

#[test]
fn new_game_request_round_trips_through_typed_payload() {
    let request = NewGameRequest {
        session_id: "abc123".into(),
        board_size: 3,
        player_count: 2,
        is_public: true,
        max_hint: 1,
    };

    let mut packet = Packet::new("new_game_request");
    packet.set_data(&request).unwrap();

    let wire = packet.to_json_string().unwrap();
    let decoded = Packet::from_json_str(&wire).unwrap();
    let decoded_request: NewGameRequest = decoded.parse_data().unwrap();

    assert_eq!(request, decoded_request);
}

#[test]
fn join_game_request_carries_numeric_game_id() {
    let request = JoinGameRequest {
        session_id: "abc123".into(),
        game_id: GameId::new(1),
        creator_username: "alice".into(),
    };

    let mut packet = Packet::new("join_game_request");
    packet.set_data(&request).unwrap();

    assert_eq!(packet.data.get("game_id").unwrap(), 1);
}

#[test]
fn error_responses_carry_the_error_inside_data() {
    let mut packet = Packet::new("login_response");
    packet.set_error("Username or password is wrong.");

    assert_eq!(packet.error(), Some("Username or password is wrong."));
}

#[test]
fn pause_stop_response_swaps_request_for_response_in_place() {
    let mut packet = Packet::new(Packet::response_command_for("new_game_request"));
    packet.set_error("Server has been paused.");

    assert_eq!(packet.command, "new_game_response");
}

#[test]
fn players_status_payload_round_trips() {
    let mut scores = HashMap::new();
    scores.insert("alice".to_string(), "2".to_string());

    let status = PlayersStatus {
        scores,
        colors: HashMap::new(),
        hints: HashMap::new(),
        status: HashMap::new(),
    };

    let mut packet = Packet::new("game_runner_players_status");
    packet.set_data(&status).unwrap();

    let decoded: PlayersStatus = packet.parse_data().unwrap();
    assert_eq!(decoded, status);
}
