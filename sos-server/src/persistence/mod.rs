//! C3: serialized access to accounts, sessions, games, logs, hints, actions.
//!
//! One `rusqlite::Connection` behind one `std::sync::Mutex`, mirroring the
//! original's `db_lock` + `@db_transaction` decorator: every mutating method
//! acquires the lock, runs inside an explicit transaction, commits before
//! returning, and turns any failure into a [`StoreError`] value rather than
//! unwinding — callers branch on `Result`, never on "is this an exception".

mod error;
mod schema;

pub use error::StoreError;

use rand::RngCore;
use sha2::{Digest, Sha512};
use sos_shared::letter::Letter;
use sos_shared::messages::AccountProfile;
use sos_shared::{AccountId, GameId};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

use rusqlite::{params, Connection, OptionalExtension};

pub struct Store {
    conn: Mutex<Connection>,
}

/// Everything a runner needs to know about a game at startup, joining the
/// pieces of `get_game_information`'s tuple return value from the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub player_count: u32,
    pub board_size: u32,
    pub creator: AccountId,
    pub creator_username: String,
    pub max_hint: u32,
    pub running: bool,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}

fn hash_password(password: &str) -> String {
    let digest = Sha512::digest(password.as_bytes());
    hex::encode(digest)
}

/// Compares two hex digests in time proportional to their length, not to the
/// position of the first mismatching byte (spec §9).
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn generate_token() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let mut bytes = [0u8; 50];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Test-only accessor for the persisted winner of a finished game.
    #[cfg(test)]
    pub fn game_winner(&self, game_id: GameId) -> Result<Option<AccountId>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let winner: Option<i64> = conn.query_row(
            "SELECT winner FROM games WHERE game_id = ?1",
            params![game_id.raw()],
            |row| row.get(0),
        )?;
        Ok(winner.map(AccountId::new))
    }

    /// Non-mutating: resolves a session token to an account id, or `None` on
    /// a missing or (by construction, impossible) ambiguous token.
    #[instrument(skip(self, token))]
    pub fn resolve(&self, token: &str) -> Option<AccountId> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT account_id FROM sessions WHERE token = ?1")
            .ok()?;
        let ids: Vec<i64> = stmt
            .query_map(params![token], |row| row.get(0))
            .ok()?
            .filter_map(Result::ok)
            .collect();

        match ids.as_slice() {
            [id] => Some(AccountId::new(*id)),
            _ => None,
        }
    }

    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let row: Option<(i64, String, bool)> = tx
            .query_row(
                "SELECT account_id, password_hash, is_disabled FROM accounts WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
            )
            .optional()?;

        let (account_id, password_hash, is_disabled) =
            row.ok_or(StoreError::WrongUsernamePassword)?;

        if is_disabled || !constant_time_eq(&hash_password(password), &password_hash) {
            return Err(StoreError::WrongUsernamePassword);
        }

        tx.execute(
            "UPDATE accounts SET last_login = ?1 WHERE account_id = ?2",
            params![now(), account_id],
        )?;

        let token = generate_token();
        tx.execute(
            "INSERT INTO sessions (token, created_at, account_id) VALUES (?1, ?2, ?3)",
            params![token, now(), account_id],
        )?;

        tx.commit()?;
        Ok(token)
    }

    #[instrument(skip(self, token))]
    pub fn invalidate(&self, token: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        if affected == 0 {
            return Err(StoreError::InvalidSessionToken);
        }
        Ok(())
    }

    fn invalidate_all_sessions(tx: &rusqlite::Transaction<'_>, account_id: i64) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM sessions WHERE account_id = ?1",
            params![account_id],
        )?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub fn register(
        &self,
        username: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        is_admin: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT account_id FROM accounts WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::ExistingUsername);
        }

        conn.execute(
            "INSERT INTO accounts (username, password_hash, first_name, last_name, created_at, is_admin)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                username,
                hash_password(password),
                first_name,
                last_name,
                now(),
                is_admin as i64
            ],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(ref sqlite_err, _)
                if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::ExistingUsername
            }
            other => StoreError::from(other),
        })?;

        Ok(())
    }

    fn resolve_and_verify(
        tx: &rusqlite::Transaction<'_>,
        token: &str,
        current_password: &str,
    ) -> Result<i64, StoreError> {
        let account_id: Option<i64> = tx
            .query_row(
                "SELECT account_id FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        let account_id = account_id.ok_or(StoreError::InvalidSessionToken)?;

        let password_hash: String = tx.query_row(
            "SELECT password_hash FROM accounts WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;

        if !constant_time_eq(&hash_password(current_password), &password_hash) {
            return Err(StoreError::WrongPassword);
        }

        Ok(account_id)
    }

    #[instrument(skip(self, current_password, new_password))]
    pub fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let account_id = Self::resolve_and_verify(&tx, token, current_password)?;

        if current_password == new_password {
            return Err(StoreError::RepeatedPassword);
        }

        tx.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE account_id = ?2",
            params![hash_password(new_password), account_id],
        )?;
        Self::invalidate_all_sessions(&tx, account_id)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self, current_password))]
    pub fn change_username(
        &self,
        token: &str,
        current_password: &str,
        new_username: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let account_id = Self::resolve_and_verify(&tx, token, current_password)?;

        let current_username: String = tx.query_row(
            "SELECT username FROM accounts WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;

        if current_username != new_username {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT account_id FROM accounts WHERE username = ?1",
                    params![new_username],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::ExistingUsername);
            }

            tx.execute(
                "UPDATE accounts SET username = ?1 WHERE account_id = ?2",
                params![new_username, account_id],
            )?;
        }

        Self::invalidate_all_sessions(&tx, account_id)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self, current_password))]
    pub fn edit_profile(
        &self,
        token: &str,
        current_password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let account_id = Self::resolve_and_verify(&tx, token, current_password)?;

        tx.execute(
            "UPDATE accounts SET first_name = ?1, last_name = ?2 WHERE account_id = ?3",
            params![first_name, last_name, account_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, current_password, password))]
    pub fn edit_account(
        &self,
        token: &str,
        current_password: &str,
        username: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        is_admin: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let account_id = Self::resolve_and_verify(&tx, token, current_password)?;

        let current_username: String = tx.query_row(
            "SELECT username FROM accounts WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        if current_username != username {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT account_id FROM accounts WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::ExistingUsername);
            }
        }

        tx.execute(
            "UPDATE accounts SET username = ?1, password_hash = ?2, first_name = ?3, last_name = ?4, is_admin = ?5
             WHERE account_id = ?6",
            params![
                username,
                hash_password(password),
                first_name,
                last_name,
                is_admin as i64,
                account_id
            ],
        )?;
        Self::invalidate_all_sessions(&tx, account_id)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self, current_password))]
    pub fn remove_account(&self, token: &str, current_password: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let account_id = Self::resolve_and_verify(&tx, token, current_password)?;

        tx.execute(
            "UPDATE accounts
             SET username = ?1, is_disabled = 1, deleted_at = ?2
             WHERE account_id = ?3",
            params![format!("DELETED_ACCOUNT_{account_id}"), now(), account_id],
        )?;
        Self::invalidate_all_sessions(&tx, account_id)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub fn get_account(&self, token: &str) -> Result<AccountProfile, StoreError> {
        let account_id = self.resolve(token).ok_or(StoreError::InvalidSessionToken)?;
        let conn = self.conn.lock().unwrap();
        let profile = conn.query_row(
            "SELECT username, first_name, last_name, rating, wins, games_played, is_admin
             FROM accounts WHERE account_id = ?1",
            params![account_id.raw()],
            |row| {
                Ok(AccountProfile {
                    username: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    rating: row.get(3)?,
                    wins: row.get(4)?,
                    games_played: row.get(5)?,
                    is_admin: row.get::<_, i64>(6)? != 0,
                })
            },
        )?;
        Ok(profile)
    }

    #[instrument(skip(self, token))]
    pub fn new_game(
        &self,
        token: &str,
        board_size: u32,
        player_count: u32,
        is_public: bool,
        max_hint: u32,
    ) -> Result<(GameId, AccountId), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let account_id: Option<i64> = tx
            .query_row(
                "SELECT account_id FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        let account_id = account_id.ok_or(StoreError::InvalidSessionToken)?;

        tx.execute(
            "INSERT INTO games (player_count, board_size, is_public, max_hint, running, created_at, who_created)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
            params![player_count, board_size, is_public as i64, max_hint, now(), account_id],
        )?;
        let game_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO players (game_id, account_id, joined_at) VALUES (?1, ?2, ?3)",
            params![game_id, account_id, now()],
        )?;

        tx.commit()?;
        Ok((GameId::new(game_id), AccountId::new(account_id)))
    }

    #[instrument(skip(self, token))]
    pub fn join_game(
        &self,
        token: &str,
        game_id: GameId,
        creator_username: &str,
    ) -> Result<AccountId, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let account_id: Option<i64> = tx
            .query_row(
                "SELECT account_id FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        let account_id = account_id.ok_or(StoreError::InvalidSessionToken)?;

        let row: Option<(i64, String, bool)> = tx
            .query_row(
                "SELECT g.player_count, a.username, g.running
                 FROM games g JOIN accounts a ON a.account_id = g.who_created
                 WHERE g.game_id = ?1",
                params![game_id.raw()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
            )
            .optional()?;
        let (player_count, actual_creator, running) = row.ok_or(StoreError::WrongGameId)?;
        if actual_creator != creator_username {
            return Err(StoreError::WrongGameId);
        }
        if !running {
            return Err(StoreError::GameHasEnded);
        }

        let already_joined: Option<i64> = tx
            .query_row(
                "SELECT account_id FROM players WHERE game_id = ?1 AND account_id = ?2 AND left_at IS NULL",
                params![game_id.raw(), account_id],
                |row| row.get(0),
            )
            .optional()?;
        if already_joined.is_some() {
            return Ok(AccountId::new(account_id));
        }

        let current_players: i64 = tx.query_row(
            "SELECT COUNT(*) FROM players WHERE game_id = ?1 AND left_at IS NULL",
            params![game_id.raw()],
            |row| row.get(0),
        )?;
        if current_players >= player_count {
            return Err(StoreError::GameNewPlayerBanned);
        }

        tx.execute(
            "INSERT INTO players (game_id, account_id, joined_at) VALUES (?1, ?2, ?3)",
            params![game_id.raw(), account_id, now()],
        )?;

        tx.commit()?;
        Ok(AccountId::new(account_id))
    }

    #[instrument(skip(self))]
    pub fn get_game_information(&self, game_id: GameId) -> Result<GameInfo, StoreError> {
        let conn = self.conn.lock().unwrap();
        let (player_count, board_size, who_created, creator_username, max_hint, running): (
            i64,
            i64,
            i64,
            String,
            i64,
            i64,
        ) = conn
            .query_row(
                "SELECT g.player_count, g.board_size, g.who_created, a.username, g.max_hint, g.running
                 FROM games g JOIN accounts a ON a.account_id = g.who_created
                 WHERE g.game_id = ?1",
                params![game_id.raw()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?
            .ok_or(StoreError::WrongGameId)?;

        Ok(GameInfo {
            player_count: player_count as u32,
            board_size: board_size as u32,
            creator: AccountId::new(who_created),
            creator_username,
            max_hint: max_hint as u32,
            running: running != 0,
        })
    }

    #[instrument(skip(self))]
    pub fn add_game_log(
        &self,
        game_id: GameId,
        account_id: AccountId,
        letter: Letter,
        row: usize,
        column: usize,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let log_number: i64 = tx.query_row(
            "SELECT COUNT(*) FROM game_logs WHERE game_id = ?1",
            params![game_id.raw()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO game_logs (log_number, row_number, column_number, letter, game_id, account_id, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log_number + 1,
                row as i64,
                column as i64,
                letter.to_string(),
                game_id.raw(),
                account_id.raw(),
                now()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn add_game_hint(
        &self,
        game_id: GameId,
        account_id: AccountId,
        hint: Option<(usize, usize, Letter)>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let (row, column, letter) = match hint {
            Some((row, column, letter)) => (row as i64, column as i64, letter.to_string()),
            None => (0, 0, String::new()),
        };

        conn.execute(
            "INSERT INTO game_hints (row_number, column_number, letter, game_id, account_id, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![row, column, letter, game_id.raw(), account_id.raw(), now()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn update_account_games_and_wins(
        &self,
        account_id: AccountId,
        delta_games: i64,
        delta_wins: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE accounts SET games_played = games_played + ?1, wins = wins + ?2 WHERE account_id = ?3",
            params![delta_games, delta_wins, account_id.raw()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_game_ended(&self, game_id: GameId, winner: Option<AccountId>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE games SET running = 0, winner = ?1 WHERE game_id = ?2",
            params![winner.map(AccountId::raw), game_id.raw()],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get_username_from_account_id(&self, account_id: AccountId) -> Result<String, StoreError> {
        let conn = self.conn.lock().unwrap();
        let username = conn.query_row(
            "SELECT username FROM accounts WHERE account_id = ?1",
            params![account_id.raw()],
            |row| row.get(0),
        )?;
        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_and_login(store: &Store, username: &str) -> String {
        store
            .register(username, "hunter2", "First", "Last", false)
            .unwrap();
        store.authenticate(username, "hunter2").unwrap()
    }

    #[test]
    fn login_with_wrong_password_is_rejected_then_succeeds_with_right_one() {
        let store = Store::open_in_memory().unwrap();
        store
            .register("alice", "pw", "Alice", "Liddell", false)
            .unwrap();

        let err = store.authenticate("alice", "wrong").unwrap_err();
        assert!(matches!(err, StoreError::WrongUsernamePassword));

        let token = store.authenticate("alice", "pw").unwrap();
        assert!(token.len() >= 50);

        store.invalidate(&token).unwrap();
        let err = store.invalidate(&token).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSessionToken));
    }

    #[test]
    fn changing_username_invalidates_the_token_used_to_request_it() {
        let store = Store::open_in_memory().unwrap();
        let token = register_and_login(&store, "alice");

        store.change_username(&token, "hunter2", "alice2").unwrap();
        assert!(store.resolve(&token).is_none());
    }

    #[test]
    fn registering_a_duplicate_username_fails() {
        let store = Store::open_in_memory().unwrap();
        store
            .register("alice", "pw", "Alice", "Liddell", false)
            .unwrap();
        let err = store
            .register("alice", "other", "Someone", "Else", false)
            .unwrap_err();
        assert!(matches!(err, StoreError::ExistingUsername));
    }

    #[test]
    fn create_and_join_is_idempotent_and_rejects_a_full_roster() {
        let store = Store::open_in_memory().unwrap();
        let owner_token = register_and_login(&store, "alice");
        let guest_token = register_and_login(&store, "bob");
        let third_token = register_and_login(&store, "carol");

        let (game_id, _owner_account) = store.new_game(&owner_token, 3, 2, true, 1).unwrap();

        let guest_account = store.join_game(&guest_token, game_id, "alice").unwrap();
        let guest_account_again = store.join_game(&guest_token, game_id, "alice").unwrap();
        assert_eq!(guest_account, guest_account_again);

        let player_rows: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM players WHERE game_id = ?1",
                params![game_id.raw()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(player_rows, 2);

        let err = store
            .join_game(&third_token, game_id, "alice")
            .unwrap_err();
        assert!(matches!(err, StoreError::GameNewPlayerBanned));
    }

    #[test]
    fn soft_delete_rewrites_username_and_disables_the_account() {
        let store = Store::open_in_memory().unwrap();
        let token = register_and_login(&store, "alice");
        let account_id = store.resolve(&token).unwrap();

        store.remove_account(&token, "hunter2").unwrap();

        let username = store.get_username_from_account_id(account_id).unwrap();
        assert_eq!(username, format!("DELETED_ACCOUNT_{}", account_id.raw()));
        assert!(store.resolve(&token).is_none());
    }

    #[test]
    fn game_log_numbers_are_dense_starting_at_one() {
        let store = Store::open_in_memory().unwrap();
        let token = register_and_login(&store, "alice");
        let (game_id, account_id) = store.new_game(&token, 3, 1, true, 0).unwrap();

        store
            .add_game_log(game_id, account_id, Letter::S, 0, 0)
            .unwrap();
        store
            .add_game_log(game_id, account_id, Letter::O, 0, 1)
            .unwrap();

        let numbers: Vec<i64> = store
            .conn
            .lock()
            .unwrap()
            .prepare("SELECT log_number FROM game_logs WHERE game_id = ?1 ORDER BY log_number")
            .unwrap()
            .query_map(params![game_id.raw()], |row| row.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }
}
