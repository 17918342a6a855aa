//! SQLite schema, ported from `database_manager.py`'s `SQLITE_SCHEMA` with the
//! `game_hints` and `actions` tables the fuller original also carries (spec
//! §3). Timestamps are Unix seconds (`INTEGER`) rather than the original's
//! formatted-string datetimes — equivalent information, simpler comparisons.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    account_id      INTEGER PRIMARY KEY,
    username        TEXT UNIQUE NOT NULL,
    password_hash   TEXT NOT NULL,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    rating          INTEGER NOT NULL DEFAULT 0 CHECK (rating >= 0),
    wins            INTEGER NOT NULL DEFAULT 0 CHECK (wins >= 0),
    games_played    INTEGER NOT NULL DEFAULT 0 CHECK (games_played >= 0),
    created_at      INTEGER NOT NULL,
    deleted_at      INTEGER,
    last_login      INTEGER,
    is_admin        INTEGER NOT NULL DEFAULT 0 CHECK (is_admin IN (0, 1)),
    is_disabled     INTEGER NOT NULL DEFAULT 0 CHECK (is_disabled IN (0, 1))
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id      INTEGER PRIMARY KEY,
    token           TEXT UNIQUE NOT NULL,
    created_at      INTEGER NOT NULL,
    account_id      INTEGER NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts (account_id)
);

CREATE TABLE IF NOT EXISTS games (
    game_id         INTEGER PRIMARY KEY,
    winner          INTEGER,
    player_count    INTEGER NOT NULL CHECK (player_count > 0),
    board_size      INTEGER NOT NULL CHECK (board_size > 0),
    is_public       INTEGER NOT NULL CHECK (is_public IN (0, 1)),
    max_hint        INTEGER NOT NULL DEFAULT 0 CHECK (max_hint >= 0),
    running         INTEGER NOT NULL DEFAULT 1 CHECK (running IN (0, 1)),
    created_at      INTEGER NOT NULL,
    who_created     INTEGER NOT NULL,
    FOREIGN KEY (winner) REFERENCES accounts (account_id),
    FOREIGN KEY (who_created) REFERENCES accounts (account_id)
);

CREATE TABLE IF NOT EXISTS players (
    player_id       INTEGER PRIMARY KEY,
    game_id         INTEGER NOT NULL,
    account_id      INTEGER NOT NULL,
    joined_at       INTEGER NOT NULL,
    left_at         INTEGER,
    FOREIGN KEY (game_id) REFERENCES games (game_id),
    FOREIGN KEY (account_id) REFERENCES accounts (account_id)
);

CREATE TABLE IF NOT EXISTS game_logs (
    gamelog_id      INTEGER PRIMARY KEY,
    log_number      INTEGER NOT NULL CHECK (log_number > 0),
    row_number      INTEGER NOT NULL CHECK (row_number >= 0),
    column_number   INTEGER NOT NULL CHECK (column_number >= 0),
    letter          TEXT NOT NULL CHECK (letter IN ('S', 'O')),
    game_id         INTEGER NOT NULL,
    account_id      INTEGER NOT NULL,
    logged_at       INTEGER NOT NULL,
    FOREIGN KEY (game_id) REFERENCES games (game_id),
    FOREIGN KEY (account_id) REFERENCES accounts (account_id)
);

CREATE TABLE IF NOT EXISTS game_hints (
    gamehint_id     INTEGER PRIMARY KEY,
    row_number      INTEGER NOT NULL CHECK (row_number >= 0),
    column_number   INTEGER NOT NULL CHECK (column_number >= 0),
    letter          TEXT NOT NULL CHECK (letter IN ('S', 'O', '')),
    game_id         INTEGER NOT NULL,
    account_id      INTEGER NOT NULL,
    logged_at       INTEGER NOT NULL,
    FOREIGN KEY (game_id) REFERENCES games (game_id),
    FOREIGN KEY (account_id) REFERENCES accounts (account_id)
);

CREATE TABLE IF NOT EXISTS actions (
    action_id       INTEGER PRIMARY KEY,
    who             INTEGER,
    logged_at       INTEGER NOT NULL,
    report          TEXT NOT NULL,
    FOREIGN KEY (who) REFERENCES accounts (account_id)
);
";
