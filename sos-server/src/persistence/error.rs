use thiserror::Error;

/// Every way a [`super::Store`] call can fail, expressed as an explicit sum
/// rather than by returning an exception object through the normal return
/// path (spec §9: "model this as an explicit sum... rather than piggy-backing
/// on a shared base type"). The dispatcher only ever shows a caller
/// `Display`'s output; it never forwards a discriminant.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("This username exists already.")]
    ExistingUsername,

    #[error("Username or password is wrong.")]
    WrongUsernamePassword,

    #[error("Current password is incorrect.")]
    WrongPassword,

    #[error("Session token is not valid.")]
    InvalidSessionToken,

    #[error("New password must be different from the current password.")]
    RepeatedPassword,

    #[error("Game ID or username is not valid.")]
    WrongGameId,

    #[error("This game already has the maximum number of players.")]
    GameNewPlayerBanned,

    #[error("This game has already ended.")]
    GameHasEnded,

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
