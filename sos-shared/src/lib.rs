//! Wire types shared between the SOS game server and anything that speaks its
//! protocol. Carries no I/O of its own — framing, sockets, and persistence all
//! live in `sos-server`.

pub mod ids;
pub mod letter;
pub mod messages;
pub mod packet;

pub use ids::{AccountId, GameId};
pub use letter::Letter;
pub use packet::Packet;
