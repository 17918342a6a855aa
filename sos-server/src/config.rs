//! Listening address and storage path, the only configuration surface.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sos-server", about = "Multiplayer SOS game server")]
pub struct Config {
    #[arg(long, env = "SOS_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "SOS_PORT", default_value_t = 12345)]
    pub port: u16,

    #[arg(long, env = "SOS_DB_PATH", default_value = "./sos.sqlite3")]
    pub db_path: PathBuf,
}
