//! Shared map of live game ids to their runner's proxy (spec §4.5/§4.6: C5
//! looks a game up or creates it; C6 deregisters itself when it exits).

use super::runner::{spawn_idle_ticker, GameRunner, GameRunnerProxy};
use crate::persistence::{GameInfo, Store};
use dashmap::DashMap;
use sos_shared::GameId;
use std::sync::Arc;
use thespian::Actor;
use tracing::info;

#[derive(Default)]
pub struct GameRegistry {
    runners: DashMap<GameId, GameRunnerProxy>,
}

impl GameRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Looks up the runner for `game_id`, spawning a fresh one seeded from
    /// `info` the first time this id is seen. Refuses to fabricate a runner
    /// for a game persistence already marked as not running — a finished or
    /// idle-reclaimed game must stay unroutable under its old id, even if a
    /// stale roster entry tries to rejoin it.
    pub fn get_or_create(
        self: &Arc<Self>,
        game_id: GameId,
        info: &GameInfo,
        store: Arc<Store>,
    ) -> Option<GameRunnerProxy> {
        if let Some(existing) = self.runners.get(&game_id) {
            return Some(existing.clone());
        }
        if !info.running {
            return None;
        }

        Some(
            self.runners
                .entry(game_id)
                .or_insert_with(|| {
                    info!(%game_id, "spawning game runner");
                    let stage = GameRunner::new(game_id, info, store, self.clone()).into_stage();
                    let proxy = stage.proxy();
                    tokio::spawn(stage.run());
                    spawn_idle_ticker(proxy.clone());
                    proxy
                })
                .clone(),
        )
    }

    /// Removes `game_id` from the registry. Called by a runner as it exits
    /// (winner announced, or idle reclamation) so a later lookup of the same
    /// id spawns a brand new runner rather than resurrecting the old one.
    pub fn deregister(&self, game_id: GameId) {
        self.runners.remove(&game_id);
    }
}
