//! Authoritative player set for one match session

use log::{debug, info, warn};
use shared::{
    FieldChange, FieldError, FieldStore, FieldValue, GamePhase, PlayerId, PlayerState, Role,
    TeamTally,
};
use std::collections::BTreeMap;

/// Exactly one entity per connection, created on accept and destroyed on
/// disconnect
#[derive(Debug, Default)]
pub struct Session {
    players: BTreeMap<PlayerId, FieldStore>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entity for a newly accepted connection
    pub fn spawn_player(&mut self, id: PlayerId, phase: GamePhase) -> PlayerState {
        let state = PlayerState::new(id, phase);
        if self
            .players
            .insert(id, FieldStore::new(Role::Authority, state.clone()))
            .is_some()
        {
            warn!("Replaced existing entity for player {}", id);
        }
        info!("Spawned entity for player {}", id);
        state
    }

    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!("Removed entity for player {}", id);
        }
        removed
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id).map(FieldStore::state)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    /// Current state of every entity, for join snapshots
    pub fn snapshot(&self) -> Vec<PlayerState> {
        self.players.values().map(|s| s.state().clone()).collect()
    }

    pub fn tally(&self) -> TeamTally {
        TeamTally::from_players(
            self.players
                .values()
                .map(|s| (s.state().team, s.state().ready)),
        )
    }

    /// Tally of everyone except `id`
    pub fn tally_excluding(&self, id: PlayerId) -> TeamTally {
        TeamTally::from_players(
            self.players
                .iter()
                .filter(|(pid, _)| **pid != id)
                .map(|(_, s)| (s.state().team, s.state().ready)),
        )
    }

    /// Authority-internal assignment, any field. Unknown entities are a no-op.
    pub fn assign(&mut self, id: PlayerId, value: FieldValue) -> Option<FieldChange> {
        self.write(id, value, FieldStore::assign)
    }

    /// Assignment on behalf of a peer's request. Fields the authority
    /// owns outright are refused.
    pub fn assign_requested(&mut self, id: PlayerId, value: FieldValue) -> Option<FieldChange> {
        self.write(id, value, FieldStore::assign_requested)
    }

    fn write<F>(&mut self, id: PlayerId, value: FieldValue, assign: F) -> Option<FieldChange>
    where
        F: FnOnce(&mut FieldStore, FieldValue) -> Result<Option<FieldChange>, FieldError>,
    {
        let store = self.players.get_mut(&id)?;
        match assign(store, value) {
            Ok(change) => {
                // Changes travel through the return value; keep the
                // store's own queue from growing.
                store.drain_changes();
                if let Some(change) = &change {
                    debug!("Player {} {:?} -> {:?}", id, change.old, change.new);
                }
                change
            }
            Err(e) => {
                warn!("Assignment on player {} rejected: {}", id, e);
                None
            }
        }
    }

    /// Assigns a value computed per entity to every entity
    pub fn assign_all<F>(&mut self, mut value_for: F) -> Vec<FieldChange>
    where
        F: FnMut(&PlayerState) -> FieldValue,
    {
        let mut changes = Vec::new();
        for id in self.ids() {
            let Some(value) = self.get(id).map(&mut value_for) else {
                continue;
            };
            changes.extend(self.assign(id, value));
        }
        changes
    }
}
