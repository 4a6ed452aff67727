//! Peer-side mirror of the replicated world
//!
//! Holds one replica [`FieldStore`] per entity and applies authority
//! broadcasts in arrival order. Field changes are turned into
//! [`PlayerEvent`]s for presentation instead of firing side effects from
//! setters.

use crate::feed::MessageFeed;
use crate::phase_vote::infer_phase;
use log::{debug, info, warn};
use shared::scene::SceneRegistry;
use shared::{
    FieldChange, FieldStore, FieldValue, GamePhase, Packet, PlayerId, PlayerState, Role, Team,
    TeamTally,
};
use std::collections::BTreeMap;

/// Observer notifications derived from replication
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Joined(PlayerId),
    Left(PlayerId),
    NameChanged { id: PlayerId, name: String },
    TeamChanged { id: PlayerId, team: Team, is_local: bool },
    ReadyChanged { id: PlayerId, ready: bool },
    AliveChanged { id: PlayerId, alive: bool },
    PhaseChanged(GamePhase),
}

/// Packets that the local player or session loop has to act on
#[derive(Debug, Clone, PartialEq)]
pub enum WorldSignal {
    Welcome { id: PlayerId, level: String },
    /// The local entity arrived; perform the initial spawn
    LocalSpawned,
    LoadLevel(String),
    /// The local entity's health reached zero because of another peer
    LocalEliminated { by: PlayerId },
    /// The authority is gone; stop participating
    Disconnected(String),
}

pub struct ClientWorld {
    local_id: Option<PlayerId>,
    players: BTreeMap<PlayerId, FieldStore>,
    canonical_phase: Option<GamePhase>,
    local_team: Team,
    level: Option<String>,
    feed: MessageFeed,
    scene: SceneRegistry,
    events: Vec<PlayerEvent>,
}

impl ClientWorld {
    pub fn new(feed_capacity: usize, scene: SceneRegistry) -> Self {
        Self {
            local_id: None,
            players: BTreeMap::new(),
            canonical_phase: None,
            local_team: Team::None,
            level: None,
            feed: MessageFeed::new(feed_capacity),
            scene,
            events: Vec::new(),
        }
    }

    pub fn apply_packet(&mut self, packet: Packet) -> Option<WorldSignal> {
        match packet {
            Packet::Connected {
                client_id,
                phase,
                level,
            } => {
                info!("Connected as player {} in {} ({})", client_id, level, phase);
                self.reset();
                self.local_id = Some(client_id);
                self.canonical_phase = Some(phase);
                self.level = Some(level.clone());
                Some(WorldSignal::Welcome {
                    id: client_id,
                    level,
                })
            }

            Packet::PlayerSpawned { state } => self.spawn(state),

            Packet::PlayerDespawned { id } => {
                if self.players.remove(&id).is_some() {
                    debug!("Player {} left", id);
                    self.events.push(PlayerEvent::Left(id));
                }
                None
            }

            Packet::FieldChanged { change, origin } => self.apply_change(&change, origin),

            Packet::PhaseChanged { phase } => {
                info!("Phase changed to {}", phase);
                self.canonical_phase = Some(phase);
                self.events.push(PlayerEvent::PhaseChanged(phase));
                None
            }

            Packet::LoadLevel { level } => {
                info!("Loading level {}", level);
                self.level = Some(level.clone());
                Some(WorldSignal::LoadLevel(level))
            }

            Packet::Message {
                text,
                display_time,
                timestamp,
            } => {
                self.feed.push(text, display_time, timestamp);
                None
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.reset();
                Some(WorldSignal::Disconnected(reason))
            }

            _ => {
                warn!("Unexpected packet type from server");
                None
            }
        }
    }

    fn spawn(&mut self, state: PlayerState) -> Option<WorldSignal> {
        let id = state.id;
        let is_local = self.local_id == Some(id);
        if is_local {
            self.local_team = state.team;
        }
        self.players
            .insert(id, FieldStore::new(Role::Replica, state));
        self.events.push(PlayerEvent::Joined(id));

        is_local.then_some(WorldSignal::LocalSpawned)
    }

    fn apply_change(
        &mut self,
        change: &FieldChange,
        origin: Option<PlayerId>,
    ) -> Option<WorldSignal> {
        let Some(store) = self.players.get_mut(&change.entity) else {
            debug!("Change for unknown entity {}", change.entity);
            return None;
        };

        let applied = match store.apply_replicated(change) {
            Ok(Some(applied)) => applied,
            Ok(None) => return None,
            Err(e) => {
                warn!("Rejected replicated change: {}", e);
                return None;
            }
        };

        let id = applied.entity;
        let is_local = self.local_id == Some(id);
        match (&applied.old, &applied.new) {
            (_, FieldValue::Name(name)) => self.events.push(PlayerEvent::NameChanged {
                id,
                name: name.clone(),
            }),
            (_, FieldValue::Team(team)) => {
                if is_local {
                    self.local_team = *team;
                }
                self.events.push(PlayerEvent::TeamChanged {
                    id,
                    team: *team,
                    is_local,
                });
            }
            (_, FieldValue::Ready(ready)) => {
                self.events.push(PlayerEvent::ReadyChanged { id, ready: *ready })
            }
            (FieldValue::Health(old), FieldValue::Health(new)) => {
                let (was_alive, alive) = (*old > 0, *new > 0);
                if was_alive != alive {
                    self.events.push(PlayerEvent::AliveChanged { id, alive });
                }
                if is_local && was_alive && !alive {
                    if let Some(by) = origin.filter(|by| Some(*by) != self.local_id) {
                        return Some(WorldSignal::LocalEliminated { by });
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn reset(&mut self) {
        self.local_id = None;
        self.players.clear();
        self.canonical_phase = None;
        self.local_team = Team::None;
        self.level = None;
        self.feed.clear();
    }

    /// Advances message display timers
    pub fn tick(&mut self, dt: f32) {
        self.feed.tick(dt);
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn is_connected(&self) -> bool {
        self.local_id.is_some()
    }

    pub fn local_state(&self) -> Option<&PlayerState> {
        self.local_id
            .and_then(|id| self.players.get(&id))
            .map(|store| store.state())
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id).map(|store| store.state())
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values().map(|store| store.state())
    }

    /// Cached team of the local entity
    pub fn local_team(&self) -> Team {
        self.local_team
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    /// Phase pushed by the authority, or the majority of mirrored entity
    /// phases when none has arrived
    pub fn phase(&self) -> GamePhase {
        self.canonical_phase
            .unwrap_or_else(|| self.inferred_phase())
    }

    pub fn inferred_phase(&self) -> GamePhase {
        infer_phase(self.players().map(|p| p.local_phase))
    }

    pub fn tally(&self) -> TeamTally {
        TeamTally::from_players(self.players().map(|p| (p.team, p.ready)))
    }

    pub fn phase_label(&self) -> String {
        match self.phase() {
            GamePhase::Lobby => {
                let tally = self.tally();
                format!(
                    "Lobby: {} ready of {} (Red {} / Blue {})",
                    tally.ready, tally.total, tally.red, tally.blue
                )
            }
            GamePhase::Starting => "Match starting".to_string(),
            GamePhase::Playing => "Match in progress".to_string(),
            GamePhase::Ending => "Match over".to_string(),
        }
    }

    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    pub fn scene(&self) -> &SceneRegistry {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneRegistry {
        &mut self.scene
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MAX_HEALTH;

    fn connected(local: PlayerId) -> ClientWorld {
        let mut world = ClientWorld::new(4, SceneRegistry::default());
        world.apply_packet(Packet::Connected {
            client_id: local,
            phase: GamePhase::Lobby,
            level: "lobby".into(),
        });
        world
    }

    fn spawned(id: PlayerId) -> Packet {
        Packet::PlayerSpawned {
            state: PlayerState::new(id, GamePhase::Lobby),
        }
    }

    fn change(entity: PlayerId, old: FieldValue, new: FieldValue, origin: Option<PlayerId>) -> Packet {
        Packet::FieldChanged {
            change: FieldChange { entity, old, new },
            origin,
        }
    }

    #[test]
    fn test_own_spawn_signals_local_spawn() {
        let mut world = connected(2);
        assert_eq!(world.apply_packet(spawned(1)), None);
        assert_eq!(world.apply_packet(spawned(2)), Some(WorldSignal::LocalSpawned));
        assert_eq!(
            world.drain_events(),
            vec![PlayerEvent::Joined(1), PlayerEvent::Joined(2)]
        );
        assert_eq!(world.local_state().map(|s| s.id), Some(2));
    }

    #[test]
    fn test_remote_transform_stream_does_not_accumulate() {
        let mut world = connected(1);
        world.apply_packet(spawned(1));
        world.apply_packet(spawned(2));
        world.drain_events();

        for i in 0..10_000 {
            world.apply_packet(change(
                2,
                FieldValue::Yaw(0.0),
                FieldValue::Yaw(i as f32 + 1.0),
                Some(2),
            ));
        }

        assert_eq!(world.player(2).map(|s| s.yaw), Some(10_000.0));
        let store = world.players.get_mut(&2).unwrap();
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn test_team_change_updates_local_cache() {
        let mut world = connected(1);
        world.apply_packet(spawned(1));
        world.apply_packet(spawned(2));
        world.drain_events();

        world.apply_packet(change(2, FieldValue::Team(Team::None), FieldValue::Team(Team::Blue), Some(2)));
        assert_eq!(world.local_team(), Team::None);
        world.apply_packet(change(1, FieldValue::Team(Team::None), FieldValue::Team(Team::Red), Some(1)));
        assert_eq!(world.local_team(), Team::Red);

        assert_eq!(
            world.drain_events(),
            vec![
                PlayerEvent::TeamChanged {
                    id: 2,
                    team: Team::Blue,
                    is_local: false
                },
                PlayerEvent::TeamChanged {
                    id: 1,
                    team: Team::Red,
                    is_local: true
                },
            ]
        );
    }

    #[test]
    fn test_elimination_by_other_peer() {
        let mut world = connected(1);
        world.apply_packet(spawned(1));

        let signal = world.apply_packet(change(
            1,
            FieldValue::Health(MAX_HEALTH),
            FieldValue::Health(0),
            Some(3),
        ));
        assert_eq!(signal, Some(WorldSignal::LocalEliminated { by: 3 }));
        assert!(world
            .drain_events()
            .contains(&PlayerEvent::AliveChanged { id: 1, alive: false }));
    }

    #[test]
    fn test_self_inflicted_health_zero_is_not_elimination() {
        let mut world = connected(1);
        world.apply_packet(spawned(1));
        let signal = world.apply_packet(change(
            1,
            FieldValue::Health(MAX_HEALTH),
            FieldValue::Health(0),
            Some(1),
        ));
        assert_eq!(signal, None);
    }

    #[test]
    fn test_phase_prefers_canonical_then_vote() {
        let mut world = ClientWorld::new(4, SceneRegistry::default());
        let mut state = PlayerState::new(5, GamePhase::Playing);
        state.local_phase = GamePhase::Playing;
        world.apply_packet(Packet::PlayerSpawned { state });
        assert_eq!(world.phase(), GamePhase::Playing);

        world.apply_packet(Packet::PhaseChanged {
            phase: GamePhase::Ending,
        });
        assert_eq!(world.phase(), GamePhase::Ending);
        assert_eq!(world.phase_label(), "Match over");
    }

    #[test]
    fn test_tally_and_lobby_label() {
        let mut world = connected(1);
        world.apply_packet(spawned(1));
        world.apply_packet(spawned(2));
        world.apply_packet(change(1, FieldValue::Team(Team::None), FieldValue::Team(Team::Red), Some(1)));
        world.apply_packet(change(1, FieldValue::Ready(false), FieldValue::Ready(true), Some(1)));

        let tally = world.tally();
        assert_eq!((tally.red, tally.blue, tally.ready, tally.total), (1, 0, 1, 2));
        assert_eq!(world.phase_label(), "Lobby: 1 ready of 2 (Red 1 / Blue 0)");
    }

    #[test]
    fn test_messages_feed_and_disconnect() {
        let mut world = connected(1);
        world.apply_packet(Packet::Message {
            text: "hi".into(),
            display_time: 1.0,
            timestamp: 0,
        });
        assert_eq!(world.feed().visible()[0].text, "hi");

        world.tick(1.0);
        assert!(world.feed().is_empty());

        let signal = world.apply_packet(Packet::Disconnected {
            reason: "bye".into(),
        });
        assert_eq!(signal, Some(WorldSignal::Disconnected("bye".into())));
        assert!(!world.is_connected());
    }

    #[test]
    fn test_despawn_removes_player() {
        let mut world = connected(1);
        world.apply_packet(spawned(2));
        world.drain_events();
        world.apply_packet(Packet::PlayerDespawned { id: 2 });
        assert!(world.player(2).is_none());
        assert_eq!(world.drain_events(), vec![PlayerEvent::Left(2)]);
    }
}
