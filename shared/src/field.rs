//! Replicated per-entity field store
//!
//! Every player entity carries a fixed set of replicated fields. Each field
//! declares who may write it:
//! - [`WritePolicy::AuthorityOnly`]: only the authoritative process assigns it
//! - [`WritePolicy::RequestToAuthority`]: any peer may *ask* the authority to
//!   assign it, but never mutates it locally
//!
//! Reads are always local. A successful mutation produces a [`FieldChange`]
//! carrying the old and new value; the authority broadcasts it and every
//! peer (the authority included) hands it to its observers.

use crate::types::{GamePhase, PlayerId, Team, Vec3};
use crate::{DEFAULT_PLAYER_NAME, MAX_HEALTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who may assign a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    AuthorityOnly,
    RequestToAuthority,
}

/// Which side of the replication link a store lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Replica,
}

/// Field keys of a player entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerField {
    Name,
    Team,
    Ready,
    Health,
    Respawning,
    CanMove,
    LocalPhase,
    ViewPitch,
    Yaw,
    Position,
}

impl PlayerField {
    pub fn policy(self) -> WritePolicy {
        match self {
            PlayerField::CanMove | PlayerField::LocalPhase => WritePolicy::AuthorityOnly,
            _ => WritePolicy::RequestToAuthority,
        }
    }
}

/// A typed value for one replicated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Name(String),
    Team(Team),
    Ready(bool),
    Health(i32),
    Respawning(bool),
    CanMove(bool),
    LocalPhase(GamePhase),
    ViewPitch(f32),
    Yaw(f32),
    Position(Vec3),
}

impl FieldValue {
    pub fn field(&self) -> PlayerField {
        match self {
            FieldValue::Name(_) => PlayerField::Name,
            FieldValue::Team(_) => PlayerField::Team,
            FieldValue::Ready(_) => PlayerField::Ready,
            FieldValue::Health(_) => PlayerField::Health,
            FieldValue::Respawning(_) => PlayerField::Respawning,
            FieldValue::CanMove(_) => PlayerField::CanMove,
            FieldValue::LocalPhase(_) => PlayerField::LocalPhase,
            FieldValue::ViewPitch(_) => PlayerField::ViewPitch,
            FieldValue::Yaw(_) => PlayerField::Yaw,
            FieldValue::Position(_) => PlayerField::Position,
        }
    }
}

/// Change notification emitted after a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub entity: PlayerId,
    pub old: FieldValue,
    pub new: FieldValue,
}

impl FieldChange {
    pub fn field(&self) -> PlayerField {
        self.new.field()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("field {0:?} can only be assigned by the authority")]
    NotAuthority(PlayerField),
    #[error("field {0:?} is not assignable on request")]
    NotRequestable(PlayerField),
    #[error("change for entity {got} applied to entity {expected}")]
    EntityMismatch { expected: PlayerId, got: PlayerId },
    #[error("replicated change for {0:?} applied on the authority")]
    EchoOnAuthority(PlayerField),
}

/// Full replicated state of one player entity.
///
/// Sent whole when an entity spawns or a peer joins; afterwards only
/// individual [`FieldChange`]s travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub ready: bool,
    pub health: i32,
    pub respawning: bool,
    pub can_move: bool,
    pub local_phase: GamePhase,
    pub view_pitch: f32,
    pub yaw: f32,
    pub position: Vec3,
}

impl PlayerState {
    pub fn new(id: PlayerId, phase: GamePhase) -> Self {
        Self {
            id,
            name: DEFAULT_PLAYER_NAME.to_string(),
            team: Team::None,
            ready: false,
            health: MAX_HEALTH,
            respawning: false,
            can_move: phase == GamePhase::Playing,
            local_phase: phase,
            view_pitch: 0.0,
            yaw: 0.0,
            position: Vec3::ZERO,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn get(&self, field: PlayerField) -> FieldValue {
        match field {
            PlayerField::Name => FieldValue::Name(self.name.clone()),
            PlayerField::Team => FieldValue::Team(self.team),
            PlayerField::Ready => FieldValue::Ready(self.ready),
            PlayerField::Health => FieldValue::Health(self.health),
            PlayerField::Respawning => FieldValue::Respawning(self.respawning),
            PlayerField::CanMove => FieldValue::CanMove(self.can_move),
            PlayerField::LocalPhase => FieldValue::LocalPhase(self.local_phase),
            PlayerField::ViewPitch => FieldValue::ViewPitch(self.view_pitch),
            PlayerField::Yaw => FieldValue::Yaw(self.yaw),
            PlayerField::Position => FieldValue::Position(self.position),
        }
    }

    /// Writes a value and returns the one it replaced
    fn set(&mut self, value: FieldValue) -> FieldValue {
        let old = self.get(value.field());
        match value {
            FieldValue::Name(v) => self.name = v,
            FieldValue::Team(v) => self.team = v,
            FieldValue::Ready(v) => self.ready = v,
            FieldValue::Health(v) => self.health = v,
            FieldValue::Respawning(v) => self.respawning = v,
            FieldValue::CanMove(v) => self.can_move = v,
            FieldValue::LocalPhase(v) => self.local_phase = v,
            FieldValue::ViewPitch(v) => self.view_pitch = v,
            FieldValue::Yaw(v) => self.yaw = v,
            FieldValue::Position(v) => self.position = v,
        }
        old
    }
}

/// Replicated fields of one entity on one process
#[derive(Debug, Clone)]
pub struct FieldStore {
    role: Role,
    state: PlayerState,
    changes: Vec<FieldChange>,
}

impl FieldStore {
    pub fn new(role: Role, state: PlayerState) -> Self {
        Self {
            role,
            state,
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.state.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// Authority write path, open to every field.
    ///
    /// Visible locally at once; the returned change is what gets
    /// broadcast and is also queued for [`drain_changes`](Self::drain_changes).
    /// Assigning the current value is not a mutation and yields `Ok(None)`.
    pub fn assign(&mut self, value: FieldValue) -> Result<Option<FieldChange>, FieldError> {
        if self.role != Role::Authority {
            return Err(FieldError::NotAuthority(value.field()));
        }
        let change = self.write(value);
        if let Some(change) = &change {
            self.changes.push(change.clone());
        }
        Ok(change)
    }

    /// Authority write path for values that arrived as a peer's request.
    /// Only [`WritePolicy::RequestToAuthority`] fields are accepted.
    pub fn assign_requested(
        &mut self,
        value: FieldValue,
    ) -> Result<Option<FieldChange>, FieldError> {
        let field = value.field();
        if field.policy() != WritePolicy::RequestToAuthority {
            return Err(FieldError::NotRequestable(field));
        }
        self.assign(value)
    }

    /// Replica receive path for a broadcast echo.
    ///
    /// The applied change is returned to the caller, which dispatches it
    /// to observers; nothing is queued on the replica.
    pub fn apply_replicated(
        &mut self,
        change: &FieldChange,
    ) -> Result<Option<FieldChange>, FieldError> {
        if self.role != Role::Replica {
            return Err(FieldError::EchoOnAuthority(change.field()));
        }
        if change.entity != self.state.id {
            return Err(FieldError::EntityMismatch {
                expected: self.state.id,
                got: change.entity,
            });
        }
        Ok(self.write(change.new.clone()))
    }

    fn write(&mut self, value: FieldValue) -> Option<FieldChange> {
        if self.state.get(value.field()) == value {
            return None;
        }
        let old = self.state.set(value.clone());
        let change = FieldChange {
            entity: self.state.id,
            old,
            new: value,
        };
        Some(change)
    }

    /// Takes the change notifications queued by [`assign`](Self::assign)
    pub fn drain_changes(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert_eq!(PlayerField::CanMove.policy(), WritePolicy::AuthorityOnly);
        assert_eq!(PlayerField::LocalPhase.policy(), WritePolicy::AuthorityOnly);
        assert_eq!(PlayerField::Name.policy(), WritePolicy::RequestToAuthority);
        assert_eq!(PlayerField::Health.policy(), WritePolicy::RequestToAuthority);
    }

    #[test]
    fn test_authority_assign_is_visible_and_notifies() {
        let mut store = FieldStore::new(Role::Authority, PlayerState::new(7, GamePhase::Lobby));

        let change = store.assign(FieldValue::Team(Team::Blue)).unwrap().unwrap();
        assert_eq!(store.state().team, Team::Blue);
        assert_eq!(change.entity, 7);
        assert_eq!(change.old, FieldValue::Team(Team::None));
        assert_eq!(change.new, FieldValue::Team(Team::Blue));

        let drained = store.drain_changes();
        assert_eq!(drained, vec![change]);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn test_assign_same_value_is_not_a_change() {
        let mut store = FieldStore::new(Role::Authority, PlayerState::new(1, GamePhase::Lobby));
        assert_eq!(store.assign(FieldValue::Ready(false)).unwrap(), None);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn test_replica_cannot_assign() {
        let mut store = FieldStore::new(Role::Replica, PlayerState::new(1, GamePhase::Lobby));
        let err = store.assign(FieldValue::Ready(true)).unwrap_err();
        assert_eq!(err, FieldError::NotAuthority(PlayerField::Ready));
        assert!(!store.state().ready);
    }

    #[test]
    fn test_replica_applies_echo_with_local_old_value() {
        let mut store = FieldStore::new(Role::Replica, PlayerState::new(3, GamePhase::Lobby));
        let echo = FieldChange {
            entity: 3,
            old: FieldValue::Health(100),
            new: FieldValue::Health(40),
        };
        let applied = store.apply_replicated(&echo).unwrap().unwrap();
        assert_eq!(store.state().health, 40);
        assert_eq!(applied.old, FieldValue::Health(MAX_HEALTH));
    }

    #[test]
    fn test_replica_echoes_are_not_queued() {
        let mut store = FieldStore::new(Role::Replica, PlayerState::new(2, GamePhase::Playing));
        for i in 0..1000 {
            let echo = FieldChange {
                entity: 2,
                old: FieldValue::Yaw(0.0),
                new: FieldValue::Yaw(i as f32 + 1.0),
            };
            assert!(store.apply_replicated(&echo).unwrap().is_some());
        }
        assert_eq!(store.state().yaw, 1000.0);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn test_requested_assign_honours_write_policy() {
        let mut store = FieldStore::new(Role::Authority, PlayerState::new(1, GamePhase::Lobby));

        assert_eq!(
            store.assign_requested(FieldValue::CanMove(true)),
            Err(FieldError::NotRequestable(PlayerField::CanMove))
        );
        assert_eq!(
            store.assign_requested(FieldValue::LocalPhase(GamePhase::Playing)),
            Err(FieldError::NotRequestable(PlayerField::LocalPhase))
        );
        assert!(!store.state().can_move);
        assert!(store.drain_changes().is_empty());

        assert!(store.assign_requested(FieldValue::Ready(true)).unwrap().is_some());
        assert!(store.assign(FieldValue::CanMove(true)).unwrap().is_some());
        assert_eq!(store.drain_changes().len(), 2);
    }

    #[test]
    fn test_replica_rejects_foreign_entity() {
        let mut store = FieldStore::new(Role::Replica, PlayerState::new(3, GamePhase::Lobby));
        let echo = FieldChange {
            entity: 4,
            old: FieldValue::Ready(false),
            new: FieldValue::Ready(true),
        };
        assert_eq!(
            store.apply_replicated(&echo),
            Err(FieldError::EntityMismatch {
                expected: 3,
                got: 4
            })
        );
    }

    #[test]
    fn test_new_state_defaults() {
        let state = PlayerState::new(9, GamePhase::Playing);
        assert_eq!(state.name, DEFAULT_PLAYER_NAME);
        assert_eq!(state.health, MAX_HEALTH);
        assert!(state.can_move);
        assert!(state.is_alive());

        let lobby = PlayerState::new(9, GamePhase::Lobby);
        assert!(!lobby.can_move);
    }
}
