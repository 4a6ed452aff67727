//! Protocol and replicated-state types shared by the authority and its peers

pub mod codec;
pub mod field;
pub mod request;
pub mod scene;
pub mod types;

use serde::{Deserialize, Serialize};

pub use field::{FieldChange, FieldError, FieldStore, FieldValue, PlayerField, PlayerState, Role};
pub use request::AuthorityRequest;
pub use types::{GamePhase, PlayerId, Team, TeamTally, Transform, Vec3};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_HEALTH: i32 = 100;
pub const DEFAULT_PLAYER_NAME: &str = "Player";
/// Seconds a relayed message stays in the feed
pub const MESSAGE_DISPLAY_TIME: f32 = 5.0;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Peer -> authority
    Connect {
        client_version: u32,
    },
    Request {
        target: PlayerId,
        request: AuthorityRequest,
    },
    Heartbeat,
    Disconnect,

    // Authority -> peers
    Connected {
        client_id: PlayerId,
        phase: GamePhase,
        level: String,
    },
    PlayerSpawned {
        state: PlayerState,
    },
    PlayerDespawned {
        id: PlayerId,
    },
    FieldChanged {
        change: FieldChange,
        /// Connection whose request caused the change, if any
        origin: Option<PlayerId>,
    },
    PhaseChanged {
        phase: GamePhase,
    },
    LoadLevel {
        level: String,
    },
    Message {
        text: String,
        display_time: f32,
        /// Authority wall clock in milliseconds
        timestamp: u64,
    },
    Disconnected {
        reason: String,
    },
}
