//! Named operations a peer may ask the authority to perform

use crate::types::{Team, Vec3};
use serde::{Deserialize, Serialize};

/// One-way request from a peer to the authority.
///
/// The requester never mutates its own copy; the effect arrives later as a
/// broadcast field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthorityRequest {
    SetName(String),
    SetTeam(Team),
    SetReady(bool),
    SetHealth(i32),
    SetRespawning(bool),
    /// Fire-and-forget chat/UI line, re-broadcast but never stored
    RelayMessage(String),
    /// Vertical look angle for rendering on remote observers
    UpdateLookRotation(f32),
    /// Position and yaw of the locally simulated instance
    UpdateTransform { position: Vec3, yaw: f32 },
}

impl AuthorityRequest {
    /// Whether only the owning connection may target an entity with this
    /// request. Health and respawn state are open so other players can
    /// deal damage.
    pub fn requires_ownership(&self) -> bool {
        !matches!(
            self,
            AuthorityRequest::SetHealth(_)
                | AuthorityRequest::SetRespawning(_)
                | AuthorityRequest::RelayMessage(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthorityRequest::SetName(_) => "SetName",
            AuthorityRequest::SetTeam(_) => "SetTeam",
            AuthorityRequest::SetReady(_) => "SetReady",
            AuthorityRequest::SetHealth(_) => "SetHealth",
            AuthorityRequest::SetRespawning(_) => "SetRespawning",
            AuthorityRequest::RelayMessage(_) => "RelayMessage",
            AuthorityRequest::UpdateLookRotation(_) => "UpdateLookRotation",
            AuthorityRequest::UpdateTransform { .. } => "UpdateTransform",
        }
    }
}
