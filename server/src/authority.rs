//! Rules the authority applies to incoming requests
//!
//! Malformed input is corrected rather than rejected: names are sanitized
//! and defaulted, health is clamped, unassigned teams are balanced. The
//! only rejections are ownership violations, unknown targets and fields the
//! authority owns outright, all dropped with a warning.

use crate::roster::QueuedRequest;
use crate::session::Session;
use log::warn;
use shared::{
    AuthorityRequest, FieldChange, FieldValue, Team, TeamTally, DEFAULT_PLAYER_NAME, MAX_HEALTH,
};

/// Result of applying one request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Field changes to broadcast
    Changed(Vec<FieldChange>),
    /// Text to re-broadcast as a UI message
    Relay(String),
    /// Nothing to send
    Dropped,
}

/// Trims and removes every whitespace character; empty results become the
/// default name
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        cleaned
    }
}

/// Resolves a team request. `Team::None` means "put me where I'm needed":
/// the side with fewer members, Red on ties.
pub fn balance_team(requested: Team, others: &TeamTally) -> Team {
    match requested {
        Team::None => {
            if others.red <= others.blue {
                Team::Red
            } else {
                Team::Blue
            }
        }
        team => team,
    }
}

pub fn clamp_health(value: i32) -> i32 {
    value.clamp(0, MAX_HEALTH)
}

/// Applies a queued request to the session
pub fn apply_request(session: &mut Session, queued: &QueuedRequest) -> RequestOutcome {
    let QueuedRequest {
        origin,
        target,
        request,
    } = queued;

    // Relayed verbatim and never stored
    if let AuthorityRequest::RelayMessage(text) = request {
        return RequestOutcome::Relay(text.clone());
    }

    if !session.contains(*target) {
        warn!(
            "{} from player {} targets unknown entity {}",
            request.name(),
            origin,
            target
        );
        return RequestOutcome::Dropped;
    }

    if request.requires_ownership() && origin != target {
        warn!(
            "Player {} may not {} on entity {}",
            origin,
            request.name(),
            target
        );
        return RequestOutcome::Dropped;
    }

    let values = match request {
        AuthorityRequest::SetName(name) => vec![FieldValue::Name(sanitize_name(name))],
        AuthorityRequest::SetTeam(team) => {
            let others = session.tally_excluding(*target);
            vec![FieldValue::Team(balance_team(*team, &others))]
        }
        AuthorityRequest::SetReady(ready) => vec![FieldValue::Ready(*ready)],
        AuthorityRequest::SetHealth(health) => vec![FieldValue::Health(clamp_health(*health))],
        AuthorityRequest::SetRespawning(flag) => vec![FieldValue::Respawning(*flag)],
        AuthorityRequest::UpdateLookRotation(pitch) => vec![FieldValue::ViewPitch(*pitch)],
        AuthorityRequest::UpdateTransform { position, yaw } => {
            vec![FieldValue::Position(*position), FieldValue::Yaw(*yaw)]
        }
        AuthorityRequest::RelayMessage(_) => return RequestOutcome::Dropped,
    };

    let changes: Vec<FieldChange> = values
        .into_iter()
        .filter_map(|value| session.assign_requested(*target, value))
        .collect();

    if changes.is_empty() {
        RequestOutcome::Dropped
    } else {
        RequestOutcome::Changed(changes)
    }
}
