//! Core value types shared between the authority and its peers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection-scoped handle for a player entity.
///
/// Assigned by the authority on connection-accept and stable for the
/// lifetime of that connection.
pub type PlayerId = u32;

/// Team affiliation of a player entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    #[default]
    None,
    Red,
    Blue,
}

impl Team {
    /// Returns true for the two playable sides
    pub fn is_playable(self) -> bool {
        matches!(self, Team::Red | Team::Blue)
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Team::None => "none",
            Team::Red => "red",
            Team::Blue => "blue",
        };
        f.write_str(label)
    }
}

/// Match lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GamePhase {
    /// No active match; players pick teams and ready up
    #[default]
    Lobby,
    /// Countdown elapsing, movement disabled
    Starting,
    /// Normal match, movement enabled
    Playing,
    /// Terminal display, awaiting return to the lobby
    Ending,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GamePhase::Lobby => "lobby",
            GamePhase::Starting => "starting",
            GamePhase::Playing => "playing",
            GamePhase::Ending => "ending",
        };
        f.write_str(label)
    }
}

/// Represents a vector in 3D space.
///
/// Y is up. Horizontal movement happens on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3 {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    /// Distance between two points
    pub fn distance(&self, other: &Vec3) -> f32 {
        other.add(&self.scale(-1.0)).magnitude()
    }
}

/// Position plus facing, used for spawn points and teleports
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation about the vertical axis in degrees
    pub yaw: f32,
}

impl Transform {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }
}

/// Aggregate team and readiness counts over the player set.
///
/// Derived on demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamTally {
    pub red: usize,
    pub blue: usize,
    pub ready: usize,
    pub total: usize,
}

impl TeamTally {
    /// Folds a sequence of (team, ready) pairs into counts
    pub fn from_players<I>(players: I) -> Self
    where
        I: IntoIterator<Item = (Team, bool)>,
    {
        let mut tally = TeamTally::default();
        for (team, ready) in players {
            tally.total += 1;
            match team {
                Team::Red => tally.red += 1,
                Team::Blue => tally.blue += 1,
                Team::None => {}
            }
            if ready {
                tally.ready += 1;
            }
        }
        tally
    }

    /// Both sides populated, nobody unassigned, everyone ready
    pub fn ready_to_start(&self) -> bool {
        self.red > 0
            && self.blue > 0
            && self.red + self.blue == self.total
            && self.ready == self.total
    }

    /// True when at least one side has no members
    pub fn team_empty(&self) -> bool {
        self.red == 0 || self.blue == 0
    }
}
