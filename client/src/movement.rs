//! Local movement simulation for the locally-controlled player
//!
//! Collision and ground detection belong to the physics layer and are
//! consumed through [`GroundProbe`] and [`CharacterMover`]. [`FlatGround`]
//! is a minimal body standing on an infinite plane, used by the headless
//! client and in tests.

use crate::input::InputSample;
use shared::{GamePhase, Vec3};

pub const PITCH_LIMIT: f32 = 90.0;

/// Physics-layer ground queries
pub trait GroundProbe {
    fn is_grounded(&self) -> bool;
    /// Whether a surface lies within `distance` below the character
    fn probe_down(&self, distance: f32) -> bool;
}

/// Physics-layer character controller
pub trait CharacterMover {
    fn move_by(&mut self, delta: Vec3);
    fn position(&self) -> Vec3;
    /// Places the character without sweeping for collisions
    fn teleport(&mut self, position: Vec3);
    /// Disabling removes the character from movement and collision
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementTuning {
    /// Degrees per second per unit of look input
    pub sensitivity: f32,
    pub speed: f32,
    pub jump_force: f32,
    pub gravity_y: f32,
    pub grounded_distance: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            sensitivity: 120.0,
            speed: 5.0,
            jump_force: 1.5,
            gravity_y: -9.81,
            grounded_distance: 0.3,
        }
    }
}

/// Simulated look and vertical state. Angles are in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementState {
    pub yaw: f32,
    pub pitch: f32,
    pub velocity_y: f32,
    pub airborne: bool,
}

/// What one tick did, for callers that replicate or inspect it
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementReport {
    /// False when the mover was disabled and nothing ran
    pub simulated: bool,
    pub pitch_changed: bool,
    /// Vertical velocity set by a jump this tick, before gravity
    pub launch_velocity: Option<f32>,
    pub velocity: Vec3,
}

/// Gates applied on top of the input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveContext {
    /// Replicated `CanMove` combined with local locks such as a pending respawn
    pub can_move: bool,
    pub phase: GamePhase,
}

impl MoveContext {
    fn permits_movement(&self) -> bool {
        self.can_move && self.phase == GamePhase::Playing
    }
}

/// Horizontal direction for a move input relative to `yaw`
pub fn horizontal_direction(move_axis: crate::input::Axis2, yaw: f32) -> Vec3 {
    let (sin, cos) = yaw.to_radians().sin_cos();
    let forward = Vec3::new(sin, 0.0, cos);
    let right = Vec3::new(cos, 0.0, -sin);
    right.scale(move_axis.x).add(&forward.scale(move_axis.y))
}

/// Runs one movement tick. Step order matters; see the numbered comments.
pub fn tick<B>(
    state: &mut MovementState,
    input: &InputSample,
    ctx: MoveContext,
    tuning: &MovementTuning,
    body: &mut B,
    dt: f32,
) -> MovementReport
where
    B: GroundProbe + CharacterMover + ?Sized,
{
    if !body.is_enabled() {
        return MovementReport::default();
    }

    let mut report = MovementReport {
        simulated: true,
        ..MovementReport::default()
    };

    // 1. yaw
    state.yaw += input.look_axis.x * tuning.sensitivity * dt;

    // 2. pitch
    let pitch = (state.pitch - input.look_axis.y * tuning.sensitivity * dt)
        .clamp(-PITCH_LIMIT, PITCH_LIMIT);
    report.pitch_changed = pitch != state.pitch;
    state.pitch = pitch;

    // 3. ground check and jump
    if body.is_grounded() {
        state.velocity_y = 0.0;
        if input.jump && ctx.permits_movement() {
            state.airborne = true;
            state.velocity_y = (-tuning.jump_force * tuning.gravity_y).sqrt();
            report.launch_velocity = Some(state.velocity_y);
        } else {
            state.airborne = false;
        }
    }

    // 4. stick to slopes
    if !state.airborne {
        if body.probe_down(tuning.grounded_distance) {
            state.velocity_y = tuning.gravity_y;
        } else {
            state.airborne = true;
        }
    }

    // 5. gravity
    state.velocity_y += tuning.gravity_y * dt;

    // 6. horizontal motion
    let horizontal = if ctx.permits_movement() {
        horizontal_direction(input.move_axis, state.yaw).scale(tuning.speed)
    } else {
        Vec3::ZERO
    };
    let velocity = Vec3::new(horizontal.x, state.velocity_y, horizontal.z);
    body.move_by(velocity.scale(dt));
    report.velocity = velocity;

    report
}

/// Character on an infinite horizontal floor
#[derive(Debug, Clone)]
pub struct FlatGround {
    position: Vec3,
    floor_y: f32,
    enabled: bool,
    grounded: bool,
}

impl FlatGround {
    pub fn new(floor_y: f32, position: Vec3) -> Self {
        let mut body = Self {
            position,
            floor_y,
            enabled: true,
            grounded: false,
        };
        body.settle();
        body
    }

    fn settle(&mut self) {
        if self.position.y <= self.floor_y {
            self.position.y = self.floor_y;
            self.grounded = true;
        } else {
            self.grounded = false;
        }
    }
}

impl GroundProbe for FlatGround {
    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn probe_down(&self, distance: f32) -> bool {
        self.position.y - self.floor_y <= distance
    }
}

impl CharacterMover for FlatGround {
    fn move_by(&mut self, delta: Vec3) {
        if !self.enabled {
            return;
        }
        self.position = self.position.add(&delta);
        self.settle();
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.settle();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
