//! Spawn and respawn sequencing for the locally-controlled player
//!
//! A respawn runs disable, place, (wait), enable. The wait only happens for
//! death respawns and is an explicit timer polled from the simulation tick.
//! While a sequence is pending every further spawn call is a no-op.

use crate::movement::{CharacterMover, MovementState};
use log::{debug, info};
use rand::Rng;
use shared::scene::SpawnRegistry;
use shared::{AuthorityRequest, PlayerId, Team, Transform, Vec3, MAX_HEALTH};
use std::time::Duration;

/// Inputs a spawn needs from the surrounding session
pub struct SpawnContext<'a> {
    pub team: Team,
    pub spawns: &'a mut SpawnRegistry,
    /// Camera position right before the spawn started
    pub camera_position: Vec3,
}

#[derive(Debug)]
pub struct RespawnCoordinator {
    delay: Duration,
    respawning: bool,
    remaining: Option<Duration>,
    movement_locked: bool,
    spectate: Option<PlayerId>,
    last_alive_camera: Option<Vec3>,
    last_spawn: Option<Transform>,
    outbox: Vec<AuthorityRequest>,
}

impl RespawnCoordinator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            respawning: false,
            remaining: None,
            movement_locked: false,
            spectate: None,
            last_alive_camera: None,
            last_spawn: None,
            outbox: Vec::new(),
        }
    }

    /// Starts a spawn. `eliminated_by` marks a death respawn, which waits for
    /// the configured delay while spectating the eliminator. Returns false
    /// when a spawn is already in progress.
    pub fn spawn_player<M, R>(
        &mut self,
        eliminated_by: Option<PlayerId>,
        ctx: SpawnContext<'_>,
        rng: &mut R,
        mover: &mut M,
        movement: &mut MovementState,
    ) -> bool
    where
        M: CharacterMover + ?Sized,
        R: Rng + ?Sized,
    {
        if self.respawning {
            debug!("Spawn ignored, respawn already in progress");
            return false;
        }

        self.respawning = true;
        self.outbox.push(AuthorityRequest::SetRespawning(true));
        mover.set_enabled(false);
        self.outbox.push(AuthorityRequest::SetHealth(0));
        self.movement_locked = true;
        self.last_alive_camera = Some(ctx.camera_position);
        self.spectate = eliminated_by;

        let transform = ctx.spawns.choose(ctx.team, rng);
        mover.teleport(transform.position);
        movement.yaw = transform.yaw;
        movement.pitch = 0.0;
        movement.velocity_y = 0.0;
        movement.airborne = false;
        self.last_spawn = Some(transform);

        match eliminated_by {
            Some(by) => {
                info!(
                    "Eliminated by {}, respawning in {:.1}s",
                    by,
                    self.delay.as_secs_f32()
                );
                self.remaining = Some(self.delay);
                if self.delay.is_zero() {
                    self.complete(mover);
                }
            }
            None => self.complete(mover),
        }
        true
    }

    /// Advances a pending death respawn. Returns true on the tick it completes.
    pub fn tick<M>(&mut self, dt: Duration, mover: &mut M) -> bool
    where
        M: CharacterMover + ?Sized,
    {
        let Some(remaining) = self.remaining else {
            return false;
        };
        let remaining = remaining.saturating_sub(dt);
        if remaining.is_zero() {
            self.complete(mover);
            true
        } else {
            self.remaining = Some(remaining);
            false
        }
    }

    fn complete<M>(&mut self, mover: &mut M)
    where
        M: CharacterMover + ?Sized,
    {
        self.remaining = None;
        self.spectate = None;
        mover.set_enabled(true);
        self.outbox.push(AuthorityRequest::SetHealth(MAX_HEALTH));
        self.movement_locked = false;
        self.respawning = false;
        self.outbox.push(AuthorityRequest::SetRespawning(false));
        debug!("Spawn complete at {:?}", self.last_spawn);
    }

    pub fn is_respawning(&self) -> bool {
        self.respawning
    }

    /// Local counterpart of `CanMove`, false while a spawn is pending
    pub fn movement_locked(&self) -> bool {
        self.movement_locked
    }

    pub fn spectate_target(&self) -> Option<PlayerId> {
        self.spectate
    }

    pub fn last_alive_camera(&self) -> Option<Vec3> {
        self.last_alive_camera
    }

    pub fn last_spawn(&self) -> Option<Transform> {
        self.last_spawn
    }

    pub fn remaining_delay(&self) -> Option<Duration> {
        self.remaining
    }

    /// Requests for the local entity produced since the last drain
    pub fn drain_requests(&mut self) -> Vec<AuthorityRequest> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::FlatGround;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::scene::SpawnPoint;

    fn registry() -> SpawnRegistry {
        let mut spawns = SpawnRegistry::new(Transform::new(Vec3::new(0.0, 0.0, 0.0), 0.0));
        spawns.register(SpawnPoint {
            team: Team::Red,
            transform: Transform::new(Vec3::new(10.0, 0.0, 0.0), 90.0),
        });
        spawns
    }

    fn ctx(spawns: &mut SpawnRegistry, team: Team) -> SpawnContext<'_> {
        SpawnContext {
            team,
            spawns,
            camera_position: Vec3::new(1.0, 2.0, 3.0),
        }
    }

    #[test]
    fn test_initial_spawn_completes_immediately() {
        let mut spawns = registry();
        let mut rng = StdRng::seed_from_u64(7);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut movement = MovementState {
            pitch: 45.0,
            ..MovementState::default()
        };
        let mut respawn = RespawnCoordinator::new(Duration::from_secs(3));

        assert!(respawn.spawn_player(
            None,
            ctx(&mut spawns, Team::Red),
            &mut rng,
            &mut body,
            &mut movement
        ));

        assert!(!respawn.is_respawning());
        assert!(body.is_enabled());
        assert_eq!(body.position(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(movement.yaw, 90.0);
        assert_eq!(movement.pitch, 0.0);
        assert_eq!(
            respawn.drain_requests(),
            vec![
                AuthorityRequest::SetRespawning(true),
                AuthorityRequest::SetHealth(0),
                AuthorityRequest::SetHealth(MAX_HEALTH),
                AuthorityRequest::SetRespawning(false),
            ]
        );
    }

    #[test]
    fn test_team_without_points_uses_fallback() {
        let mut spawns = registry();
        let mut rng = StdRng::seed_from_u64(7);
        let mut body = FlatGround::new(0.0, Vec3::new(4.0, 0.0, 4.0));
        let mut movement = MovementState::default();
        let mut respawn = RespawnCoordinator::new(Duration::from_secs(3));

        respawn.spawn_player(
            None,
            ctx(&mut spawns, Team::Blue),
            &mut rng,
            &mut body,
            &mut movement,
        );
        assert_eq!(body.position(), Vec3::ZERO);
    }

    #[test]
    fn test_death_respawn_waits_and_is_guarded() {
        let mut spawns = registry();
        let mut rng = StdRng::seed_from_u64(7);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut movement = MovementState::default();
        let mut respawn = RespawnCoordinator::new(Duration::from_secs(2));

        assert!(respawn.spawn_player(
            Some(9),
            ctx(&mut spawns, Team::Red),
            &mut rng,
            &mut body,
            &mut movement
        ));
        assert!(respawn.is_respawning());
        assert!(respawn.movement_locked());
        assert!(!body.is_enabled());
        assert_eq!(respawn.spectate_target(), Some(9));
        assert_eq!(respawn.last_alive_camera(), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(respawn.drain_requests().len(), 2);

        // Re-entrant call is absorbed
        assert!(!respawn.spawn_player(
            Some(4),
            ctx(&mut spawns, Team::Red),
            &mut rng,
            &mut body,
            &mut movement
        ));
        assert!(respawn.drain_requests().is_empty());
        assert_eq!(respawn.spectate_target(), Some(9));

        assert!(!respawn.tick(Duration::from_secs(1), &mut body));
        assert!(respawn.is_respawning());
        assert!(respawn.tick(Duration::from_secs(1), &mut body));

        assert!(!respawn.is_respawning());
        assert!(!respawn.movement_locked());
        assert!(body.is_enabled());
        assert_eq!(respawn.spectate_target(), None);
        assert_eq!(
            respawn.drain_requests(),
            vec![
                AuthorityRequest::SetHealth(MAX_HEALTH),
                AuthorityRequest::SetRespawning(false),
            ]
        );
        assert!(!respawn.tick(Duration::from_secs(1), &mut body));
    }
}
