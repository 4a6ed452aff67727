//! The locally-controlled player entity
//!
//! Runs movement, respawn and interaction for the entity this process owns.
//! Anything that changes replicated state leaves as a request; the effect
//! shows up later through the world mirror.

use crate::input::InputSample;
use crate::movement::{self, CharacterMover, GroundProbe, MoveContext, MovementReport, MovementState, MovementTuning};
use crate::respawn::{RespawnCoordinator, SpawnContext};
use crate::settings::ClientConfig;
use crate::world::{ClientWorld, WorldSignal};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{AuthorityRequest, Packet, PlayerId, Team};
use std::time::Duration;

pub struct LocalPlayer {
    id: PlayerId,
    tuning: MovementTuning,
    movement: MovementState,
    respawn: RespawnCoordinator,
    transform_push_interval: Duration,
    since_transform_push: Duration,
    rng: StdRng,
    outbox: Vec<Packet>,
}

impl LocalPlayer {
    pub fn new(id: PlayerId, tuning: MovementTuning, config: &ClientConfig) -> Self {
        Self::with_rng(id, tuning, config, StdRng::from_entropy())
    }

    /// Deterministic spawn selection for tests and replays
    pub fn with_rng(
        id: PlayerId,
        tuning: MovementTuning,
        config: &ClientConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            tuning,
            movement: MovementState::default(),
            respawn: RespawnCoordinator::new(config.respawn_delay),
            transform_push_interval: config.transform_push_interval,
            since_transform_push: Duration::ZERO,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn movement(&self) -> &MovementState {
        &self.movement
    }

    pub fn respawn(&self) -> &RespawnCoordinator {
        &self.respawn
    }

    /// Reacts to world signals that involve the local entity
    pub fn handle_signal<B>(&mut self, signal: &WorldSignal, world: &mut ClientWorld, body: &mut B)
    where
        B: CharacterMover + ?Sized,
    {
        match signal {
            WorldSignal::LocalSpawned | WorldSignal::LoadLevel(_) => self.spawn(None, world, body),
            WorldSignal::LocalEliminated { by } => self.spawn(Some(*by), world, body),
            WorldSignal::Welcome { .. } | WorldSignal::Disconnected(_) => {}
        }
    }

    fn spawn<B>(&mut self, eliminated_by: Option<PlayerId>, world: &mut ClientWorld, body: &mut B)
    where
        B: CharacterMover + ?Sized,
    {
        let ctx = SpawnContext {
            team: world.local_team(),
            camera_position: body.position(),
            spawns: &mut world.scene_mut().spawns,
        };
        if self
            .respawn
            .spawn_player(eliminated_by, ctx, &mut self.rng, body, &mut self.movement)
        {
            self.flush_respawn_requests();
            self.push_transform(body);
        }
    }

    /// One simulation tick of the local entity
    pub fn tick<B>(
        &mut self,
        world: &mut ClientWorld,
        sample: &InputSample,
        body: &mut B,
        dt: Duration,
    ) -> MovementReport
    where
        B: GroundProbe + CharacterMover + ?Sized,
    {
        if self.respawn.tick(dt, body) {
            debug!("Player {} back in play", self.id);
        }

        let replicated_can_move = world.local_state().map_or(false, |s| s.can_move);
        let ctx = MoveContext {
            can_move: replicated_can_move && !self.respawn.movement_locked(),
            phase: world.phase(),
        };

        let report = movement::tick(
            &mut self.movement,
            sample,
            ctx,
            &self.tuning,
            body,
            dt.as_secs_f32(),
        );

        if report.pitch_changed && world.is_connected() {
            self.request(self.id, AuthorityRequest::UpdateLookRotation(self.movement.pitch));
        }

        self.since_transform_push += dt;
        if self.since_transform_push >= self.transform_push_interval {
            self.push_transform(body);
        }

        if sample.interact_pressed {
            let position = body.position();
            if world.scene_mut().interactables.interact(position, self.id) {
                debug!("Player {} interacted at {:?}", self.id, position);
            }
        }

        self.flush_respawn_requests();
        report
    }

    fn push_transform<B>(&mut self, body: &B)
    where
        B: CharacterMover + ?Sized,
    {
        self.since_transform_push = Duration::ZERO;
        self.request(
            self.id,
            AuthorityRequest::UpdateTransform {
                position: body.position(),
                yaw: self.movement.yaw,
            },
        );
    }

    fn flush_respawn_requests(&mut self) {
        for request in self.respawn.drain_requests() {
            self.request(self.id, request);
        }
    }

    pub fn request(&mut self, target: PlayerId, request: AuthorityRequest) {
        self.outbox.push(Packet::Request { target, request });
    }

    pub fn set_name(&mut self, name: &str) {
        self.request(self.id, AuthorityRequest::SetName(name.to_string()));
    }

    pub fn set_team(&mut self, team: Team) {
        self.request(self.id, AuthorityRequest::SetTeam(team));
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.request(self.id, AuthorityRequest::SetReady(ready));
    }

    pub fn relay_message(&mut self, text: &str) {
        self.request(self.id, AuthorityRequest::RelayMessage(text.to_string()));
    }

    /// Asks the authority to lower another entity's health. Returns false
    /// when the target is unknown or already down.
    pub fn deal_damage(&mut self, world: &ClientWorld, target: PlayerId, amount: i32) -> bool {
        match world.player(target) {
            Some(state) if state.is_alive() => {
                self.request(
                    target,
                    AuthorityRequest::SetHealth(state.health.saturating_sub(amount)),
                );
                true
            }
            _ => false,
        }
    }

    /// Prompt of the interactable the player stands next to
    pub fn interaction_prompt<B>(&self, world: &ClientWorld, body: &B) -> Option<String>
    where
        B: CharacterMover + ?Sized,
    {
        world
            .scene()
            .interactables
            .prompt(body.position())
            .map(str::to_string)
    }

    /// Packets produced since the last drain, in send order
    pub fn drain_packets(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::FlatGround;
    use shared::scene::{Interactable, SceneRegistry, SpawnPoint};
    use shared::{
        FieldChange, FieldValue, GamePhase, PlayerState, Transform, Vec3, MAX_HEALTH,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Door {
        opened: Arc<AtomicU32>,
    }

    impl Interactable for Door {
        fn message(&self) -> &str {
            "Open door"
        }
        fn position(&self) -> Vec3 {
            Vec3::new(10.0, 0.0, 0.0)
        }
        fn radius(&self) -> f32 {
            2.0
        }
        fn interact(&mut self, _by: PlayerId) {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn world_with_local(id: PlayerId, phase: GamePhase) -> ClientWorld {
        let mut scene = SceneRegistry::default();
        scene.spawns.register(SpawnPoint {
            team: Team::Red,
            transform: Transform::new(Vec3::new(10.0, 0.0, 0.0), 180.0),
        });
        let mut world = ClientWorld::new(4, scene);
        world.apply_packet(Packet::Connected {
            client_id: id,
            phase,
            level: "arena".into(),
        });
        let mut state = PlayerState::new(id, phase);
        state.team = Team::Red;
        world.apply_packet(Packet::PlayerSpawned { state });
        world
    }

    fn player(id: PlayerId) -> LocalPlayer {
        LocalPlayer::with_rng(
            id,
            MovementTuning::default(),
            &ClientConfig::default(),
            StdRng::seed_from_u64(1),
        )
    }

    fn requests(packets: Vec<Packet>) -> Vec<(PlayerId, AuthorityRequest)> {
        packets
            .into_iter()
            .filter_map(|p| match p {
                Packet::Request { target, request } => Some((target, request)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_local_spawn_places_on_team_point() {
        let mut world = world_with_local(1, GamePhase::Lobby);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut me = player(1);

        me.handle_signal(&WorldSignal::LocalSpawned, &mut world, &mut body);
        assert_eq!(body.position(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(me.movement().yaw, 180.0);

        let sent = requests(me.drain_packets());
        assert_eq!(sent[0], (1, AuthorityRequest::SetRespawning(true)));
        assert!(sent
            .iter()
            .any(|(_, r)| matches!(r, AuthorityRequest::UpdateTransform { .. })));
    }

    #[test]
    fn test_elimination_starts_delayed_respawn() {
        let mut world = world_with_local(1, GamePhase::Playing);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut me = player(1);

        let signal = world
            .apply_packet(Packet::FieldChanged {
                change: FieldChange {
                    entity: 1,
                    old: FieldValue::Health(MAX_HEALTH),
                    new: FieldValue::Health(0),
                },
                origin: Some(2),
            })
            .unwrap();
        me.handle_signal(&signal, &mut world, &mut body);

        assert!(me.respawn().is_respawning());
        assert_eq!(me.respawn().spectate_target(), Some(2));

        let step = InputSample::default();
        me.tick(&mut world, &step, &mut body, Duration::from_secs(2));
        assert!(me.respawn().is_respawning());
        me.tick(&mut world, &step, &mut body, Duration::from_secs(1));
        assert!(!me.respawn().is_respawning());
        assert!(requests(me.drain_packets())
            .contains(&(1, AuthorityRequest::SetHealth(MAX_HEALTH))));
    }

    #[test]
    fn test_look_change_requests_rotation_update() {
        let mut world = world_with_local(1, GamePhase::Playing);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut me = player(1);

        let look = InputSample {
            look_axis: crate::input::Axis2::new(0.0, -0.1),
            ..InputSample::default()
        };
        me.tick(&mut world, &look, &mut body, Duration::from_millis(10));
        let pitch = me.movement().pitch;
        assert!(pitch > 0.0);
        assert!(requests(me.drain_packets())
            .contains(&(1, AuthorityRequest::UpdateLookRotation(pitch))));
    }

    #[test]
    fn test_transform_push_cadence() {
        let mut world = world_with_local(1, GamePhase::Lobby);
        let mut body = FlatGround::new(0.0, Vec3::ZERO);
        let mut me = player(1);
        let idle = InputSample::default();

        me.tick(&mut world, &idle, &mut body, Duration::from_millis(60));
        assert!(me.drain_packets().is_empty());
        me.tick(&mut world, &idle, &mut body, Duration::from_millis(60));
        let sent = requests(me.drain_packets());
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].1, AuthorityRequest::UpdateTransform { .. }));
    }

    #[test]
    fn test_interact_within_radius() {
        let mut world = world_with_local(1, GamePhase::Playing);
        let opened = Arc::new(AtomicU32::new(0));
        world.scene_mut().interactables.register(Box::new(Door {
            opened: Arc::clone(&opened),
        }));
        let mut body = FlatGround::new(0.0, Vec3::new(9.0, 0.0, 0.0));
        let mut me = player(1);

        assert_eq!(
            me.interaction_prompt(&world, &body).as_deref(),
            Some("Open door")
        );
        let press = InputSample {
            interact_pressed: true,
            ..InputSample::default()
        };
        me.tick(&mut world, &press, &mut body, Duration::from_millis(10));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deal_damage_targets_other_entity() {
        let mut world = world_with_local(1, GamePhase::Playing);
        world.apply_packet(Packet::PlayerSpawned {
            state: PlayerState::new(2, GamePhase::Playing),
        });
        let mut me = player(1);

        assert!(me.deal_damage(&world, 2, 30));
        assert!(!me.deal_damage(&world, 9, 30));
        assert_eq!(
            requests(me.drain_packets()),
            vec![(2, AuthorityRequest::SetHealth(MAX_HEALTH - 30))]
        );
    }
}
