//! Client session loop over TCP
//!
//! A reader task forwards decoded packets through a channel; the main loop
//! multiplexes those with the simulation tick and the heartbeat, and writes
//! outgoing packets directly on the write half.

use crate::input::{Axis2, InputManager, RawInput};
use crate::local_player::LocalPlayer;
use crate::movement::{FlatGround, MovementTuning};
use crate::settings::ClientConfig;
use crate::world::{ClientWorld, PlayerEvent, WorldSignal};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::codec::{read_packet, write_packet};
use shared::scene::SceneRegistry;
use shared::{Packet, Team, Vec3, PROTOCOL_VERSION};
use std::time::{Duration, Instant};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// How this participant presents itself after joining
#[derive(Debug, Clone)]
pub struct PlayerProfile {
    pub name: String,
    pub team: Team,
    pub auto_ready: bool,
}

/// Why the session loop returned
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The authority sent `Disconnected`
    Kicked(String),
    /// The connection closed without a farewell
    ConnectionLost,
    /// The local participant left
    Left,
}

pub struct Client {
    server_addr: String,
    config: ClientConfig,
    tuning: MovementTuning,
    profile: PlayerProfile,

    world: ClientWorld,
    player: Option<LocalPlayer>,
    body: FlatGround,
    input: InputManager,
    wander: Axis2,
    wander_until: Instant,
}

impl Client {
    pub fn new(
        server_addr: &str,
        config: ClientConfig,
        tuning: MovementTuning,
        profile: PlayerProfile,
    ) -> Self {
        let world = ClientWorld::new(config.feed_capacity, SceneRegistry::default());
        Self {
            server_addr: server_addr.to_string(),
            config,
            tuning,
            profile,
            world,
            player: None,
            body: FlatGround::new(0.0, Vec3::ZERO),
            input: InputManager::new(),
            wander: Axis2::ZERO,
            wander_until: Instant::now(),
        }
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    async fn send_packet(
        writer: &mut OwnedWriteHalf,
        packet: &Packet,
    ) -> Result<(), Box<dyn std::error::Error>> {
        write_packet(writer, packet).await?;
        Ok(())
    }

    async fn flush(&mut self, writer: &mut OwnedWriteHalf) -> Result<(), Box<dyn std::error::Error>> {
        let Some(player) = self.player.as_mut() else {
            return Ok(());
        };
        for packet in player.drain_packets() {
            Self::send_packet(writer, &packet).await?;
        }
        Ok(())
    }

    /// Applies one packet. Returns `Some` when the session is over.
    fn handle_packet(&mut self, packet: Packet) -> Option<SessionEnd> {
        let signal = self.world.apply_packet(packet)?;

        match &signal {
            WorldSignal::Welcome { id, level } => {
                info!("Joined as player {} on {}", id, level);
                let mut player = LocalPlayer::new(*id, self.tuning, &self.config);
                player.set_name(&self.profile.name);
                player.set_team(self.profile.team);
                if self.profile.auto_ready {
                    player.set_ready(true);
                }
                self.player = Some(player);
            }
            WorldSignal::Disconnected(reason) => {
                self.player = None;
                return Some(SessionEnd::Kicked(reason.clone()));
            }
            _ => {}
        }

        if let Some(player) = self.player.as_mut() {
            player.handle_signal(&signal, &mut self.world, &mut self.body);
        }
        None
    }

    /// Headless stand-in for device input: wander in a random direction,
    /// changing course every few seconds
    fn sample_input(&mut self) -> RawInput {
        let now = Instant::now();
        if now >= self.wander_until {
            let mut rng = rand::thread_rng();
            self.wander = Axis2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
            self.wander_until = now + Duration::from_millis(rng.gen_range(1000..4000));
        }
        RawInput {
            move_axis: self.wander,
            ..RawInput::default()
        }
    }

    fn log_events(&mut self) {
        for event in self.world.drain_events() {
            match event {
                PlayerEvent::Joined(id) => info!("Player {} joined", id),
                PlayerEvent::Left(id) => info!("Player {} left", id),
                PlayerEvent::NameChanged { id, name } => info!("Player {} is now {}", id, name),
                PlayerEvent::TeamChanged { id, team, is_local } => {
                    info!("Player {} joined team {}{}", id, team, if is_local { " (you)" } else { "" })
                }
                PlayerEvent::ReadyChanged { id, ready } => debug!("Player {} ready: {}", id, ready),
                PlayerEvent::AliveChanged { id, alive } => debug!("Player {} alive: {}", id, alive),
                PlayerEvent::PhaseChanged(_) => info!("{}", self.world.phase_label()),
            }
        }
    }

    pub async fn run(&mut self) -> Result<SessionEnd, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);
        let stream = TcpStream::connect(&self.server_addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let (packet_tx, mut packet_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(Some(packet)) => {
                        if packet_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        break;
                    }
                }
            }
        });

        Self::send_packet(
            &mut writer,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
        )
        .await?;

        let tick_duration =
            Duration::from_micros(1_000_000 / u64::from(self.config.tick_rate.max(1)));
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_interval = interval(self.config.heartbeat_interval);
        let mut last_tick = Instant::now();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let end = loop {
            tokio::select! {
                packet = packet_rx.recv() => {
                    match packet {
                        Some(packet) => {
                            if let Some(end) = self.handle_packet(packet) {
                                break end;
                            }
                            self.flush(&mut writer).await?;
                        }
                        None => {
                            warn!("Connection to server lost");
                            break SessionEnd::ConnectionLost;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    let raw = self.sample_input();
                    let sample = self.input.update(&raw);
                    if let Some(player) = self.player.as_mut() {
                        player.tick(&mut self.world, &sample, &mut self.body, dt);
                    }
                    self.world.tick(dt.as_secs_f32());
                    self.log_events();
                    self.flush(&mut writer).await?;
                },

                _ = heartbeat_interval.tick() => {
                    Self::send_packet(&mut writer, &Packet::Heartbeat).await?;
                },

                _ = &mut shutdown => {
                    info!("Leaving session");
                    break SessionEnd::Left;
                }
            }
        };

        if end == SessionEnd::Left {
            let _ = Self::send_packet(&mut writer, &Packet::Disconnect).await;
        }
        self.player = None;
        Ok(end)
    }
}
