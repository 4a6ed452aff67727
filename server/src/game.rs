//! Transport-agnostic authority core
//!
//! Owns the connection roster, the player session and the match lifecycle.
//! Every entry point returns the packets that must go out as [`Envelope`]s;
//! the network layer only routes them. This keeps the whole authority
//! drivable from tests without sockets.

use crate::authority::{apply_request, RequestOutcome};
use crate::roster::Roster;
use crate::match_state::{LifecycleEvent, MatchConfig, MatchLifecycle};
use crate::session::Session;
use crate::utils::get_timestamp;
use log::{debug, info, warn};
use shared::{
    FieldChange, FieldValue, GamePhase, Packet, PlayerId, MESSAGE_DISPLAY_TIME, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;

/// Who a packet is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected client, the origin included
    All,
    Client(PlayerId),
    /// A connection that has no player entity (rejected handshakes)
    Addr(SocketAddr),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub recipient: Recipient,
    pub packet: Packet,
}

impl Envelope {
    fn all(packet: Packet) -> Self {
        Self {
            recipient: Recipient::All,
            packet,
        }
    }

    fn to(client_id: PlayerId, packet: Packet) -> Self {
        Self {
            recipient: Recipient::Client(client_id),
            packet,
        }
    }

    fn field(change: FieldChange, origin: Option<PlayerId>) -> Self {
        Self::all(Packet::FieldChanged { change, origin })
    }
}

pub struct GameServer {
    roster: Roster,
    session: Session,
    lifecycle: MatchLifecycle,
    tick: u32,
}

impl GameServer {
    pub fn new(max_clients: usize, config: MatchConfig) -> Self {
        Self {
            roster: Roster::new(max_clients),
            session: Session::new(),
            lifecycle: MatchLifecycle::new(config),
            tick: 0,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.lifecycle.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn lifecycle(&self) -> &MatchLifecycle {
        &self.lifecycle
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Processes one packet received from `addr`
    pub fn handle_packet(&mut self, addr: SocketAddr, packet: Packet) -> Vec<Envelope> {
        match packet {
            Packet::Connect { client_version } => self.accept(addr, client_version),

            Packet::Request { target, request } => {
                match self.roster.id_for(addr) {
                    Some(origin) => {
                        debug!("Queued {} from {} for {}", request.name(), origin, target);
                        self.roster.enqueue(origin, target, request);
                    }
                    None => warn!("Dropping {} from unregistered {}", request.name(), addr),
                }
                Vec::new()
            }

            Packet::Heartbeat => {
                if let Some(id) = self.roster.id_for(addr) {
                    self.roster.touch(id);
                }
                Vec::new()
            }

            Packet::Disconnect => self.disconnect(addr),

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
                Vec::new()
            }
        }
    }

    fn accept(&mut self, addr: SocketAddr, client_version: u32) -> Vec<Envelope> {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            return vec![Envelope {
                recipient: Recipient::Addr(addr),
                packet: Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
            }];
        }

        // A repeated handshake replaces the previous entity
        let mut out = Vec::new();
        if let Some(existing_id) = self.roster.id_for(addr) {
            info!("Removing existing client {} from {}", existing_id, addr);
            out.extend(self.remove_player(existing_id));
        }

        let Some(client_id) = self.roster.admit(addr) else {
            out.push(Envelope {
                recipient: Recipient::Addr(addr),
                packet: Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
            });
            return out;
        };

        let phase = self.lifecycle.phase();
        let state = self.session.spawn_player(client_id, phase);

        out.push(Envelope::to(
            client_id,
            Packet::Connected {
                client_id,
                phase,
                level: self.lifecycle.current_level(),
            },
        ));
        for existing in self.session.snapshot() {
            if existing.id != client_id {
                out.push(Envelope::to(
                    client_id,
                    Packet::PlayerSpawned { state: existing },
                ));
            }
        }
        out.push(Envelope::all(Packet::PlayerSpawned { state }));
        out
    }

    /// Runs the disconnect path for the client at `addr`, if any
    pub fn disconnect(&mut self, addr: SocketAddr) -> Vec<Envelope> {
        match self.roster.id_for(addr) {
            Some(client_id) => self.remove_player(client_id),
            None => Vec::new(),
        }
    }

    fn remove_player(&mut self, client_id: PlayerId) -> Vec<Envelope> {
        self.roster.release(client_id);
        if !self.session.remove_player(client_id) {
            return Vec::new();
        }
        self.lifecycle.on_disconnect(&self.session.tally());
        vec![Envelope::all(Packet::PlayerDespawned { id: client_id })]
    }

    /// Prunes clients silent for longer than `timeout`. Each one is told
    /// why before its entity is despawned for everyone else.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Envelope> {
        let mut out = Vec::new();
        for (client_id, addr) in self.roster.expire(timeout) {
            out.push(Envelope {
                recipient: Recipient::Addr(addr),
                packet: Packet::Disconnected {
                    reason: "Timed out".to_string(),
                },
            });
            if self.session.remove_player(client_id) {
                self.lifecycle.on_disconnect(&self.session.tally());
                out.push(Envelope::all(Packet::PlayerDespawned { id: client_id }));
            }
        }
        out
    }

    /// One authority tick: apply queued requests, then evaluate the lifecycle
    pub fn tick(&mut self, dt: Duration) -> Vec<Envelope> {
        let mut out = Vec::new();

        for queued in self.roster.drain_requests() {
            match apply_request(&mut self.session, &queued) {
                RequestOutcome::Changed(changes) => {
                    out.extend(
                        changes
                            .into_iter()
                            .map(|change| Envelope::field(change, Some(queued.origin))),
                    );
                }
                RequestOutcome::Relay(text) => {
                    out.push(Envelope::all(Packet::Message {
                        text,
                        display_time: MESSAGE_DISPLAY_TIME,
                        timestamp: get_timestamp(),
                    }));
                }
                RequestOutcome::Dropped => {}
            }
        }

        let events = self.lifecycle.evaluate(&self.session.tally(), dt);
        out.extend(self.apply_lifecycle_events(events));

        self.tick += 1;
        out
    }

    /// Ends a running match early
    pub fn end_match(&mut self) -> Vec<Envelope> {
        let events = self.lifecycle.end_match();
        self.apply_lifecycle_events(events)
    }

    /// Tells every client the authority is going away
    pub fn shutdown(&mut self) -> Vec<Envelope> {
        info!("Server shutting down");
        vec![Envelope::all(Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        })]
    }

    fn apply_lifecycle_events(&mut self, events: Vec<LifecycleEvent>) -> Vec<Envelope> {
        let mut out = Vec::new();
        for event in events {
            match event {
                LifecycleEvent::PhaseChanged { from, to } => {
                    out.push(Envelope::all(Packet::PhaseChanged { phase: to }));

                    let mut changes = self.session.assign_all(|_| FieldValue::LocalPhase(to));
                    changes.extend(
                        self.session
                            .assign_all(|_| FieldValue::CanMove(to == GamePhase::Playing)),
                    );
                    if to == GamePhase::Lobby
                        && matches!(from, GamePhase::Playing | GamePhase::Ending)
                    {
                        changes.extend(self.session.assign_all(|_| FieldValue::Ready(false)));
                    }
                    out.extend(changes.into_iter().map(|c| Envelope::field(c, None)));
                }
                LifecycleEvent::LoadLevel(level) => {
                    out.push(Envelope::all(Packet::LoadLevel { level }));
                }
                LifecycleEvent::CountdownStarted | LifecycleEvent::CountdownCanceled => {
                    debug!("Lifecycle event {:?} on tick {}", event, self.tick);
                }
            }
        }
        out
    }
}
