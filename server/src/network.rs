//! Server network layer handling TCP connections and game loop coordination

use crate::game::{Envelope, GameServer, Recipient};
use crate::match_state::MatchConfig;
use log::{debug, error, info, warn};
use shared::codec::{read_packet, write_packet};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened {
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
        /// Dropping this stops the connection's reader task
        close: oneshot::Sender<()>,
    },
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ConnectionClosed {
        addr: SocketAddr,
    },
    Shutdown,
}

/// Live socket tasks for one peer. Dropping it closes the connection: the
/// writer flushes what is queued and exits, the reader stops at once.
struct Connection {
    outbound: mpsc::UnboundedSender<Packet>,
    _close: oneshot::Sender<()>,
}

/// Main server coordinating networking and the authority core
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    game: GameServer,
    connections: HashMap<SocketAddr, Connection>,
    tick_duration: Duration,
    client_timeout: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: MatchConfig,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game: GameServer::new(max_clients, config),
            connections: HashMap::new(),
            tick_duration,
            client_timeout,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop the loop with [`ServerMessage::Shutdown`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that accepts connections and wires their reader/writer tasks
    fn spawn_acceptor(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set nodelay for {}: {}", addr, e);
                        }
                        let (read_half, write_half) = stream.into_split();
                        let (outbound, outbound_rx) = mpsc::unbounded_channel();
                        let (close, closed) = oneshot::channel();

                        if server_tx
                            .send(ServerMessage::ConnectionOpened {
                                addr,
                                outbound,
                                close,
                            })
                            .is_err()
                        {
                            break;
                        }
                        tokio::spawn(Self::write_loop(write_half, outbound_rx, addr));
                        tokio::spawn(Self::read_loop(read_half, addr, server_tx.clone(), closed));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }))
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
        mut closed: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                result = read_packet(&mut reader) => match result {
                    Ok(Some(packet)) => {
                        if let Err(e) = server_tx.send(ServerMessage::PacketReceived { packet, addr }) {
                            error!("Failed to send packet to main loop: {}", e);
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Closing connection {}: {}", addr, e);
                        break;
                    }
                },
                _ = &mut closed => {
                    debug!("Connection {} closed by server", addr);
                    return;
                }
            }
        }
        let _ = server_tx.send(ServerMessage::ConnectionClosed { addr });
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
        addr: SocketAddr,
    ) {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                error!("Failed to send packet to {}: {}", addr, e);
                break;
            }
        }
    }

    fn send_to_addr(&self, addr: SocketAddr, packet: Packet) {
        match self.connections.get(&addr) {
            Some(conn) => {
                if conn.outbound.send(packet).is_err() {
                    debug!("Connection {} already closed", addr);
                }
            }
            None => debug!("No connection for {}", addr),
        }
    }

    /// Routes envelopes produced by the authority core. A `Disconnected`
    /// addressed to one peer is its last packet; the connection is closed
    /// right after it.
    fn dispatch(&mut self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            match envelope.recipient {
                Recipient::All => {
                    for (_, addr) in self.game.roster().addrs() {
                        self.send_to_addr(addr, envelope.packet.clone());
                    }
                }
                Recipient::Client(client_id) => {
                    if let Some(addr) = self.game.roster().addr_of(client_id) {
                        self.send_to_addr(addr, envelope.packet);
                    }
                }
                Recipient::Addr(addr) => {
                    let farewell = matches!(envelope.packet, Packet::Disconnected { .. });
                    self.send_to_addr(addr, envelope.packet);
                    if farewell && self.connections.remove(&addr).is_some() {
                        info!("Closed connection {}", addr);
                    }
                }
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let acceptor = self.spawn_acceptor();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ConnectionOpened { addr, outbound, close }) => {
                            debug!("Connection opened from {}", addr);
                            self.connections.insert(addr, Connection { outbound, _close: close });
                        }
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            let envelopes = self.game.handle_packet(addr, packet);
                            self.dispatch(envelopes);
                        }
                        Some(ServerMessage::ConnectionClosed { addr }) => {
                            let envelopes = self.game.disconnect(addr);
                            self.dispatch(envelopes);
                            self.connections.remove(&addr);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            let envelopes = self.game.shutdown();
                            self.dispatch(envelopes);
                            self.connections.clear();
                            // Give writer tasks a moment to flush the farewell
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    let envelopes = self.game.tick(dt);
                    self.dispatch(envelopes);

                    let tick = self.game.tick_count();
                    if tick % 60 == 0 && !self.game.roster().is_empty() {
                        debug!(
                            "Tick {}: {} clients, phase {}, {:.1}Hz",
                            tick,
                            self.game.roster().len(),
                            self.game.phase(),
                            1.0 / dt.as_secs_f32().max(f32::EPSILON)
                        );
                    }
                },

                _ = timeout_interval.tick() => {
                    let envelopes = self.game.check_timeouts(self.client_timeout);
                    self.dispatch(envelopes);
                },
            }
        }

        if let Some(acceptor) = acceptor {
            acceptor.abort();
            let _ = acceptor.await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PROTOCOL_VERSION;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_handshake_over_tcp() {
        let mut server = Server::new(
            "127.0.0.1:0",
            Duration::from_millis(10),
            4,
            MatchConfig::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = server.local_addr();
        let control = server.control();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        write_packet(
            &mut writer,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
        )
        .await
        .unwrap();

        match read_packet(&mut reader).await.unwrap() {
            Some(Packet::Connected { client_id, .. }) => assert_eq!(client_id, 1),
            other => panic!("Unexpected packet {:?}", other),
        }
        match read_packet(&mut reader).await.unwrap() {
            Some(Packet::PlayerSpawned { state }) => assert_eq!(state.id, 1),
            other => panic!("Unexpected packet {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
        let mut saw_farewell = false;
        while let Ok(Some(packet)) = read_packet(&mut reader).await {
            if let Packet::Disconnected { reason } = packet {
                assert_eq!(reason, "Server shutting down");
                saw_farewell = true;
                break;
            }
        }
        assert!(saw_farewell);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_listener() {
        let mut server = Server::new(
            "127.0.0.1:0",
            Duration::from_millis(10),
            2,
            MatchConfig::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = server.local_addr();
        server.control().send(ServerMessage::Shutdown).unwrap();
        server.run().await.unwrap();

        let rebound = tokio::net::TcpListener::bind(addr).await;
        tokio_test::assert_ok!(rebound);
    }

    #[test]
    fn test_bind_reports_ephemeral_port() {
        let server = tokio_test::block_on(Server::new(
            "127.0.0.1:0",
            Duration::from_millis(20),
            2,
            MatchConfig::default(),
            Duration::from_secs(5),
        ));
        let server = tokio_test::assert_ok!(server);
        assert_ne!(server.local_addr().port(), 0);
        tokio_test::assert_ok!(server.control().send(ServerMessage::Shutdown));
    }

    #[test]
    fn test_server_message_creation() {
        let packet = Packet::Connect { client_version: 1 };
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        match (ServerMessage::PacketReceived { packet, addr }) {
            ServerMessage::PacketReceived { packet: p, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(p, Packet::Connect { client_version: 1 }));
            }
            _ => panic!("Unexpected message type"),
        }
    }
}
