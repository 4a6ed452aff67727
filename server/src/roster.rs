//! Connection roster for the authority
//!
//! Each admitted connection owns exactly one player entity, and its id
//! doubles as that entity's id. The roster also holds the per-origin
//! request queues the authority drains once per tick; a queue keeps the
//! order its origin sent in, with no ordering across origins.

use log::{info, warn};
use shared::{AuthorityRequest, PlayerId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A request waiting to be applied on the next tick
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRequest {
    pub origin: PlayerId,
    pub target: PlayerId,
    pub request: AuthorityRequest,
}

#[derive(Debug)]
pub struct Connection {
    pub id: PlayerId,
    pub addr: SocketAddr,
    /// Refreshed by every packet from this peer
    pub last_activity: Instant,
    pub inbox: VecDeque<(PlayerId, AuthorityRequest)>,
}

impl Connection {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_activity: Instant::now(),
            inbox: VecDeque::new(),
        }
    }

    pub fn mark_active(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_silent_for(&self, limit: Duration) -> bool {
        self.last_activity.elapsed() > limit
    }
}

pub struct Roster {
    by_id: BTreeMap<PlayerId, Connection>,
    by_addr: HashMap<SocketAddr, PlayerId>,
    next_id: PlayerId,
    capacity: usize,
}

impl Roster {
    /// Ids are handed out from 1 upward and never reused within a run.
    pub fn new(capacity: usize) -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_addr: HashMap::new(),
            next_id: 1,
            capacity,
        }
    }

    /// Registers a new peer. `None` means the roster is full.
    pub fn admit(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.by_id.len() >= self.capacity {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        info!("Peer {} joined from {}", id, addr);
        self.by_addr.insert(addr, id);
        self.by_id.insert(id, Connection::new(id, addr));
        Some(id)
    }

    /// Forgets a peer along with whatever it still had queued.
    pub fn release(&mut self, id: PlayerId) -> bool {
        let Some(conn) = self.by_id.remove(&id) else {
            return false;
        };
        self.by_addr.remove(&conn.addr);
        if !conn.inbox.is_empty() {
            warn!(
                "Discarding {} queued requests from peer {}",
                conn.inbox.len(),
                id
            );
        }
        info!("Peer {} left", id);
        true
    }

    pub fn id_for(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.by_addr.get(&addr).copied()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn addr_of(&self, id: PlayerId) -> Option<SocketAddr> {
        self.by_id.get(&id).map(|conn| conn.addr)
    }

    /// Returns false (and drops the request) when `origin` is unknown.
    pub fn enqueue(&mut self, origin: PlayerId, target: PlayerId, request: AuthorityRequest) -> bool {
        match self.by_id.get_mut(&origin) {
            Some(conn) => {
                conn.mark_active();
                conn.inbox.push_back((target, request));
                true
            }
            None => false,
        }
    }

    pub fn touch(&mut self, id: PlayerId) {
        if let Some(conn) = self.by_id.get_mut(&id) {
            conn.mark_active();
        }
    }

    /// Empties every inbox, visiting origins in id order.
    pub fn drain_requests(&mut self) -> Vec<QueuedRequest> {
        self.by_id
            .iter_mut()
            .flat_map(|(origin, conn)| {
                let origin = *origin;
                conn.inbox.drain(..).map(move |(target, request)| QueuedRequest {
                    origin,
                    target,
                    request,
                })
            })
            .collect()
    }

    /// Releases every peer that has been silent longer than `limit` and
    /// returns their ids and addresses so the caller can run its departure
    /// path and tell the peer.
    pub fn expire(&mut self, limit: Duration) -> Vec<(PlayerId, SocketAddr)> {
        let silent: Vec<(PlayerId, SocketAddr)> = self
            .by_id
            .values()
            .filter(|conn| conn.is_silent_for(limit))
            .map(|conn| (conn.id, conn.addr))
            .collect();

        for (id, _) in &silent {
            warn!("Peer {} went silent", id);
            self.release(*id);
        }
        silent
    }

    pub fn addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.by_id.values().map(|conn| (conn.id, conn.addr)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
