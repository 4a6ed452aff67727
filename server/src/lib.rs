//! # Match Authority Library
//!
//! The authoritative side of the arena shooter. It owns the canonical copy of
//! every replicated player field, applies the requests peers send, runs the
//! match lifecycle and fans the results back out to every connection.
//!
//! ## Core Responsibilities
//!
//! ### Replicated State
//! Each player entity has a [`shared::FieldStore`] in authority role. Only
//! the authority writes fields; peers observe them through `FieldChanged`
//! broadcasts that are applied in the order they were produced.
//!
//! ### Request Handling
//! Peers never write state directly. They send requests addressed to an
//! entity; the authority queues them per connection, drains them once per
//! tick, sanitizes the input (names, health, team balancing) and enforces
//! ownership for owner-only requests.
//!
//! ### Match Lifecycle
//! Lobby, Starting, Playing and Ending are driven by the ready/team tally
//! and by explicit timers. Phase changes are mirrored into every entity's
//! `LocalPhase` and `CanMove` fields.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All authority logic runs on one task. Socket reader and writer tasks only
//! move framed packets between TCP streams and channels, so the game state
//! never needs a lock.
//!
//! ### Transport-Agnostic Core
//! [`game::GameServer`] returns [`game::Envelope`]s instead of writing to
//! sockets, which lets the whole authority run in tests without networking.
//!
//! ## Module Organization
//!
//! - `roster`: connection roster, ids, per-connection request queues, timeouts
//! - `session`: authority field stores for every player entity
//! - `authority`: request sanitizing and ownership checks
//! - `match_state`: the lifecycle state machine and its timers
//! - `game`: ties the above together and emits envelopes
//! - `network`: TCP acceptor, per-connection tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::match_state::MatchConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(20),
//!         16,
//!         MatchConfig::default(),
//!         Duration::from_secs(5),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod game;
pub mod match_state;
pub mod network;
pub mod roster;
pub mod session;
pub mod utils;
