//! # Match Participant Library
//!
//! The non-authoritative side of the arena shooter. A participant mirrors
//! the replicated world, simulates only its own player entity, and routes
//! every change to shared state through requests to the authority.
//!
//! ## Architecture Overview
//!
//! ### Server-Relayed State
//! There is no prediction or reconciliation. Replicated fields are applied
//! exactly as the authority broadcasts them, in order, and a request's
//! effect becomes visible only when its echo arrives on a later tick.
//!
//! ### Local Simulation
//! The locally-controlled entity runs movement every tick against the
//! physics layer's ground probe and character mover, and periodically
//! pushes its look pitch and transform so remote observers can render it.
//!
//! ### Spawn Sequencing
//! Initial spawns, level loads and eliminations all go through one guarded
//! respawn coordinator. Death respawns wait for a delay while spectating
//! the eliminator.
//!
//! ## Module Organization
//!
//! - `world`: replica field stores, canonical phase, observer events, scene registries
//! - `phase_vote`: majority phase inference used before the canonical phase arrives
//! - `feed`: rolling message feed
//! - `input`: per-tick input samples with press detection and the menu toggle
//! - `movement`: the per-tick movement algorithm and the physics-layer traits
//! - `respawn`: the spawn/respawn coordinator
//! - `local_player`: the entity this process controls
//! - `settings`: runtime tuning and local settings accessors
//! - `network`: TCP session loop for a headless participant
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::movement::MovementTuning;
//! use client::network::{Client, PlayerProfile};
//! use client::settings::ClientConfig;
//! use shared::Team;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = PlayerProfile {
//!         name: "alice".to_string(),
//!         team: Team::None,
//!         auto_ready: true,
//!     };
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         ClientConfig::default(),
//!         MovementTuning::default(),
//!         profile,
//!     );
//!     let end = client.run().await?;
//!     println!("Session ended: {:?}", end);
//!     Ok(())
//! }
//! ```

pub mod feed;
pub mod input;
pub mod local_player;
pub mod movement;
pub mod network;
pub mod phase_vote;
pub mod respawn;
pub mod settings;
pub mod world;
