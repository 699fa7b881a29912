//! # Arena Server Library
//!
//! Authoritative server for a room-based grid arena game: players walk a
//! 13x13 maze, plant timed bombs, blow up crates, pick up power-ups and try
//! to be the last one standing.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every rule decision happens here. Clients send intents (move, place bomb)
//! and render whatever state the server broadcasts back; illegal intents are
//! silently dropped and the next snapshot corrects the client.
//!
//! ### Rooms
//! Players create a room and share its six-character code. Up to four
//! players can join a room before its game starts. A room disappears as soon
//! as its last player leaves or times out.
//!
//! ### State Broadcasting
//! Every accepted action and every tick of a running game broadcasts a full
//! snapshot to the room, so a lost datagram is healed by the next one.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! `network::Server` owns the `RoomRegistry` and processes inbound packets,
//! client timeouts and tick requests sequentially in one `tokio::select!`
//! loop. No two mutations of a room can interleave.
//!
//! ### Per-Room Tick Tasks
//! A room with a running game owns one `TickScheduler`, a spawned task that
//! posts a tick request every 100 ms. It is aborted on game over, reset and
//! room teardown; late requests from an aborted task are recognised by their
//! generation and ignored.
//!
//! ## Module Organization
//!
//! - `grid`: arena generation and spawn slots
//! - `model`: the per-room world state
//! - `simulation`: fuses, blasts, eliminations, win check
//! - `room`: validated player actions and game lifecycle for one room
//! - `registry`: room directory and action routing
//! - `scheduler`: per-room tick task
//! - `broadcast`: snapshot and notification packets
//! - `client_manager`: address to player identity mapping and timeouts
//! - `network`: UDP transport and the event loop
//! - `config`, `error`: configuration and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:3001".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod grid;
pub mod model;
pub mod network;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod simulation;
