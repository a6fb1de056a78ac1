//! Ten-pin bowling scoring with an append-only, SQLite-journaled game store.
//!
//! # Examples
//!
//! Scoring a roll sequence directly with [`engine::score`]:
//! ```
//! use bowlscore::engine::score::{frame_breakdown, total_score};
//!
//! let rolls = [10, 7, 3, 9, 0];
//! assert_eq!(total_score(&rolls), 20 + 19 + 9);
//!
//! let frames = frame_breakdown(&rolls);
//! assert_eq!(frames.len(), 3);
//! assert_eq!(frames[1].rolls.iter().map(|m| m.to_string()).collect::<Vec<_>>(), ["7", "/"]);
//! ```
//!
//! In-memory store usage with [`core::store::GameStore`]:
//! ```
//! use bowlscore::core::store::GameStore;
//!
//! let mut store = GameStore::new();
//! let (started, _ops) = store.start_game("Dana").expect("start");
//! for pins in [3, 4] {
//!     store.append_roll(started.game.id, pins).expect("roll");
//! }
//! assert_eq!(store.total_score(started.game.id).expect("score"), 7);
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use bowlscore::{
//!     core::store::GameStore,
//!     persist::sqlite::SqliteJournal,
//!     runtime::handle::{spawn_bowling, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteJournal::open("bowling.db").expect("open sqlite");
//! let store = sink.load_store().expect("replay");
//! let handle = spawn_bowling(store, Some(Box::new(sink)), RuntimeConfig::default());
//! let started = handle.start_game("Dana").await.expect("start");
//! handle.roll(started.game.id, 10).await.expect("roll");
//! let _score = handle.score(started.game.id).await.expect("score");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Core in-memory store and index helpers.
pub mod core;
/// Pure scoring engine.
pub mod engine;
/// Player, game and frame records.
pub mod game;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Request-level operations for an outer transport.
pub mod service;
/// Summary prompt rendering and generator trait.
pub mod summary;
/// Shared primitive types and enums.
pub mod types;
