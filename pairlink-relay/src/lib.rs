//! # pairlink-relay
//!
//! Relay server for pairwise "encrypted" chat channels.
//!
//! This crate implements a relay that:
//! - Accepts line-delimited JSON over TCP (default port 12345)
//! - Tracks online nicknames, pairwise session state and transcripts
//! - Enforces the encryption gate without ever touching key material
//! - Persists the set of every nickname ever seen
//! - Exposes an HTTP operator interface (snapshots, ban, event feed)
//!
//! ## Architecture
//!
//! ```text
//! client A ──┐   TCP, one JSON record per line    ┌── client B
//!            ├────────────────────────────────────┤
//!        ┌───┴────────────────────────────────────┴───┐
//!        │               pairlink-relay               │
//!        │  router tasks ─► ChatRelay (single lock)   │
//!        │            ─► bounded outbound queues      │
//!        │               ─► writer tasks              │
//!        │  registered.json      HTTP operator API    │
//!        └────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Clients open with `presence`, then exchange `check_users`, `message`,
//! `encrypt_response`, `end_encryption` and arbitrary addressed records.
//! The relay forwards `message` records only over pairs whose encrypted
//! channel was negotiated, and never inspects payload content.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod listener;
pub mod outbound;
pub mod router;
pub mod server;
pub mod session;
pub mod storage;
