//! # pairlink-types
//!
//! Wire-format types for the pairlink relay protocol.
//!
//! This crate provides the vocabulary shared by the relay server, clients
//! and tests:
//! - [`ClientPacket`] / [`Routed`] - parsed view of one inbound wire line
//! - [`ServerPacket`] - records the server originates
//! - [`SessionKey`] - canonical unordered nickname pair
//! - [`WireError`] - decoding errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod packet;
mod pair;

pub use error::WireError;
pub use packet::{parse_line, ClientPacket, Routed, RoutedKind, ServerPacket, DEFAULT_PORT};
pub use pair::SessionKey;
