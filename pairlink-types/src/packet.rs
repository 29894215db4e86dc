//! The line-delimited JSON wire protocol.
//!
//! Every record is one UTF-8 JSON object per line. The relay inspects only
//! the routing fields it needs; everything else in a relayed record is
//! opaque and forwarded verbatim, so clients are free to attach whatever
//! negotiation or ciphertext metadata they like.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::WireError;

/// Default TCP port for the relay protocol.
pub const DEFAULT_PORT: u16 = 12345;

/// Parsed view of one inbound line.
#[derive(Debug, Clone)]
pub enum ClientPacket {
    /// Initial handshake claiming a nickname for the connection's lifetime.
    Presence {
        /// The claimed nickname.
        nick: String,
    },
    /// Query which of the given nicknames have ever registered.
    CheckUsers {
        /// The nicknames to look up.
        users: BTreeSet<String>,
    },
    /// Any addressed record to relay between two nicknames.
    Routed(Routed),
}

/// An addressed record to be relayed between two nicknames.
#[derive(Debug, Clone)]
pub struct Routed {
    /// Declared sender nickname.
    pub from: String,
    /// Declared target nickname.
    pub to: String,
    /// The routed kind, carrying the fields the relay inspects.
    pub kind: RoutedKind,
    /// The full parsed record, re-encoded verbatim on forward.
    pub value: Value,
}

/// The subset of a routed record the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedKind {
    /// Chat payload; relayed only over an active session with the
    /// `encrypted` flag set (absent reads as false).
    Message {
        /// Sender-asserted encryption flag.
        encrypted: bool,
    },
    /// Negotiation outcome; `accepted` iff `status == "accept"`.
    EncryptResponse {
        /// Whether the responder accepted the channel.
        accepted: bool,
    },
    /// Explicit session teardown.
    EndEncryption,
    /// Anything else carrying a from/to pair: relayed opaquely.
    Other(String),
}

impl Routed {
    /// Re-encode the original record for forwarding.
    pub fn to_line(&self) -> String {
        serde_json::to_string(&self.value).expect("JSON value re-encoding cannot fail")
    }
}

/// Parse one inbound line into a [`ClientPacket`].
pub fn parse_line(line: &str) -> Result<ClientPacket, WireError> {
    let value: Value = serde_json::from_str(line)?;
    let obj = value.as_object().ok_or(WireError::NotAnObject)?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingType)?
        .to_string();

    match kind.as_str() {
        "presence" => {
            let nick = require_str(obj, &kind, "nick")?;
            Ok(ClientPacket::Presence { nick })
        }
        "check_users" => {
            let users = obj
                .get("users")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(ClientPacket::CheckUsers { users })
        }
        _ => {
            let from = require_str(obj, &kind, "from")?;
            let to = require_str(obj, &kind, "to")?;
            let routed_kind = match kind.as_str() {
                "message" => RoutedKind::Message {
                    encrypted: obj.get("encrypted").and_then(Value::as_bool).unwrap_or(false),
                },
                "encrypt_response" => RoutedKind::EncryptResponse {
                    accepted: obj.get("status").and_then(Value::as_str) == Some("accept"),
                },
                "end_encryption" => RoutedKind::EndEncryption,
                other => RoutedKind::Other(other.to_string()),
            };
            Ok(ClientPacket::Routed(Routed {
                from,
                to,
                kind: routed_kind,
                value,
            }))
        }
    }
}

/// Extract a required, non-empty string field.
fn require_str(obj: &Map<String, Value>, kind: &str, field: &'static str) -> Result<String, WireError> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WireError::MissingField {
            kind: kind.to_string(),
            field,
        })
}

/// Records the server originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPacket {
    /// Current online user list, broadcast on every membership change.
    UserList {
        /// Sorted online nicknames.
        users: Vec<String>,
    },
    /// Reply to `check_users`: the subset already registered.
    RegisteredUsers {
        /// Sorted subset of the requested nicknames.
        users: Vec<String>,
    },
    /// The recipient has been banned; the connection closes next.
    Ban,
    /// Session teardown notice, sent to the surviving peer when the other
    /// party disconnects or is banned.
    EndEncryption {
        /// The departed peer.
        from: String,
        /// The surviving peer.
        to: String,
        /// `"disconnect"` or `"ban"`.
        reason: String,
    },
}

impl ServerPacket {
    /// Encode as one wire line (no trailing newline; the writer appends it).
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("server packet serialization cannot fail")
    }
}
