//! Pairwise session state.
//!
//! Each unordered nickname pair has a status gating message relay, plus a
//! byte counter and transcript kept for the operator console. The counter
//! and transcript are diagnostic: they record every forwarded packet kind,
//! independent of the active/inactive gate.

use pairlink_types::SessionKey;
use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Status of a pairwise session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No encrypted channel negotiated.
    #[default]
    Inactive,
    /// Both parties agreed to an encrypted channel; messages relay.
    Active,
}

/// Events that drive a session's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The responder accepted the encrypted channel.
    NegotiateAccept,
    /// The responder declined.
    NegotiateReject,
    /// Either party requested teardown.
    ExplicitEnd,
    /// Either party disconnected or was banned.
    PeerDeparted,
}

/// One transcript entry: a packet forwarded at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    /// Unix timestamp in milliseconds when the packet was forwarded.
    pub timestamp_ms: u64,
    /// The forwarded record, as parsed from the wire.
    pub packet: Value,
}

/// State of one nickname pair.
#[derive(Debug, Default)]
pub struct PairSession {
    status: SessionStatus,
    bytes_forwarded: u64,
    packets_forwarded: u64,
    transcript: Vec<TranscriptEntry>,
}

impl PairSession {
    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Cumulative wire bytes forwarded for this pair.
    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded
    }

    /// Cumulative packets forwarded for this pair.
    pub fn packets_forwarded(&self) -> u64 {
        self.packets_forwarded
    }

    /// The ordered transcript, oldest entry first.
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Apply a lifecycle event and return the new status.
    pub fn apply(&mut self, event: SessionEvent) -> SessionStatus {
        self.status = match (self.status, event) {
            (_, SessionEvent::NegotiateAccept) => SessionStatus::Active,
            (_, SessionEvent::NegotiateReject)
            | (_, SessionEvent::ExplicitEnd)
            | (_, SessionEvent::PeerDeparted) => SessionStatus::Inactive,
        };
        self.status
    }

    /// Record one successfully forwarded packet of any kind.
    pub fn record_transfer(&mut self, wire_len: usize, packet: Value, timestamp_ms: u64) {
        self.bytes_forwarded += wire_len as u64;
        self.packets_forwarded += 1;
        self.transcript.push(TranscriptEntry {
            timestamp_ms,
            packet,
        });
    }
}

/// Operator-facing summary of one pair session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// The canonical pair.
    pub pair: SessionKey,
    /// Current status.
    pub status: SessionStatus,
    /// Cumulative wire bytes forwarded.
    pub bytes_forwarded: u64,
    /// Cumulative packets forwarded.
    pub packets_forwarded: u64,
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
