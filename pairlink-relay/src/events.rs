//! Operator-facing lifecycle event feed.
//!
//! A bounded ring buffer of connect/disconnect/ban events, polled by the
//! operator console via `GET /events?since=SEQ`.

use serde::Serialize;
use std::collections::VecDeque;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A nickname completed a presence handshake.
    Connect,
    /// A nickname's connection ended.
    Disconnect,
    /// A nickname was banned.
    Ban,
}

/// One lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Monotonic sequence number, starting at 1 for process lifetime.
    pub seq: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// What happened.
    pub kind: EventKind,
    /// The nickname involved.
    pub nick: String,
}

/// Bounded ring buffer of lifecycle events.
#[derive(Debug)]
pub struct EventLog {
    buf: VecDeque<EventRecord>,
    capacity: usize,
    next_seq: u64,
}

impl EventLog {
    /// Create a log holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 1,
        }
    }

    /// Append an event, evicting the oldest when full. Returns its sequence
    /// number.
    pub fn push(&mut self, kind: EventKind, nick: &str, timestamp_ms: u64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(EventRecord {
            seq,
            timestamp_ms,
            kind,
            nick: nick.to_string(),
        });
        seq
    }

    /// Events with a sequence number greater than `since`, oldest first.
    pub fn since(&self, since: u64) -> Vec<EventRecord> {
        self.buf.iter().filter(|e| e.seq > since).cloned().collect()
    }

    /// Sequence number of the newest event, or 0 if none were ever pushed.
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }
}
