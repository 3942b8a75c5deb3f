//! Peer-to-peer wire messages for the Lamport engine.
//!
//! Each message is one self-describing JSON record per line. Only `Rel`
//! carries a payload — the releasing replica's full catalog snapshot.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

/// The three message kinds of the optimized Ricart–Agrawala protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Req,
    Ack,
    Rel,
}

/// A single peer message, as it travels the wire and as it is stored in
/// the peer-state table `T`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub from: u32,
    #[serde(default)]
    pub to: Vec<u32>,
    pub stamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Catalog>,
}

impl Message {
    pub fn req(from: u32, to: Vec<u32>, stamp: u64) -> Self {
        Message {
            kind: MessageKind::Req,
            from,
            to,
            stamp,
            payload: None,
        }
    }

    pub fn ack(from: u32, to: u32, stamp: u64) -> Self {
        Message {
            kind: MessageKind::Ack,
            from,
            to: vec![to],
            stamp,
            payload: None,
        }
    }

    pub fn rel(from: u32, to: Vec<u32>, stamp: u64, payload: Catalog) -> Self {
        Message {
            kind: MessageKind::Rel,
            from,
            to,
            stamp,
            payload: Some(payload),
        }
    }

    /// Encode as a single newline-terminated wire line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut s = serde_json::to_string(self)?;
        s.push('\n');
        Ok(s)
    }

    /// Decode a single wire line (trailing newline optional).
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_round_trips() {
        let m = Message::req(1, vec![2, 3], 5);
        let line = m.to_line().unwrap();
        let back = Message::from_line(&line).unwrap();
        assert_eq!(back.kind, MessageKind::Req);
        assert_eq!(back.from, 1);
        assert_eq!(back.stamp, 5);
        assert!(back.payload.is_none());
    }

    #[test]
    fn rel_carries_payload() {
        let mut catalog = Catalog::new();
        catalog.insert(
            1,
            crate::catalog::Event {
                name: "x".into(),
                closed: false,
                creator_id: 1,
                jobs: Default::default(),
            },
        );
        let m = Message::rel(2, vec![1, 3], 9, catalog.clone());
        let line = m.to_line().unwrap();
        let back = Message::from_line(&line).unwrap();
        assert_eq!(back.kind, MessageKind::Rel);
        assert_eq!(back.payload.unwrap().len(), catalog.len());
    }
}
