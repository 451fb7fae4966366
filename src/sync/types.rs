//! Sync data types
//!
//! Defines the values describing one push or pull:
//! - Peer roles and actions
//! - Push payloads
//! - Peer responses

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the parent/child pair is being addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeerRole {
    Parent,
    Child,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRole::Parent => write!(f, "parent"),
            PeerRole::Child => write!(f, "child"),
        }
    }
}

/// Change that originated the sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncAction {
    Created,
    Updated,
    Voided,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "CREATED",
            SyncAction::Updated => "UPDATED",
            SyncAction::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized action name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for SyncAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(SyncAction::Created),
            "UPDATED" => Ok(SyncAction::Updated),
            "VOIDED" => Ok(SyncAction::Voided),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// Direction of a one-resource transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncDirection {
    /// Child copy is sent to the parent
    Push,
    /// Parent copy is written into the child
    Pull,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Push => "PUSH",
            SyncDirection::Pull => "PULL",
        }
    }

    /// Role the resource is read from
    pub fn source(&self) -> PeerRole {
        match self {
            SyncDirection::Push => PeerRole::Child,
            SyncDirection::Pull => PeerRole::Parent,
        }
    }

    /// Role the resource is written to
    pub fn target(&self) -> PeerRole {
        match self {
            SyncDirection::Push => PeerRole::Parent,
            SyncDirection::Pull => PeerRole::Child,
        }
    }
}

/// What a push carries: a full representation, or the identifier of a voided resource
#[derive(Debug, Clone, PartialEq)]
pub enum PushPayload {
    Object(Value),
    Identifier(String),
}

impl PushPayload {
    /// Identifier for a delete: the string itself, or the object's `uuid`
    pub fn identifier(&self) -> Option<&str> {
        match self {
            PushPayload::Identifier(uuid) => Some(uuid),
            PushPayload::Object(value) => value.get("uuid").and_then(Value::as_str),
        }
    }
}

/// Status and body returned by a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerResponse {
    pub status: u16,
    pub body: String,
}

impl PeerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
