//! Audit message types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;
use crate::sync::{PeerResponse, SyncDirection};

/// Outcome of one push, as seen by the audit trail
pub type PushOutcome = Result<Option<PeerResponse>, SyncError>;

/// Persisted record of one sync attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMessage {
    pub id: String,
    /// Category name of the synced resource
    pub resource_name: String,
    pub action: String,
    pub operation: SyncDirection,
    pub success: bool,
    #[serde(with = "crate::sync::date::required")]
    pub timestamp: DateTime<Utc>,
    /// Resource path per client profile
    pub available_resource_urls: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_resource_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub creator_instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_conflict_uuid: Option<String>,
    /// Audit message that followed up on this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_audit: Option<String>,
}

impl AuditMessage {
    /// A fresh, not yet successful attempt
    pub fn new(
        operation: SyncDirection,
        resource_name: &str,
        action: &str,
        available_resource_urls: BTreeMap<String, String>,
        creator_instance_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            resource_name: resource_name.to_string(),
            action: action.to_string(),
            operation,
            success: false,
            timestamp: Utc::now(),
            available_resource_urls,
            used_resource_url: None,
            parent_url: None,
            local_url: None,
            details: None,
            creator_instance_id: creator_instance_id.to_string(),
            merge_conflict_uuid: None,
            next_audit: None,
        }
    }

    /// Fill success and details from a push outcome
    pub fn record(&mut self, outcome: &PushOutcome) {
        match outcome {
            Ok(Some(response)) => {
                self.success = response.is_success();
                self.details = Some(format!("{}: {}", response.status, response.body));
            }
            Ok(None) => {
                self.success = false;
                self.details = Some("No request was dispatched".to_string());
            }
            Err(e) => {
                self.success = false;
                self.details = Some(e.to_string());
            }
        }
    }

    /// Mark this attempt as an unresolved merge conflict
    pub fn mark_conflict(&mut self, details: impl Into<String>) {
        self.success = false;
        self.merge_conflict_uuid = Some(Uuid::new_v4().to_string());
        self.details = Some(details.into());
    }
}

/// Lifecycle of a recorded merge conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictState {
    Open,
    Resolved,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> AuditMessage {
        let links = BTreeMap::from([(
            "rest".to_string(),
            "/ws/rest/v1/patient/1234".to_string(),
        )]);
        AuditMessage::new(SyncDirection::Push, "patient", "UPDATED", links, "child-1")
    }

    #[test]
    fn test_record_outcomes() {
        let mut audit = message();
        audit.record(&Ok(Some(PeerResponse {
            status: 200,
            body: "{}".to_string(),
        })));
        assert!(audit.success);

        audit.record(&Ok(None));
        assert!(!audit.success);

        audit.record(&Err(SyncError::Transport {
            status: 500,
            body: "down".to_string(),
        }));
        assert!(!audit.success);
        assert!(audit.details.as_deref().unwrap().contains("down"));
    }

    #[test]
    fn test_mark_conflict_assigns_uuid() {
        let mut audit = message();
        audit.mark_conflict("diverged");
        assert!(!audit.success);
        assert!(audit.merge_conflict_uuid.is_some());
    }

    #[test]
    fn test_serialization_shape() {
        let value = serde_json::to_value(message()).unwrap();
        assert_eq!(value["resourceName"], "patient");
        assert_eq!(value["operation"], "PUSH");
        assert_eq!(value["availableResourceUrls"]["rest"], "/ws/rest/v1/patient/1234");
        assert!(value.get("nextAudit").is_none());
    }
}
