//! One-resource transfers between the child and its parent
//!
//! A transfer pulls the source and target copies, lets [`MergeBehaviour`]
//! decide, pushes when needed and always ends with a persisted audit message.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::category::Category;
use super::client::SyncClient;
use super::merge::{MergeBehaviour, MergeDecision};
use super::types::{PeerResponse, PeerRole, PushPayload, SyncAction, SyncDirection};
use crate::audit::{AuditMessage, AuditStore, PushOutcome};
use crate::error::{Result, SyncError};

/// Identifier of a resource: last path segment of any of its links
pub fn extract_uuid(resource_links: &BTreeMap<String, String>) -> Option<String> {
    resource_links.values().find_map(|link| {
        link.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(String::from)
    })
}

/// Operator-approved representation to overwrite the parent with
#[derive(Debug, Clone)]
pub struct ForcePushRequest {
    pub entity: Value,
    pub resource_name: String,
    pub resource_links: BTreeMap<String, String>,
    pub action: String,
    pub uuid: Option<String>,
}

/// Push that ignores prior divergence
#[async_trait]
pub trait ForcePush: Send + Sync {
    async fn merge_force_push(&self, request: &ForcePushRequest) -> PushOutcome;
}

enum Transfer {
    Pushed(Option<PeerResponse>),
    Decided(MergeDecision),
}

pub struct SyncService {
    client: SyncClient,
    audit: Arc<dyn AuditStore>,
}

impl SyncService {
    pub fn new(client: SyncClient, audit: Arc<dyn AuditStore>) -> Self {
        Self { client, audit }
    }

    /// Send the child's copy of a resource to the parent
    pub async fn push_object(
        &self,
        category: Category,
        resource_links: &BTreeMap<String, String>,
        action: &str,
        base: Option<&Value>,
    ) -> Result<AuditMessage> {
        self.transfer(SyncDirection::Push, category, resource_links, action, base)
            .await
    }

    /// Write the parent's copy of a resource into the child
    pub async fn pull_object(
        &self,
        category: Category,
        resource_links: &BTreeMap<String, String>,
        action: &str,
        base: Option<&Value>,
    ) -> Result<AuditMessage> {
        self.transfer(SyncDirection::Pull, category, resource_links, action, base)
            .await
    }

    async fn transfer(
        &self,
        direction: SyncDirection,
        category: Category,
        resource_links: &BTreeMap<String, String>,
        action: &str,
        base: Option<&Value>,
    ) -> Result<AuditMessage> {
        let general = &self.client.settings().general;
        let mut audit = AuditMessage::new(
            direction,
            category.as_str(),
            action,
            resource_links.clone(),
            &general.local_instance_id,
        );

        let outcome = match self.preferred_link(resource_links) {
            Some((client_profile, path)) => {
                audit.used_resource_url = Some(path.to_string());
                audit.local_url = self.full_url(PeerRole::Child, path).ok();
                audit.parent_url = self.full_url(PeerRole::Parent, path).ok();
                self.run_transfer(direction, category, client_profile, path, resource_links, action, base)
                    .await
            }
            None => Err(SyncError::MissingConfiguration(
                "resource has no URL for any registered client".to_string(),
            )),
        };

        match outcome {
            Ok(Transfer::Pushed(response)) => audit.record(&Ok(response)),
            Ok(Transfer::Decided(MergeDecision::Conflict)) => {
                audit.mark_conflict(format!(
                    "{} and {} copies diverged since the last sync",
                    direction.source(),
                    direction.target()
                ));
            }
            Ok(Transfer::Decided(decision)) => {
                audit.success = decision != MergeDecision::Absent;
                audit.details = Some(match decision {
                    MergeDecision::Absent => format!("Resource not found on the {}", direction.source()),
                    MergeDecision::InSync => "Resource already in sync".to_string(),
                    _ => format!("The {} copy is newer, nothing sent", direction.target()),
                });
            }
            Err(e) => audit.record(&Err(e)),
        }

        if audit.success {
            tracing::info!("{} {} {}: {}", direction.as_str(), category, action, audit.id);
        } else {
            tracing::error!(
                "{} {} {} failed: {}",
                direction.as_str(),
                category,
                action,
                audit.details.as_deref().unwrap_or_default()
            );
        }

        self.audit.save(&audit).await?;
        Ok(audit)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_transfer(
        &self,
        direction: SyncDirection,
        category: Category,
        client_profile: &str,
        path: &str,
        resource_links: &BTreeMap<String, String>,
        action: &str,
        base: Option<&Value>,
    ) -> std::result::Result<Transfer, SyncError> {
        let source_url = self.full_url(direction.source(), path)?;
        let target_url = self.full_url(direction.target(), path)?;

        if action.parse::<SyncAction>().ok() == Some(SyncAction::Voided) {
            let uuid = extract_uuid(resource_links)
                .ok_or_else(|| SyncError::InvalidPayload("resource links carry no identifier".to_string()))?;
            let response = self
                .client
                .push(
                    category,
                    PushPayload::Identifier(uuid),
                    client_profile,
                    &target_url,
                    action,
                    direction.target(),
                )
                .await?;
            return Ok(Transfer::Pushed(response));
        }

        let binding = self.client.clients().resolve(client_profile, category)?;
        let source = self
            .client
            .pull(category, client_profile, &source_url, direction.source())
            .await?
            .map(|r| r.into_body());
        let target = self
            .client
            .pull(category, client_profile, &target_url, direction.target())
            .await?
            .map(|r| r.into_body());

        let decision = MergeBehaviour::new(&binding).decide(source.as_ref(), target.as_ref(), base);
        match (decision, source) {
            (MergeDecision::Push, Some(source)) => {
                let response = self
                    .client
                    .push(
                        category,
                        PushPayload::Object(source),
                        client_profile,
                        &target_url,
                        action,
                        direction.target(),
                    )
                    .await?;
                Ok(Transfer::Pushed(response))
            }
            (decision, _) => Ok(Transfer::Decided(decision)),
        }
    }

    /// Link of the preferred client profile, else the first registered one
    fn preferred_link<'l>(&self, resource_links: &'l BTreeMap<String, String>) -> Option<(&'l str, &'l str)> {
        let preferred = &self.client.settings().general.preferred_client;
        resource_links
            .get_key_value(preferred)
            .or_else(|| {
                resource_links
                    .iter()
                    .find(|(client, _)| self.client.clients().get(client).is_ok())
            })
            .map(|(client, path)| (client.as_str(), path.as_str()))
    }

    fn full_url(&self, role: PeerRole, path: &str) -> std::result::Result<String, SyncError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        let base = self
            .client
            .settings()
            .general
            .base_url(role)
            .ok_or_else(|| SyncError::MissingConfiguration(format!("base URL of the {role} instance")))?;
        Ok(format!("{}/{}", base, path.trim_start_matches('/')))
    }
}

#[async_trait]
impl ForcePush for SyncService {
    async fn merge_force_push(&self, request: &ForcePushRequest) -> PushOutcome {
        let category: Category = request.resource_name.parse()?;
        let (client_profile, path) = self
            .preferred_link(&request.resource_links)
            .ok_or_else(|| SyncError::MissingConfiguration("conflict has no resource URL".to_string()))?;
        let target_url = self.full_url(PeerRole::Parent, path)?;

        let payload = if request.action.parse::<SyncAction>().ok() == Some(SyncAction::Voided) {
            let uuid = request
                .uuid
                .clone()
                .or_else(|| extract_uuid(&request.resource_links))
                .ok_or_else(|| SyncError::InvalidPayload("no identifier to void".to_string()))?;
            PushPayload::Identifier(uuid)
        } else {
            PushPayload::Object(request.entity.clone())
        };

        tracing::info!("Forced push of {} {} to {}", category, request.action, target_url);
        self.client
            .push(
                category,
                payload,
                client_profile,
                &target_url,
                &request.action,
                PeerRole::Parent,
            )
            .await
    }
}
