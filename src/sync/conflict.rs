//! Operator-driven conflict resolution
//!
//! An operator submits a replacement representation for an open conflict.
//! The representation is force-pushed to the parent and the attempt is
//! persisted and chained behind the audit message that recorded the
//! conflict, whatever the outcome.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::Mutex;

use super::service::{extract_uuid, ForcePush, ForcePushRequest};
use super::types::SyncDirection;
use crate::audit::{AuditMessage, AuditStore, ConflictState, PushOutcome};
use crate::error::{Result, SyncError};

/// Page listing the audit trail, returned once a resolution is accepted
pub const AUDIT_LIST_URL: &str = "/sync2/auditList.page";

#[derive(Debug)]
pub enum ResolutionOutcome {
    /// The forced push succeeded and the conflict is resolved
    Accepted(AuditMessage),
    /// The forced push failed; the conflict stays open
    Failed(AuditMessage),
    /// The operator payload is not a JSON object
    Malformed(String),
    NotFound,
    AlreadyResolved,
}

pub struct ConflictResolver {
    audit: Arc<dyn AuditStore>,
    pusher: Arc<dyn ForcePush>,
    instance_id: String,
    /// One lock per conflict being resolved
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConflictResolver {
    pub fn new(audit: Arc<dyn AuditStore>, pusher: Arc<dyn ForcePush>, instance_id: impl Into<String>) -> Self {
        Self {
            audit,
            pusher,
            instance_id: instance_id.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Force-push `payload` for the conflict `conflict_uuid`
    ///
    /// Only store failures are returned as errors. Push failures, including
    /// panics inside the push, become a persisted failed attempt.
    pub async fn resolve(&self, conflict_uuid: &str, payload: &str) -> Result<ResolutionOutcome> {
        let entity = match serde_json::from_str::<Value>(payload) {
            Ok(entity @ Value::Object(_)) => entity,
            Ok(_) => return Ok(ResolutionOutcome::Malformed("expected a JSON object".to_string())),
            Err(e) => return Ok(ResolutionOutcome::Malformed(e.to_string())),
        };

        let lock = self.conflict_lock(conflict_uuid).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.resolve_locked(conflict_uuid, entity).await
        };
        self.release_lock(conflict_uuid, lock).await;
        outcome
    }

    async fn conflict_lock(&self, conflict_uuid: &str) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .await
            .entry(conflict_uuid.to_string())
            .or_default()
            .clone()
    }

    async fn release_lock(&self, conflict_uuid: &str, lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        drop(lock);
        // only the map still holds it
        if in_flight
            .get(conflict_uuid)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            in_flight.remove(conflict_uuid);
        }
    }

    async fn resolve_locked(&self, conflict_uuid: &str, entity: Value) -> Result<ResolutionOutcome> {
        let Some(original) = self.audit.get_by_merge_conflict_uuid(conflict_uuid).await? else {
            return Ok(ResolutionOutcome::NotFound);
        };
        if self.audit.conflict_state(conflict_uuid).await? == Some(ConflictState::Resolved) {
            return Ok(ResolutionOutcome::AlreadyResolved);
        }

        let request = ForcePushRequest {
            entity,
            resource_name: original.resource_name.clone(),
            resource_links: original.available_resource_urls.clone(),
            action: original.action.clone(),
            uuid: extract_uuid(&original.available_resource_urls),
        };
        let outcome: PushOutcome = AssertUnwindSafe(self.pusher.merge_force_push(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SyncError::Unexpected(panic_message(panic))));

        let mut attempt = AuditMessage::new(
            SyncDirection::Push,
            &original.resource_name,
            &original.action,
            original.available_resource_urls.clone(),
            &self.instance_id,
        );
        attempt.used_resource_url = original.used_resource_url.clone();
        attempt.parent_url = original.parent_url.clone();
        attempt.local_url = original.local_url.clone();
        attempt.record(&outcome);
        if attempt.success {
            attempt.merge_conflict_uuid = Some(conflict_uuid.to_string());
        }

        self.audit.save(&attempt).await?;
        self.audit.set_next_audit(&original, &attempt).await?;

        if attempt.success {
            tracing::info!("Conflict {} resolved by {}", conflict_uuid, attempt.id);
            Ok(ResolutionOutcome::Accepted(attempt))
        } else {
            tracing::error!(
                "Resolution of conflict {} failed: {}",
                conflict_uuid,
                attempt.details.as_deref().unwrap_or_default()
            );
            Ok(ResolutionOutcome::Failed(attempt))
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "forced push panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditRepository;
    use crate::db::create_memory_pool;
    use crate::sync::types::PeerResponse;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    enum Behaviour {
        Succeed,
        SlowSucceed,
        Fail,
        Panic,
    }

    struct MockPusher {
        behaviour: Behaviour,
        received: Mutex<Vec<ForcePushRequest>>,
    }

    impl MockPusher {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ForcePush for MockPusher {
        async fn merge_force_push(&self, request: &ForcePushRequest) -> PushOutcome {
            self.received.lock().unwrap().push(request.clone());
            match self.behaviour {
                Behaviour::Succeed => Ok(Some(PeerResponse {
                    status: 200,
                    body: "{}".to_string(),
                })),
                Behaviour::SlowSucceed => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Ok(Some(PeerResponse {
                        status: 200,
                        body: "{}".to_string(),
                    }))
                }
                Behaviour::Fail => Err(SyncError::Transport {
                    status: 500,
                    body: "parent rejected".to_string(),
                }),
                Behaviour::Panic => panic!("serializer blew up"),
            }
        }
    }

    async fn setup(pusher: Arc<MockPusher>) -> (ConflictResolver, Arc<AuditRepository>, AuditMessage) {
        let store = Arc::new(AuditRepository::new(create_memory_pool().await.unwrap()));
        let links = BTreeMap::from([(
            "rest".to_string(),
            "/ws/rest/v1/patient/1234".to_string(),
        )]);
        let mut original =
            AuditMessage::new(SyncDirection::Push, "patient", "UPDATED", links, "child-1");
        original.mark_conflict("diverged");
        store.save(&original).await.unwrap();

        let resolver = ConflictResolver::new(store.clone(), pusher, "child-1");
        (resolver, store, original)
    }

    const PAYLOAD: &str = r#"{"uuid": "1234", "gender": "F"}"#;

    #[tokio::test]
    async fn test_successful_resolution_links_and_stamps() {
        let pusher = MockPusher::new(Behaviour::Succeed);
        let (resolver, store, original) = setup(pusher.clone()).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        let outcome = resolver.resolve(&conflict_uuid, PAYLOAD).await.unwrap();
        let ResolutionOutcome::Accepted(attempt) = outcome else {
            panic!("expected acceptance");
        };

        assert_eq!(attempt.merge_conflict_uuid.as_deref(), Some(conflict_uuid.as_str()));
        assert!(store.get(&attempt.id).await.unwrap().unwrap().success);
        let original = store.get(&original.id).await.unwrap().unwrap();
        assert_eq!(original.next_audit.as_deref(), Some(attempt.id.as_str()));
        assert_eq!(
            store.conflict_state(&conflict_uuid).await.unwrap(),
            Some(ConflictState::Resolved)
        );

        let received = pusher.received.lock().unwrap();
        assert_eq!(received[0].resource_name, "patient");
        assert_eq!(received[0].action, "UPDATED");
        assert_eq!(received[0].uuid.as_deref(), Some("1234"));
        assert_eq!(received[0].entity["gender"], "F");
    }

    #[tokio::test]
    async fn test_failed_resolution_is_persisted_and_linked() {
        let (resolver, store, original) = setup(MockPusher::new(Behaviour::Fail)).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        let outcome = resolver.resolve(&conflict_uuid, PAYLOAD).await.unwrap();
        let ResolutionOutcome::Failed(attempt) = outcome else {
            panic!("expected failure");
        };

        let stored = store.get(&attempt.id).await.unwrap().unwrap();
        assert!(!stored.success);
        assert!(stored.details.unwrap().contains("parent rejected"));
        let original = store.get(&original.id).await.unwrap().unwrap();
        assert_eq!(original.next_audit.as_deref(), Some(attempt.id.as_str()));
        assert_eq!(
            store.conflict_state(&conflict_uuid).await.unwrap(),
            Some(ConflictState::Open)
        );
    }

    #[tokio::test]
    async fn test_panicking_push_becomes_failed_attempt() {
        let (resolver, store, original) = setup(MockPusher::new(Behaviour::Panic)).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        let outcome = resolver.resolve(&conflict_uuid, PAYLOAD).await.unwrap();
        let ResolutionOutcome::Failed(attempt) = outcome else {
            panic!("expected failure");
        };
        assert!(attempt.details.unwrap().contains("serializer blew up"));
        assert!(store.get(&attempt.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retries_are_chained_in_order() {
        let store = Arc::new(AuditRepository::new(create_memory_pool().await.unwrap()));
        let links = BTreeMap::from([(
            "rest".to_string(),
            "/ws/rest/v1/obs/abcd".to_string(),
        )]);
        let mut original =
            AuditMessage::new(SyncDirection::Push, "observation", "UPDATED", links, "child-1");
        original.mark_conflict("diverged");
        store.save(&original).await.unwrap();
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        let failing = ConflictResolver::new(store.clone(), MockPusher::new(Behaviour::Fail), "child-1");
        let ResolutionOutcome::Failed(first) = failing.resolve(&conflict_uuid, PAYLOAD).await.unwrap() else {
            panic!("expected failure");
        };

        let passing = ConflictResolver::new(store.clone(), MockPusher::new(Behaviour::Succeed), "child-1");
        let ResolutionOutcome::Accepted(second) = passing.resolve(&conflict_uuid, PAYLOAD).await.unwrap() else {
            panic!("expected acceptance");
        };

        let chain: Vec<String> = store
            .chain(&original.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(chain, vec![original.id, first.id, second.id]);
    }

    #[tokio::test]
    async fn test_resolved_conflict_is_not_pushed_again() {
        let pusher = MockPusher::new(Behaviour::Succeed);
        let (resolver, _, original) = setup(pusher.clone()).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        resolver.resolve(&conflict_uuid, PAYLOAD).await.unwrap();
        let outcome = resolver.resolve(&conflict_uuid, PAYLOAD).await.unwrap();

        assert!(matches!(outcome, ResolutionOutcome::AlreadyResolved));
        assert_eq!(pusher.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_push_once() {
        let pusher = MockPusher::new(Behaviour::SlowSucceed);
        let (resolver, store, original) = setup(pusher.clone()).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        let (a, b) = tokio::join!(
            resolver.resolve(&conflict_uuid, PAYLOAD),
            resolver.resolve(&conflict_uuid, PAYLOAD)
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let accepted = outcomes
            .iter()
            .filter(|o| matches!(o, ResolutionOutcome::Accepted(_)))
            .count();
        let refused = outcomes
            .iter()
            .filter(|o| matches!(o, ResolutionOutcome::AlreadyResolved))
            .count();
        assert_eq!((accepted, refused), (1, 1));
        assert_eq!(pusher.received.lock().unwrap().len(), 1);
        assert_eq!(store.chain(&original.id).await.unwrap().len(), 2);
        assert!(resolver.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_and_unknown_conflict() {
        let pusher = MockPusher::new(Behaviour::Succeed);
        let (resolver, _, original) = setup(pusher.clone()).await;
        let conflict_uuid = original.merge_conflict_uuid.clone().unwrap();

        assert!(matches!(
            resolver.resolve(&conflict_uuid, "{not json").await.unwrap(),
            ResolutionOutcome::Malformed(_)
        ));
        assert!(matches!(
            resolver.resolve(&conflict_uuid, "[1, 2]").await.unwrap(),
            ResolutionOutcome::Malformed(_)
        ));
        assert!(matches!(
            resolver.resolve("no-such-conflict", PAYLOAD).await.unwrap(),
            ResolutionOutcome::NotFound
        ));
        assert!(pusher.received.lock().unwrap().is_empty());
    }
}
