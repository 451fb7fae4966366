//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::audit::{AuditRepository, AuditStore};
use crate::config::Config;
use crate::sync::{
    ClientRegistry, ConflictResolver, CredentialSource, RequestRelay, SyncClient, SyncService,
    TransportConfigurator,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    audit: Arc<dyn AuditStore>,
    relay: RequestRelay,
    resolver: ConflictResolver,
}

impl AppState {
    /// Wire the sync engine over `db`, resolving credentials through `credentials`
    pub fn new(config: &Config, db: SqlitePool, credentials: Arc<dyn CredentialSource>) -> Self {
        let settings = Arc::new(config.sync.clone());
        let clients = Arc::new(ClientRegistry::with_defaults());
        let configurator = TransportConfigurator::new(credentials, clients.clone());
        let audit: Arc<dyn AuditStore> = Arc::new(AuditRepository::new(db));

        let client = SyncClient::new(settings.clone(), clients, configurator.clone());
        let service = Arc::new(SyncService::new(client, audit.clone()));
        let relay = RequestRelay::new(settings.clone(), configurator);
        let resolver = ConflictResolver::new(
            audit.clone(),
            service,
            settings.general.local_instance_id.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                audit,
                relay,
                resolver,
            }),
        }
    }

    pub fn audit(&self) -> &Arc<dyn AuditStore> {
        &self.inner.audit
    }

    pub fn relay(&self) -> &RequestRelay {
        &self.inner.relay
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.inner.resolver
    }
}
