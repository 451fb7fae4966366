//! Parent/child synchronization engine
//!
//! This module provides:
//! - The envelope wrapping every cross-instance request
//! - Client profiles resolving categories to request builders
//! - Per-operation transport configuration
//! - The push/pull client and the one-resource sync service
//! - Normalization and equivalence of resource representations
//! - The operator conflict resolution workflow
//! - The receiving side relay

mod category;
mod client;
mod client_helper;
mod conflict;
pub mod date;
mod envelope;
mod equivalence;
mod merge;
mod normalize;
mod relay;
mod service;
mod transport;
mod types;

pub use category::Category;
pub use client::{SyncClient, SYNC2_REST_ENDPOINT};
pub use client_helper::{
    CategoryBinding, ClientHelper, ClientRegistry, FhirClientHelper, RestClientHelper,
    FHIR_CLIENT, REST_CLIENT,
};
pub use conflict::{ConflictResolver, ResolutionOutcome, AUDIT_LIST_URL};
pub use envelope::{Envelope, HttpMethod, RequestDescriptor, Resource, ResourceKind};
pub use equivalence::{equivalent, IGNORED_KEYS};
pub use merge::{MergeBehaviour, MergeDecision};
pub use normalize::{normalize, normalize_for_url};
pub use relay::{RelayEndpoint, RequestRelay};
pub use service::{extract_uuid, ForcePush, ForcePushRequest, SyncService};
pub use transport::{
    CredentialSource, Credentials, EnvCredentialSource, Interceptor, PayloadConverter,
    StaticCredentials, TransportConfig, TransportConfigurator,
};
pub use types::{PeerResponse, PeerRole, PushPayload, SyncAction, SyncDirection};
