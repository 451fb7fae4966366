//! Transport configuration
//!
//! Credentials are resolved per operation and baked into a freshly built
//! `reqwest::Client`, so concurrent operations never share a mutable
//! transport and a credential change applies on the next call.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};

use super::client_helper::ClientRegistry;
use super::types::PeerRole;
use crate::error::SyncError;

/// Username/password pair for one peer role
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Basic <base64(user:password)>`
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Supplies credentials at call time
pub trait CredentialSource: Send + Sync {
    fn credentials(&self, role: PeerRole) -> Result<Credentials, SyncError>;
}

/// Reads `SYNC2_{LOCAL,PARENT}_{USERNAME,PASSWORD}` on every call
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialSource;

impl EnvCredentialSource {
    fn keys(role: PeerRole) -> (&'static str, &'static str) {
        match role {
            PeerRole::Parent => ("SYNC2_PARENT_USERNAME", "SYNC2_PARENT_PASSWORD"),
            PeerRole::Child => ("SYNC2_LOCAL_USERNAME", "SYNC2_LOCAL_PASSWORD"),
        }
    }
}

impl CredentialSource for EnvCredentialSource {
    fn credentials(&self, role: PeerRole) -> Result<Credentials, SyncError> {
        let (user_key, password_key) = Self::keys(role);
        match (env::var(user_key), env::var(password_key)) {
            (Ok(username), Ok(password)) if !username.is_empty() => {
                Ok(Credentials::new(username, password))
            }
            _ => Err(SyncError::MissingCredentials(role)),
        }
    }
}

/// Fixed credentials per role
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    by_role: HashMap<PeerRole, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: PeerRole, credentials: Credentials) -> Self {
        self.by_role.insert(role, credentials);
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self, role: PeerRole) -> Result<Credentials, SyncError> {
        self.by_role
            .get(&role)
            .cloned()
            .ok_or(SyncError::MissingCredentials(role))
    }
}

/// Header-level decoration of an outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interceptor {
    BasicAuth(Credentials),
    Header { name: String, value: String },
}

impl Interceptor {
    fn apply(&self, headers: &mut HeaderMap) -> Result<(), SyncError> {
        let (name, value) = match self {
            Interceptor::BasicAuth(credentials) => {
                (AUTHORIZATION, credentials.basic_header())
            }
            Interceptor::Header { name, value } => {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    SyncError::MissingConfiguration(format!("invalid header name {name}: {e}"))
                })?;
                (name, value.clone())
            }
        };
        let mut value = HeaderValue::from_str(&value).map_err(|e| {
            SyncError::MissingConfiguration(format!("invalid header value for {name}: {e}"))
        })?;
        if name == AUTHORIZATION {
            value.set_sensitive(true);
        }
        headers.insert(name, value);
        Ok(())
    }
}

/// Payload encodings a transport understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadConverter {
    Json,
    FhirJson,
    Envelope,
}

impl PayloadConverter {
    pub fn media_type(&self) -> &'static str {
        match self {
            PayloadConverter::Json | PayloadConverter::Envelope => "application/json",
            PayloadConverter::FhirJson => "application/fhir+json",
        }
    }
}

/// Interceptors and converters for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub interceptors: Vec<Interceptor>,
    pub converters: Vec<PayloadConverter>,
}

impl TransportConfig {
    /// Media type used for inner request bodies
    pub fn content_type(&self) -> &'static str {
        self.converters
            .iter()
            .find(|c| **c != PayloadConverter::Envelope)
            .unwrap_or(&PayloadConverter::Json)
            .media_type()
    }

    pub fn default_headers(&self) -> Result<HeaderMap, SyncError> {
        let mut headers = HeaderMap::new();
        for interceptor in &self.interceptors {
            interceptor.apply(&mut headers)?;
        }

        let mut accepted: Vec<&str> = self.converters.iter().map(|c| c.media_type()).collect();
        accepted.dedup();
        if !accepted.is_empty() {
            let accept = HeaderValue::from_str(&accepted.join(", ")).map_err(|e| {
                SyncError::MissingConfiguration(format!("invalid accept header: {e}"))
            })?;
            headers.insert(ACCEPT, accept);
        }
        Ok(headers)
    }

    /// A client owned by the calling operation only
    pub fn http_client(&self) -> Result<reqwest::Client, SyncError> {
        Ok(reqwest::Client::builder()
            .default_headers(self.default_headers()?)
            .build()?)
    }
}

/// Builds a [`TransportConfig`] for a client profile and peer role
#[derive(Clone)]
pub struct TransportConfigurator {
    credentials: Arc<dyn CredentialSource>,
    clients: Arc<ClientRegistry>,
}

impl TransportConfigurator {
    pub fn new(credentials: Arc<dyn CredentialSource>, clients: Arc<ClientRegistry>) -> Self {
        Self {
            credentials,
            clients,
        }
    }

    pub fn configure(&self, client_profile: &str, role: PeerRole) -> Result<TransportConfig, SyncError> {
        let helper = self.clients.get(client_profile)?;
        let credentials = self.credentials.credentials(role)?;

        let mut converters = helper.converters();
        converters.push(PayloadConverter::Envelope);

        Ok(TransportConfig {
            interceptors: helper.interceptors(&credentials),
            converters,
        })
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialSource> {
        &self.credentials
    }
}
