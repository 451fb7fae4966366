//! Receiving side of the sync2 endpoints
//!
//! A peer sends an [`Envelope`] to `/sync2/{get,post,put,delete}`. Once the
//! caller is authenticated and its instance admitted by the whitelist, the
//! inner request is replayed against the local record API with local
//! credentials and the answer is handed back untouched.

use std::sync::Arc;

use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::envelope::{Envelope, HttpMethod};
use super::transport::TransportConfigurator;
use super::types::{PeerResponse, PeerRole};
use crate::config::SyncConfig;
use crate::error::{CodecError, SyncError};

/// Which of the four receiving endpoints was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEndpoint {
    Get,
    Post,
    Put,
    Delete,
}

impl RelayEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayEndpoint::Get => "get",
            RelayEndpoint::Post => "post",
            RelayEndpoint::Put => "put",
            RelayEndpoint::Delete => "delete",
        }
    }

    /// Inner methods a sender may route through this endpoint
    fn accepts(&self, method: HttpMethod) -> bool {
        match self {
            RelayEndpoint::Get => method == HttpMethod::Get,
            // REST updates are POSTed to the resource
            RelayEndpoint::Post | RelayEndpoint::Put => {
                matches!(method, HttpMethod::Post | HttpMethod::Put)
            }
            RelayEndpoint::Delete => method == HttpMethod::Delete,
        }
    }
}

#[derive(Clone)]
pub struct RequestRelay {
    settings: Arc<SyncConfig>,
    configurator: TransportConfigurator,
}

impl RequestRelay {
    pub fn new(settings: Arc<SyncConfig>, configurator: TransportConfigurator) -> Self {
        Self {
            settings,
            configurator,
        }
    }

    /// An authenticated operator, from an instance the whitelist admits
    pub fn is_request_authenticated(&self, user: Option<&str>, envelope: &Envelope) -> bool {
        user.is_some() && self.settings.whitelist.admits(&envelope.instance_id)
    }

    /// Username of a basic `Authorization` header matching the local credentials
    pub fn authenticated_user(&self, authorization: Option<&str>) -> Result<Option<String>, SyncError> {
        let Some((username, password)) = authorization.and_then(decode_basic) else {
            return Ok(None);
        };
        let local = self.configurator.credentials().credentials(PeerRole::Child)?;
        if username == local.username && password == local.password {
            Ok(Some(username))
        } else {
            tracing::warn!("Rejected sync2 credentials for user {}", username);
            Ok(None)
        }
    }

    /// Whether `url` points into this instance's record API
    pub fn is_local_target(&self, url: &str) -> bool {
        let Some(base) = self.settings.general.base_url(PeerRole::Child) else {
            return false;
        };
        url.strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    }

    /// Replay the envelope's request locally
    ///
    /// Peer statuses, errors included, are passed through as a response.
    pub async fn relay(&self, endpoint: RelayEndpoint, envelope: &Envelope) -> Result<PeerResponse, SyncError> {
        let request = envelope.reconstruct_request()?;
        if !endpoint.accepts(request.method) {
            return Err(SyncError::InvalidPayload(format!(
                "{:?} request sent to the {} endpoint",
                request.method,
                endpoint.as_str()
            )));
        }

        let transport = self.configurator.configure(&envelope.client_name, PeerRole::Child)?;
        let mut builder = transport
            .http_client()?
            .request(request.method.to_reqwest(), &request.url);
        for (name, value) in &request.headers {
            if !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(CodecError::from)?;
            builder = builder
                .header(CONTENT_TYPE, transport.content_type())
                .body(bytes);
        }

        tracing::debug!(
            "Relaying {:?} {} from instance {}",
            request.method,
            request.url,
            envelope.instance_id
        );
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(PeerResponse { status, body })
    }
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
