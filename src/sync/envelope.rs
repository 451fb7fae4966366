//! Cross-instance request envelope
//!
//! Every outbound call wraps the category-specific request in an [`Envelope`]
//! stamped with the issuing instance. The receiving peer rebuilds the body as
//! the [`ResourceKind`] the envelope declares; unknown kinds are rejected while
//! decoding instead of being looked up by name.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// HTTP verb of the inner request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Method, target URL and body of the request the peer should perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    /// When the request was built
    #[serde(default, with = "crate::sync::date::optional")]
    pub issued: Option<DateTime<Utc>>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body,
            // the wire format carries milliseconds
            issued: Some(Utc::now().trunc_subsecs(3)),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// Closed set of types a request body can be reconstructed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Generic REST representation, any JSON object
    SimpleObject,
    Patient,
    Observation,
    Encounter,
    Location,
    Person,
    AllergyIntolerance,
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::SimpleObject => "SimpleObject",
            ResourceKind::Patient => "Patient",
            ResourceKind::Observation => "Observation",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Location => "Location",
            ResourceKind::Person => "Person",
            ResourceKind::AllergyIntolerance => "AllergyIntolerance",
        }
    }

    /// FHIR `resourceType` this kind must carry, if any
    fn fhir_resource_type(&self) -> Option<&'static str> {
        match self {
            ResourceKind::SimpleObject => None,
            other => Some(other.type_name()),
        }
    }

    /// Rebuild `body` as this kind
    pub fn reconstruct(self, body: Value) -> Result<Resource, CodecError> {
        let object = body
            .as_object()
            .ok_or(CodecError::NotAnObject(self.type_name()))?;

        if let Some(expected) = self.fhir_resource_type() {
            match object.get("resourceType").and_then(Value::as_str) {
                Some(found) if found == expected => {}
                Some(found) => {
                    return Err(CodecError::UnexpectedResourceType {
                        expected,
                        found: found.to_string(),
                    })
                }
                None => {
                    return Err(CodecError::UnexpectedResourceType {
                        expected,
                        found: "<none>".to_string(),
                    })
                }
            }
        }

        Ok(Resource { kind: self, body })
    }
}

/// A body that has been validated against its declared kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub body: Value,
}

impl Resource {
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// The serialized cross-instance request wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Instance that issued the request
    pub instance_id: String,
    pub request: RequestDescriptor,
    /// Client profile selecting the transport configuration
    pub client_name: String,
    /// Kind the body is reconstructed as on receipt
    pub target_type: ResourceKind,
}

impl Envelope {
    pub fn new(
        instance_id: impl Into<String>,
        request: RequestDescriptor,
        client_name: impl Into<String>,
        target_type: ResourceKind,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            request,
            client_name: client_name.into(),
            target_type,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The inner request with its body rebuilt as `target_type`
    ///
    /// An absent or null body is left absent.
    pub fn reconstruct_request(&self) -> Result<RequestDescriptor, CodecError> {
        let mut request = self.request.clone();
        request.body = match request.body.take() {
            None | Some(Value::Null) => None,
            Some(body) => Some(self.target_type.reconstruct(body)?.into_body()),
        };
        Ok(request)
    }
}
