//! Client profiles and category resolution
//!
//! A client profile (`rest`, `fhir`) decides which [`ResourceKind`] a category
//! reconstructs as, how retrieve/create/update/delete requests are shaped and
//! which interceptors and converters the transport needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::category::Category;
use super::envelope::{HttpMethod, RequestDescriptor, ResourceKind};
use super::normalize::normalize;
use super::transport::{Credentials, Interceptor, PayloadConverter};
use crate::error::SyncError;

pub const REST_CLIENT: &str = "rest";
pub const FHIR_CLIENT: &str = "fhir";

/// Category-specific request builders for one client profile
pub trait ClientHelper: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve_kind(&self, category: Category) -> Result<ResourceKind, SyncError>;

    fn retrieve_request(&self, resource_url: &str) -> Result<RequestDescriptor, SyncError> {
        Ok(RequestDescriptor::new(HttpMethod::Get, validate_url(resource_url)?, None))
    }

    fn create_request(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError> {
        Ok(RequestDescriptor::new(
            HttpMethod::Post,
            validate_url(resource_url)?,
            Some(payload),
        ))
    }

    fn update_request(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError>;

    fn delete_request(&self, resource_url: &str, uuid: &str) -> Result<RequestDescriptor, SyncError> {
        let url = validate_url(resource_url)?;
        let url = if url.trim_end_matches('/').ends_with(&format!("/{uuid}")) {
            url
        } else {
            format!("{}/{}", url.trim_end_matches('/'), urlencoding::encode(uuid))
        };
        Ok(RequestDescriptor::new(HttpMethod::Delete, url, None))
    }

    fn interceptors(&self, credentials: &Credentials) -> Vec<Interceptor> {
        vec![Interceptor::BasicAuth(credentials.clone())]
    }

    fn converters(&self) -> Vec<PayloadConverter>;
}

fn validate_url(url: &str) -> Result<String, SyncError> {
    reqwest::Url::parse(url)
        .map(|_| url.to_string())
        .map_err(|e| SyncError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// OpenMRS REST web services
#[derive(Debug, Default)]
pub struct RestClientHelper;

impl ClientHelper for RestClientHelper {
    fn name(&self) -> &'static str {
        REST_CLIENT
    }

    fn resolve_kind(&self, _category: Category) -> Result<ResourceKind, SyncError> {
        Ok(ResourceKind::SimpleObject)
    }

    // The REST API updates through POST on the resource URL.
    fn update_request(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError> {
        Ok(RequestDescriptor::new(
            HttpMethod::Post,
            validate_url(resource_url)?,
            Some(payload),
        ))
    }

    fn converters(&self) -> Vec<PayloadConverter> {
        vec![PayloadConverter::Json]
    }
}

/// FHIR endpoints
#[derive(Debug, Default)]
pub struct FhirClientHelper;

impl ClientHelper for FhirClientHelper {
    fn name(&self) -> &'static str {
        FHIR_CLIENT
    }

    fn resolve_kind(&self, category: Category) -> Result<ResourceKind, SyncError> {
        match category {
            Category::Patient => Ok(ResourceKind::Patient),
            Category::Observation => Ok(ResourceKind::Observation),
            Category::Visit | Category::Encounter => Ok(ResourceKind::Encounter),
            Category::Location => Ok(ResourceKind::Location),
            Category::Person => Ok(ResourceKind::Person),
            Category::Allergy => Ok(ResourceKind::AllergyIntolerance),
            other => Err(SyncError::UnsupportedCategory {
                client: FHIR_CLIENT.to_string(),
                category: other.to_string(),
            }),
        }
    }

    fn update_request(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError> {
        Ok(RequestDescriptor::new(
            HttpMethod::Put,
            validate_url(resource_url)?,
            Some(payload),
        ))
    }

    fn converters(&self) -> Vec<PayloadConverter> {
        vec![PayloadConverter::FhirJson]
    }
}

/// Client profiles registered at start-up
#[derive(Default, Clone)]
pub struct ClientRegistry {
    helpers: BTreeMap<String, Arc<dyn ClientHelper>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `rest` and `fhir` profiles
    pub fn with_defaults() -> Self {
        Self::new()
            .register(Arc::new(RestClientHelper))
            .register(Arc::new(FhirClientHelper))
    }

    pub fn register(mut self, helper: Arc<dyn ClientHelper>) -> Self {
        self.helpers.insert(helper.name().to_string(), helper);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ClientHelper>, SyncError> {
        self.helpers
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownClient(name.to_string()))
    }

    /// Bind `category` to the builders of `client_profile`
    pub fn resolve(&self, client_profile: &str, category: Category) -> Result<CategoryBinding, SyncError> {
        let helper = self.get(client_profile)?;
        let kind = helper.resolve_kind(category)?;
        Ok(CategoryBinding {
            category,
            kind,
            helper,
        })
    }
}

/// Everything needed to sync one category through one client profile
#[derive(Clone)]
pub struct CategoryBinding {
    category: Category,
    kind: ResourceKind,
    helper: Arc<dyn ClientHelper>,
}

impl CategoryBinding {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn retrieve(&self, resource_url: &str) -> Result<RequestDescriptor, SyncError> {
        self.helper.retrieve_request(resource_url)
    }

    pub fn create(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError> {
        self.helper.create_request(resource_url, payload)
    }

    pub fn update(&self, resource_url: &str, payload: Value) -> Result<RequestDescriptor, SyncError> {
        self.helper.update_request(resource_url, payload)
    }

    pub fn delete(&self, resource_url: &str, uuid: &str) -> Result<RequestDescriptor, SyncError> {
        self.helper.delete_request(resource_url, uuid)
    }

    pub fn normalize(&self, representation: Value) -> Value {
        normalize(self.category, representation)
    }
}
