use crate::types::{AnnotationDocument, ServiceMetadata, ValueListReference, ValueListService};
use crate::value_list::{self, ExtractionError};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("service request failed: {0}")]
    Request(String),
    #[error("service response invalid: {0}")]
    InvalidResponse(String),
    #[error("invalid service url: {0}")]
    InvalidUrl(String),
}

/// Handle able to read value-list references and fetch the services they point to.
#[async_trait]
pub trait ValueHelpProvider: Send + Sync {
    /// Extracts value-list references from already loaded metadata.
    fn value_list_references(
        &self,
        service_path: &str,
        metadata: &ServiceMetadata,
        annotations: &[AnnotationDocument],
    ) -> Result<Vec<ValueListReference>, ExtractionError> {
        value_list::value_list_references(service_path, metadata, annotations)
    }

    /// Fetches the `$metadata` of every referenced value-help service.
    async fn fetch_value_list_services(
        &self,
        references: &[ValueListReference],
    ) -> Result<Vec<ValueListService>, ProviderError>;

    /// Origin of the backend system this handle talks to, when known.
    fn origin(&self) -> Option<String> {
        None
    }
}

#[async_trait]
impl<T> ValueHelpProvider for Arc<T>
where
    T: ValueHelpProvider + ?Sized,
{
    fn value_list_references(
        &self,
        service_path: &str,
        metadata: &ServiceMetadata,
        annotations: &[AnnotationDocument],
    ) -> Result<Vec<ValueListReference>, ExtractionError> {
        (**self).value_list_references(service_path, metadata, annotations)
    }

    async fn fetch_value_list_services(
        &self,
        references: &[ValueListReference],
    ) -> Result<Vec<ValueListService>, ProviderError> {
        (**self).fetch_value_list_services(references).await
    }

    fn origin(&self) -> Option<String> {
        (**self).origin()
    }
}

#[async_trait]
impl<T> ValueHelpProvider for Box<T>
where
    T: ValueHelpProvider + ?Sized,
{
    fn value_list_references(
        &self,
        service_path: &str,
        metadata: &ServiceMetadata,
        annotations: &[AnnotationDocument],
    ) -> Result<Vec<ValueListReference>, ExtractionError> {
        (**self).value_list_references(service_path, metadata, annotations)
    }

    async fn fetch_value_list_services(
        &self,
        references: &[ValueListReference],
    ) -> Result<Vec<ValueListService>, ProviderError> {
        (**self).fetch_value_list_services(references).await
    }

    fn origin(&self) -> Option<String> {
        (**self).origin()
    }
}

/// Settings of a validated backend connection.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub sap_client: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// OData client for ABAP backends.
#[derive(Debug, Clone)]
pub struct AbapServiceProvider {
    base: Url,
    config: ConnectionConfig,
    client: Client,
}

impl AbapServiceProvider {
    pub fn new(config: ConnectionConfig) -> Result<Self, ProviderError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        let mut builder = Client::builder();
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self {
            base,
            config,
            client,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Resolves the absolute URL of a referenced value-help service.
    ///
    /// The reference value is relative to the referencing service root.
    ///
    /// # Examples
    ///
    /// ```
    /// use odata_inquirer_core::providers::{AbapServiceProvider, ConnectionConfig};
    /// use odata_inquirer_core::types::ValueListReference;
    ///
    /// let provider =
    ///     AbapServiceProvider::new(ConnectionConfig::new("https://abap.example.com")).unwrap();
    /// let url = provider
    ///     .service_url(&ValueListReference {
    ///         target: "T".to_string(),
    ///         root_path: "/sap/opu/odata4/sap/svc/srvd/sap/svc/0001".to_string(),
    ///         value: "../../../../srvd_f4/sap/vh/0001/$metadata".to_string(),
    ///     })
    ///     .unwrap();
    /// assert_eq!(
    ///     url.as_str(),
    ///     "https://abap.example.com/sap/opu/odata4/sap/svc/srvd_f4/sap/vh/0001/$metadata"
    /// );
    /// ```
    pub fn service_url(&self, reference: &ValueListReference) -> Result<Url, ProviderError> {
        let root = format!("{}/", reference.root_path.trim_end_matches('/'));
        self.base
            .join(&root)
            .and_then(|root| root.join(&reference.value))
            .map_err(|e| ProviderError::InvalidUrl(format!("{}: {e}", reference.value)))
    }

    async fn fetch_service(
        &self,
        reference: &ValueListReference,
    ) -> Result<ValueListService, ProviderError> {
        let url = self.service_url(reference)?;
        let mut request = self.client.get(url).header(ACCEPT, "application/xml");
        if let Some(client) = &self.config.sap_client {
            request = request.query(&[("sap-client", client)]);
        }
        if let Some(user) = &self.config.username {
            request = request.basic_auth(user, self.config.password.as_ref());
        }
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        let metadata = send_text(request).await?;
        Ok(ValueListService {
            target: reference.target.clone(),
            root_path: reference.root_path.clone(),
            value: reference.value.clone(),
            metadata,
        })
    }
}

#[async_trait]
impl ValueHelpProvider for AbapServiceProvider {
    async fn fetch_value_list_services(
        &self,
        references: &[ValueListReference],
    ) -> Result<Vec<ValueListService>, ProviderError> {
        try_join_all(references.iter().map(|r| self.fetch_service(r))).await
    }

    fn origin(&self) -> Option<String> {
        Some(self.base.origin().ascii_serialization())
    }
}

async fn send_text(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Request(format!(
            "http status {} from {}",
            status,
            response.url()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}
