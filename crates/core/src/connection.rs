use crate::providers::{AbapServiceProvider, ConnectionConfig, ValueHelpProvider};
use crate::types::DatasourceType;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Returns the `scheme://host[:port]` origin of `url`, if it parses.
///
/// # Examples
///
/// ```
/// use odata_inquirer_core::connection::url_origin;
///
/// assert_eq!(
///     url_origin("https://my-system.dest/sap/opu/odata/sap/SRV").as_deref(),
///     Some("https://my-system.dest")
/// );
/// assert_eq!(url_origin("not a url"), None);
/// ```
pub fn url_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Where the value-help prompt gets its service provider handle from.
#[derive(Clone)]
pub enum ProviderSource {
    /// Build a new handle from the validated connection configuration.
    Fresh(ConnectionConfig),
    /// Reuse a handle the connection already holds.
    Existing(Arc<dyn ValueHelpProvider>),
}

impl ProviderSource {
    pub fn origin(&self) -> Option<String> {
        match self {
            ProviderSource::Fresh(config) => url_origin(&config.base_url),
            ProviderSource::Existing(provider) => provider.origin(),
        }
    }

    /// Materializes the handle; a configuration that cannot produce one yields `None`.
    pub fn into_provider(self) -> Option<Arc<dyn ValueHelpProvider>> {
        match self {
            ProviderSource::Existing(provider) => Some(provider),
            ProviderSource::Fresh(config) => match AbapServiceProvider::new(config) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(err) => {
                    warn!(error = %err, "could not create service provider for value help");
                    None
                }
            },
        }
    }
}

impl fmt::Debug for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSource::Fresh(config) => f.debug_tuple("Fresh").field(config).finish(),
            ProviderSource::Existing(provider) => f
                .debug_tuple("Existing")
                .field(&provider.origin())
                .finish(),
        }
    }
}

/// Result of validating a backend connection during service selection.
#[derive(Clone, Default)]
pub struct ValidatedConnection {
    pub validated_url: Option<String>,
    pub destination_url: Option<String>,
    pub config: ConnectionConfig,
    /// Handle supporting ABAP OData operations, when the connection produced one.
    pub abap_provider: Option<Arc<dyn ValueHelpProvider>>,
}

impl ValidatedConnection {
    pub fn url(&self) -> Option<&str> {
        self.destination_url
            .as_deref()
            .or(self.validated_url.as_deref())
    }

    pub fn origin(&self) -> Option<String> {
        self.url().and_then(url_origin)
    }

    /// Picks the provider strategy for the way the user reached the service.
    ///
    /// A raw OData service URL never comes with an authenticated handle, so a
    /// fresh one is built from the connection configuration.
    pub fn provider_source(&self, datasource: DatasourceType) -> Option<ProviderSource> {
        if datasource == DatasourceType::OdataServiceUrl {
            return Some(ProviderSource::Fresh(self.config.clone()));
        }
        self.abap_provider
            .clone()
            .map(ProviderSource::Existing)
    }
}

impl fmt::Debug for ValidatedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConnection")
            .field("validated_url", &self.validated_url)
            .field("destination_url", &self.destination_url)
            .field("config", &self.config)
            .field("abap_provider", &self.abap_provider.is_some())
            .finish()
    }
}
