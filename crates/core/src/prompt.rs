use crate::connection::{ProviderSource, ValidatedConnection};
use crate::providers::ValueHelpProvider;
use crate::types::{DatasourceType, OdataServiceState, ValueListReference};
use crate::value_list;
use tracing::{debug, info};

/// Suffix of the confirm question name; prefixed with the prompt namespace.
pub const VALUE_HELP_DOWNLOAD_CONFIRM: &str = "valueHelpDownloadConfirm";

const VALUE_HELP_DOWNLOAD_MESSAGE: &str =
    "Do you want to download the value help data for this service?";

/// References computed by the gate for one service path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedReferences {
    pub service_path: String,
    pub references: Vec<ValueListReference>,
}

/// State carried between the `when` and `validate` calls of one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchCacheState {
    /// Service path of the last prefetch; `None` after invalidation.
    pub last_service_path: Option<String>,
    pub last_references: Option<ComputedReferences>,
}

/// What a validation did with the shared service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// Not applicable; cache key and published results were reset.
    Cleared,
    /// The service path was already prefetched.
    Unchanged,
    /// No service provider handle could be resolved.
    NoProvider,
    /// The service declares no value-list references.
    NoReferences,
    Published { services: usize },
    /// The fetch failed; published results were reset.
    FetchFailed,
}

/// Confirm question offering to prefetch value-help services.
///
/// Each registered prompt owns its own [`PrefetchCacheState`], so the fetch
/// happens at most once per distinct service path it sees in sequence.
///
/// # Examples
///
/// ```
/// use odata_inquirer_core::prompt::ValueHelpPrompt;
/// use odata_inquirer_core::types::OdataServiceState;
///
/// let mut prompt = ValueHelpPrompt::new("odataService");
/// assert_eq!(prompt.name(), "odataService:valueHelpDownloadConfirm");
/// assert!(!prompt.when(&OdataServiceState::default()));
/// ```
#[derive(Debug, Clone)]
pub struct ValueHelpPrompt {
    name: String,
    cache: PrefetchCacheState,
}

impl ValueHelpPrompt {
    pub fn new(namespace: &str) -> Self {
        Self {
            name: format!("{namespace}:{VALUE_HELP_DOWNLOAD_CONFIRM}"),
            cache: PrefetchCacheState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &'static str {
        VALUE_HELP_DOWNLOAD_MESSAGE
    }

    pub fn default_answer(&self) -> bool {
        false
    }

    pub fn cache(&self) -> &PrefetchCacheState {
        &self.cache
    }

    /// Decides whether the question is shown for the current service.
    ///
    /// The extracted references are kept for the following validation.
    /// Malformed annotations count as "no references".
    pub fn when(&mut self, state: &OdataServiceState) -> bool {
        let (Some(metadata), Some(service_path)) =
            (state.metadata.as_ref(), state.service_path.as_deref())
        else {
            self.cache.last_references = None;
            return false;
        };

        let references =
            match value_list::value_list_references(service_path, metadata, &state.annotations) {
                Ok(references) => references,
                Err(err) => {
                    debug!(error = %err, service_path, "ignoring malformed value list annotations");
                    Vec::new()
                }
            };
        debug!(
            service_path,
            references = references.len(),
            "value help prompt evaluated"
        );

        let show = !references.is_empty();
        self.cache.last_references = Some(ComputedReferences {
            service_path: service_path.to_string(),
            references,
        });
        show
    }

    /// Fetches value-help services once per distinct service path.
    ///
    /// Never fails: every error is folded into the returned outcome and the
    /// published results in `state`.
    pub async fn prefetch(
        &mut self,
        confirmed: bool,
        state: &mut OdataServiceState,
        source: Option<ProviderSource>,
    ) -> PrefetchOutcome {
        let system_origin = source.as_ref().and_then(ProviderSource::origin);
        self.prefetch_for_system(confirmed, state, source, system_origin)
            .await
    }

    /// Like [`prefetch`](Self::prefetch), but checks the service against
    /// `system_origin` instead of the provider's own origin.
    async fn prefetch_for_system(
        &mut self,
        confirmed: bool,
        state: &mut OdataServiceState,
        source: Option<ProviderSource>,
        system_origin: Option<String>,
    ) -> PrefetchOutcome {
        let same_system = match (state.origin.as_deref(), system_origin.as_deref()) {
            (Some(service), Some(system)) => service == system,
            _ => true,
        };

        let service_path = match state.service_path.clone() {
            Some(path) if confirmed && same_system && state.metadata.is_some() => path,
            _ => {
                self.cache.last_service_path = None;
                state.value_list_references = None;
                return PrefetchOutcome::Cleared;
            }
        };

        if self.cache.last_service_path.as_deref() == Some(service_path.as_str()) {
            return PrefetchOutcome::Unchanged;
        }

        let Some(provider) = source.and_then(ProviderSource::into_provider) else {
            debug!(service_path = %service_path, "no service provider available for value help");
            return PrefetchOutcome::NoProvider;
        };

        self.cache.last_service_path = Some(service_path.clone());
        let references = self.references_for(&service_path, state, provider.as_ref());
        if references.is_empty() {
            state.value_list_references = None;
            return PrefetchOutcome::NoReferences;
        }

        match provider.fetch_value_list_services(&references).await {
            Ok(services) => {
                let count = services.len();
                debug!(service_path = %service_path, services = count, "value help services fetched");
                state.value_list_references = Some(services);
                PrefetchOutcome::Published { services: count }
            }
            Err(err) => {
                info!(error = %err, "No value list references could be retrieved for the service");
                state.value_list_references = None;
                PrefetchOutcome::FetchFailed
            }
        }
    }

    /// Validation hook of the confirm question; always accepts the answer.
    pub async fn validate(
        &mut self,
        confirmed: bool,
        state: &mut OdataServiceState,
        source: Option<ProviderSource>,
    ) -> bool {
        let outcome = self.prefetch(confirmed, state, source).await;
        debug!(?outcome, "value help validation finished");
        true
    }

    pub async fn validate_with_connection(
        &mut self,
        confirmed: bool,
        state: &mut OdataServiceState,
        connection: &ValidatedConnection,
        datasource: DatasourceType,
    ) -> bool {
        let source = connection.provider_source(datasource);
        let outcome = self
            .prefetch_for_system(confirmed, state, source, connection.origin())
            .await;
        debug!(?outcome, "value help validation finished");
        true
    }

    /// Runs one prompt lifecycle: gate, confirmation, prefetch.
    ///
    /// `confirm` receives the question message and default answer and is
    /// only called when the gate shows the question. Returns `Ok(None)` when
    /// the question was hidden.
    pub async fn ask<F>(
        &mut self,
        state: &mut OdataServiceState,
        source: Option<ProviderSource>,
        confirm: F,
    ) -> anyhow::Result<Option<PrefetchOutcome>>
    where
        F: FnOnce(&str, bool) -> anyhow::Result<bool>,
    {
        if !self.when(state) {
            return Ok(None);
        }
        let confirmed = confirm(self.message(), self.default_answer())?;
        Ok(Some(self.prefetch(confirmed, state, source).await))
    }

    fn references_for(
        &self,
        service_path: &str,
        state: &OdataServiceState,
        provider: &dyn ValueHelpProvider,
    ) -> Vec<ValueListReference> {
        if let Some(computed) = &self.cache.last_references {
            if computed.service_path == service_path {
                return computed.references.clone();
            }
        }
        let Some(metadata) = state.metadata.as_ref() else {
            return Vec::new();
        };
        provider
            .value_list_references(service_path, metadata, &state.annotations)
            .unwrap_or_else(|err| {
                debug!(error = %err, service_path, "ignoring malformed value list annotations");
                Vec::new()
            })
    }
}
