use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Converted form of an OData service `$metadata` document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub annotations: Vec<AnnotationTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationTarget {
    pub target: String,
    #[serde(default)]
    pub terms: BTreeMap<String, Value>,
}

/// One annotation file delivered alongside the service metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDocument {
    pub source: Option<String>,
    #[serde(default)]
    pub targets: Vec<AnnotationTarget>,
}

/// Pointer from an annotated element to an external value-help service.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueListReference {
    pub target: String,
    pub root_path: String,
    pub value: String,
}

/// A value-help service fetched for one [`ValueListReference`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueListService {
    pub target: String,
    pub root_path: String,
    pub value: String,
    pub metadata: String,
}

/// Service selection state shared by the prompts of one inquirer session.
///
/// The value-help prompt reads `metadata`, `service_path`, `annotations` and
/// `origin`, and is the only writer of `value_list_references`.
#[derive(Debug, Clone, Default)]
pub struct OdataServiceState {
    pub metadata: Option<ServiceMetadata>,
    pub service_path: Option<String>,
    pub annotations: Vec<AnnotationDocument>,
    pub origin: Option<String>,
    pub value_list_references: Option<Vec<ValueListService>>,
}

/// How the user reached the service currently being selected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DatasourceType {
    SapSystem,
    OdataServiceUrl,
    ProjectSpecificDestination,
    MetadataFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub status: String,
    pub phase: String,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password_env_var: String,
    pub sap_client: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password_env_var: "ODATA_INQUIRER_PASSWORD".to_string(),
            sap_client: None,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    pub namespace: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            namespace: "odataService".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppStudioSettings {
    pub expose_port_endpoint: String,
    pub strip_s4hc_api_hosts: bool,
}

impl Default for AppStudioSettings {
    fn default() -> Self {
        Self {
            expose_port_endpoint: "http://localhost:3001".to_string(),
            strip_s4hc_api_hosts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub prompt: PromptSettings,
    pub app_studio: AppStudioSettings,
}
