//! Helpers for running inside SAP Business Application Studio.
//!
//! Environment lookups go through an `env_get` closure so callers decide
//! where variables come from.

use crate::types::AppStudioSettings;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

/// Base URL of the Business Application Studio workspace.
pub const H2O_URL_ENV: &str = "H2O_URL";
/// Proxy that resolves `*.dest` hosts inside Business Application Studio.
pub const PROXY_URL_ENV: &str = "HTTP_PROXY";

const ODATA_ABAP_USAGE: &str = "odata_abap";
const SAML_ASSERTION: &str = "SAMLAssertion";
const INTERNET_PROXY: &str = "Internet";

#[derive(Debug, Error)]
pub enum AppStudioError {
    #[error("not running in SAP Business Application Studio")]
    NotAppStudio,
    #[error("app studio request failed: {0}")]
    Request(String),
    #[error("app studio response invalid: {0}")]
    InvalidResponse(String),
}

pub fn is_app_studio<F>(env_get: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    app_studio_base_url(env_get).is_some()
}

pub fn app_studio_base_url<F>(env_get: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_get(H2O_URL_ENV).filter(|v| !v.trim().is_empty())
}

pub fn app_studio_proxy_url<F>(env_get: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_get(PROXY_URL_ENV).filter(|v| !v.trim().is_empty())
}

/// Returns the URL under which a destination is reachable in Business Application Studio.
///
/// # Examples
///
/// ```
/// use odata_inquirer_core::app_studio::destination_url_for_app_studio;
///
/// assert_eq!(
///     destination_url_for_app_studio("ABC123", None).unwrap(),
///     "https://ABC123.dest"
/// );
/// assert_eq!(
///     destination_url_for_app_studio("ABC123", Some("/sap/opu/odata/sap/SRV")).unwrap(),
///     "https://abc123.dest/sap/opu/odata/sap/SRV"
/// );
/// ```
pub fn destination_url_for_app_studio(
    name: &str,
    path: Option<&str>,
) -> Result<String, url::ParseError> {
    let origin = format!("https://{name}.dest");
    let base = Url::parse(&origin)?;
    match path {
        Some(path) if path.len() > 1 => Ok(base.join(path)?.to_string()),
        _ => Ok(origin),
    }
}

/// Destination as listed by Business Application Studio.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Destination {
    pub name: String,
    #[serde(default, rename = "Type")]
    pub destination_type: String,
    #[serde(default)]
    pub authentication: String,
    #[serde(default)]
    pub proxy_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub host: String,
    #[serde(
        default,
        rename = "WebIDEEnabled",
        deserialize_with = "string_or_scalar"
    )]
    pub web_ide_enabled: Option<String>,
    #[serde(default, rename = "WebIDEUsage")]
    pub web_ide_usage: Option<String>,
    #[serde(default, rename = "WebIDEAdditionalData")]
    pub web_ide_additional_data: Option<String>,
    #[serde(default, rename = "sap-client")]
    pub sap_client: Option<String>,
    #[serde(default, rename = "sap-platform")]
    pub sap_platform: Option<String>,
    #[serde(default, rename = "HTML5.DynamicDestination")]
    pub html5_dynamic_destination: Option<String>,
}

impl Destination {
    pub fn is_web_ide_enabled(&self) -> bool {
        self.web_ide_enabled
            .as_deref()
            .map(str::trim)
            .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false"))
    }
}

/// Accepts a string, or a bool/number rendered as its JSON text.
fn string_or_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

pub type Destinations = BTreeMap<String, Destination>;

/// True for S/4HANA Cloud destinations reached with SAML assertion over the internet.
pub fn is_s4hc(destination: &Destination) -> bool {
    destination
        .web_ide_usage
        .as_deref()
        .is_some_and(|usage| usage.contains(ODATA_ABAP_USAGE))
        && destination.authentication == SAML_ASSERTION
        && destination.proxy_type == INTERNET_PROXY
}

/// Removes the `-api` suffix from the first label of an S/4HANA Cloud host.
///
/// ```
/// use odata_inquirer_core::app_studio::strip_s4hc_api_host;
///
/// assert_eq!(
///     strip_s4hc_api_host("https://my123-api.s4hana.ondemand.com"),
///     "https://my123.s4hana.ondemand.com"
/// );
/// ```
pub fn strip_s4hc_api_host(host: &str) -> String {
    match host.split_once('.') {
        Some((first, rest)) => {
            format!("{}.{rest}", first.strip_suffix("-api").unwrap_or(first))
        }
        None => host.strip_suffix("-api").unwrap_or(host).to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListDestinationOpts {
    pub strip_s4hc_api_hosts: bool,
}

/// HTTP client for the Business Application Studio workspace APIs.
#[derive(Debug, Clone)]
pub struct AppStudioClient {
    base_url: String,
    proxy_url: Option<String>,
    expose_port_endpoint: String,
    client: Client,
}

impl AppStudioClient {
    pub fn new(
        base_url: impl Into<String>,
        proxy_url: Option<String>,
        expose_port_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            proxy_url,
            expose_port_endpoint: expose_port_endpoint.into(),
            client: Client::new(),
        }
    }

    pub fn from_env<F>(env_get: F, settings: &AppStudioSettings) -> Result<Self, AppStudioError>
    where
        F: Fn(&str) -> Option<String> + Copy,
    {
        let base_url = app_studio_base_url(env_get).ok_or(AppStudioError::NotAppStudio)?;
        Ok(Self::new(
            base_url,
            app_studio_proxy_url(env_get),
            settings.expose_port_endpoint.clone(),
        ))
    }

    /// Lists the destinations enabled for development tools, keyed by name.
    pub async fn list_destinations(
        &self,
        opts: ListDestinationOpts,
    ) -> Result<Destinations, AppStudioError> {
        if let Some(proxy) = &self.proxy_url {
            self.get(&join_endpoint(proxy, "reload")).await?;
        }
        let body: Value = self
            .get(&join_endpoint(&self.base_url, "api/listDestinations"))
            .await?
            .json()
            .await
            .map_err(|e| AppStudioError::InvalidResponse(e.to_string()))?;

        let list = match body {
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        let mut destinations = Destinations::new();
        for item in list {
            let name = item.get("Name").cloned();
            let mut destination: Destination = match serde_json::from_value(item) {
                Ok(destination) => destination,
                Err(err) => {
                    warn!(error = %err, name = ?name, "skipping unreadable destination");
                    continue;
                }
            };
            if opts.strip_s4hc_api_hosts && is_s4hc(&destination) {
                destination.host = strip_s4hc_api_host(&destination.host);
            }
            if destination.is_web_ide_enabled() {
                destinations.insert(destination.name.clone(), destination);
            }
        }
        debug!(count = destinations.len(), "destinations listed");
        Ok(destinations)
    }

    /// Exposes a local port and returns its public URL, or an empty string on failure.
    pub async fn expose_port(&self, port: u16) -> String {
        let url = format!(
            "{}?port={port}",
            join_endpoint(&self.expose_port_endpoint, "AppStudio/api/getHostByPort")
        );
        let result = match self.get(&url).await {
            Ok(response) => response
                .json::<Value>()
                .await
                .map_err(|e| AppStudioError::InvalidResponse(e.to_string())),
            Err(err) => Err(err),
        };
        match result {
            Ok(body) => match body.get("result") {
                Some(Value::String(host)) => host.clone(),
                Some(other) => other.to_string(),
                None => {
                    error!("Port {port} was not exposed!");
                    String::new()
                }
            },
            Err(err) => {
                error!(error = %err, "Port {port} was not exposed!");
                String::new()
            }
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, AppStudioError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppStudioError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppStudioError::Request(format!(
                "http status {status} from {url}"
            )));
        }
        Ok(response)
    }
}

fn join_endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn s4hc_destination() -> Value {
        json!({
            "Name": "S4HC",
            "Type": "HTTP",
            "Authentication": "SAMLAssertion",
            "ProxyType": "Internet",
            "Description": "S/4HANA Cloud",
            "Host": "https://my123-api.s4hana.ondemand.com",
            "WebIDEEnabled": "true",
            "WebIDEUsage": "odata_abap,dev_abap"
        })
    }

    #[test]
    fn app_studio_detection_uses_h2o_url() {
        let env = HashMap::from([(H2O_URL_ENV.to_string(), "https://ws.example".to_string())]);
        assert!(is_app_studio(|k| env.get(k).cloned()));
        assert!(!is_app_studio(|_| None));
        assert!(!is_app_studio(|_| Some(" ".to_string())));
        assert_eq!(app_studio_proxy_url(|k| env.get(k).cloned()), None);
    }

    #[test]
    fn from_env_requires_app_studio() {
        let err = AppStudioClient::from_env(|_| None, &AppStudioSettings::default())
            .expect_err("outside bas");
        assert!(matches!(err, AppStudioError::NotAppStudio));
    }

    #[test]
    fn destination_url_ignores_root_path() {
        assert_eq!(
            destination_url_for_app_studio("dest", Some("/")).expect("url"),
            "https://dest.dest"
        );
    }

    #[test]
    fn s4hc_requires_usage_auth_and_proxy() {
        let mut destination: Destination =
            serde_json::from_value(s4hc_destination()).expect("destination");
        assert!(is_s4hc(&destination));
        destination.proxy_type = "OnPremise".to_string();
        assert!(!is_s4hc(&destination));
    }

    #[test]
    fn web_ide_enabled_rejects_false() {
        let mut destination = Destination::default();
        assert!(!destination.is_web_ide_enabled());
        destination.web_ide_enabled = Some("false".to_string());
        assert!(!destination.is_web_ide_enabled());
        destination.web_ide_enabled = Some("true".to_string());
        assert!(destination.is_web_ide_enabled());
    }

    #[tokio::test]
    async fn lists_enabled_destinations_and_strips_api_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/listDestinations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                s4hc_destination(),
                {
                    "Name": "HIDDEN",
                    "Host": "https://hidden.example.com",
                    "Authentication": "NoAuthentication",
                    "ProxyType": "Internet"
                },
                {
                    "Name": "ONPREM",
                    "Host": "http://onprem:44300",
                    "Authentication": "PrincipalPropagation",
                    "ProxyType": "OnPremise",
                    "WebIDEEnabled": "true",
                    "sap-client": "100"
                }
            ])))
            .mount(&server)
            .await;

        let client = AppStudioClient::new(server.uri(), Some(server.uri()), server.uri());
        let destinations = client
            .list_destinations(ListDestinationOpts {
                strip_s4hc_api_hosts: true,
            })
            .await
            .expect("list");

        assert_eq!(destinations.len(), 2);
        assert_eq!(
            destinations["S4HC"].host,
            "https://my123.s4hana.ondemand.com"
        );
        assert_eq!(destinations["ONPREM"].sap_client.as_deref(), Some("100"));
        assert!(!destinations.contains_key("HIDDEN"));
    }

    #[tokio::test]
    async fn unreadable_entries_do_not_hide_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listDestinations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "Name": "GOOD", "Host": "https://good.example.com", "WebIDEEnabled": "true" },
                { "Name": "BOOL", "Host": "https://bool.example.com", "WebIDEEnabled": true },
                { "Name": "OFF", "Host": "https://off.example.com", "WebIDEEnabled": false },
                { "Name": "TEXT_OFF", "Host": "https://off.example.com", "WebIDEEnabled": "false" },
                { "Host": "https://nameless.example.com", "WebIDEEnabled": "true" },
                { "Name": 42, "WebIDEEnabled": "true" }
            ])))
            .mount(&server)
            .await;

        let client = AppStudioClient::new(server.uri(), None, server.uri());
        let destinations = client
            .list_destinations(ListDestinationOpts::default())
            .await
            .expect("list");

        assert_eq!(
            destinations.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["BOOL", "GOOD"]
        );
        assert_eq!(destinations["BOOL"].web_ide_enabled.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn non_array_listing_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listDestinations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "x" })))
            .mount(&server)
            .await;

        let client = AppStudioClient::new(server.uri(), None, server.uri());
        let destinations = client
            .list_destinations(ListDestinationOpts::default())
            .await
            .expect("list");
        assert!(destinations.is_empty());
    }

    #[tokio::test]
    async fn expose_port_returns_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AppStudio/api/getHostByPort"))
            .and(query_param("port", "8080"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": "https://port8080-ws.example" })),
            )
            .mount(&server)
            .await;

        let client = AppStudioClient::new(server.uri(), None, server.uri());
        assert_eq!(client.expose_port(8080).await, "https://port8080-ws.example");
    }

    #[tokio::test]
    async fn expose_port_failure_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AppStudio/api/getHostByPort"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AppStudioClient::new(server.uri(), None, server.uri());
        assert_eq!(client.expose_port(4004).await, "");
    }
}
