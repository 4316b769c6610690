mod config;
mod logging;

use crate::config::{init_config_file, load_config, CONFIG_FILE_NAME};
use clap::{Parser, Subcommand, ValueEnum};
use odata_inquirer_core::app_studio::{
    app_studio_base_url, destination_url_for_app_studio, AppStudioClient, ListDestinationOpts,
};
use odata_inquirer_core::connection::ValidatedConnection;
use odata_inquirer_core::prompt::{PrefetchOutcome, ValueHelpPrompt};
use odata_inquirer_core::providers::{AbapServiceProvider, ConnectionConfig, ValueHelpProvider};
use odata_inquirer_core::types::{
    AnnotationDocument, AppConfig, DatasourceType, JsonEnvelope, OdataServiceState,
    ServiceMetadata,
};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "odata-inquirer",
    version,
    about = "OData service value help and SAP Business Application Studio destinations"
)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatasourceArg {
    SapSystem,
    OdataServiceUrl,
    ProjectSpecificDestination,
    MetadataFile,
}

impl From<DatasourceArg> for DatasourceType {
    fn from(arg: DatasourceArg) -> Self {
        match arg {
            DatasourceArg::SapSystem => DatasourceType::SapSystem,
            DatasourceArg::OdataServiceUrl => DatasourceType::OdataServiceUrl,
            DatasourceArg::ProjectSpecificDestination => DatasourceType::ProjectSpecificDestination,
            DatasourceArg::MetadataFile => DatasourceType::MetadataFile,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    InitConfig {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    Destinations {
        #[arg(long = "strip-s4hc-api-hosts", default_value_t = false)]
        strip_s4hc_api_hosts: bool,
    },
    DestinationUrl {
        name: String,
        #[arg(long)]
        path: Option<String>,
    },
    ExposePort {
        port: u16,
    },
    ValueHelp {
        #[arg(long)]
        metadata: PathBuf,
        #[arg(long = "annotations")]
        annotations: Vec<PathBuf>,
        #[arg(long = "service-path")]
        service_path: String,
        #[arg(long, conflicts_with = "destination")]
        url: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long, value_enum, default_value_t = DatasourceArg::OdataServiceUrl)]
        datasource: DatasourceArg,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet)?;

    if let Commands::InitConfig { force } = cli.cmd {
        init_config_file(Path::new(CONFIG_FILE_NAME), force)?;
        println!("initialized {CONFIG_FILE_NAME}");
        return Ok(());
    }

    let cfg = load_config()?;
    debug!(namespace = %cfg.prompt.namespace, "configuration loaded");

    match cli.cmd {
        Commands::InitConfig { .. } => {}
        Commands::Destinations {
            strip_s4hc_api_hosts,
        } => {
            let client = AppStudioClient::from_env(|k| std::env::var(k).ok(), &cfg.app_studio)?;
            let destinations = client
                .list_destinations(ListDestinationOpts {
                    strip_s4hc_api_hosts: strip_s4hc_api_hosts
                        || cfg.app_studio.strip_s4hc_api_hosts,
                })
                .await?;
            if cli.json {
                print_envelope("destinations", "destinations listed", json!(destinations))?;
            } else if destinations.is_empty() {
                println!("no destinations found");
            } else {
                for destination in destinations.values() {
                    println!(
                        "{}\t{}\t{}",
                        destination.name,
                        destination.host,
                        destination.web_ide_usage.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::DestinationUrl { name, path } => {
            let url = destination_url_for_app_studio(&name, path.as_deref())?;
            if cli.json {
                print_envelope("destination-url", "destination url", json!({ "url": url }))?;
            } else {
                println!("{url}");
            }
        }
        Commands::ExposePort { port } => {
            let client = AppStudioClient::new(
                app_studio_base_url(|k| std::env::var(k).ok()).unwrap_or_default(),
                None,
                cfg.app_studio.expose_port_endpoint.clone(),
            );
            let url = client.expose_port(port).await;
            if cli.json {
                let status = if url.is_empty() { "error" } else { "ok" };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&JsonEnvelope {
                        status: status.to_string(),
                        phase: "expose-port".to_string(),
                        message: format!("port {port}"),
                        details: json!({ "url": url }),
                    })?
                );
            } else if url.is_empty() {
                eprintln!("port {port} was not exposed");
            } else {
                println!("{url}");
            }
        }
        Commands::ValueHelp {
            metadata,
            annotations,
            service_path,
            url,
            destination,
            datasource,
            namespace,
            yes,
        } => {
            let metadata: ServiceMetadata = read_json(&metadata)?;
            let annotations = annotations
                .iter()
                .map(|path| read_json::<AnnotationDocument>(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let datasource = DatasourceType::from(datasource);
            let connection = build_connection(
                &cfg,
                url.as_deref(),
                destination.as_deref(),
                &service_path,
                datasource,
                |k| std::env::var(k).ok(),
            )?;

            let mut state = OdataServiceState {
                metadata: Some(metadata),
                service_path: Some(service_path),
                annotations,
                origin: connection.origin(),
                value_list_references: None,
            };
            let mut prompt =
                ValueHelpPrompt::new(namespace.as_deref().unwrap_or(&cfg.prompt.namespace));
            let outcome = prompt
                .ask(
                    &mut state,
                    connection.provider_source(datasource),
                    |message, default| {
                        if yes {
                            Ok(true)
                        } else {
                            prompt_confirm(message, default)
                        }
                    },
                )
                .await?;

            report_value_help(cli.json, prompt.name(), outcome, &state)?;
        }
    }

    Ok(())
}

fn build_connection<F>(
    cfg: &AppConfig,
    url: Option<&str>,
    destination: Option<&str>,
    service_path: &str,
    datasource: DatasourceType,
    env_get: F,
) -> anyhow::Result<ValidatedConnection>
where
    F: Fn(&str) -> Option<String>,
{
    let mut connection = ValidatedConnection::default();
    let base_url = if let Some(name) = destination {
        connection.destination_url = Some(destination_url_for_app_studio(name, Some(service_path))?);
        Some(destination_url_for_app_studio(name, None)?)
    } else {
        url.map(ToString::to_string)
            .or_else(|| cfg.connection.url.clone())
            .filter(|v| !v.trim().is_empty())
    };

    let Some(base_url) = base_url else {
        if datasource == DatasourceType::MetadataFile {
            return Ok(connection);
        }
        anyhow::bail!("no backend url; pass --url or --destination, or set connection.url in {CONFIG_FILE_NAME}");
    };

    if connection.destination_url.is_none() {
        connection.validated_url = Some(format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            service_path.trim_start_matches('/')
        ));
    }
    connection.config = ConnectionConfig {
        base_url,
        username: cfg.connection.username.clone(),
        password: env_get(&cfg.connection.password_env_var),
        sap_client: cfg.connection.sap_client.clone(),
        headers: Default::default(),
        timeout_ms: Some(cfg.connection.timeout_ms),
    };

    if !matches!(
        datasource,
        DatasourceType::OdataServiceUrl | DatasourceType::MetadataFile
    ) {
        let provider = AbapServiceProvider::new(connection.config.clone())?;
        connection.abap_provider = Some(Arc::new(provider) as Arc<dyn ValueHelpProvider>);
    }
    Ok(connection)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

fn report_value_help(
    json_output: bool,
    prompt_name: &str,
    outcome: Option<PrefetchOutcome>,
    state: &OdataServiceState,
) -> anyhow::Result<()> {
    let message = describe_outcome(outcome);
    if json_output {
        return print_envelope(
            "value-help",
            message,
            json!({
                "prompt": prompt_name,
                "outcome": outcome.map(|o| format!("{o:?}")),
                "services": state.value_list_references,
            }),
        );
    }

    println!("{message}");
    for service in state.value_list_references.iter().flatten() {
        println!("  {} -> {}", service.target, service.value);
    }
    Ok(())
}

fn describe_outcome(outcome: Option<PrefetchOutcome>) -> &'static str {
    match outcome {
        None => "service has no value help references",
        Some(PrefetchOutcome::Cleared) => "value help download skipped",
        Some(PrefetchOutcome::Unchanged) => "value help already downloaded",
        Some(PrefetchOutcome::NoProvider) => "no service provider available for value help",
        Some(PrefetchOutcome::NoReferences) => "service has no value help references",
        Some(PrefetchOutcome::Published { .. }) => "value help downloaded",
        Some(PrefetchOutcome::FetchFailed) => "value help could not be downloaded",
    }
}

fn print_envelope(phase: &str, message: &str, details: serde_json::Value) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonEnvelope {
            status: "ok".to_string(),
            phase: phase.to_string(),
            message: message.to_string(),
            details,
        })?
    );
    Ok(())
}

fn prompt_confirm(prompt: &str, default: bool) -> anyhow::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{prompt} {hint}: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(parse_confirm_answer(&answer, default))
}

fn parse_confirm_answer(answer: &str, default: bool) -> bool {
    match answer.trim() {
        "" => default,
        "y" | "Y" | "yes" | "YES" => true,
        _ => false,
    }
}
