use odata_inquirer_core::types::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

pub const CONFIG_FILE_NAME: &str = ".odata-inquirer.toml";

pub fn load_config() -> anyhow::Result<AppConfig> {
    let local_path = PathBuf::from(CONFIG_FILE_NAME);
    let home_path = std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME));

    let home = match &home_path {
        Some(path) => read_config_value(path)?,
        None => None,
    };
    let local = read_config_value(&local_path)?;

    resolve_config(home, local, |k| std::env::var(k).ok())
}

pub fn resolve_config<F>(
    home: Option<Value>,
    local: Option<Value>,
    env_get: F,
) -> anyhow::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = Value::try_from(AppConfig::default())?;
    if let Some(home_value) = home {
        merge_toml(&mut merged, home_value);
    }
    if let Some(local_value) = local {
        merge_toml(&mut merged, local_value);
    }

    let mut cfg: AppConfig = merged.try_into()?;
    apply_env_overrides(&mut cfg, env_get);
    Ok(cfg)
}

fn read_config_value(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)?;
    let parsed = raw.parse::<Value>()?;
    Ok(Some(parsed))
}

fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_map), Value::Table(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, env_get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_get("ODATA_INQUIRER_URL") {
        cfg.connection.url = Some(v);
    }
    if let Some(v) = env_get("ODATA_INQUIRER_USERNAME") {
        cfg.connection.username = Some(v);
    }
    if let Some(v) = env_get("ODATA_INQUIRER_PASSWORD_ENV_VAR") {
        cfg.connection.password_env_var = v;
    }
    if let Some(v) = env_get("ODATA_INQUIRER_SAP_CLIENT") {
        cfg.connection.sap_client = Some(v);
    }
    if let Some(v) = env_get("ODATA_INQUIRER_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        cfg.connection.timeout_ms = v;
    }

    if let Some(v) = env_get("ODATA_INQUIRER_PROMPT_NAMESPACE") {
        cfg.prompt.namespace = v;
    }

    if let Some(v) = env_get("ODATA_INQUIRER_EXPOSE_PORT_ENDPOINT") {
        cfg.app_studio.expose_port_endpoint = v;
    }
    if let Some(v) = env_get("ODATA_INQUIRER_STRIP_S4HC_API_HOSTS").and_then(|v| parse_bool(&v)) {
        cfg.app_studio.strip_s4hc_api_hosts = v;
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

pub fn init_config_file(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; re-run with --force to overwrite",
            path.display()
        );
    }
    fs::write(path, config_template())?;
    Ok(())
}

fn config_template() -> &'static str {
    r#"# odata-inquirer configuration
# precedence: CLI > env > local .odata-inquirer.toml > home ~/.odata-inquirer.toml > defaults

[connection]
# backend system used for value help requests when no destination is given
# url = "https://my-abap-system.example.com"
# username = "DEVELOPER"
# the password is read from this environment variable, never from this file
password_env_var = "ODATA_INQUIRER_PASSWORD"
# sap_client = "100"
timeout_ms = 30000

[prompt]
namespace = "odataService"

[app_studio]
expose_port_endpoint = "http://localhost:3001"
strip_s4hc_api_hosts = false
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn config_precedence_env_local_home_defaults() {
        let home = Some(
            r#"
            [connection]
            url = "https://home.example.com"
            sap_client = "200"

            [app_studio]
            strip_s4hc_api_hosts = true
            "#
            .parse::<Value>()
            .expect("home parse"),
        );

        let local = Some(
            r#"
            [connection]
            url = "https://local.example.com"

            [prompt]
            namespace = "local"
            "#
            .parse::<Value>()
            .expect("local parse"),
        );

        let env = HashMap::from([
            ("ODATA_INQUIRER_PROMPT_NAMESPACE".to_string(), "env".to_string()),
            ("ODATA_INQUIRER_TIMEOUT_MS".to_string(), "500".to_string()),
        ]);

        let cfg = resolve_config(home, local, |k| env.get(k).cloned()).expect("resolve config");

        assert_eq!(cfg.connection.url.as_deref(), Some("https://local.example.com"));
        assert_eq!(cfg.connection.sap_client.as_deref(), Some("200"));
        assert_eq!(cfg.connection.timeout_ms, 500);
        assert_eq!(cfg.prompt.namespace, "env");
        assert!(cfg.app_studio.strip_s4hc_api_hosts);
        assert_eq!(cfg.connection.password_env_var, "ODATA_INQUIRER_PASSWORD");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env = HashMap::from([
            ("ODATA_INQUIRER_TIMEOUT_MS".to_string(), "soon".to_string()),
            ("ODATA_INQUIRER_STRIP_S4HC_API_HOSTS".to_string(), "maybe".to_string()),
        ]);
        let cfg = resolve_config(None, None, |k| env.get(k).cloned()).expect("resolve config");
        assert_eq!(cfg.connection.timeout_ms, 30_000);
        assert!(!cfg.app_studio.strip_s4hc_api_hosts);
    }

    #[test]
    fn template_parses_into_config() {
        let value = config_template().parse::<Value>().expect("template parse");
        let cfg = resolve_config(None, Some(value), |_| None).expect("resolve config");
        assert_eq!(cfg.prompt.namespace, "odataService");
        assert_eq!(cfg.connection.url, None);
    }

    #[test]
    fn init_config_requires_force_to_overwrite() {
        let base = std::env::temp_dir().join(format!(
            "odata-inquirer-cli-test-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time")
                .as_nanos()
        ));
        fs::create_dir_all(&base).expect("create temp dir");
        let cfg_path = base.join(CONFIG_FILE_NAME);

        init_config_file(&cfg_path, false).expect("must create first config");
        let err = init_config_file(&cfg_path, false).expect_err("must reject overwrite");
        assert!(err.to_string().contains("--force"));

        init_config_file(&cfg_path, true).expect("force overwrite should succeed");
        let content = fs::read_to_string(&cfg_path).expect("read config");
        assert!(content.contains("[app_studio]"));

        fs::remove_dir_all(&base).expect("cleanup temp dir");
    }
}
