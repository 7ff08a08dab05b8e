use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::ProductId;
use crate::flags::{FaultSettings, FlagValue};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub flags: FlagsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub products_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct FlagsConfig {
    pub provider: FlagProvider,
    pub ofrep_url: Option<String>,
    pub timeout_ms: u64,
    pub failure_product_id: String,
    pub max_latency_ms: u64,
    pub values: HashMap<String, FlagValue>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagProvider {
    None,
    Static,
    Ofrep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub products_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub flag_provider: Option<FlagProvider>,
    pub ofrep_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3550,
                graceful_shutdown_secs: 15,
            },
            catalog: CatalogConfig { products_path: PathBuf::from("products") },
            flags: FlagsConfig {
                provider: FlagProvider::None,
                ofrep_url: None,
                timeout_ms: 500,
                failure_product_id: crate::flags::fault::DEMO_FAILURE_PRODUCT_ID.to_string(),
                max_latency_ms: 5_000,
                values: HashMap::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for FlagProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "static" => Ok(Self::Static),
            "ofrep" => Ok(Self::Ofrep),
            other => Err(ConfigError::Validation(format!(
                "unsupported flag provider `{other}` (expected none|static|ofrep)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl FlagsConfig {
    pub fn fault_settings(&self) -> FaultSettings {
        FaultSettings {
            failure_product_id: ProductId::new(self.failure_product_id.clone()),
            flag_timeout: Duration::from_millis(self.timeout_ms),
            max_latency: Duration::from_millis(self.max_latency_ms),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("catalog.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(products_path) = catalog.products_path {
                self.catalog.products_path = products_path;
            }
        }

        if let Some(flags) = patch.flags {
            if let Some(provider) = flags.provider {
                self.flags.provider = provider;
            }
            if let Some(ofrep_url) = flags.ofrep_url {
                self.flags.ofrep_url = Some(ofrep_url);
            }
            if let Some(timeout_ms) = flags.timeout_ms {
                self.flags.timeout_ms = timeout_ms;
            }
            if let Some(failure_product_id) = flags.failure_product_id {
                self.flags.failure_product_id = failure_product_id;
            }
            if let Some(max_latency_ms) = flags.max_latency_ms {
                self.flags.max_latency_ms = max_latency_ms;
            }
            if let Some(values) = flags.values {
                self.flags.values.extend(values);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some((_, value)) = env_value(&["CATALOG_SERVER_BIND_ADDRESS"]) {
            self.server.bind_address = value;
        }
        if let Some(found) = env_value(&["CATALOG_SERVER_PORT", "PRODUCT_CATALOG_PORT"]) {
            self.server.port = parse_env(found)?;
        }
        if let Some(found) = env_value(&["CATALOG_SERVER_GRACEFUL_SHUTDOWN_SECS"]) {
            self.server.graceful_shutdown_secs = parse_env(found)?;
        }

        if let Some((_, value)) = env_value(&["CATALOG_PRODUCTS_PATH"]) {
            self.catalog.products_path = PathBuf::from(value);
        }

        if let Some(found) = env_value(&["CATALOG_FLAGS_PROVIDER"]) {
            self.flags.provider = found.1.parse()?;
        }
        if let Some((_, value)) = env_value(&["CATALOG_FLAGS_OFREP_URL"]) {
            self.flags.ofrep_url = Some(value);
        }
        if let Some(found) = env_value(&["CATALOG_FLAGS_TIMEOUT_MS"]) {
            self.flags.timeout_ms = parse_env(found)?;
        }
        if let Some((_, value)) = env_value(&["CATALOG_FLAGS_FAILURE_PRODUCT_ID"]) {
            self.flags.failure_product_id = value;
        }
        if let Some(found) = env_value(&["CATALOG_FLAGS_MAX_LATENCY_MS"]) {
            self.flags.max_latency_ms = parse_env(found)?;
        }

        if let Some((_, value)) = env_value(&["CATALOG_LOGGING_LEVEL", "CATALOG_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some((_, value)) = env_value(&["CATALOG_LOGGING_FORMAT", "CATALOG_LOG_FORMAT"]) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(products_path) = overrides.products_path {
            self.catalog.products_path = products_path;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(flag_provider) = overrides.flag_provider {
            self.flags.provider = flag_provider;
        }
        if let Some(ofrep_url) = overrides.ofrep_url {
            self.flags.ofrep_url = Some(ofrep_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_catalog(&self.catalog)?;
        validate_flags(&self.flags)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("catalog.toml"), PathBuf::from("config/catalog.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references against the process environment.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_owned() })?;
        output.push_str(&value);
        rest = &tail[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.products_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.products_path must point to a json file or directory".to_string(),
        ));
    }

    Ok(())
}

fn validate_flags(flags: &FlagsConfig) -> Result<(), ConfigError> {
    if flags.timeout_ms == 0 || flags.timeout_ms > 30_000 {
        return Err(ConfigError::Validation(
            "flags.timeout_ms must be in range 1..=30000".to_string(),
        ));
    }

    if flags.max_latency_ms > 60_000 {
        return Err(ConfigError::Validation(
            "flags.max_latency_ms must be at most 60000".to_string(),
        ));
    }

    if flags.failure_product_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "flags.failure_product_id must not be empty".to_string(),
        ));
    }

    if flags.provider == FlagProvider::Ofrep {
        let url = flags.ofrep_url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err(ConfigError::Validation(
                "flags.ofrep_url is required for the ofrep provider".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "flags.ofrep_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

/// First non-blank value among `keys`, paired with the key that supplied it.
fn env_value<'k>(keys: &[&'k str]) -> Option<(&'k str, String)> {
    keys.iter().find_map(|key| {
        env::var(key).ok().filter(|value| !value.trim().is_empty()).map(|value| (*key, value))
    })
}

fn parse_env<T: FromStr>((key, value): (&str, String)) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    catalog: Option<CatalogPatch>,
    flags: Option<FlagsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    products_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FlagsPatch {
    provider: Option<FlagProvider>,
    ofrep_url: Option<String>,
    timeout_ms: Option<u64>,
    failure_product_id: Option<String>,
    max_latency_ms: Option<u64>,
    values: Option<HashMap<String, FlagValue>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, FlagProvider, LoadOptions, LogFormat};
    use crate::flags::FlagValue;

    static ENV: Mutex<()> = Mutex::new(());

    /// Serializes tests that mutate process environment variables.
    fn exclusive_env() -> Result<MutexGuard<'static, ()>, String> {
        ENV.lock().map_err(|_| "environment mutex poisoned by an earlier test".to_owned())
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn check(condition: bool, message: &str) -> Result<(), String> {
        condition.then_some(()).ok_or_else(|| message.to_owned())
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let _guard = exclusive_env()?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        check(config.server.port == 3550, "default port should be 3550")?;
        check(config.flags.provider == FlagProvider::None, "flags default to no provider")?;
        check(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )?;
        check(
            config.flags.fault_settings().flag_timeout == Duration::from_millis(500),
            "default flag timeout should be 500ms",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation_and_flag_values() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("TEST_CATALOG_DATA_DIR", "/srv/catalog");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("catalog.toml");
            fs::write(
                &path,
                r#"
[catalog]
products_path = "${TEST_CATALOG_DATA_DIR}/products"

[flags]
provider = "static"

[flags.values]
productCatalogFailure = true
productCatalogLatencyMs = 25
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            check(
                config.catalog.products_path == PathBuf::from("/srv/catalog/products"),
                "products path should be interpolated from the environment",
            )?;
            check(config.flags.provider == FlagProvider::Static, "provider should be static")?;
            check(
                config.flags.values.get("productCatalogFailure") == Some(&FlagValue::Bool(true)),
                "boolean flag value should be loaded",
            )?;
            check(
                config.flags.values.get("productCatalogLatencyMs") == Some(&FlagValue::Int(25)),
                "integer flag value should be loaded",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CATALOG_DATA_DIR"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("CATALOG_PRODUCTS_PATH", "/from-env");
        env::set_var("CATALOG_SERVER_PORT", "4000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("catalog.toml");
            fs::write(
                &path,
                r#"
[server]
port = 3000

[catalog]
products_path = "/from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    products_path: Some(PathBuf::from("/from-override")),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            check(
                config.catalog.products_path == PathBuf::from("/from-override"),
                "override products path should win",
            )?;
            check(config.logging.level == "debug", "overridden log level should be debug")?;
            check(config.server.port == 4000, "env port should win over file and defaults")?;
            Ok(())
        })();

        clear_vars(&["CATALOG_PRODUCTS_PATH", "CATALOG_SERVER_PORT"]);
        result
    }

    #[test]
    fn legacy_port_variable_is_honoured() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("PRODUCT_CATALOG_PORT", "8088");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            check(config.server.port == 8088, "PRODUCT_CATALOG_PORT should set the port")
        })();

        clear_vars(&["PRODUCT_CATALOG_PORT"]);
        result
    }

    #[test]
    fn invalid_port_env_is_rejected() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("CATALOG_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            check(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "CATALOG_SERVER_PORT"),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["CATALOG_SERVER_PORT"]);
        result
    }

    #[test]
    fn invalid_alias_value_names_the_alias() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("PRODUCT_CATALOG_PORT", "99999");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            check(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PRODUCT_CATALOG_PORT"),
                "error should name the alias that supplied the value",
            )
        })();

        clear_vars(&["PRODUCT_CATALOG_PORT"]);
        result
    }

    #[test]
    fn interpolation_expands_each_reference_and_rejects_unterminated() -> Result<(), String> {
        let _guard = exclusive_env()?;

        env::set_var("CATALOG_TEST_HOST", "flagd");
        let expanded =
            super::interpolate_env_vars("url = \"http://${CATALOG_TEST_HOST}:${CATALOG_TEST_HOST}\"");
        let unterminated = super::interpolate_env_vars("url = \"${CATALOG_TEST_HOST\"");
        clear_vars(&["CATALOG_TEST_HOST"]);

        check(
            expanded.ok().as_deref() == Some("url = \"http://flagd:flagd\""),
            "every reference should be expanded",
        )?;
        check(
            matches!(unterminated, Err(ConfigError::UnterminatedInterpolation)),
            "a reference without a closing brace should fail",
        )
    }

    #[test]
    fn ofrep_provider_requires_url() -> Result<(), String> {
        let _guard = exclusive_env()?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                flag_provider: Some(FlagProvider::Ofrep),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };

        check(
            matches!(error, ConfigError::Validation(ref message) if message.contains("flags.ofrep_url")),
            "validation failure should mention flags.ofrep_url",
        )
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = exclusive_env()?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        check(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should fail",
        )
    }
}
