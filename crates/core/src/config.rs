use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["supportdesk.toml", "config/supportdesk.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app: AppSection,
    pub services: ServicesConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AppSection {
    pub env: AppEnv,
    pub default_user_id: String,
}

#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub support_url: String,
    pub refund_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEnv {
    Development,
    Staging,
    Production,
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
    pub app_env: Option<AppEnv>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub support_url: Option<String>,
    pub refund_url: Option<String>,
    pub auth_token: Option<String>,
    pub server_port: Option<u16>,
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
            app: AppSection { env: AppEnv::Development, default_user_id: "demo-user".to_string() },
            services: ServicesConfig {
                support_url: "http://127.0.0.1:8080".to_string(),
                refund_url: "http://127.0.0.1:8080".to_string(),
                timeout_secs: 10,
                max_retries: 2,
                retry_base_delay_ms: 200,
            },
            auth: AuthConfig { token: None },
            database: DatabaseConfig {
                url: "sqlite://supportdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl std::str::FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unsupported app env `{other}` (expected development|staging|production)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth.token.as_ref().map(|token| token.expose_secret())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(app) = patch.app {
            if let Some(env) = app.env {
                self.app.env = env;
            }
            if let Some(default_user_id) = app.default_user_id {
                self.app.default_user_id = default_user_id;
            }
        }

        if let Some(services) = patch.services {
            if let Some(support_url) = services.support_url {
                self.services.support_url = support_url;
            }
            if let Some(refund_url) = services.refund_url {
                self.services.refund_url = refund_url;
            }
            if let Some(timeout_secs) = services.timeout_secs {
                self.services.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = services.max_retries {
                self.services.max_retries = max_retries;
            }
            if let Some(retry_base_delay_ms) = services.retry_base_delay_ms {
                self.services.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(auth_token_value) = auth.token {
                self.auth.token = Some(secret_value(auth_token_value));
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

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
        if let Some(value) = read_env("SUPPORTDESK_APP_ENV") {
            self.app.env = value.parse()?;
        }
        if let Some(value) = read_env("SUPPORTDESK_DEFAULT_USER_ID") {
            self.app.default_user_id = value;
        }

        if let Some(value) = read_env("SUPPORTDESK_SUPPORT_SERVICE_URL") {
            self.services.support_url = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_REFUND_SERVICE_URL") {
            self.services.refund_url = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVICES_TIMEOUT_SECS") {
            self.services.timeout_secs = parse_u64("SUPPORTDESK_SERVICES_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVICES_MAX_RETRIES") {
            self.services.max_retries = parse_u32("SUPPORTDESK_SERVICES_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVICES_RETRY_BASE_DELAY_MS") {
            self.services.retry_base_delay_ms =
                parse_u64("SUPPORTDESK_SERVICES_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("SUPPORTDESK_AUTH_TOKEN") {
            self.auth.token = Some(secret_value(value));
        }

        if let Some(value) = read_env("SUPPORTDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SUPPORTDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SUPPORTDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SUPPORTDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVER_PORT") {
            self.server.port = parse_u16("SUPPORTDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SUPPORTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SUPPORTDESK_LOGGING_LEVEL").or_else(|| read_env("SUPPORTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SUPPORTDESK_LOGGING_FORMAT").or_else(|| read_env("SUPPORTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(app_env) = overrides.app_env {
            self.app.env = app_env;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(support_url) = overrides.support_url {
            self.services.support_url = support_url;
        }
        if let Some(refund_url) = overrides.refund_url {
            self.services.refund_url = refund_url;
        }
        if let Some(auth_token) = overrides.auth_token {
            self.auth.token = Some(secret_value(auth_token));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_app(&self.app, &self.auth)?;
        validate_services(&self.services)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_app(app: &AppSection, auth: &AuthConfig) -> Result<(), ConfigError> {
    if app.default_user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "app.default_user_id must not be empty (set SUPPORTDESK_DEFAULT_USER_ID)".to_string(),
        ));
    }

    if app.env == AppEnv::Production {
        let missing = auth
            .token
            .as_ref()
            .map(|token| token.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "auth.token is required when app.env is production (set SUPPORTDESK_AUTH_TOKEN)"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("services.support_url", &services.support_url), ("services.refund_url", &services.refund_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if services.timeout_secs == 0 || services.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "services.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if services.max_retries > 10 {
        return Err(ConfigError::Validation(
            "services.max_retries must be at most 10".to_string(),
        ));
    }

    if services.retry_base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "services.retry_base_delay_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
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

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    app: Option<AppPatch>,
    services: Option<ServicesPatch>,
    auth: Option<AuthPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AppPatch {
    env: Option<AppEnv>,
    default_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    support_url: Option<String>,
    refund_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, AppEnv, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SUPPORTDESK_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("supportdesk.toml");
            fs::write(
                &path,
                r#"
[auth]
token = "${TEST_SUPPORTDESK_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.auth_token() == Some("token-from-env"), "token should be interpolated")
        })();

        clear_vars(&["TEST_SUPPORTDESK_TOKEN"]);
        result
    }

    #[test]
    fn frontend_env_names_configure_services() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_DEFAULT_USER_ID", "agent-42");
        env::set_var("SUPPORTDESK_SUPPORT_SERVICE_URL", "http://support.internal:9001");
        env::set_var("SUPPORTDESK_REFUND_SERVICE_URL", "https://refund.internal");
        env::set_var("SUPPORTDESK_APP_ENV", "staging");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.app.default_user_id == "agent-42", "default user id from env")?;
            ensure(
                config.services.support_url == "http://support.internal:9001",
                "support url from env",
            )?;
            ensure(config.services.refund_url == "https://refund.internal", "refund url from env")?;
            ensure(config.app.env == AppEnv::Staging, "app env from env")
        })();

        clear_vars(&[
            "SUPPORTDESK_DEFAULT_USER_ID",
            "SUPPORTDESK_SUPPORT_SERVICE_URL",
            "SUPPORTDESK_REFUND_SERVICE_URL",
            "SUPPORTDESK_APP_ENV",
        ]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_LOG_LEVEL", "warn");
        env::set_var("SUPPORTDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["SUPPORTDESK_LOG_LEVEL", "SUPPORTDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SUPPORTDESK_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("supportdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070

[services]
refund_url = "http://refund-from-file:8000"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(
                config.services.refund_url == "http://refund-from-file:8000",
                "file value should win over default",
            )
        })();

        clear_vars(&["SUPPORTDESK_DATABASE_URL", "SUPPORTDESK_SERVER_PORT"]);
        result
    }

    #[test]
    fn production_requires_an_auth_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_APP_ENV", "production");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("auth.token")
            );
            ensure(has_message, "validation failure should mention auth.token")?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    auth_token: Some("prod-token".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.app.env == AppEnv::Production, "production env should load with token")
        })();

        clear_vars(&["SUPPORTDESK_APP_ENV"]);
        result
    }

    #[test]
    fn invalid_service_url_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                support_url: Some("support.internal".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("services.support_url")
            ),
            "validation failure should name services.support_url",
        )
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_SERVICES_MAX_RETRIES", "many");
        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { ref key, .. })
                if key == "SUPPORTDESK_SERVICES_MAX_RETRIES" =>
            {
                Ok(())
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override error".to_string()),
        };

        clear_vars(&["SUPPORTDESK_SERVICES_MAX_RETRIES"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SUPPORTDESK_AUTH_TOKEN", "bearer-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bearer-secret-value"), "debug output should not contain token")?;
            ensure(
                config.auth.token.as_ref().map(|token| token.expose_secret().to_string())
                    == Some("bearer-secret-value".to_string()),
                "token should still be readable through expose_secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["SUPPORTDESK_AUTH_TOKEN"]);
        result
    }
}
