use std::env;
use std::fs;
use std::path::Path;

use supportdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("app.env", &["SUPPORTDESK_APP_ENV"], format!("{:?}", config.app.env)),
        field(
            "app.default_user_id",
            &["SUPPORTDESK_DEFAULT_USER_ID"],
            config.app.default_user_id.clone(),
        ),
        field(
            "services.support_url",
            &["SUPPORTDESK_SUPPORT_SERVICE_URL"],
            config.services.support_url.clone(),
        ),
        field(
            "services.refund_url",
            &["SUPPORTDESK_REFUND_SERVICE_URL"],
            config.services.refund_url.clone(),
        ),
        field(
            "services.timeout_secs",
            &["SUPPORTDESK_SERVICES_TIMEOUT_SECS"],
            config.services.timeout_secs.to_string(),
        ),
        field(
            "services.max_retries",
            &["SUPPORTDESK_SERVICES_MAX_RETRIES"],
            config.services.max_retries.to_string(),
        ),
        field(
            "services.retry_base_delay_ms",
            &["SUPPORTDESK_SERVICES_RETRY_BASE_DELAY_MS"],
            config.services.retry_base_delay_ms.to_string(),
        ),
        field("auth.token", &["SUPPORTDESK_AUTH_TOKEN"], redact_token(config.auth_token())),
        field("database.url", &["SUPPORTDESK_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["SUPPORTDESK_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["SUPPORTDESK_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            &["SUPPORTDESK_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["SUPPORTDESK_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["SUPPORTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["SUPPORTDESK_LOGGING_LEVEL", "SUPPORTDESK_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["SUPPORTDESK_LOGGING_FORMAT", "SUPPORTDESK_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most a short prefix of the token visible.
fn redact_token(token: Option<&str>) -> String {
    let Some(token) = token.map(str::trim) else {
        return "<unset>".to_string();
    };
    if token.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = token.split_once('_') {
        return format!("{prefix}_***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source, redact_token};

    #[test]
    fn tokens_are_redacted() {
        assert_eq!(redact_token(None), "<unset>");
        assert_eq!(redact_token(Some("  ")), "<empty>");
        assert_eq!(redact_token(Some("sd_live_abc123")), "sd_***");
        assert_eq!(redact_token(Some("opaque")), "<redacted>");
    }

    #[test]
    fn file_source_is_reported_for_nested_keys() {
        let doc: Value = "[services]\nsupport_url = \"http://support.internal\"\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "services.support_url"));
        assert!(!contains_path(&doc, "services.refund_url"));
        assert_eq!(
            field_source("services.support_url", &[], Some(&doc), None),
            "file (config file)"
        );
        assert_eq!(field_source("services.refund_url", &[], Some(&doc), None), "default");
    }
}
