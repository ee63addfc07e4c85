use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::SessionConfig;
use tracing::warn;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "taker.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_seconds: u64,
    pub grace_delay_seconds: u64,
    pub auto_retry_delay_seconds: u64,
    pub warning_threshold_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8443".into(),
            auth_token: None,
            request_timeout_seconds: 15,
            grace_delay_seconds: 3,
            auto_retry_delay_seconds: 3,
            warning_threshold_seconds: 300,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            grace_delay: Duration::from_secs(self.grace_delay_seconds),
            auto_retry_delay: Duration::from_secs(self.auto_retry_delay_seconds),
            warning_threshold_seconds: self.warning_threshold_seconds,
            ..SessionConfig::default()
        }
    }
}

/// File values first, then environment overrides. A missing default
/// `taker.toml` is fine; a path named explicitly must exist and parse.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let file_cfg = match config_path {
        Some(path) => read_file_config(path)?,
        None => match read_file_config(Path::new(DEFAULT_CONFIG_FILE)) {
            Ok(file_cfg) => file_cfg,
            Err(err) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                warn!("config: ignoring {DEFAULT_CONFIG_FILE} err={err:#}");
                HashMap::new()
            }
            Err(_) => HashMap::new(),
        },
    };

    let mut settings = Settings::default();
    apply_overrides(&mut settings, &file_cfg, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_file_config(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("config file '{}' is not a flat string table", path.display()))
}

fn apply_overrides(
    settings: &mut Settings,
    file_cfg: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("auth_token") {
        settings.auth_token = Some(v.clone());
    }
    set_number(&mut settings.request_timeout_seconds, file_cfg.get("request_timeout_seconds"));
    set_number(&mut settings.grace_delay_seconds, file_cfg.get("grace_delay_seconds"));
    set_number(
        &mut settings.auto_retry_delay_seconds,
        file_cfg.get("auto_retry_delay_seconds"),
    );
    set_number(
        &mut settings.warning_threshold_seconds,
        file_cfg.get("warning_threshold_seconds"),
    );

    if let Some(v) = env("TAKER_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
    set_number(
        &mut settings.request_timeout_seconds,
        env("APP__REQUEST_TIMEOUT_SECONDS").as_ref(),
    );
    set_number(
        &mut settings.grace_delay_seconds,
        env("APP__GRACE_DELAY_SECONDS").as_ref(),
    );
    set_number(
        &mut settings.auto_retry_delay_seconds,
        env("APP__AUTO_RETRY_DELAY_SECONDS").as_ref(),
    );
    set_number(
        &mut settings.warning_threshold_seconds,
        env("APP__WARNING_THRESHOLD_SECONDS").as_ref(),
    );
}

fn set_number(target: &mut u64, raw: Option<&String>) {
    if let Some(parsed) = raw.and_then(|v| v.trim().parse::<u64>().ok()) {
        *target = parsed;
    }
}

pub fn normalize_base_url(raw_base_url: &str) -> anyhow::Result<String> {
    let trimmed = raw_base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(Settings::default().api_base_url);
    }

    let base_url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed =
        Url::parse(&base_url).with_context(|| format!("invalid api base url '{raw_base_url}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported scheme '{}' in api base url", parsed.scheme());
    }
    Ok(base_url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
