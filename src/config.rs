use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Period of the scheduled fleet cycle in seconds.
    pub control_interval_secs: u64,
    /// Greenhouses processed in parallel during a fleet cycle.
    pub fleet_concurrency: usize,
    /// Spawn the scheduled fleet cycle. Request-triggered cycles always work.
    pub automation_enabled: bool,
    /// Greenhouse used when a request does not name one.
    pub default_greenhouse_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            control_interval_secs: parse_positive(
                "CONTROL_INTERVAL_SECS",
                &optional("CONTROL_INTERVAL_SECS", "300"),
            )?,
            fleet_concurrency: parse_positive("FLEET_CONCURRENCY", &optional("FLEET_CONCURRENCY", "4"))?
                as usize,
            automation_enabled: parse_bool("AUTOMATION_ENABLED", &optional("AUTOMATION_ENABLED", "true"))?,
            default_greenhouse_id: optional("DEFAULT_GREENHOUSE_ID", "greenhouse-01"),
        })
    }
}

/// Parse a strictly positive integer.
fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got: {raw:?}"))?;
    if value == 0 {
        bail!("{key} must be a positive integer, got: 0");
    }
    Ok(value)
}

/// Accepts `true`/`false`/`1`/`0`/`yes`/`no` in any case.
fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("{key} must be a boolean, got: {raw:?}"),
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
