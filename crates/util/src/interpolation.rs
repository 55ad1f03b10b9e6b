//! Configuration interpolation for environment variables.
//!
//! Definition documents may reference process environment values in client
//! settings (`Authorization: "Bearer ${env:ZENDESK_TOKEN}"`). Values are
//! resolved once when clients are built, never during a fetch.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w+_-]*)}").expect("env pattern compiles"));

/// Interpolate a string value, replacing `${env:NAME}` patterns.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let mut resolved_env = Vec::new();
    for cap in ENV_PLACEHOLDER.captures_iter(value) {
        let var_name = cap[1].to_string();
        let env_value = std::env::var(&var_name).map_err(|_| InterpolationError::MissingEnvVar { name: var_name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", var_name);
        resolved_env.push((cap[0].to_string(), env_value));
    }

    let mut result = value.to_string();
    for (placeholder, env_value) in resolved_env {
        result = result.replace(&placeholder, &env_value);
    }

    Ok(result)
}

/// Interpolate every value of a header map.
pub fn interpolate_headers(headers: &IndexMap<String, String>) -> Result<IndexMap<String, String>, InterpolationError> {
    headers
        .iter()
        .map(|(name, value)| Ok((name.clone(), interpolate_string(value)?)))
        .collect()
}

/// Errors that can occur during interpolation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },
}
