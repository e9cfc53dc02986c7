use anyhow::{bail, Context, Result};
use std::{collections::HashMap, str::FromStr, time::Duration};

/// Supported analyst backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Noop,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "noop" | "none" | "disabled" => Ok(Self::Noop),
            other => bail!("unsupported LLM provider `{other}` (expected `openai` or `noop`)"),
        }
    }
}

/// Environment-driven configuration for the listing analyst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LlmSettings {
    pub const PROVIDER_ENV: &'static str = "LISTING_GUARD_PROVIDER";
    pub const API_KEY_ENV: &'static str = "LISTING_GUARD_API_KEY";
    pub const FALLBACK_API_KEY_ENV: &'static str = "OPENAI_API_KEY";
    pub const ENDPOINT_ENV: &'static str = "LISTING_GUARD_ENDPOINT";
    pub const MODEL_ENV: &'static str = "LISTING_GUARD_MODEL";
    pub const TIMEOUT_ENV: &'static str = "LISTING_GUARD_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `LISTING_GUARD_PROVIDER`: `openai` (default) or `noop`.
    /// * `LISTING_GUARD_API_KEY`: API key, falling back to `OPENAI_API_KEY`.
    ///   Required unless the provider is `noop`.
    /// * `LISTING_GUARD_ENDPOINT`, `LISTING_GUARD_MODEL`, `LISTING_GUARD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Same as [`LlmSettings::from_env`] over an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let non_blank = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match non_blank(Self::PROVIDER_ENV) {
            Some(raw) => raw
                .parse::<ProviderKind>()
                .with_context(|| format!("invalid {}", Self::PROVIDER_ENV))?,
            None => ProviderKind::OpenAi,
        };
        let api_key =
            non_blank(Self::API_KEY_ENV).or_else(|| non_blank(Self::FALLBACK_API_KEY_ENV));
        let api_key = match provider {
            ProviderKind::Noop => api_key.unwrap_or_default(),
            ProviderKind::OpenAi => api_key.with_context(|| {
                format!(
                    "environment variable {} (or {}) must be set to enable listing analysis",
                    Self::API_KEY_ENV,
                    Self::FALLBACK_API_KEY_ENV
                )
            })?,
        };
        let timeout_secs = match non_blank(Self::TIMEOUT_ENV) {
            Some(raw) => Some(
                raw.parse::<u64>().with_context(|| {
                    format!("{} must be a whole number of seconds", Self::TIMEOUT_ENV)
                })?,
            ),
            None => None,
        };

        Ok(Self {
            provider,
            api_key,
            endpoint: non_blank(Self::ENDPOINT_ENV),
            model: non_blank(Self::MODEL_ENV),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
