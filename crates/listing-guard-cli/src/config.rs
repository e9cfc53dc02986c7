use std::{collections::HashMap, env, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use config::{Config, File};
use listing_guard_core::{LlmSettings, RiskThresholds};
use serde::Deserialize;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const BIND_ENV: &str = "LISTING_GUARD_BIND";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Application settings from an optional config file plus environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub database_url: Option<String>,
    pub llm: LlmOverrides,
    pub pricing: PricingConfig,
    pub thresholds: RiskThresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database_url: None,
            llm: LlmOverrides::default(),
            pricing: PricingConfig::default(),
            thresholds: RiskThresholds::default(),
        }
    }
}

/// `[llm]` section. Set values win over the corresponding environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl LlmOverrides {
    pub fn apply(&self, vars: &mut HashMap<String, String>) {
        let pairs = [
            (LlmSettings::PROVIDER_ENV, self.provider.clone()),
            (LlmSettings::API_KEY_ENV, self.api_key.clone()),
            (LlmSettings::ENDPOINT_ENV, self.endpoint.clone()),
            (LlmSettings::MODEL_ENV, self.model.clone()),
            (
                LlmSettings::TIMEOUT_ENV,
                self.timeout_secs.map(|secs| secs.to_string()),
            ),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                vars.insert(key.to_string(), value);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Product-search API queried alongside the simulated sources.
    pub search_endpoint: Option<String>,
    /// Humantime duration such as `"10s"`.
    pub search_timeout: Option<String>,
    /// YAML file of per-category price range overrides.
    pub table_path: Option<PathBuf>,
}

impl PricingConfig {
    pub fn search_timeout(&self) -> Result<Option<Duration>> {
        self.search_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw)
                    .with_context(|| format!("invalid pricing.search_timeout `{raw}`"))
            })
            .transpose()
    }
}

impl AppConfig {
    /// Load `.env`, then the config file (if any), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .set_override_option("database_url", lookup(DATABASE_URL_ENV))?
            .set_override_option("bind", lookup(BIND_ENV))?
            .build()
            .context("failed to load configuration")?;
        let app: AppConfig = config
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(app)
    }

    /// LLM settings from the process environment with `[llm]` applied on top.
    pub fn llm_settings(&self) -> Result<LlmSettings> {
        let mut vars: HashMap<String, String> = env::vars().collect();
        self.llm.apply(&mut vars);
        LlmSettings::from_vars(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file() {
        let config = AppConfig::load_with_env(None, no_env).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert!(config.database_url.is_none());
        assert_eq!(config.thresholds, RiskThresholds::default());
    }

    #[test]
    fn reads_toml_file_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing-guard.toml");
        fs::write(
            &path,
            r#"
bind = "0.0.0.0:8080"
database_url = "postgres://file/db"

[llm]
provider = "noop"

[pricing]
search_timeout = "3s"
table_path = "prices.yaml"

[thresholds]
medium = 25
high = 60
"#,
        )
        .unwrap();

        let config = AppConfig::load_with_env(Some(&path), |key| {
            (key == DATABASE_URL_ENV).then(|| "postgres://env/db".to_string())
        })
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.database_url.as_deref(), Some("postgres://env/db"));
        assert_eq!(config.llm.provider.as_deref(), Some("noop"));
        assert_eq!(
            config.pricing.search_timeout().unwrap(),
            Some(Duration::from_secs(3))
        );
        assert_eq!(config.pricing.table_path, Some(PathBuf::from("prices.yaml")));
        assert_eq!(config.thresholds.high, 60);
    }

    #[test]
    fn llm_overrides_win_over_environment() {
        let mut vars = HashMap::from([
            (LlmSettings::PROVIDER_ENV.to_string(), "openai".to_string()),
            (LlmSettings::MODEL_ENV.to_string(), "gpt-4o".to_string()),
        ]);
        LlmOverrides {
            provider: Some("noop".into()),
            timeout_secs: Some(5),
            ..LlmOverrides::default()
        }
        .apply(&mut vars);

        assert_eq!(vars[LlmSettings::PROVIDER_ENV], "noop");
        assert_eq!(vars[LlmSettings::MODEL_ENV], "gpt-4o");
        assert_eq!(vars[LlmSettings::TIMEOUT_ENV], "5");
    }

    #[test]
    fn rejects_bad_timeout() {
        let pricing = PricingConfig {
            search_timeout: Some("soon".into()),
            ..PricingConfig::default()
        };
        assert!(pricing.search_timeout().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load_with_env(Some(&path), no_env).is_err());
    }
}
