use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "DASHFEED_ENV";
const CONFIG_DIR_ENV: &str = "DASHFEED_CONFIG_DIR";
const ENV_PREFIX: &str = "DASHFEED";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub finance: FinanceSettings,
    #[serde(default)]
    pub aladin: AladinSettings,
    #[serde(default)]
    pub steam: SteamSettings,
    #[serde(default)]
    pub weather: WeatherSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `DASHFEED_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::from_dir(&config_dir, &environment)
    }

    /// Load configuration from `config_dir` for the named environment.
    pub fn from_dir(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;
        settings.check_deadlines()?;
        Ok(settings)
    }

    /// Handler deadlines must expire before the edge timeout so slow
    /// upstreams degrade through each endpoint's own policy instead of an
    /// empty timeout response.
    pub fn check_deadlines(&self) -> anyhow::Result<()> {
        let edge = self.server.request_timeout_ms;
        for (name, deadline) in [
            ("aladin.deadline_ms", self.aladin.deadline_ms),
            ("weather.serve_deadline_ms", self.weather.serve_deadline_ms),
        ] {
            if deadline >= edge {
                anyhow::bail!(
                    "{name} ({deadline}) must be below server.request_timeout_ms ({edge})"
                );
            }
        }
        Ok(())
    }

    /// Copy of the settings safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.aladin.ttb_key.is_some() {
            copy.aladin.ttb_key = Some("<redacted>".to_string());
        }
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Directory served for every non-API path
    #[serde(default = "ServerSettings::default_static_dir")]
    pub static_dir: String,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_static_dir() -> String {
        "public".to_string()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            static_dir: Self::default_static_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Quote feed (chart API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceSettings {
    #[serde(default = "FinanceSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "FinanceSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// The chart API rejects default HTTP client signatures.
    #[serde(default = "FinanceSettings::default_user_agent")]
    pub user_agent: String,
    #[serde(default = "FinanceSettings::default_symbols")]
    pub symbols: Vec<String>,
}

impl FinanceSettings {
    fn default_base_url() -> String {
        "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
    }

    fn default_timeout_ms() -> u64 {
        8000
    }

    fn default_user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            .to_string()
    }

    fn default_symbols() -> Vec<String> {
        [
            // indices
            "^GSPC", "^DJI", "^IXIC", "^KS11", "^KQ11", "^N225", "^HSI",
            // fx
            "KRW=X", "JPYKRW=X", "EURKRW=X", "CNYKRW=X",
            // commodities
            "GC=F", "SI=F", "CL=F",
            // crypto
            "BTC-USD", "ETH-USD",
            // yields
            "^TNX", "^TYX",
            // volatility
            "^VIX",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
            user_agent: Self::default_user_agent(),
            symbols: Self::default_symbols(),
        }
    }
}

/// Book catalog (Aladin TTB) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AladinSettings {
    #[serde(default = "AladinSettings::default_base_url")]
    pub base_url: String,
    /// API secret; requests fail with 500 while unset
    #[serde(default)]
    pub ttb_key: Option<String>,
    #[serde(default = "AladinSettings::default_max_results")]
    pub max_results: u32,
    #[serde(default = "AladinSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Budget for the whole three-list batch, fallback included
    #[serde(default = "AladinSettings::default_deadline_ms")]
    pub deadline_ms: u64,
}

impl AladinSettings {
    fn default_base_url() -> String {
        "https://www.aladin.co.kr/ttb/api/ItemList.aspx".to_string()
    }

    fn default_max_results() -> u32 {
        10
    }

    fn default_timeout_ms() -> u64 {
        10000
    }

    fn default_deadline_ms() -> u64 {
        12000
    }

    /// The configured key, treating blank values as missing.
    pub fn api_key(&self) -> Option<&str> {
        self.ttb_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for AladinSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            ttb_key: None,
            max_results: Self::default_max_results(),
            timeout_ms: Self::default_timeout_ms(),
            deadline_ms: Self::default_deadline_ms(),
        }
    }
}

/// Game storefront settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteamSettings {
    #[serde(default = "SteamSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "SteamSettings::default_country")]
    pub country: String,
    #[serde(default = "SteamSettings::default_language")]
    pub language: String,
    #[serde(default = "SteamSettings::default_items_per_bucket")]
    pub items_per_bucket: usize,
    #[serde(default = "SteamSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SteamSettings {
    fn default_base_url() -> String {
        "https://store.steampowered.com/api/featuredcategories".to_string()
    }

    fn default_country() -> String {
        "kr".to_string()
    }

    fn default_language() -> String {
        "korean".to_string()
    }

    fn default_items_per_bucket() -> usize {
        10
    }

    fn default_timeout_ms() -> u64 {
        10000
    }
}

impl Default for SteamSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            country: Self::default_country(),
            language: Self::default_language(),
            items_per_bucket: Self::default_items_per_bucket(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Weather forecast, cache and refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSettings {
    #[serde(default = "WeatherSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "WeatherSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "WeatherSettings::default_timezone")]
    pub timezone: String,
    #[serde(default = "WeatherSettings::default_forecast_days")]
    pub forecast_days: u8,
    #[serde(default = "WeatherSettings::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "WeatherSettings::default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Total attempts for a rate-limited (429) upstream call
    #[serde(default = "WeatherSettings::default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit; the wait before retry `n` is `n * backoff_ms`
    #[serde(default = "WeatherSettings::default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "WeatherSettings::default_hourly_limit")]
    pub hourly_limit: usize,
    /// How long a cache-miss request waits for the upstream before serving
    /// an empty snapshot; the fetch itself keeps running and fills the cache
    #[serde(default = "WeatherSettings::default_serve_deadline_ms")]
    pub serve_deadline_ms: u64,
}

impl WeatherSettings {
    fn default_base_url() -> String {
        "https://api.open-meteo.com/v1/forecast".to_string()
    }

    fn default_timeout_ms() -> u64 {
        10000
    }

    fn default_timezone() -> String {
        "Asia/Seoul".to_string()
    }

    fn default_forecast_days() -> u8 {
        7
    }

    fn default_cache_ttl_secs() -> u64 {
        3600
    }

    fn default_refresh_interval_secs() -> u64 {
        1800
    }

    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_ms() -> u64 {
        2000
    }

    fn default_hourly_limit() -> usize {
        48
    }

    fn default_serve_deadline_ms() -> u64 {
        12000
    }
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
            timezone: Self::default_timezone(),
            forecast_days: Self::default_forecast_days(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            refresh_interval_secs: Self::default_refresh_interval_secs(),
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
            hourly_limit: Self::default_hourly_limit(),
            serve_deadline_ms: Self::default_serve_deadline_ms(),
        }
    }
}
