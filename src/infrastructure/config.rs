// Configuration - Store and server settings read once at startup
use crate::domain::request::OffsetConvention;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 1.x-compatible `/query` endpoint
    #[default]
    InfluxQl,
    /// 2.x `/api/v2/query` endpoint
    Flux,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: BackendKind,
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    pub bucket: String,
    pub measurement: String,
    pub org: String,
    pub page_size: u32,
    pub offset_convention: OffsetConvention,
    pub query_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::InfluxQl,
            host: "http://localhost:8086".to_string(),
            token: String::new(),
            database: "trend_data".to_string(),
            retention_policy: "autogen".to_string(),
            bucket: "trend_data".to_string(),
            measurement: "AssetData".to_string(),
            org: "default".to_string(),
            page_size: 50_000,
            offset_convention: OffsetConvention::Exact,
            query_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// `config/trend-store.{toml,yaml,json}` when present, then `TREND__*`
/// environment variables (e.g. `TREND__STORE__HOST`).
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/trend-store").required(false))
        .add_source(
            config::Environment::with_prefix("TREND")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
