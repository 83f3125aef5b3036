use contracts::usecases::u501_sync_from_erp::SyncStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source_api: SourceApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceApiKind {
    #[default]
    Mock,
    Rest,
    Erp,
}

/// Параметры внешнего источника (ERP)
#[derive(Debug, Deserialize, Clone)]
pub struct SourceApiConfig {
    #[serde(default)]
    pub kind: SourceApiKind,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// REST: базовый URL
    pub base_url: Option<String>,
    pub token: Option<String>,
    /// ERP: сервисы дебиторки (клиенты, платежи), продаж и инвентаря
    pub receivables_url: Option<String>,
    pub sales_url: Option<String>,
    pub inventory_url: Option<String>,
    /// Подстроки в теле ответа, означающие ошибку сервера ERP
    #[serde(default = "default_error_markers")]
    pub error_markers: Vec<String>,
}

impl Default for SourceApiConfig {
    fn default() -> Self {
        Self {
            kind: SourceApiKind::Mock,
            timeout_secs: default_timeout_secs(),
            base_url: None,
            token: None,
            receivables_url: None,
            sales_url: None,
            inventory_url: None,
            error_markers: default_error_markers(),
        }
    }
}

/// Параметры синхронизации и планировщика
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub strategy: SyncStrategy,
    /// Cron-выражение (с секундами), например "0 */15 * * * *"
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_customer_page_size")]
    pub customer_page_size: u32,
    #[serde(default = "default_max_customer_pages")]
    pub max_customer_pages: u32,
    /// Глубина исторической догрузки в днях (0 = только сегодня)
    #[serde(default)]
    pub backfill_days: u32,
    /// Смещение локального времени арендаторов от UTC
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_progress_ttl_hours")]
    pub progress_ttl_hours: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::default(),
            schedule: default_schedule(),
            customer_page_size: default_customer_page_size(),
            max_customer_pages: default_max_customer_pages(),
            backfill_days: 0,
            utc_offset_hours: default_utc_offset_hours(),
            progress_ttl_hours: default_progress_ttl_hours(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_error_markers() -> Vec<String> {
    vec![
        "System.Exception".to_string(),
        "System.Web.Services.Protocols.SoapException".to_string(),
        "Error en el servidor".to_string(),
        "ORA-".to_string(),
    ]
}

fn default_schedule() -> String {
    "0 */30 * * * *".to_string()
}

fn default_customer_page_size() -> u32 {
    500
}

fn default_max_customer_pages() -> u32 {
    200
}

fn default_utc_offset_hours() -> i32 {
    -5
}

fn default_progress_ttl_hours() -> i64 {
    24
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[server]
port = 3000

[source_api]
kind = "mock"

[sync]
strategy = "bulk"
schedule = "0 */30 * * * *"
backfill_days = 0
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    // Try to find config.toml next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    // Fall back to default config
    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    // If absolute path, use as is
    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    // If relative path, resolve it relative to the executable directory
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let resolved_path = exe_dir.join(db_path);
            return Ok(resolved_path);
        }
    }

    // Fallback: use relative to current directory
    Ok(PathBuf::from(db_path_str))
}
