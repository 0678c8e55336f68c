use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator, IntoStaticStr};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀，示例：VC__SERVER__PORT=9999
pub const ENV_PREFIX: &str = "VC";

/// 存储后端类型
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, EnumIter, AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file on local disk
    File,
    /// SeaORM: SQLite (embedded), PostgreSQL or MySQL
    #[default]
    Database,
    /// Supabase / PostgREST over HTTPS
    Supabase,
    /// Process memory, lost on restart
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StorageBackend::iter()
            .find(|b| b.as_ref() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = StorageBackend::iter().map(|b| b.into()).collect();
                format!(
                    "Invalid storage backend: '{}'. Valid: {}",
                    s,
                    valid.join(", ")
                )
            })
    }
}

/// 应用配置（从 TOML + 环境变量加载，启动时使用）
///
/// - server: 监听地址、端口、CPU 数量、可信代理
/// - storage: 计数器存储后端及其连接参数
/// - geo: 访客地理位置查询
/// - cors: 跨域配置
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// Peers allowed to set X-Forwarded-For (IPs or CIDR). Empty = trust the header from anyone.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub file: FileStorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
}

/// 文件存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStorageConfig {
    #[serde(default = "default_count_file")]
    pub path: String,
    #[serde(default = "default_visitor_log_path")]
    pub visitor_log_path: String,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Supabase (PostgREST) 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_counter_table")]
    pub counter_table: String,
    #[serde(default = "default_visitor_table")]
    pub visitor_table: String,
    /// RPC used to run the visitor table DDL; services without it are tolerated
    #[serde(default = "default_sql_rpc")]
    pub sql_rpc: String,
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// 访客地理位置配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 查询失败时是否让请求失败
    #[serde(default = "default_true")]
    pub strict: bool,
    /// 外部 API URL，使用 {ip} 作为占位符
    #[serde(default = "default_geo_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub ipinfo_token: Option<String>,
    /// MaxMindDB 文件路径 (GeoLite2-City.mmdb)，可读时优先于外部 API
    #[serde(default)]
    pub maxminddb_path: Option<String>,
    #[serde(default = "default_geo_timeout_secs")]
    pub timeout_secs: u64,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `["*"]` allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_true")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_count_file() -> String {
    "visitor-count.json".to_string()
}

fn default_visitor_log_path() -> String {
    "visitors.jsonl".to_string()
}

fn default_database_url() -> String {
    "sqlite://visitor-count.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

fn default_retry_max_delay_ms() -> u64 {
    1000
}

fn default_counter_table() -> String {
    "visitor_count".to_string()
}

fn default_visitor_table() -> String {
    "visitor_info".to_string()
}

fn default_sql_rpc() -> String {
    "execute_sql".to_string()
}

fn default_max_cas_retries() -> u32 {
    8
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_geo_api_url() -> String {
    "https://ipinfo.io/{ip}/json".to_string()
}

fn default_geo_timeout_secs() -> u64 {
    3
}

fn default_cors_max_age() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: default_count_file(),
            visitor_log_path: default_visitor_log_path(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            counter_table: default_counter_table(),
            visitor_table: default_visitor_table(),
            sql_rpc: default_sql_rpc(),
            max_cas_retries: default_max_cas_retries(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: true,
            api_url: default_geo_api_url(),
            ipinfo_token: None,
            maxminddb_path: None,
            timeout_secs: default_geo_timeout_secs(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: true,
        }
    }
}
