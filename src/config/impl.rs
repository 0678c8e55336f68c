use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::{AppConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX};

static CONFIG: OnceLock<ArcSwap<AppConfig>> = OnceLock::new();

/// Environment variables understood for compatibility with older deployments,
/// mapped onto their config keys. They win over everything else.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("DATABASE_URL", "storage.database.url"),
    ("SUPABASE_URL", "storage.supabase.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "storage.supabase.service_key"),
    ("IPINFO_TOKEN", "geo.ipinfo_token"),
];

/// Comma-separated origin list; setting it also turns CORS on
const LEGACY_CORS_ENV_VAR: &str = "CORS_ALLOWED_ORIGINS";

const SAMPLE_CONFIG_HEADER: &str = "\
# CORS is disabled by default, so browsers only accept same-origin calls.
# To serve a page on another domain set [cors] enabled = true with
# allowed_origins, or CORS_ALLOWED_ORIGINS=\"https://a.example,https://b.example\".

";

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

fn apply_legacy_cors(builder: Builder, raw: Option<&str>) -> Result<Builder, config::ConfigError> {
    let origins = raw.map(parse_origin_list).unwrap_or_default();
    if origins.is_empty() {
        return Ok(builder);
    }
    builder
        .set_override("cors.enabled", true)?
        .set_override("cors.allowed_origins", origins)
}

impl AppConfig {
    /// 从 TOML 文件和环境变量构建配置
    ///
    /// 优先级：旧版 ENV (PORT 等) > VC__ 前缀 ENV > TOML 文件 > 默认值
    pub fn build(path: &str) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("server.trusted_proxies"),
            );

        for (var, key) in LEGACY_ENV_VARS {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }
        let cors_origins = std::env::var(LEGACY_CORS_ENV_VAR).ok();
        builder = apply_legacy_cors(builder, cors_origins.as_deref())?;

        builder.build()?.try_deserialize::<AppConfig>()
    }

    /// Like [`AppConfig::build`], but falls back to defaults when the sources are unusable.
    ///
    /// Logging is not up yet when this runs, so problems go to stderr.
    pub fn load(path: &str) -> Self {
        match Self::build(path) {
            Ok(config) => {
                if std::path::Path::new(path).exists() {
                    eprintln!("[INFO] Configuration loaded from: {}", path);
                }
                config
            }
            Err(e) => {
                eprintln!("[ERROR] Failed to load config from {}: {}", path, e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        match toml::to_string_pretty(&Self::default()) {
            Ok(body) => format!("{}{}", SAMPLE_CONFIG_HEADER, body),
            Err(e) => format!("# Error generating sample config: {}", e),
        }
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks. Falls back to `config.toml` when
/// [`init_config`] was never called.
pub fn get_config() -> Arc<AppConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(AppConfig::load(DEFAULT_CONFIG_PATH)))
        .load_full()
}

/// Initialize the global configuration from `path` (or `config.toml`)
///
/// Only the first call has any effect.
pub fn init_config(path: Option<&str>) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(AppConfig::load(path.unwrap_or(DEFAULT_CONFIG_PATH))));
}

/// Swap in a new configuration, e.g. after applying command-line overrides
pub fn replace_config(config: AppConfig) {
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(config)),
        None => {
            let _ = CONFIG.set(ArcSwap::from_pointee(config));
        }
    }
}
