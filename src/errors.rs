use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    StorageUnavailable(String),
    MalformedState(String),
    NotInitialized(String),
    ExternalLookup(String),
    Configuration(String),
    Serialization(String),
}

impl CounterError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            CounterError::StorageUnavailable(_) => "E001",
            CounterError::MalformedState(_) => "E002",
            CounterError::NotInitialized(_) => "E003",
            CounterError::ExternalLookup(_) => "E004",
            CounterError::Configuration(_) => "E005",
            CounterError::Serialization(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            CounterError::StorageUnavailable(_) => "Storage Unavailable",
            CounterError::MalformedState(_) => "Malformed State",
            CounterError::NotInitialized(_) => "Counter Not Initialized",
            CounterError::ExternalLookup(_) => "External Lookup Failure",
            CounterError::Configuration(_) => "Configuration Error",
            CounterError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            CounterError::StorageUnavailable(msg)
            | CounterError::MalformedState(msg)
            | CounterError::NotInitialized(msg)
            | CounterError::ExternalLookup(msg)
            | CounterError::Configuration(msg)
            | CounterError::Serialization(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CounterError {}

// 便捷的构造函数
impl CounterError {
    pub fn storage_unavailable<T: Into<String>>(msg: T) -> Self {
        CounterError::StorageUnavailable(msg.into())
    }

    pub fn malformed_state<T: Into<String>>(msg: T) -> Self {
        CounterError::MalformedState(msg.into())
    }

    pub fn not_initialized<T: Into<String>>(msg: T) -> Self {
        CounterError::NotInitialized(msg.into())
    }

    pub fn external_lookup<T: Into<String>>(msg: T) -> Self {
        CounterError::ExternalLookup(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        CounterError::Configuration(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        CounterError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for CounterError {
    fn from(err: sea_orm::DbErr) -> Self {
        CounterError::StorageUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for CounterError {
    fn from(err: std::io::Error) -> Self {
        CounterError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CounterError {
    fn from(err: serde_json::Error) -> Self {
        CounterError::Serialization(err.to_string())
    }
}

impl From<ureq::Error> for CounterError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => {
                CounterError::StorageUnavailable(format!("remote returned HTTP {}", status))
            }
            other => CounterError::StorageUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CounterError>;
