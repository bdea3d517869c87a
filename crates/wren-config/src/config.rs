use serde::{Deserialize, Serialize};
use wren_session::{SessionOptions, StressScale, FALLBACK_STRESS_POST, FALLBACK_STRESS_PRE};

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 所有可通过 `get_value` / `set_value` 访问的键
    pub const KEYS: [&'static str; 9] = [
        "version",
        "storage.path",
        "storage.watch",
        "session.stress_scale",
        "session.validate_stress",
        "session.fallback_stress_pre",
        "session.fallback_stress_post",
        "logging.level",
        "logging.json",
    ];

    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["storage", "path"] => Some(self.storage.path.clone()),
            ["storage", "watch"] => Some(self.storage.watch.to_string()),
            ["session", "stress_scale"] => Some(self.session.stress_scale.max().to_string()),
            ["session", "validate_stress"] => Some(self.session.validate_stress.to_string()),
            ["session", "fallback_stress_pre"] => Some(self.session.fallback_stress_pre.to_string()),
            ["session", "fallback_stress_post"] => {
                Some(self.session.fallback_stress_post.to_string())
            }
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["storage", "path"] => {
                self.storage.path = value.to_string();
            }
            ["storage", "watch"] => {
                self.storage.watch = parse_bool(value)?;
            }
            ["session", "stress_scale"] => {
                self.session.stress_scale = value.parse().map_err(ConfigError::Validation)?;
            }
            ["session", "validate_stress"] => {
                self.session.validate_stress = parse_bool(value)?;
            }
            ["session", "fallback_stress_pre"] => {
                self.session.fallback_stress_pre = parse_level(value)?;
            }
            ["session", "fallback_stress_post"] => {
                self.session.fallback_stress_post = parse_level(value)?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "json"] => {
                self.logging.json = parse_bool(value)?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> ConfigResult<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))
}

fn parse_level(value: &str) -> ConfigResult<i32> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid stress level: {}", value)))
}

/// Storage 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 数据目录，支持 `~`
    pub path: String,
    /// 是否监听其他进程对数据目录的修改
    #[serde(default)]
    pub watch: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.wren/storage".to_string(),
            watch: false,
        }
    }
}

/// Session 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default)]
    pub stress_scale: StressScale,
    #[serde(default = "default_validate_stress")]
    pub validate_stress: bool,
    #[serde(default = "default_fallback_pre")]
    pub fallback_stress_pre: i32,
    #[serde(default = "default_fallback_post")]
    pub fallback_stress_post: i32,
}

fn default_validate_stress() -> bool {
    true
}

fn default_fallback_pre() -> i32 {
    FALLBACK_STRESS_PRE
}

fn default_fallback_post() -> i32 {
    FALLBACK_STRESS_POST
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stress_scale: StressScale::Five,
            validate_stress: true,
            fallback_stress_pre: FALLBACK_STRESS_PRE,
            fallback_stress_post: FALLBACK_STRESS_POST,
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        SessionOptions {
            stress_scale: config.stress_scale,
            validate_stress: config.validate_stress,
            fallback_stress_pre: config.fallback_stress_pre,
            fallback_stress_post: config.fallback_stress_post,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Watch error: {0}")]
    #[cfg(feature = "hot-reload")]
    Watch(#[from] notify::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.path, "~/.wren/storage");
        assert_eq!(config.session.stress_scale, StressScale::Five);
        assert_eq!(config.session.fallback_stress_pre, 3);
        assert_eq!(config.session.fallback_stress_post, 2);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_get_and_set_by_dotted_key() {
        let mut config = Config::default();
        config.set_value("session.stress_scale", "10").unwrap();
        config.set_value("storage.watch", "true").unwrap();
        config.set_value("logging.level", "debug").unwrap();

        assert_eq!(config.get_value("session.stress_scale").as_deref(), Some("10"));
        assert_eq!(config.get_value("storage.watch").as_deref(), Some("true"));
        assert_eq!(config.get_value("logging.level").as_deref(), Some("debug"));
        assert_eq!(config.get_value("server.port"), None);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_value("storage.watch", "maybe"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("session.stress_scale", "7"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("nope", "1"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert!(config.set_value("version", "9").is_err());
    }

    #[test]
    fn test_every_listed_key_is_readable() {
        let config = Config::default();
        for key in Config::KEYS {
            assert!(config.get_value(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"version":"0.1.0","session":{"stress_scale":"ten"}}"#)
                .unwrap();
        assert_eq!(config.session.stress_scale, StressScale::Ten);
        assert!(config.session.validate_stress);
        assert_eq!(config.storage, StorageConfig::default());

        let options = SessionOptions::from(&config.session);
        assert_eq!(options.stress_scale, StressScale::Ten);
    }
}
