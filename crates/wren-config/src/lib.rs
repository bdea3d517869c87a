//! # Wren Config
//!
//! 配置文件默认位于 `~/.wren/config.json`，首次加载时自动创建。
//! 文件内容支持 `${VAR}` / `${VAR:-default}` 环境变量展开。

pub mod config;
pub mod manager;

pub use config::{
    Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, SessionConfig, StorageConfig,
};
pub use manager::ConfigManager;

use std::path::{Path, PathBuf};

/// 获取 Wren 配置目录路径
pub fn wren_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wren"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    wren_dir().map(|dir| dir.join("config.json"))
}

/// 初始化 Wren 目录结构：配置文件所在目录和数据目录
pub async fn init_wren_dirs(config_path: &Path, config: &Config) -> ConfigResult<()> {
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let storage = expand_tilde(&config.storage.path)
        .ok_or_else(|| ConfigError::InvalidPath(config.storage.path.clone()))?;
    tokio::fs::create_dir_all(storage).await?;
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None if path == "~" => dirs::home_dir(),
        None => Some(PathBuf::from(path)),
    }
}
