use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
    #[cfg(feature = "hot-reload")]
    watcher: Option<Arc<parking_lot::Mutex<notify::RecommendedWatcher>>>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let config = Self::parse(&content)?;
            Self::validate(&config)?;
            config
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self::new(config, path.to_path_buf()))
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.wren/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 用现成的配置创建管理器，不读写文件
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
            #[cfg(feature = "hot-reload")]
            watcher: None,
        }
    }

    /// 获取配置的共享引用
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// 当前配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 保存配置到文件
    pub async fn save(&self) -> ConfigResult<()> {
        self.save_to(&self.path).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 保存配置到指定路径
    pub async fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = {
            let config = self.config.read().await;
            serde_json::to_string_pretty(&*config)?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload(&self) -> ConfigResult<()> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let new_config = Self::parse(&content)?;
        Self::validate(&new_config)?;

        *self.config.write().await = new_config;

        info!("Config reloaded from {:?}", self.path);
        Ok(())
    }

    /// 修改配置，校验通过后保存
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        {
            let mut config = self.config.write().await;
            let mut updated = config.clone();
            f(&mut updated)?;
            Self::validate(&updated)?;
            *config = updated;
        }
        self.save().await
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.storage.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.path cannot be empty".to_string(),
            ));
        }

        let session = &config.session;
        if session.validate_stress {
            let scale = session.stress_scale;
            for (key, level) in [
                ("session.fallback_stress_pre", session.fallback_stress_pre),
                ("session.fallback_stress_post", session.fallback_stress_post),
            ] {
                if scale.validate(level).is_err() {
                    return Err(ConfigError::Validation(format!(
                        "{} = {} is outside the 1-{} scale",
                        key,
                        level,
                        scale.max()
                    )));
                }
            }
        }

        Ok(())
    }

    /// 展开环境变量并解析
    fn parse(content: &str) -> ConfigResult<Config> {
        let content = Self::expand_env_vars(content)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match (std::env::var(var_name), default_value) {
                (Ok(val), _) => val,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "hot-reload")]
impl ConfigManager {
    /// 启动热重载监听
    ///
    /// 文件修改后在后台线程中重新读取；解析或校验失败时保留旧配置。
    pub fn watch<F>(&mut self, callback: F) -> ConfigResult<()>
    where
        F: Fn(&Config) + Send + 'static,
    {
        use notify::{
            Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode,
            Result as NotifyResult, Watcher,
        };
        use std::sync::mpsc::channel;
        use std::thread;

        let path = self.path.clone();
        let config = Arc::clone(&self.config);

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: NotifyResult<Event>| {
                if let Ok(event) = res {
                    if event.kind.is_modify() {
                        let _ = tx.send(());
                    }
                }
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        self.watcher = Some(Arc::new(parking_lot::Mutex::new(watcher)));

        thread::spawn(move || {
            while rx.recv().is_ok() {
                debug!("Config file changed, reloading...");

                let reload_result = std::fs::read_to_string(&path)
                    .map_err(ConfigError::from)
                    .and_then(|content| ConfigManager::parse(&content))
                    .and_then(|new_config| {
                        ConfigManager::validate(&new_config)?;
                        Ok(new_config)
                    });

                match reload_result {
                    Ok(new_config) => {
                        *config.blocking_write() = new_config.clone();
                        info!("Config hot-reloaded successfully");
                        callback(&new_config);
                    }
                    Err(e) => {
                        warn!("Failed to hot-reload config: {}", e);
                    }
                }
            }
            debug!("Config watcher thread exiting");
        });

        info!("Started watching config file: {:?}", self.path);
        Ok(())
    }

    /// 停止热重载监听
    pub fn unwatch(&mut self) -> ConfigResult<()> {
        if let Some(watcher) = self.watcher.take() {
            use notify::Watcher;
            watcher.lock().unwatch(&self.path)?;
            info!("Stopped watching config file");
        }
        Ok(())
    }
}
