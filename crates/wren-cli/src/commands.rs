//! 非交互子命令

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use parking_lot::Mutex;
use wren_config::{Config, ConfigManager};
use wren_session::StressScale;
use wren_storage::{
    JsonFileStorage, JsonFileStorageConfig, LocalStore, Persistence, StorageWatcher,
    StressSnapshotUpdate,
};

/// 打开数据目录
pub fn open_store(storage_path: &str) -> anyhow::Result<(LocalStore, Arc<JsonFileStorage>)> {
    let storage = Arc::new(JsonFileStorage::new(JsonFileStorageConfig::new(storage_path))?);
    let store = LocalStore::new(storage.clone());
    Ok((store, storage))
}

/// 监听数据目录，把其他进程的修改打印出来
pub fn start_watch(
    store: &LocalStore,
    storage: Arc<JsonFileStorage>,
    out: impl Write + Send + 'static,
) -> anyhow::Result<(StorageWatcher, wren_storage::Subscription)> {
    let out = Mutex::new(out);
    let watcher = StorageWatcher::start(storage, store.change_bus())?;
    let subscription = store.subscribe_to_external_changes(move |key, value| {
        let _ = writeln!(out.lock(), "{}", format!("🔔 {} changed: {}", key, value).yellow());
    });
    Ok((watcher, subscription))
}

pub fn describe_persistence(persistence: &Persistence) -> String {
    match persistence {
        Persistence::Persisted => "saved".green().to_string(),
        Persistence::Unchanged => "unchanged".dimmed().to_string(),
        Persistence::InMemoryOnly { reason } => format!("not saved: {}", reason).red().to_string(),
    }
}

pub fn streak(store: &LocalStore, record: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let streak = if record {
        let outcome = store.record_completion();
        writeln!(out, "Recorded completion ({})", describe_persistence(&outcome.persistence))?;
        outcome.into_value()
    } else {
        store.read_streak()
    };

    writeln!(out, "{}", format!("🔥 {} day streak ({})", streak.count, streak.tier()).cyan().bold())?;
    writeln!(out, "Total sessions:  {}", streak.total_sessions)?;
    match streak.last_completed_date {
        Some(date) => writeln!(out, "Last completed:  {}", date)?,
        None => writeln!(out, "Last completed:  {}", "never".dimmed())?,
    }
    Ok(())
}

pub fn stress(
    store: &LocalStore,
    config: &Config,
    pre: Option<i32>,
    post: Option<i32>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let scale = config.session.stress_scale;
    if config.session.validate_stress {
        for level in pre.iter().chain(post.iter()) {
            scale.validate(*level)?;
        }
    }

    if pre.is_some() || post.is_some() {
        let update = StressSnapshotUpdate {
            pre,
            post,
            ..Default::default()
        };
        let outcome = store.write_stress_snapshot(update);
        writeln!(out, "Stress reading {}", describe_persistence(&outcome.persistence))?;
    }

    match store.read_stress_snapshot() {
        Some(snapshot) => {
            writeln!(out, "{}", "📊 Latest stress readings".cyan().bold())?;
            writeln!(out, "Before: {}", format_level(scale, snapshot.pre))?;
            writeln!(out, "After:  {}", format_level(scale, snapshot.post))?;
            writeln!(out, "Date:   {}", snapshot.session_date.to_rfc3339())?;
        }
        None => writeln!(out, "{}", "No stress readings recorded yet".dimmed())?,
    }
    Ok(())
}

fn format_level(scale: StressScale, level: Option<i32>) -> String {
    match level {
        Some(level) => format!("{} ({})", level, scale.describe(level)),
        None => "-".to_string(),
    }
}

pub fn snapshot(store: &LocalStore, clear: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if clear {
        let persistence = store.clear_in_progress_session();
        writeln!(out, "In-progress session cleared ({})", describe_persistence(&persistence))?;
        return Ok(());
    }

    writeln!(out, "Session state: {}", store.read_session_flag())?;
    match store.read_in_progress_session() {
        Some(snapshot) => writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?,
        None => writeln!(out, "{}", "No session in progress".dimmed())?,
    }
    Ok(())
}

pub fn reset(store: &LocalStore, out: &mut impl Write) -> anyhow::Result<()> {
    let persistence = store.clear_all();
    writeln!(out, "All Wren data cleared ({})", describe_persistence(&persistence))?;
    Ok(())
}

/// 配置子命令使用的路径
pub fn resolve_config_path(raw: &str) -> PathBuf {
    wren_config::expand_tilde(raw).unwrap_or_else(|| PathBuf::from(raw))
}

pub async fn config_get(path: &Path, key: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let config = ConfigManager::load(path).await?.snapshot().await;
    match config.get_value(key) {
        Some(value) => writeln!(out, "{}", format!("{} = {}", key, value).green())?,
        None => anyhow::bail!("Key not found: {}", key),
    }
    Ok(())
}

pub async fn config_set(path: &Path, key: &str, value: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let manager = ConfigManager::load(path).await?;
    manager.update(|config| config.set_value(key, value)).await?;
    writeln!(out, "{}", format!("✅ Set {} = {}", key, value).green())?;
    Ok(())
}

pub async fn config_init(path: &Path, force: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if path.exists() && !force {
        writeln!(out, "{}", format!("⚠️  Config already exists at {:?}", path).yellow())?;
        writeln!(out, "{}", "Use --force to overwrite".dimmed())?;
        return Ok(());
    }

    let default_config = Config::default();
    wren_config::init_wren_dirs(path, &default_config).await?;
    ConfigManager::new(default_config, path.to_path_buf()).save().await?;

    writeln!(out, "{}", format!("✅ Config initialized at {:?}", path).green())?;
    Ok(())
}

pub async fn config_show(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let config = ConfigManager::load(path).await?.snapshot().await;
    writeln!(out, "{}", "📋 Current Configuration:".cyan().bold())?;
    writeln!(out)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        colored::control::set_override(false);
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_streak_record_then_show() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = open_store(&temp_dir.path().to_string_lossy()).unwrap();

        let recorded = render(|out| streak(&store, true, out));
        assert!(recorded.contains("Recorded completion (saved)"));
        assert!(recorded.contains("1 day streak"));

        let again = render(|out| streak(&store, true, out));
        assert!(again.contains("(unchanged)"));
        assert!(again.contains("Total sessions:  1"));
    }

    #[test]
    fn test_stress_validates_against_config_scale() {
        let store = LocalStore::in_memory();
        let config = Config::default();
        let mut out = Vec::new();
        assert!(stress(&store, &config, Some(8), None, &mut out).is_err());
        assert_eq!(store.read_stress_snapshot(), None);

        let shown = render(|out| stress(&store, &config, Some(4), None, out));
        assert!(shown.contains("Before: 4 (Stressed)"));
        assert!(shown.contains("After:  -"));

        let merged = render(|out| stress(&store, &config, None, Some(2), out));
        assert!(merged.contains("Before: 4"));
        assert!(merged.contains("After:  2 (Relaxed)"));
    }

    #[test]
    fn test_snapshot_and_reset() {
        let store = LocalStore::in_memory();
        let empty = render(|out| snapshot(&store, false, out));
        assert!(empty.contains("Session state: idle"));
        assert!(empty.contains("No session in progress"));

        store.record_completion();
        render(|out| reset(&store, out));
        assert_eq!(store.read_streak().count, 0);
    }

    #[tokio::test]
    async fn test_config_commands_roundtrip() {
        colored::control::set_override(false);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut out = Vec::new();

        config_set(&path, "session.stress_scale", "10", &mut out).await.unwrap();
        config_get(&path, "session.stress_scale", &mut out).await.unwrap();
        assert!(config_get(&path, "nope", &mut out).await.is_err());
        assert!(config_set(&path, "logging.level", "loud", &mut out).await.is_err());
        config_init(&path, false, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("session.stress_scale = 10"));
        assert!(text.contains("Config already exists"));
    }
}
