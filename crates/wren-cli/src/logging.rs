//! 日志初始化
//!
//! 日志统一写到 stderr，stdout 只留给会话内容。

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wren_config::LoggingConfig;

/// 根据配置和命令行参数初始化 tracing
///
/// 级别优先级：`--debug` > `--log-level` / `WREN_LOG` > 配置文件。
pub fn init(config: &LoggingConfig, level_override: Option<&str>, debug: bool) -> anyhow::Result<()> {
    let level = if debug {
        "debug".to_string()
    } else {
        level_override
            .map(str::to_string)
            .unwrap_or_else(|| config.level.to_string())
    };

    let filter = build_filter(&level)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    tracing::debug!("Logging initialized with level: {}", level);
    Ok(())
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(directives_for(level))
        .map_err(|e| anyhow::anyhow!("Invalid log level: {}", e))
}

/// 裸级别只作用于 wren 自己的 crate，其他 crate 保持 warn
fn directives_for(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    ["wren", "wren_config", "wren_session", "wren_storage"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(std::iter::once("warn".to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_level_is_scoped_to_wren_crates() {
        let directives = directives_for("debug");
        assert!(directives.contains("wren_storage=debug"));
        assert!(directives.ends_with(",warn"));
        assert!(build_filter("debug").is_ok());
    }

    #[test]
    fn test_explicit_directives_pass_through() {
        assert_eq!(directives_for("wren_session=trace"), "wren_session=trace");
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(build_filter("wren_session=loud").is_err());
    }
}
