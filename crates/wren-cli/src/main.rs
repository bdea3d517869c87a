use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use wren_config::{Config, ConfigManager};
use wren_session::SessionOptions;

mod commands;
mod flow;
mod logging;

use flow::{FlowOutcome, SessionFlow};

#[derive(Parser)]
#[command(name = "wren")]
#[command(about = "Guided meditation sessions with stress tracking and daily streaks")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "WREN_CONFIG", default_value = "~/.wren/config.json")]
    config: String,

    /// Data directory (overrides storage.path)
    #[arg(long, env = "WREN_STORAGE")]
    storage: Option<String>,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Log level or filter directives (overrides logging.level)
    #[arg(long, env = "WREN_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Store(StoreCommands),
    /// 配置管理命令
    Config(ConfigArgs),
}

/// 需要打开数据目录的命令
#[derive(Subcommand)]
enum StoreCommands {
    /// 开始或继续一次引导冥想
    Session,
    /// 查看连续天数
    Streak {
        /// 记录今天完成了一次会话
        #[arg(long)]
        record: bool,
    },
    /// 查看或记录压力读数
    Stress {
        /// 会前读数
        #[arg(long)]
        pre: Option<i32>,
        /// 会后读数
        #[arg(long)]
        post: Option<i32>,
    },
    /// 查看进行中会话快照
    Snapshot {
        /// 删除快照
        #[arg(long)]
        clear: bool,
    },
    /// 清除所有 Wren 数据
    Reset {
        /// 跳过确认
        #[arg(long, short)]
        yes: bool,
    },
    /// 监听其他进程对数据的修改
    Watch,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: storage.path, session.stress_scale)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: storage.path, session.stress_scale)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = commands::resolve_config_path(&cli.config);

    match cli.command {
        Commands::Config(args) => {
            // 配置命令在配置文件损坏时也要能运行
            logging::init(&Config::default().logging, cli.log_level.as_deref(), cli.debug)?;
            handle_config(args, &config_path).await
        }
        Commands::Store(command) => {
            let config = ConfigManager::load(&config_path).await?.snapshot().await;
            logging::init(&config.logging, cli.log_level.as_deref(), cli.debug)?;
            debug!("Config loaded from {:?}", config_path);
            run(command, &config, &config_path, cli.storage).await
        }
    }
}

async fn run(
    command: StoreCommands,
    config: &Config,
    config_path: &Path,
    storage_override: Option<String>,
) -> anyhow::Result<()> {
    let storage_path = storage_override.unwrap_or_else(|| config.storage.path.clone());
    let (store, storage) = commands::open_store(&storage_path)?;
    debug!("Using storage at {:?}", storage.base_path());

    let mut stdout = io::stdout();
    match command {
        StoreCommands::Session => {
            let _watch = if config.storage.watch {
                Some(commands::start_watch(&store, storage, io::stderr())?)
            } else {
                None
            };
            let options = SessionOptions::from(&config.session);
            let stdin = io::stdin();
            let outcome = SessionFlow::new(store, options, stdin.lock(), stdout.lock()).run()?;
            if let FlowOutcome::Completed { streak, .. } = outcome {
                info!("Session finished, streak is {} day(s)", streak.count);
            }
        }
        StoreCommands::Streak { record } => commands::streak(&store, record, &mut stdout)?,
        StoreCommands::Stress { pre, post } => commands::stress(&store, config, pre, post, &mut stdout)?,
        StoreCommands::Snapshot { clear } => commands::snapshot(&store, clear, &mut stdout)?,
        StoreCommands::Reset { yes } => {
            if !yes && !confirm("This deletes your streak, stress readings and session. Continue?")? {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }
            commands::reset(&store, &mut stdout)?;
        }
        StoreCommands::Watch => {
            let (watcher, subscription) = commands::start_watch(&store, storage, io::stdout())?;
            let mut config_manager = ConfigManager::new(config.clone(), config_path.to_path_buf());
            config_manager.watch(|reloaded| {
                info!("Config reloaded, log level is now {}", reloaded.logging.level);
            })?;
            println!(
                "{}",
                format!("👀 Watching {} (Ctrl+C to stop)", storage_path).cyan()
            );
            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe();
            watcher.stop()?;
            config_manager.unwatch()?;
        }
    }

    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    match args.command {
        ConfigCommands::Get { key } => commands::config_get(config_path, &key, &mut stdout).await,
        ConfigCommands::Set { key, value } => {
            commands::config_set(config_path, &key, &value, &mut stdout).await
        }
        ConfigCommands::Init { force } => commands::config_init(config_path, force, &mut stdout).await,
        ConfigCommands::Show => commands::config_show(config_path, &mut stdout).await,
    }
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", question.yellow());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_and_store_commands_are_routed_apart() {
        let cli = Cli::try_parse_from(["wren", "config", "get", "storage.path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                command: ConfigCommands::Get { ref key }
            }) if key == "storage.path"
        ));

        let cli = Cli::try_parse_from(["wren", "stress", "--pre", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Store(StoreCommands::Stress {
                pre: Some(4),
                post: None
            })
        ));

        let cli = Cli::try_parse_from(["wren", "session"]).unwrap();
        assert!(matches!(cli.command, Commands::Store(StoreCommands::Session)));
    }
}
