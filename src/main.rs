//! URL Vitals 主程序入口
//!
//! 并发URL可用性验证工具

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use url_vitals::cli::args::{Args, Commands};
use url_vitals::cli::commands::{
    CheckCommand, Command, InitCommand, ReportCommand, RunCommand, VersionCommand,
};
use url_vitals::config::{load_config, Config};
use url_vitals::logging::{LogConfig, LoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 需要配置的命令先加载配置，日志级别可以来自配置文件
    let config = if args.command.needs_config() {
        Some(
            load_config(args.config.as_deref())
                .await
                .context("加载配置失败")?,
        )
    } else {
        None
    };

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.effective_log_level(config.as_ref()),
        console: args.log_file.is_none(),
        file_path: args.log_file.clone(),
        json_format: args.log_json,
        ..Default::default()
    };
    let logging = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("URL Vitals v{} 启动", url_vitals::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args, config.unwrap_or_default(), logging).await {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args, config: Config, logging: LoggingSystem) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Run { .. } => Box::new(RunCommand::new(config, logging)),
        Commands::Report { .. } => Box::new(ReportCommand::new(config)),
        Commands::Check { .. } => Box::new(CheckCommand::new(config)),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command
        .execute(args)
        .await
        .context("命令执行失败")
}
