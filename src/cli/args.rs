//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// URL Vitals - 并发URL可用性验证工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "url-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "URL_VITALS_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "URL_VITALS_LOG_LEVEL",
        global = true
    )]
    pub log_level: Option<LogLevel>,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出", global = true)]
    pub verbose: bool,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志", global = true)]
    pub log_json: bool,

    /// 日志文件路径，指定后日志只写入文件
    #[arg(long, value_name = "FILE", help = "日志文件路径", global = true)]
    pub log_file: Option<PathBuf>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 批量验证CSV中的URL并生成报告
    Run {
        /// 输入CSV文件（需要 Category 与 SourceURL 列）
        #[arg(short, long, value_name = "CSV", help = "输入CSV文件")]
        input: PathBuf,

        /// 并发任务数
        #[arg(
            short,
            long,
            value_name = "COUNT",
            help = "并发任务数",
            env = "URL_VITALS_WORKERS"
        )]
        workers: Option<usize>,

        /// 单次请求超时时间（秒）
        #[arg(short, long, value_name = "SECONDS", help = "单次请求超时时间（秒）")]
        timeout: Option<f64>,

        /// 每个任务两次探测之间的间隔（秒）
        #[arg(short, long, value_name = "SECONDS", help = "请求间隔（秒）")]
        delay: Option<f64>,

        /// 报告输出目录
        #[arg(short, long, value_name = "DIR", help = "报告输出目录")]
        output_dir: Option<PathBuf>,
    },

    /// 从之前的全部结果表重新生成报告（不重新探测）
    Report {
        /// 全部结果表
        #[arg(short, long, value_name = "CSV", help = "全部结果表")]
        results: PathBuf,

        /// 报告输出目录
        #[arg(short, long, value_name = "DIR", help = "报告输出目录")]
        output_dir: Option<PathBuf>,
    },

    /// 探测单个URL
    Check {
        /// 待探测的URL
        #[arg(value_name = "URL", help = "待探测的URL")]
        url: String,

        /// 超时时间（秒）
        #[arg(short, long, value_name = "SECONDS", help = "超时时间（秒）")]
        timeout: Option<f64>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "url-vitals.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

impl Commands {
    /// 是否需要加载配置文件
    pub fn needs_config(&self) -> bool {
        matches!(
            self,
            Commands::Run { .. } | Commands::Report { .. } | Commands::Check { .. }
        )
    }
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 是否启用详细输出
    pub fn is_verbose(&self) -> bool {
        self.verbose || matches!(self.log_level, Some(LogLevel::Debug | LogLevel::Trace))
    }

    /// 计算最终日志级别
    ///
    /// 优先级：`--verbose` > `--log-level` > 配置文件 > info
    pub fn effective_log_level(&self, config: Option<&Config>) -> log::LevelFilter {
        if self.verbose {
            return log::LevelFilter::Debug;
        }
        if let Some(level) = self.log_level {
            return level.into();
        }
        config
            .and_then(|c| log::LevelFilter::from_str(&c.log_level).ok())
            .unwrap_or(log::LevelFilter::Info)
    }

    /// 把命令行覆盖项应用到配置
    pub fn apply_overrides(&self, config: &mut Config) {
        match &self.command {
            Commands::Run {
                workers,
                timeout,
                delay,
                output_dir,
                ..
            } => {
                if let Some(workers) = workers {
                    config.validation.worker_count = *workers;
                }
                if let Some(timeout) = timeout {
                    config.validation.timeout_seconds = *timeout;
                }
                if let Some(delay) = delay {
                    config.validation.per_worker_delay_seconds = *delay;
                }
                if let Some(dir) = output_dir {
                    config.output.directory = dir.clone();
                }
            }
            Commands::Report {
                output_dir: Some(dir),
                ..
            } => {
                config.output.directory = dir.clone();
            }
            Commands::Check {
                timeout: Some(timeout),
                ..
            } => {
                config.validation.timeout_seconds = *timeout;
            }
            _ => {}
        }
    }
}
