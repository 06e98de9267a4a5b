//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{default_config_template, validate_config, Config};
use crate::error::{ConfigError, Result};
use crate::health::{
    BatchProgress, BatchValidator, HttpProber, ProbeOutcome, Prober, ValidationResult,
};
use crate::logging::LoggingSystem;
use crate::report::views::{fastest, render_fastest, DEFAULT_FASTEST_COUNT};
use crate::report::{load_results, load_tasks, ReportFiles, ReportWriter, RunMetadata, Summary};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 应用命令行覆盖项并重新验证配置
fn effective_config(args: &Args, config: &Config) -> Result<Config> {
    let mut config = config.clone();
    args.apply_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok(config)
}

/// 打印汇总、最快URL和写出的文件
fn print_report(summary: &Summary, results: &[ValidationResult], files: &ReportFiles) {
    println!();
    print!("{}", summary.render_text());
    println!();
    print!(
        "{}",
        render_fastest(&fastest(results, DEFAULT_FASTEST_COUNT))
    );
    println!();
    println!("报告文件:");
    for path in files.paths() {
        println!("  {}", path.display());
    }
}

/// 批量验证命令
pub struct RunCommand {
    config: Config,
    logging: LoggingSystem,
}

impl RunCommand {
    /// 创建批量验证命令
    pub fn new(config: Config, logging: LoggingSystem) -> Self {
        Self { config, logging }
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Run { input, .. } = &args.command {
            let config = effective_config(args, &self.config)?;
            self.run_batch(&config, input).await
        } else {
            Ok(())
        }
    }
}

impl RunCommand {
    /// 执行批量验证并写出报告
    async fn run_batch(&self, config: &Config, input: &Path) -> Result<()> {
        let tasks = load_tasks(input)?;
        let run = RunMetadata::start(Some(input.display().to_string()));
        let run_id = run.run_id.to_string();

        let prober: Arc<dyn Prober> = Arc::new(HttpProber::from_config(config)?);
        let validator = BatchValidator::new(prober, config.validation.scheduler_config())
            .with_progress_callback(Arc::new(|progress: BatchProgress| {
                println!(
                    "进度: {}/{} 个URL已检测 ({:.1}%)",
                    progress.completed,
                    progress.total,
                    progress.percent()
                );
            }));

        self.logging
            .batch_started_log(&run_id, tasks.len(), config.validation.worker_count);
        let results = validator.validate_batch(tasks).await;
        for result in &results {
            self.logging.validation_result_log(result);
        }
        let run = run.finish();

        let summary = Summary::from_results(&results);
        let files = ReportWriter::new(config.output.clone()).write(&results, &run)?;
        self.logging.batch_summary_log(&run_id, &summary);

        print_report(&summary, &results, &files);
        Ok(())
    }
}

/// 重新生成报告命令
pub struct ReportCommand {
    config: Config,
}

impl ReportCommand {
    /// 创建重新生成报告命令
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Command for ReportCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Report { results, .. } = &args.command {
            let config = effective_config(args, &self.config)?;

            let run = RunMetadata::start(Some(results.display().to_string()));
            let loaded = load_results(results)?;
            let run = run.finish();

            let summary = Summary::from_results(&loaded);
            let files = ReportWriter::new(config.output.clone()).write(&loaded, &run)?;
            print_report(&summary, &loaded, &files);
        }
        Ok(())
    }
}

/// 单URL检测命令
pub struct CheckCommand {
    config: Config,
}

impl CheckCommand {
    /// 创建单URL检测命令
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check { url, format, .. } = &args.command {
            let config = effective_config(args, &self.config)?;
            let prober = HttpProber::from_config(&config)?;
            let timeout = Duration::from_secs_f64(config.validation.timeout_seconds);

            let outcome = prober.probe(url, timeout).await;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
                OutputFormat::Text => self.print_text_outcome(&outcome),
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 打印文本格式结果
    fn print_text_outcome(&self, outcome: &ProbeOutcome) {
        let status_icon = if outcome.status.is_successful() {
            "✓"
        } else {
            "✗"
        };
        let status_code = outcome
            .http_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let elapsed = outcome
            .elapsed_seconds
            .map(|s| format!("{s:.2}s"))
            .unwrap_or_else(|| "N/A".to_string());

        println!(
            "{} {} - {} - {} - {}",
            status_icon, outcome.url, outcome.status, status_code, elapsed
        );
        if let Some(redirected_to) = &outcome.redirected_to {
            println!("  重定向到: {redirected_to}");
        }
        if let Some(content_type) = &outcome.content_type {
            println!("  内容类型: {content_type}");
        }
        if let Some(error) = &outcome.error {
            println!("  错误: {error}");
        }
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, default_config_template()?).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("注意: 默认配置不校验TLS证书（transport.accept_invalid_certs = true）");

        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}
