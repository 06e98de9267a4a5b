//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能。`log` 宏的输出通过 `LogTracer` 桥接到 `tracing`，
//! 由同一个 subscriber 统一输出到控制台或文件。

use crate::health::result::ValidationResult;
use crate::report::summary::Summary;
use log::LevelFilter;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化失败时的错误信息
    init_error: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn global_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        // 连接池的调试日志在大批量探测时过于嘈杂
        module_levels.insert("hyper_util".to_string(), LevelFilter::Warn);
        module_levels.insert("rustls".to_string(), LevelFilter::Warn);

        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels,
        }
    }
}

impl LogConfig {
    /// 根据级别字符串创建配置
    ///
    /// # 参数
    /// * `level` - 日志级别字符串（trace/debug/info/warn/error）
    ///
    /// # 返回
    /// * `anyhow::Result<Self>` - 日志配置或错误
    pub fn from_level_str(level: &str) -> anyhow::Result<Self> {
        let level = LevelFilter::from_str(level)
            .map_err(|_| anyhow::anyhow!("无效的日志级别: {level}"))?;
        Ok(Self {
            level,
            ..Self::default()
        })
    }
}

/// 日志系统管理器
#[derive(Debug, Clone)]
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只会真正初始化一次，重复调用返回新的 `LoggingSystem` 实例。
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `anyhow::Result<LoggingSystem>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        Self::setup_logging_with_options(config, false)
    }

    /// 初始化日志系统（带选项）
    ///
    /// # 参数
    /// * `config` - 日志配置
    /// * `force_reinit` - 是否强制重新初始化（主要用于测试）
    pub fn setup_logging_with_options(
        config: LogConfig,
        force_reinit: bool,
    ) -> anyhow::Result<Self> {
        {
            let state = global_state();
            if state.initialized && !force_reinit {
                if let Some(e) = &state.init_error {
                    return Err(anyhow::anyhow!("日志系统之前初始化失败: {e}"));
                }
                return Ok(Self {
                    config: config.clone(),
                });
            }
        }

        let init_result = Self::perform_initialization(&config);

        {
            let mut state = global_state();
            state.initialized = true;
            state.current_config = Some(config.clone());
            state.init_error = init_result.as_ref().err().map(|e| e.to_string());
        }

        init_result?;
        Ok(Self { config })
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {e}"))?;
        Ok(())
    }

    /// 构建环境过滤器：`RUST_LOG` 优先，其次是配置的级别与模块级别
    fn build_env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
        let mut env_filter = EnvFilter::from_default_env()
            .add_directive(Directive::from(Self::level_to_tracing(config.level)));

        let mut modules: Vec<_> = config.module_levels.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in modules {
            let directive: Directive = format!("{module}={}", Self::level_to_string(*level))
                .parse()
                .map_err(|e| anyhow::anyhow!("无效的模块日志级别 {module}: {e}"))?;
            env_filter = env_filter.add_directive(directive);
        }

        Ok(env_filter)
    }

    /// 初始化 tracing subscriber
    ///
    /// 只设置全局 dispatcher，`log` 桥接由 `init_log_tracer` 负责
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_env_filter(config)?;

        let result = match (&config.file_path, config.console) {
            (Some(file_path), false) => {
                let file = std::fs::File::create(file_path)
                    .map_err(|e| anyhow::anyhow!("创建日志文件失败: {e}"))?;
                let file_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_writer(Mutex::new(file))
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_target(true)
                        .boxed()
                };
                tracing::subscriber::set_global_default(
                    registry().with(env_filter).with(file_layer),
                )
            }
            _ => {
                let console_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_ansi(true)
                        .with_thread_ids(true)
                        .boxed()
                };
                tracing::subscriber::set_global_default(
                    registry().with(env_filter).with(console_layer),
                )
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!("日志系统初始化完成: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("already been set") {
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {error_msg}"))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的级别过滤器
    fn level_to_tracing(level: LevelFilter) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter as TracingLevel;
        match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        }
    }

    /// 将 log::LevelFilter 转换为字符串
    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }

    /// 当前实例的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 日志系统是否已初始化
    pub fn is_initialized() -> bool {
        global_state().initialized
    }

    /// 获取全局生效的日志配置
    pub fn current_config() -> Option<LogConfig> {
        global_state().current_config.clone()
    }

    #[cfg(test)]
    pub fn reset_for_testing() {
        let mut state = global_state();
        state.initialized = false;
        state.init_error = None;
        state.current_config = None;
    }

    /// 记录批量验证开始
    pub fn batch_started_log(&self, run_id: &str, total: usize, worker_count: usize) {
        if self.config.json_format {
            let entry = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "batch_started",
                "run_id": run_id,
                "total": total,
                "workers": worker_count,
            });
            tracing::info!("{entry}");
        } else {
            tracing::info!(
                "BATCH {}: 开始验证 {} 个URL，{} 个并发任务",
                run_id,
                total,
                worker_count
            );
        }
    }

    /// 记录单个URL的验证结果
    pub fn validation_result_log(&self, result: &ValidationResult) {
        if self.config.json_format {
            let entry = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "validation_result",
                "url": result.source_url,
                "category": result.category,
                "status": result.status.as_str(),
                "http_code": result.http_code,
                "elapsed_seconds": result.elapsed_seconds,
                "error": result.error,
            });
            tracing::debug!("{entry}");
        } else {
            tracing::debug!(
                "RESULT: {} [{}] - {} {}",
                result.source_url,
                result.category,
                result.status,
                result.error.as_deref().unwrap_or("")
            );
        }
    }

    /// 记录批量验证汇总
    pub fn batch_summary_log(&self, run_id: &str, summary: &Summary) {
        if self.config.json_format {
            let entry = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "batch_summary",
                "run_id": run_id,
                "total": summary.total,
                "successful": summary.successful,
                "failed": summary.failed,
                "success_rate": summary.success_rate,
            });
            tracing::info!("{entry}");
        } else {
            tracing::info!(
                "BATCH {}: 完成 {} 个URL，成功 {}，失败 {}，成功率 {:.1}%",
                run_id,
                summary.total,
                summary.successful,
                summary.failed,
                summary.success_rate
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::{ProbeOutcome, StatusCategory, UrlTask};
    use serial_test::serial;
    use tempfile::NamedTempFile;

    fn create_test_config() -> LogConfig {
        LogConfig {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }

    #[test]
    #[serial]
    fn test_logging_system_single_initialization() {
        LoggingSystem::reset_for_testing();

        let config = create_test_config();
        assert!(LoggingSystem::setup_logging(config.clone()).is_ok());
        assert!(LoggingSystem::is_initialized());

        // 第二次调用不会重复初始化
        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    #[serial]
    fn test_logging_system_force_reinit() {
        LoggingSystem::reset_for_testing();

        let config = create_test_config();
        LoggingSystem::setup_logging(config.clone()).unwrap();
        assert!(LoggingSystem::setup_logging_with_options(config, true).is_ok());
    }

    #[test]
    #[serial]
    fn test_logging_system_with_file_output() {
        LoggingSystem::reset_for_testing();

        let temp_file = NamedTempFile::new().unwrap();
        let mut config = create_test_config();
        config.file_path = Some(temp_file.path().to_path_buf());
        config.console = false;

        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    #[serial]
    fn test_current_config_retrieval() {
        LoggingSystem::reset_for_testing();

        let mut config = create_test_config();
        config.json_format = true;
        LoggingSystem::setup_logging(config.clone()).unwrap();

        let current = LoggingSystem::current_config().unwrap();
        assert_eq!(current, config);
    }

    #[test]
    #[serial]
    fn test_module_level_filtering() {
        LoggingSystem::reset_for_testing();

        let mut config = create_test_config();
        config
            .module_levels
            .insert("url_vitals::health".to_string(), LevelFilter::Debug);

        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    fn test_from_level_str() {
        let config = LogConfig::from_level_str("debug").unwrap();
        assert_eq!(config.level, LevelFilter::Debug);
        assert!(config.module_levels.contains_key("hyper_util"));

        assert!(LogConfig::from_level_str("loud").is_err());
    }

    #[test]
    fn test_structured_log_helpers() {
        let system = LoggingSystem {
            config: LogConfig {
                json_format: true,
                ..create_test_config()
            },
        };
        let result = ValidationResult::from_parts(
            UrlTask::new("https://a.example.org", "Parks"),
            ProbeOutcome::new("https://a.example.org", StatusCategory::Timeout)
                .with_error("Request timeout after 15s"),
        );

        system.batch_started_log("run-1", 1, 20);
        system.validation_result_log(&result);
        system.batch_summary_log("run-1", &Summary::from_results(&[result]));
    }
}
