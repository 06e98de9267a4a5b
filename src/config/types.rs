//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体、默认值和验证逻辑。所有字段都有默认值，
//! 一个空的配置文件就是一份可用的配置。

use crate::health::classifier::{Classifier, DEFAULT_ERROR_INDICATORS, DEFAULT_MIN_CONTENT_CHARS};
use crate::health::retry::{
    RetryPolicy, DEFAULT_BACKOFF_FACTOR_SECONDS, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_STATUS_CODES,
};
use crate::health::scheduler::{
    SchedulerConfig, DEFAULT_PROGRESS_INTERVAL, DEFAULT_TIMEOUT_SECONDS, DEFAULT_WORKER_COUNT,
};
use crate::health::transport::{
    SessionPolicy, DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_MAX_REDIRECTS,
    DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 批量验证配置
    #[serde(default)]
    pub validation: ValidationConfig,
    /// HTTP传输配置
    #[serde(default)]
    pub transport: TransportConfig,
    /// 分类器配置
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,
}

/// 批量验证配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// 并发工作任务数量
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// 单次请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// 每个工作任务两次探测之间的间隔（秒）
    #[serde(default = "default_per_worker_delay")]
    pub per_worker_delay_seconds: f64,
    /// 进度上报间隔（完成数，0 表示不上报）
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

/// HTTP传输配置
///
/// `accept_invalid_certs` 默认为 `true`，即**不校验TLS证书**。
/// 这是为了得到可达性分类而做的安全折中，详见 `health::transport` 模块文档。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept 头
    #[serde(default = "default_accept")]
    pub accept: String,
    /// Accept-Language 头
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// 最大尝试次数（包含第一次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 退避因子（秒）
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor_seconds: f64,
    /// 需要重试的HTTP状态码
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,
    /// 最大重定向次数
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// 是否接受无效的TLS证书
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    /// 额外的请求头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// 分类器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// 错误页面提示短语（不区分大小写）
    #[serde(default = "default_error_indicators")]
    pub error_indicators: Vec<String>,
    /// 200响应的最小内容字符数
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// 输出目录
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    /// 全部结果表
    #[serde(default = "default_all_results_file")]
    pub all_results: String,
    /// 可用URL表（详细）；简化表在文件名后追加 `_simple`
    #[serde(default = "default_working_file")]
    pub working: String,
    /// 性能排行表
    #[serde(default = "default_performance_file")]
    pub performance: String,
    /// 汇总JSON
    #[serde(default = "default_summary_file")]
    pub summary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            validation: ValidationConfig::default(),
            transport: TransportConfig::default(),
            classifier: ClassifierConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            timeout_seconds: default_timeout(),
            per_worker_delay_seconds: default_per_worker_delay(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            max_attempts: default_max_attempts(),
            backoff_factor_seconds: default_backoff_factor(),
            retry_status_codes: default_retry_status_codes(),
            max_redirects: default_max_redirects(),
            accept_invalid_certs: default_accept_invalid_certs(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            error_indicators: default_error_indicators(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            all_results: default_all_results_file(),
            working: default_working_file(),
            performance: default_performance_file(),
            summary: default_summary_file(),
        }
    }
}

impl ValidationConfig {
    /// 转换为调度器配置
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            worker_count: self.worker_count,
            timeout: Duration::from_secs_f64(self.timeout_seconds),
            per_worker_delay: Duration::from_secs_f64(self.per_worker_delay_seconds),
            progress_interval: self.progress_interval,
        }
    }
}

impl TransportConfig {
    /// 转换为会话策略
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            user_agent: self.user_agent.clone(),
            accept: self.accept.clone(),
            accept_language: self.accept_language.clone(),
            headers: self.headers.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
            max_redirects: self.max_redirects,
        }
    }

    /// 转换为重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_factor: Duration::from_secs_f64(self.backoff_factor_seconds),
            retry_status_codes: self.retry_status_codes.clone(),
        }
    }
}

impl ClassifierConfig {
    /// 构建分类器
    pub fn build(&self) -> Classifier {
        Classifier::new(self.error_indicators.clone(), self.min_content_chars)
    }
}

impl OutputConfig {
    /// 全部结果表路径
    pub fn all_results_path(&self) -> PathBuf {
        self.directory.join(&self.all_results)
    }

    /// 可用URL详细表路径
    pub fn working_path(&self) -> PathBuf {
        self.directory.join(&self.working)
    }

    /// 可用URL简化表路径
    pub fn working_simple_path(&self) -> PathBuf {
        self.directory.join(simple_file_name(&self.working))
    }

    /// 性能排行表路径
    pub fn performance_path(&self) -> PathBuf {
        self.directory.join(&self.performance)
    }

    /// 汇总JSON路径
    pub fn summary_path(&self) -> PathBuf {
        self.directory.join(&self.summary)
    }
}

/// 在 `.csv` 扩展名前插入 `_simple`
fn simple_file_name(file_name: &str) -> String {
    match file_name.strip_suffix(".csv") {
        Some(stem) => format!("{stem}_simple.csv"),
        None => format!("{file_name}_simple"),
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}
fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECONDS as f64
}
fn default_per_worker_delay() -> f64 {
    0.3
}
fn default_progress_interval() -> usize {
    DEFAULT_PROGRESS_INTERVAL
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_accept() -> String {
    DEFAULT_ACCEPT.to_string()
}
fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR_SECONDS
}
fn default_retry_status_codes() -> Vec<u16> {
    DEFAULT_RETRY_STATUS_CODES.to_vec()
}
fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_error_indicators() -> Vec<String> {
    DEFAULT_ERROR_INDICATORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_min_content_chars() -> usize {
    DEFAULT_MIN_CONTENT_CHARS
}
fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}
fn default_all_results_file() -> String {
    "url_validation_results.csv".to_string()
}
fn default_working_file() -> String {
    "working_event_sources.csv".to_string()
}
fn default_performance_file() -> String {
    "url_performance_report.csv".to_string()
}
fn default_summary_file() -> String {
    "url_validation_summary.json".to_string()
}

/// 秒数能否表示为 `Duration`
fn is_valid_seconds(seconds: f64) -> bool {
    Duration::try_from_secs_f64(seconds).is_ok()
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.log_level, valid_log_levels
        ));
    }

    // 验证批量配置
    let validation = &config.validation;
    if validation.worker_count == 0 {
        return Err("并发任务数不能为0".to_string());
    }
    if !is_valid_seconds(validation.timeout_seconds) || validation.timeout_seconds <= 0.0 {
        return Err(format!(
            "请求超时时间必须为有效的正数: {}",
            validation.timeout_seconds
        ));
    }
    if !is_valid_seconds(validation.per_worker_delay_seconds) {
        return Err(format!(
            "请求间隔必须为有效的非负数: {}",
            validation.per_worker_delay_seconds
        ));
    }

    // 验证传输配置
    let transport = &config.transport;
    if transport.user_agent.trim().is_empty() {
        return Err("User-Agent 不能为空".to_string());
    }
    if transport.max_attempts == 0 {
        return Err("最大尝试次数不能为0".to_string());
    }
    if !is_valid_seconds(transport.backoff_factor_seconds) {
        return Err(format!(
            "退避因子必须为有效的非负数: {}",
            transport.backoff_factor_seconds
        ));
    }
    for &code in &transport.retry_status_codes {
        if !(100..=599).contains(&code) {
            return Err(format!("重试状态码 {code} 无效"));
        }
    }

    // 验证输出配置
    let output = &config.output;
    for (name, value) in [
        ("all_results", &output.all_results),
        ("working", &output.working),
        ("performance", &output.performance),
        ("summary", &output.summary),
    ] {
        if value.trim().is_empty() {
            return Err(format!("输出文件名 {name} 不能为空"));
        }
    }

    Ok(())
}
