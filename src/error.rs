//! 错误处理模块
//!
//! 定义应用程序的统一错误类型。单个URL的探测失败不会出现在这里，
//! 它们总是被归类为 `StatusCategory`；这里只覆盖配置、输入与报告文件等边界I/O。

use thiserror::Error;

/// URL Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum UrlVitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 输入数据相关错误
    #[error("输入错误: {0}")]
    Input(#[from] InputError),

    /// 报告生成相关错误
    #[error("报告错误: {0}")]
    Report(#[from] ReportError),

    /// HTTP客户端构建错误
    #[error("HTTP客户端错误: {0}")]
    Client(#[from] reqwest::Error),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV读写错误
    #[error("CSV错误: {0}")]
    Csv(#[from] csv::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 输入数据错误类型
#[derive(Error, Debug)]
pub enum InputError {
    /// 输入文件不存在
    #[error("输入文件不存在: {path}")]
    FileNotFound { path: String },

    /// 缺少必需的列
    #[error("输入文件缺少必需的列: {column}")]
    MissingColumn { column: String },

    /// 字段值无法解析
    #[error("第 {line} 行的 {column} 列无法解析: {value}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
}

/// 报告错误类型
#[derive(Error, Debug)]
pub enum ReportError {
    /// 输出目录无法创建
    #[error("无法创建输出目录 {path}: {reason}")]
    OutputDirectory { path: String, reason: String },

    /// 表格写入失败
    #[error("写入报告 {path} 失败: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UrlVitalsError>;
