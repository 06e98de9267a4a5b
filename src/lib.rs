//! URL Vitals - 并发URL可用性验证工具
//!
//! 这是一个用Rust编写的批量URL验证工具，支持：
//! - 固定大小的并发工作池与每任务请求间隔
//! - 对瞬时失败的指数退避重试
//! - 基于状态码与页面内容的结果分类（识别软404、占位页）
//! - 汇总统计、可用URL表与性能排行报告
//! - 结构化日志记录
//!
//! 安全提示：默认配置不校验TLS证书，只适合判断可达性，详见 [`health::transport`]。

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod report;

// 重新导出主要类型
pub use config::Config;
pub use error::{Result, UrlVitalsError};
pub use health::{BatchValidator, HttpProber, StatusCategory, UrlTask, ValidationResult};
pub use report::{ReportWriter, Summary};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
