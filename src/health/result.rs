//! 验证结果数据结构
//!
//! 定义URL任务、单次探测结果、状态分类枚举以及合并后的验证结果

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// 状态分类枚举
///
/// 每个探测结果恰好对应一个分类。`Success` 与 `Redirect` 属于成功族，其余都算失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// 页面可用
    Success,
    /// 最终响应仍为重定向
    Redirect,
    /// 200 但内容包含错误提示
    ErrorPage,
    /// 200 但内容过短
    MinimalContent,
    /// 404
    NotFound,
    /// 403
    Forbidden,
    /// 5xx
    ServerError,
    /// 其他HTTP状态码
    OtherError,
    /// 请求超时
    Timeout,
    /// 连接失败（DNS、拒绝、重置）
    ConnectionError,
    /// 重定向次数过多
    RedirectError,
    /// TLS握手或证书错误
    SslError,
    /// 未知错误
    UnknownError,
}

/// 状态分类所属的族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    /// 正常：success / redirect
    Nominal,
    /// 应用层失败：收到了HTTP响应但不可用
    Application,
    /// 传输层失败：没有拿到HTTP响应
    Transport,
}

impl StatusCategory {
    /// 所有分类，按名称排序
    pub const ALL: [StatusCategory; 13] = [
        StatusCategory::ConnectionError,
        StatusCategory::ErrorPage,
        StatusCategory::Forbidden,
        StatusCategory::MinimalContent,
        StatusCategory::NotFound,
        StatusCategory::OtherError,
        StatusCategory::Redirect,
        StatusCategory::RedirectError,
        StatusCategory::ServerError,
        StatusCategory::SslError,
        StatusCategory::Success,
        StatusCategory::Timeout,
        StatusCategory::UnknownError,
    ];

    /// 序列化名称
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Success => "success",
            StatusCategory::Redirect => "redirect",
            StatusCategory::ErrorPage => "error_page",
            StatusCategory::MinimalContent => "minimal_content",
            StatusCategory::NotFound => "not_found",
            StatusCategory::Forbidden => "forbidden",
            StatusCategory::ServerError => "server_error",
            StatusCategory::OtherError => "other_error",
            StatusCategory::Timeout => "timeout",
            StatusCategory::ConnectionError => "connection_error",
            StatusCategory::RedirectError => "redirect_error",
            StatusCategory::SslError => "ssl_error",
            StatusCategory::UnknownError => "unknown_error",
        }
    }

    /// 判断是否为可用URL
    pub fn is_successful(&self) -> bool {
        matches!(self, StatusCategory::Success | StatusCategory::Redirect)
    }

    /// 获取分类所属的族
    pub fn family(&self) -> StatusFamily {
        match self {
            StatusCategory::Success | StatusCategory::Redirect => StatusFamily::Nominal,
            StatusCategory::ErrorPage
            | StatusCategory::MinimalContent
            | StatusCategory::NotFound
            | StatusCategory::Forbidden
            | StatusCategory::ServerError
            | StatusCategory::OtherError => StatusFamily::Application,
            StatusCategory::Timeout
            | StatusCategory::ConnectionError
            | StatusCategory::RedirectError
            | StatusCategory::SslError
            | StatusCategory::UnknownError => StatusFamily::Transport,
        }
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusCategory::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("未知的状态分类: {s}"))
    }
}

/// 待验证的URL任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlTask {
    /// 待验证的URL
    pub url: String,
    /// 原始分类标签（例如 "Gov"）
    pub category: String,
    /// 城市
    #[serde(default)]
    pub city: String,
    /// 州
    #[serde(default)]
    pub state: String,
    /// 是否为生成的URL
    #[serde(default)]
    pub is_generated: bool,
    /// 输入中的其他列，保持输入顺序
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl UrlTask {
    /// 创建新的URL任务
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            city: String::new(),
            state: String::new(),
            is_generated: false,
            extra: Vec::new(),
        }
    }

    /// 设置城市与州
    pub fn with_location(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = city.into();
        self.state = state.into();
        self
    }

    /// 标记为生成的URL
    pub fn generated(mut self, is_generated: bool) -> Self {
        self.is_generated = is_generated;
        self
    }

    /// 附加一个额外列
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((column.into(), value.into()));
        self
    }
}

/// 单个URL的探测结果
///
/// 重试在探测器内部完成，对外只产出一个结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 请求的URL
    pub url: String,
    /// 状态分类
    pub status: StatusCategory,
    /// HTTP状态码（如果收到响应）
    pub http_code: Option<u16>,
    /// 响应耗时（秒，保留两位小数）
    pub elapsed_seconds: Option<f64>,
    /// 错误信息
    pub error: Option<String>,
    /// 重定向后的最终URL
    pub redirected_to: Option<String>,
    /// 响应体大小（字节）
    pub content_length: Option<u64>,
    /// 内容类型（不含参数）
    pub content_type: Option<String>,
}

impl ProbeOutcome {
    /// 创建新的探测结果
    pub fn new(url: impl Into<String>, status: StatusCategory) -> Self {
        Self {
            url: url.into(),
            status,
            http_code: None,
            elapsed_seconds: None,
            error: None,
            redirected_to: None,
            content_length: None,
            content_type: None,
        }
    }

    /// 设置HTTP状态码
    pub fn with_http_code(mut self, http_code: u16) -> Self {
        self.http_code = Some(http_code);
        self
    }

    /// 设置响应耗时，四舍五入到百分之一秒
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_seconds = Some(round_seconds(elapsed.as_secs_f64()));
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// 设置重定向目标
    pub fn with_redirect(mut self, redirected_to: impl Into<String>) -> Self {
        self.redirected_to = Some(redirected_to.into());
        self
    }

    /// 设置响应体大小
    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    /// 设置内容类型
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// 四舍五入到两位小数
pub(crate) fn round_seconds(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// 合并了任务字段与探测字段的验证结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// 原始分类标签
    pub category: String,
    /// 源URL
    pub source_url: String,
    /// 城市
    pub city: String,
    /// 州
    pub state: String,
    /// 是否为生成的URL
    pub is_generated: bool,
    /// 状态分类
    pub status: StatusCategory,
    /// HTTP状态码
    pub http_code: Option<u16>,
    /// 响应耗时（秒）
    pub elapsed_seconds: Option<f64>,
    /// 错误信息
    pub error: Option<String>,
    /// 重定向后的最终URL
    pub redirected_to: Option<String>,
    /// 响应体大小（字节）
    pub content_length: Option<u64>,
    /// 内容类型
    pub content_type: Option<String>,
    /// 输入中的其他列
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl ValidationResult {
    /// 由任务与探测结果合并生成
    pub fn from_parts(task: UrlTask, outcome: ProbeOutcome) -> Self {
        Self {
            category: task.category,
            source_url: task.url,
            city: task.city,
            state: task.state,
            is_generated: task.is_generated,
            status: outcome.status,
            http_code: outcome.http_code,
            elapsed_seconds: outcome.elapsed_seconds,
            error: outcome.error,
            redirected_to: outcome.redirected_to,
            content_length: outcome.content_length,
            content_type: outcome.content_type,
            extra: task.extra,
        }
    }

    /// 判断是否为可用URL
    pub fn is_working(&self) -> bool {
        self.status.is_successful()
    }

    /// 转换为JSON字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
