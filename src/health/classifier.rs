//! 结果分类器
//!
//! 把一次探测的原始结果（响应或传输错误）映射为唯一的 `StatusCategory`。
//! 仅凭HTTP 200不足以判断页面可用：软404、占位页、被拦截页面在猜测生成的URL上很常见，
//! 所以200响应还要经过内容扫描。

use crate::health::result::{ProbeOutcome, StatusCategory};
use crate::health::transport::{RawResponse, TransportError};
use std::time::Duration;

/// 默认的错误页面提示短语（仅适用于英文页面）
pub const DEFAULT_ERROR_INDICATORS: [&str; 9] = [
    "404 not found",
    "page not found",
    "file not found",
    "under construction",
    "coming soon",
    "temporarily unavailable",
    "site maintenance",
    "access denied",
    "forbidden",
];

/// 内容少于该字符数视为内容过少
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 100;

const REDIRECT_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// 确定性的结果分类器
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    /// 错误提示短语（已转为小写）
    error_indicators: Vec<String>,
    /// 最小内容字符数
    min_content_chars: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_ERROR_INDICATORS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_MIN_CONTENT_CHARS,
        )
    }
}

impl Classifier {
    /// 创建分类器
    ///
    /// # 参数
    /// * `error_indicators` - 错误提示短语，匹配时不区分大小写
    /// * `min_content_chars` - 最小内容字符数
    pub fn new(error_indicators: Vec<String>, min_content_chars: usize) -> Self {
        Self {
            error_indicators: error_indicators
                .into_iter()
                .map(|phrase| phrase.to_lowercase())
                .filter(|phrase| !phrase.is_empty())
                .collect(),
            min_content_chars,
        }
    }

    /// 错误提示短语
    pub fn error_indicators(&self) -> &[String] {
        &self.error_indicators
    }

    /// 对一次探测的最终结果分类
    ///
    /// # 参数
    /// * `url` - 请求的URL
    /// * `result` - 传输层返回的响应或错误
    /// * `elapsed` - 从发起请求到读完响应体的耗时
    /// * `timeout_duration` - 单次请求超时时间，用于错误描述
    pub fn classify(
        &self,
        url: &str,
        result: &Result<RawResponse, TransportError>,
        elapsed: Duration,
        timeout_duration: Duration,
    ) -> ProbeOutcome {
        match result {
            Ok(response) => self.classify_response(url, response, elapsed),
            Err(error) => self.classify_failure(url, error, timeout_duration),
        }
    }

    /// 对传输层失败分类
    pub fn classify_failure(
        &self,
        url: &str,
        error: &TransportError,
        timeout_duration: Duration,
    ) -> ProbeOutcome {
        let (status, message) = match error {
            TransportError::Timeout => (
                StatusCategory::Timeout,
                format!(
                    "Request timeout after {}s",
                    timeout_duration.as_secs_f64()
                ),
            ),
            TransportError::Connect(detail) => (
                StatusCategory::ConnectionError,
                format!("Connection failed: {detail}"),
            ),
            TransportError::TooManyRedirects => (
                StatusCategory::RedirectError,
                "Too many redirects".to_string(),
            ),
            TransportError::Tls(detail) => (
                StatusCategory::SslError,
                format!("SSL certificate error: {detail}"),
            ),
            TransportError::Other(detail) => (StatusCategory::UnknownError, detail.clone()),
        };

        ProbeOutcome::new(url, status).with_error(message)
    }

    /// 对收到的HTTP响应分类
    pub fn classify_response(
        &self,
        url: &str,
        response: &RawResponse,
        elapsed: Duration,
    ) -> ProbeOutcome {
        let code = response.status;
        let mut outcome = ProbeOutcome::new(url, StatusCategory::Success)
            .with_http_code(code)
            .with_elapsed(elapsed)
            .with_content_length(response.body.len() as u64);

        if let Some(content_type) = &response.content_type {
            outcome = outcome.with_content_type(content_type.clone());
        }
        if response.final_url != url {
            outcome = outcome.with_redirect(response.final_url.clone());
        }

        let (status, error) = match code {
            200 => self.classify_content(&response.lowercase_text()),
            c if REDIRECT_CODES.contains(&c) => (StatusCategory::Redirect, None),
            404 => (StatusCategory::NotFound, Some("Page not found".to_string())),
            403 => (StatusCategory::Forbidden, Some("Access forbidden".to_string())),
            c if c >= 500 => (
                StatusCategory::ServerError,
                Some(format!("Server error: {c}")),
            ),
            c => (StatusCategory::OtherError, Some(format!("HTTP {c}"))),
        };

        outcome.status = status;
        outcome.error = error;
        outcome
    }

    /// 扫描200响应的小写正文
    fn classify_content(&self, lowercase_body: &str) -> (StatusCategory, Option<String>) {
        if let Some(phrase) = self
            .error_indicators
            .iter()
            .find(|phrase| lowercase_body.contains(phrase.as_str()))
        {
            return (
                StatusCategory::ErrorPage,
                Some(format!("Page contains error indicator: {phrase}")),
            );
        }

        if lowercase_body.chars().count() < self.min_content_chars {
            return (
                StatusCategory::MinimalContent,
                Some("Page has minimal content".to_string()),
            );
        }

        (StatusCategory::Success, None)
    }
}
