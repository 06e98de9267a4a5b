//! HTTP传输层
//!
//! 提供进程内共享的HTTP会话策略、基于reqwest的传输实现，以及透明的重试中间件。
//!
//! # 安全说明
//!
//! 默认会话策略**关闭了TLS证书校验**（`accept_invalid_certs = true`）。
//! 这是为了优先得到"能否访问"的分类结果：大量政府或小型机构站点证书配置有误，
//! 校验证书会把它们全部归为 `ssl_error`。该设置削弱了对响应来源的信任，
//! 探测结果只能用于可达性判断，不能据此信任页面内容。需要严格校验时请在配置中
//! 设置 `accept_invalid_certs = false`。

use crate::error::{ConfigError, Result};
use crate::health::retry::{RetryDecision, RetryPolicy, RetryTrigger};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION};
use reqwest::{redirect, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

/// 默认浏览器 User-Agent，降低被简单反爬拦截的概率
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 默认 Accept 头
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// 默认 Accept-Language 头
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// 默认最大重定向次数
pub const DEFAULT_MAX_REDIRECTS: usize = 30;

/// 一次成功收到的HTTP响应（重定向之后）
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP状态码
    pub status: u16,
    /// 重定向后的最终URL
    pub final_url: String,
    /// 内容类型（去掉 `;` 之后的参数）
    pub content_type: Option<String>,
    /// 响应体
    pub body: Vec<u8>,
}

impl RawResponse {
    /// 创建响应
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            content_type: None,
            body: body.into(),
        }
    }

    /// 设置内容类型
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// 响应体的小写文本形式
    pub fn lowercase_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_lowercase()
    }
}

/// 传输层失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// 请求超时
    #[error("request timed out")]
    Timeout,

    /// 连接失败（DNS解析、连接被拒绝、连接被重置）
    #[error("{0}")]
    Connect(String),

    /// 重定向次数过多或出现重定向循环
    #[error("too many redirects")]
    TooManyRedirects,

    /// TLS握手或证书错误
    #[error("{0}")]
    Tls(String),

    /// 其他错误，保留原始信息
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// 映射为重试判断的输入
    pub fn retry_trigger(&self) -> RetryTrigger {
        match self {
            TransportError::Timeout => RetryTrigger::Timeout,
            TransportError::Connect(_) => RetryTrigger::Connection,
            _ => RetryTrigger::Other,
        }
    }
}

/// HTTP传输trait，探测器通过它发起请求
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 获取一个URL，跟随重定向并读取完整响应体
    ///
    /// # 参数
    /// * `url` - 请求的URL
    /// * `timeout_duration` - 单次请求的超时时间
    async fn fetch(
        &self,
        url: &str,
        timeout_duration: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// 会话策略：所有探测共享的请求头、证书与重定向设置
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPolicy {
    /// User-Agent
    pub user_agent: String,
    /// Accept 头
    pub accept: String,
    /// Accept-Language 头
    pub accept_language: String,
    /// 额外的请求头
    pub headers: BTreeMap<String, String>,
    /// 是否接受无效证书（见模块级安全说明）
    pub accept_invalid_certs: bool,
    /// 最大重定向次数
    pub max_redirects: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            headers: BTreeMap::new(),
            accept_invalid_certs: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl SessionPolicy {
    /// 构建默认请求头
    ///
    /// Accept-Encoding 由reqwest根据启用的 gzip/deflate 特性自动协商，
    /// 手动设置会关闭自动解压，所以这里不设置。
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(ACCEPT.as_str(), &self.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value(ACCEPT_LANGUAGE.as_str(), &self.accept_language)?,
        );
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );

        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConfigError::ValidationError(format!("无效的请求头名称 {name}: {e}"))
            })?;
            headers.insert(header_name, header_value(name, value)?);
        }

        Ok(headers)
    }

    /// 构建共享的HTTP客户端
    pub fn build_client(&self) -> Result<Client> {
        if self.accept_invalid_certs {
            warn!("TLS证书校验已关闭：探测结果仅代表可达性，不代表站点可信");
        }

        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(self.default_headers()?)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .redirect(redirect::Policy::limited(self.max_redirects))
            .build()?;

        Ok(client)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        ConfigError::ValidationError(format!("无效的请求头 {name} 的值: {e}")).into()
    })
}

/// 基于reqwest的HTTP传输实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// HTTP客户端（内部带连接池，可并发共享）
    client: Client,
}

impl ReqwestTransport {
    /// 根据会话策略创建传输
    pub fn new(policy: &SessionPolicy) -> Result<Self> {
        Ok(Self {
            client: policy.build_client()?,
        })
    }

    /// 使用已构建好的客户端
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        url: &str,
        timeout_duration: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout_duration)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let body = response.bytes().await.map_err(map_request_error)?;

        Ok(RawResponse {
            status,
            final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(
        &self,
        url: &str,
        timeout_duration: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        match timeout(timeout_duration, self.send(url, timeout_duration)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

/// 将reqwest错误映射为传输错误
///
/// reqwest没有单独的TLS错误类型，握手失败会表现为连接错误，
/// 因此先在错误链中查找TLS/证书相关的描述。
fn map_request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout;
    }
    if error.is_redirect() {
        return TransportError::TooManyRedirects;
    }

    // 去掉URL，避免主机名中的 "ssl"/"tls" 字样干扰判断
    let error = error.without_url();
    let detail = error_chain(&error);
    if is_tls_failure(&detail) {
        return TransportError::Tls(detail);
    }
    if error.is_connect() {
        return TransportError::Connect(detail);
    }
    TransportError::Other(detail)
}

/// 拼接完整的错误链
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

fn is_tls_failure(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// 重试中间件
///
/// 包装任意 `HttpTransport`，对超时、连接失败以及配置中的状态码按指数退避重试。
/// 重试用尽后原样返回最后一次的响应或错误。
pub struct RetryingTransport<T> {
    /// 被包装的传输
    inner: T,
    /// 重试策略
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryingTransport<T> {
    /// 创建重试中间件
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// 获取重试策略
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RetryingTransport<T> {
    async fn fetch(
        &self,
        url: &str,
        timeout_duration: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut attempt = 1u32;
        loop {
            let result = self.inner.fetch(url, timeout_duration).await;
            let trigger = match &result {
                Ok(response) => RetryTrigger::Status(response.status),
                Err(e) => e.retry_trigger(),
            };

            match self.policy.decide(attempt, trigger) {
                RetryDecision::NoRetry => return result,
                RetryDecision::RetryAfter(delay) => {
                    debug!(
                        "第 {} 次请求需要重试: {} ({:?})，{}ms 后重试",
                        attempt,
                        url,
                        trigger,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// 构建进程内共享的传输：reqwest客户端外包一层重试中间件
pub fn build_transport(
    policy: &SessionPolicy,
    retry_policy: RetryPolicy,
) -> Result<Arc<dyn HttpTransport>> {
    let transport = ReqwestTransport::new(policy)?;
    Ok(Arc::new(RetryingTransport::new(transport, retry_policy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 按脚本依次返回结果的传输桩
    struct ScriptedTransport {
        script: Mutex<Vec<std::result::Result<RawResponse, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<std::result::Result<RawResponse, TransportError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn fetch(
            &self,
            _url: &str,
            _timeout_duration: Duration,
        ) -> std::result::Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            backoff_factor: Duration::from_millis(1),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_default_policy_disables_certificate_verification() {
        // 默认策略关闭证书校验，这是有意为之的安全折中，修改默认值时需要同步更新文档
        let policy = SessionPolicy::default();
        assert!(policy.accept_invalid_certs);
        assert_eq!(policy.max_redirects, 30);
        assert!(policy.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_default_headers() {
        let mut policy = SessionPolicy::default();
        policy
            .headers
            .insert("X-Trace".to_string(), "abc".to_string());
        let headers = policy.default_headers().unwrap();

        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), "en-US,en;q=0.5");
        assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");
        assert_eq!(headers.get("upgrade-insecure-requests").unwrap(), "1");
        assert_eq!(headers.get("x-trace").unwrap(), "abc");
        assert!(headers.get(reqwest::header::ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut policy = SessionPolicy::default();
        policy
            .headers
            .insert("Bad Header".to_string(), "value".to_string());
        assert!(policy.default_headers().is_err());
    }

    #[test]
    fn test_tls_detection() {
        assert!(is_tls_failure("error trying to connect: invalid peer certificate"));
        assert!(is_tls_failure("TLS handshake eof"));
        assert!(!is_tls_failure("dns error: failed to lookup address"));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let inner = ScriptedTransport::new(vec![
            Ok(RawResponse::new(503, "https://example.com/", "busy")),
            Err(TransportError::Timeout),
            Ok(RawResponse::new(200, "https://example.com/", "ok")),
        ]);
        let transport = RetryingTransport::new(inner, fast_policy());

        let response = transport
            .fetch("https://example.com/", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_last_response() {
        let inner = ScriptedTransport::new(vec![
            Ok(RawResponse::new(502, "https://example.com/", "")),
            Ok(RawResponse::new(503, "https://example.com/", "")),
            Ok(RawResponse::new(504, "https://example.com/", "")),
            Ok(RawResponse::new(200, "https://example.com/", "")),
        ]);
        let transport = RetryingTransport::new(inner, fast_policy());

        let response = transport
            .fetch("https://example.com/", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(response.status, 504);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_redirect_and_tls_errors() {
        let inner = ScriptedTransport::new(vec![Err(TransportError::TooManyRedirects)]);
        let transport = RetryingTransport::new(inner, fast_policy());
        let result = transport
            .fetch("https://example.com/", Duration::from_secs(1))
            .await;
        assert_eq!(result, Err(TransportError::TooManyRedirects));
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);

        let inner = ScriptedTransport::new(vec![Err(TransportError::Tls("bad cert".to_string()))]);
        let transport = RetryingTransport::new(inner, fast_policy());
        let _ = transport
            .fetch("https://example.com/", Duration::from_secs(1))
            .await;
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reqwest_transport_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/busy")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let transport = RetryingTransport::new(
            ReqwestTransport::new(&SessionPolicy::default()).unwrap(),
            fast_policy(),
        );
        let response = transport
            .fetch(&format!("{}/busy", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_transport_follows_redirects() {
        let mut server = mockito::Server::new_async().await;
        let _old = server
            .mock("GET", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;
        let _new = server
            .mock("GET", "/new")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html>moved here</html>")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(&SessionPolicy::default()).unwrap();
        let response = transport
            .fetch(&format!("{}/old", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.final_url, format!("{}/new", server.url()));
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(response.body, b"<html>moved here</html>".to_vec());
    }

    #[tokio::test]
    async fn test_reqwest_transport_redirect_limit() {
        let mut server = mockito::Server::new_async().await;
        let _a = server
            .mock("GET", "/a")
            .with_status(302)
            .with_header("location", "/b")
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/b")
            .with_status(302)
            .with_header("location", "/a")
            .create_async()
            .await;

        let policy = SessionPolicy {
            max_redirects: 3,
            ..SessionPolicy::default()
        };
        let transport = ReqwestTransport::new(&policy).unwrap();
        let result = transport
            .fetch(&format!("{}/a", server.url()), Duration::from_secs(5))
            .await;

        assert_eq!(result, Err(TransportError::TooManyRedirects));
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        let transport = ReqwestTransport::new(&SessionPolicy::default()).unwrap();
        let result = transport
            .fetch("http://127.0.0.1:1/", Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
