//! URL探测器实现
//!
//! 对单个URL执行一次有界的HTTP获取（重试由传输层透明完成），并把结果分类。
//! 探测永远不会向调用方返回错误，所有失败都体现为某个 `StatusCategory`。

use crate::config::Config;
use crate::error::Result;
use crate::health::classifier::Classifier;
use crate::health::result::ProbeOutcome;
use crate::health::transport::{build_transport, HttpTransport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// 探测器trait，定义单个URL的探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 探测一个URL
    ///
    /// # 参数
    /// * `url` - 待探测的URL
    /// * `timeout_duration` - 单次请求超时时间
    ///
    /// # 返回
    /// * `ProbeOutcome` - 分类后的探测结果
    async fn probe(&self, url: &str, timeout_duration: Duration) -> ProbeOutcome;
}

/// 基于HTTP传输的探测器
#[derive(Clone)]
pub struct HttpProber {
    /// 共享的HTTP传输（已包含重试中间件）
    transport: Arc<dyn HttpTransport>,
    /// 结果分类器
    classifier: Classifier,
}

impl HttpProber {
    /// 创建新的探测器
    ///
    /// # 参数
    /// * `transport` - 共享的HTTP传输
    /// * `classifier` - 结果分类器
    pub fn new(transport: Arc<dyn HttpTransport>, classifier: Classifier) -> Self {
        Self {
            transport,
            classifier,
        }
    }

    /// 根据配置构建探测器，传输与分类器都来自配置
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = build_transport(
            &config.transport.session_policy(),
            config.transport.retry_policy(),
        )?;
        Ok(Self::new(transport, config.classifier.build()))
    }

    /// 获取分类器
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout_duration: Duration) -> ProbeOutcome {
        let start_time = Instant::now();
        let result = self.transport.fetch(url, timeout_duration).await;
        let elapsed = start_time.elapsed();

        let outcome = self
            .classifier
            .classify(url, &result, elapsed, timeout_duration);
        debug!(
            "探测完成: {} -> {} ({}ms)",
            url,
            outcome.status,
            elapsed.as_millis()
        );
        outcome
    }
}
