//! 重试与退避策略
//!
//! 决定一次传输失败或一个HTTP状态码是否值得重试，以及重试前需要等待多久。
//! 该策略只被传输层的重试中间件使用，分类器完全不感知重试。

use std::time::Duration;

/// 默认最大尝试次数（包含第一次）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 默认退避因子（秒）
pub const DEFAULT_BACKOFF_FACTOR_SECONDS: f64 = 1.0;

/// 默认需要重试的HTTP状态码
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// 重试判断的输入：一次失败的粗粒度类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// 超时
    Timeout,
    /// 连接失败
    Connection,
    /// 收到了一个HTTP状态码
    Status(u16),
    /// 其他错误，不重试
    Other,
}

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 不再重试
    NoRetry,
    /// 等待给定时长后重试
    RetryAfter(Duration),
}

/// 指数退避重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 退避因子，第n次重试前等待 `factor * 2^(n-1)`
    pub backoff_factor: Duration,
    /// 需要重试的HTTP状态码
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_factor: Duration::from_secs_f64(DEFAULT_BACKOFF_FACTOR_SECONDS),
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// 不重试的策略
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 判断HTTP状态码是否需要重试
    pub fn is_retryable_status(&self, status_code: u16) -> bool {
        self.retry_status_codes.contains(&status_code)
    }

    /// 第 `retry` 次重试（从1开始）前的等待时长
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = 1u32 << retry.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(exp)
    }

    /// 根据已完成的尝试次数和失败类型给出决策
    ///
    /// `attempt` 从1开始，表示刚刚完成的是第几次尝试。
    pub fn decide(&self, attempt: u32, trigger: RetryTrigger) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        let retryable = match trigger {
            RetryTrigger::Timeout | RetryTrigger::Connection => true,
            RetryTrigger::Status(code) => self.is_retryable_status(code),
            RetryTrigger::Other => false,
        };

        if retryable {
            RetryDecision::RetryAfter(self.backoff(attempt))
        } else {
            RetryDecision::NoRetry
        }
    }

    /// 最坏情况下所有退避等待的总时长
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|retry| self.backoff(retry)).sum()
    }
}
