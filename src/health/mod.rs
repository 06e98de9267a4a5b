//! URL验证模块
//!
//! 提供HTTP传输与重试、单URL探测、结果分类和并发批量调度功能

pub mod classifier;
pub mod probe;
pub mod result;
pub mod retry;
pub mod scheduler;
pub mod transport;

// 重新导出主要类型
pub use classifier::Classifier;
pub use probe::{HttpProber, Prober};
pub use result::{ProbeOutcome, StatusCategory, StatusFamily, UrlTask, ValidationResult};
pub use retry::{RetryDecision, RetryPolicy, RetryTrigger};
pub use scheduler::{BatchProgress, BatchValidator, ProgressCallback, SchedulerConfig};
pub use transport::{
    build_transport, HttpTransport, RawResponse, ReqwestTransport, RetryingTransport,
    SessionPolicy, TransportError,
};
