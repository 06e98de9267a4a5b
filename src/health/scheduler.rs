//! 批量验证调度器
//!
//! 固定数量的工作任务从共享队列中取URL任务，逐个探测并把结果追加到共享集合。
//! 结果集合与已完成计数由同一把锁保护，锁只在追加/计数时持有，从不跨越网络I/O。

use crate::health::probe::Prober;
use crate::health::result::{ProbeOutcome, StatusCategory, UrlTask, ValidationResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 默认工作任务数量
pub const DEFAULT_WORKER_COUNT: usize = 20;

/// 默认单次请求超时（秒）
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

/// 默认每个工作任务两次探测之间的间隔（毫秒）
pub const DEFAULT_PER_WORKER_DELAY_MILLIS: u64 = 300;

/// 默认进度上报间隔（完成数）
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// 批量进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 已完成数量
    pub completed: usize,
    /// 总数量
    pub total: usize,
}

impl BatchProgress {
    /// 完成百分比
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// 进度回调函数类型
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// 调度器配置
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// 并发工作任务数量
    pub worker_count: usize,
    /// 单次请求超时时间
    pub timeout: Duration,
    /// 每个工作任务完成一次探测后的等待时间
    pub per_worker_delay: Duration,
    /// 每完成多少个任务上报一次进度
    pub progress_interval: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            per_worker_delay: Duration::from_millis(DEFAULT_PER_WORKER_DELAY_MILLIS),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// 唯一的可变共享状态：结果集合与已完成计数
#[derive(Debug, Default)]
struct BatchState {
    results: Vec<ValidationResult>,
    processed: usize,
}

/// 工作任务之间共享的上下文
struct WorkerContext {
    prober: Arc<dyn Prober>,
    queue: Mutex<VecDeque<UrlTask>>,
    state: Mutex<BatchState>,
    config: SchedulerConfig,
    progress_callback: Option<ProgressCallback>,
    total: usize,
}

/// 获取锁，忽略中毒（锁内只做追加与计数，不会留下不一致状态）
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerContext {
    fn next_task(&self) -> Option<UrlTask> {
        lock(&self.queue).pop_front()
    }

    /// 追加结果并返回最新的完成数
    fn record(&self, result: ValidationResult) -> usize {
        let mut state = lock(&self.state);
        state.results.push(result);
        state.processed += 1;
        state.processed
    }

    fn report_progress(&self, completed: usize) {
        let interval = self.config.progress_interval;
        if interval == 0 || completed % interval != 0 {
            return;
        }

        let progress = BatchProgress {
            completed,
            total: self.total,
        };
        debug!(
            "进度: {}/{} 个URL已检测 ({:.1}%)",
            progress.completed,
            progress.total,
            progress.percent()
        );
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// 批量验证器
pub struct BatchValidator {
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 调度配置
    config: SchedulerConfig,
    /// 进度回调
    progress_callback: Option<ProgressCallback>,
}

impl BatchValidator {
    /// 创建新的批量验证器
    ///
    /// # 参数
    /// * `prober` - 所有工作任务共享的探测器
    /// * `config` - 调度配置
    pub fn new(prober: Arc<dyn Prober>, config: SchedulerConfig) -> Self {
        Self {
            prober,
            config,
            progress_callback: None,
        }
    }

    /// 设置进度回调
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// 获取调度配置
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 验证一批URL
    ///
    /// 每个输入任务恰好产生一个结果，结果按完成顺序排列。
    /// 单个任务的任何失败（包括探测任务panic）都只影响它自己。
    ///
    /// # 参数
    /// * `tasks` - URL任务列表
    ///
    /// # 返回
    /// * `Vec<ValidationResult>` - 验证结果（完成顺序）
    pub async fn validate_batch(&self, tasks: Vec<UrlTask>) -> Vec<ValidationResult> {
        let total = tasks.len();
        if total == 0 {
            info!("没有需要验证的URL");
            return Vec::new();
        }

        let worker_count = self.config.worker_count.clamp(1, total);
        info!(
            "开始验证 {} 个URL，使用 {} 个并发任务，每个任务间隔 {:.2}s",
            total,
            worker_count,
            self.config.per_worker_delay.as_secs_f64()
        );
        let started = Instant::now();

        let context = Arc::new(WorkerContext {
            prober: Arc::clone(&self.prober),
            queue: Mutex::new(tasks.into_iter().collect()),
            state: Mutex::new(BatchState {
                results: Vec::with_capacity(total),
                processed: 0,
            }),
            config: self.config.clone(),
            progress_callback: self.progress_callback.clone(),
            total,
        });

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, Arc::clone(&context))))
            .collect();

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                error!("工作任务异常退出: {}", e);
            }
        }

        // 所有工作任务都意外退出时，队列中剩余的任务仍需产出结果
        while let Some(task) = context.next_task() {
            warn!("任务未被调度: {}", task.url);
            let outcome = ProbeOutcome::new(task.url.clone(), StatusCategory::UnknownError)
                .with_error("Worker pool stopped before the task was probed");
            context.record(ValidationResult::from_parts(task, outcome));
        }

        let results = std::mem::take(&mut lock(&context.state).results);
        if results.len() != total {
            error!("结果数量 {} 与任务数量 {} 不一致", results.len(), total);
        }

        info!(
            "验证完成！共处理 {} 个URL，耗时 {:.1}s",
            results.len(),
            started.elapsed().as_secs_f64()
        );
        results
    }
}

/// 单个工作任务：循环取任务、探测、记录、等待
async fn run_worker(worker_id: usize, context: Arc<WorkerContext>) {
    debug!("工作任务 {} 启动", worker_id);

    while let Some(task) = context.next_task() {
        let prober = Arc::clone(&context.prober);
        let url = task.url.clone();
        let timeout_duration = context.config.timeout;

        // 探测在独立任务中执行，panic只会变成一个失败结果
        let probe = tokio::spawn(async move { prober.probe(&url, timeout_duration).await });
        let outcome = match probe.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("探测任务异常终止 {}: {}", task.url, e);
                ProbeOutcome::new(task.url.clone(), StatusCategory::UnknownError)
                    .with_error(format!("Probe aborted: {e}"))
            }
        };

        debug!("工作任务 {} 完成: {} -> {}", worker_id, task.url, outcome.status);
        let completed = context.record(ValidationResult::from_parts(task, outcome));
        context.report_progress(completed);

        if !context.config.per_worker_delay.is_zero() {
            tokio::time::sleep(context.config.per_worker_delay).await;
        }
    }

    debug!("工作任务 {} 结束", worker_id);
}
