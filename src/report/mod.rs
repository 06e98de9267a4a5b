//! 报告模块
//!
//! 提供CSV输入读取、汇总统计、结果视图和报告文件写入功能

pub mod input;
pub mod summary;
pub mod views;
pub mod writer;

// 重新导出主要类型
pub use input::{load_results, load_tasks};
pub use summary::{RunMetadata, RunReport, Summary};
pub use views::{fastest, performance_ranking, working_set};
pub use writer::{ReportFiles, ReportWriter};
