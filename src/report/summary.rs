//! 批量验证汇总统计
//!
//! 对完整结果集做纯归约：总数、成功率、各状态计数、各分类的可用URL数。
//! 输入顺序不影响输出。

use crate::health::result::{StatusCategory, ValidationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

/// 汇总统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// 结果总数
    pub total: usize,
    /// 可用（success/redirect）数量
    pub successful: usize,
    /// 不可用数量
    pub failed: usize,
    /// 成功率（百分比）
    pub success_rate: f64,
    /// 各状态计数，按状态名排序，不含计数为0的状态
    pub status_counts: BTreeMap<String, usize>,
    /// 各分类的可用URL数，按分类名排序
    pub category_successes: BTreeMap<String, usize>,
}

impl Summary {
    /// 从结果集计算汇总
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut status_counts = BTreeMap::new();
        let mut category_successes = BTreeMap::new();

        for result in results {
            *status_counts
                .entry(result.status.as_str().to_string())
                .or_insert(0) += 1;
            if result.is_working() {
                *category_successes
                    .entry(result.category.clone())
                    .or_insert(0) += 1;
            }
        }

        let total = results.len();
        let successful = category_successes.values().sum();
        let mut summary = Self {
            total,
            successful,
            failed: total - successful,
            success_rate: 0.0,
            status_counts,
            category_successes,
        };
        summary.success_rate = summary.percent_of(successful);
        summary
    }

    /// 某个状态的计数
    pub fn count_of(&self, status: StatusCategory) -> usize {
        self.status_counts
            .get(status.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// 某个计数占结果总数的百分比，结果为空时为0
    pub fn percent_of(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    /// 渲染控制台输出的汇总文本
    pub fn render_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "=== URL 验证汇总 ===");
        let _ = writeln!(text, "验证总数: {}", self.total);
        let _ = writeln!(
            text,
            "可用: {} ({:.1}%)",
            self.successful, self.success_rate
        );
        let _ = writeln!(
            text,
            "不可用: {} ({:.1}%)",
            self.failed,
            self.percent_of(self.failed)
        );

        let _ = writeln!(text);
        let _ = writeln!(text, "状态分布:");
        for (status, count) in &self.status_counts {
            let _ = writeln!(
                text,
                "  {status:15}: {count:4} ({:5.1}%)",
                self.percent_of(*count)
            );
        }

        let _ = writeln!(text);
        let _ = writeln!(text, "各分类可用URL:");
        if self.category_successes.is_empty() {
            let _ = writeln!(text, "  (无)");
        }
        for (category, count) in &self.category_successes {
            let _ = writeln!(text, "  {category}: {count}");
        }

        text
    }
}

/// 一次运行的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// 运行ID
    pub run_id: Uuid,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 结束时间
    pub finished_at: DateTime<Utc>,
    /// 总耗时（秒）
    pub duration_seconds: f64,
    /// 输入文件
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

impl RunMetadata {
    /// 以当前时间为开始时间创建
    pub fn start(input: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            duration_seconds: 0.0,
            input,
        }
    }

    /// 标记运行结束
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.duration_seconds = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        self
    }
}

/// 写入 summary JSON 的完整文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// 运行元数据
    pub run: RunMetadata,
    /// 汇总统计
    pub summary: Summary,
}

impl RunReport {
    /// 转换为JSON字符串
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::{ProbeOutcome, UrlTask};

    fn result(url: &str, category: &str, status: StatusCategory) -> ValidationResult {
        ValidationResult::from_parts(
            UrlTask::new(url, category),
            ProbeOutcome::new(url, status),
        )
    }

    fn sample() -> Vec<ValidationResult> {
        vec![
            result("https://a.example.org", "Parks", StatusCategory::Success),
            result("https://b.example.org", "Parks", StatusCategory::Redirect),
            result("https://c.example.org", "Libraries", StatusCategory::Success),
            result("https://d.example.org", "Libraries", StatusCategory::NotFound),
            result("https://e.example.org", "Museums", StatusCategory::Timeout),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_results(&sample());

        assert_eq!(summary.total, 5);
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.failed, 2);
        assert!((summary.success_rate - 60.0).abs() < 1e-9);
        assert_eq!(summary.count_of(StatusCategory::Success), 2);
        assert_eq!(summary.count_of(StatusCategory::Timeout), 1);
        assert_eq!(summary.count_of(StatusCategory::SslError), 0);

        let categories: Vec<_> = summary.category_successes.iter().collect();
        assert_eq!(
            categories,
            vec![(&"Libraries".to_string(), &1), (&"Parks".to_string(), &2)]
        );
    }

    #[test]
    fn test_summary_is_order_independent() {
        let mut reversed = sample();
        reversed.reverse();
        assert_eq!(
            Summary::from_results(&sample()),
            Summary::from_results(&reversed)
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::from_results(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.render_text().contains("(0.0%)"));
    }

    #[test]
    fn test_render_text_ordering() {
        let text = Summary::from_results(&sample()).render_text();

        assert!(text.contains("验证总数: 5"));
        assert!(text.contains("可用: 3 (60.0%)"));
        assert!(text.contains("不可用: 2 (40.0%)"));
        let not_found = text.find("  not_found      :    1 ( 20.0%)").unwrap();
        let success = text.find("  success        :    2 ( 40.0%)").unwrap();
        let timeout = text.find("  timeout        :    1 ( 20.0%)").unwrap();
        assert!(not_found < success && success < timeout);
    }

    #[test]
    fn test_run_report_json() {
        let run = RunMetadata::start(Some("sources.csv".to_string())).finish();
        assert!(run.finished_at >= run.started_at);
        assert!(run.duration_seconds >= 0.0);

        let report = RunReport {
            run,
            summary: Summary::from_results(&sample()),
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"run_id\""));
        assert!(json.contains("\"success_rate\""));

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
