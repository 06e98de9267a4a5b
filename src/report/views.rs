//! 结果视图
//!
//! 可用URL集合与性能排行。排序都是稳定的，相同键保持输入顺序。

use crate::health::result::ValidationResult;
use std::cmp::Ordering;
use std::fmt::Write as _;

/// 控制台默认展示的最快URL数量
pub const DEFAULT_FASTEST_COUNT: usize = 10;

/// 比较耗时，缺失值排在最后
fn compare_elapsed(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 可用URL集合：按分类升序，分类内按耗时升序
pub fn working_set(results: &[ValidationResult]) -> Vec<&ValidationResult> {
    let mut working: Vec<_> = results.iter().filter(|r| r.is_working()).collect();
    working.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| compare_elapsed(a.elapsed_seconds, b.elapsed_seconds))
    });
    working
}

/// 性能排行：有耗时的可用URL，按耗时升序
pub fn performance_ranking(results: &[ValidationResult]) -> Vec<&ValidationResult> {
    let mut ranking: Vec<_> = results
        .iter()
        .filter(|r| r.is_working() && r.elapsed_seconds.is_some())
        .collect();
    ranking.sort_by(|a, b| compare_elapsed(a.elapsed_seconds, b.elapsed_seconds));
    ranking
}

/// 性能排行的前 n 项
pub fn fastest(results: &[ValidationResult], n: usize) -> Vec<&ValidationResult> {
    let mut ranking = performance_ranking(results);
    ranking.truncate(n);
    ranking
}

/// 渲染最快URL列表
pub fn render_fastest(entries: &[&ValidationResult]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "=== 响应最快的 {} 个URL ===", entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            text,
            "{:>2}. {:.2}s  [{}] {}",
            index + 1,
            entry.elapsed_seconds.unwrap_or_default(),
            entry.category,
            entry.source_url
        );
    }
    text
}
