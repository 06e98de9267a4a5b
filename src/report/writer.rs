//! 报告表格写入
//!
//! 把结果集和派生视图写成CSV表格，把汇总写成JSON。
//! 相同的结果集总是产生字节级相同的表格。

use crate::config::types::OutputConfig;
use crate::error::{ReportError, Result};
use crate::health::result::ValidationResult;
use crate::report::summary::{RunMetadata, RunReport, Summary};
use crate::report::views::{performance_ranking, working_set};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 全部结果表的固定列
pub const ALL_RESULTS_COLUMNS: [&str; 12] = [
    "Category",
    "SourceURL",
    "status",
    "status_code",
    "response_time",
    "City",
    "State",
    "Generated",
    "redirect_url",
    "content_length",
    "content_type",
    "error",
];

/// 可用URL详细表的列
pub const WORKING_COLUMNS: [&str; 7] = [
    "Category",
    "SourceURL",
    "City",
    "State",
    "status_code",
    "response_time",
    "redirect_url",
];

/// 可用URL简化表的列
pub const WORKING_SIMPLE_COLUMNS: [&str; 2] = ["Category", "SourceURL"];

/// 性能排行表的列
pub const PERFORMANCE_COLUMNS: [&str; 8] = [
    "Category",
    "SourceURL",
    "City",
    "State",
    "status_code",
    "response_time",
    "content_length",
    "content_type",
];

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn seconds(value: Option<f64>) -> String {
    value.map(|s| format!("{s:.2}")).unwrap_or_default()
}

/// 输入中额外列的并集，按首次出现的顺序，与固定列同名的列被忽略
fn extra_columns(results: &[ValidationResult]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for result in results {
        for (column, _) in &result.extra {
            if !ALL_RESULTS_COLUMNS.contains(&column.as_str()) && !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }
    columns
}

/// 写入全部结果表
pub fn write_all_results<W: Write>(writer: W, results: &[ValidationResult]) -> Result<()> {
    let extras = extra_columns(results);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = ALL_RESULTS_COLUMNS.to_vec();
    header.extend(extras.iter().map(String::as_str));
    csv_writer.write_record(&header)?;

    for result in results {
        let mut record = vec![
            result.category.clone(),
            result.source_url.clone(),
            result.status.to_string(),
            optional(&result.http_code),
            seconds(result.elapsed_seconds),
            result.city.clone(),
            result.state.clone(),
            result.is_generated.to_string(),
            optional(&result.redirected_to),
            optional(&result.content_length),
            optional(&result.content_type),
            optional(&result.error),
        ];
        for column in &extras {
            let value = result
                .extra
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            record.push(value);
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// 写入可用URL详细表
pub fn write_working<W: Write>(writer: W, working: &[&ValidationResult]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(WORKING_COLUMNS)?;
    for result in working {
        csv_writer.write_record([
            result.category.clone(),
            result.source_url.clone(),
            result.city.clone(),
            result.state.clone(),
            optional(&result.http_code),
            seconds(result.elapsed_seconds),
            optional(&result.redirected_to),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// 写入可用URL简化表
pub fn write_working_simple<W: Write>(writer: W, working: &[&ValidationResult]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(WORKING_SIMPLE_COLUMNS)?;
    for result in working {
        csv_writer.write_record([result.category.as_str(), result.source_url.as_str()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// 写入性能排行表
pub fn write_performance<W: Write>(writer: W, ranking: &[&ValidationResult]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(PERFORMANCE_COLUMNS)?;
    for result in ranking {
        csv_writer.write_record([
            result.category.clone(),
            result.source_url.clone(),
            result.city.clone(),
            result.state.clone(),
            optional(&result.http_code),
            seconds(result.elapsed_seconds),
            optional(&result.content_length),
            optional(&result.content_type),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// 一次报告写出的文件
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFiles {
    /// 全部结果表
    pub all_results: PathBuf,
    /// 可用URL详细表
    pub working: PathBuf,
    /// 可用URL简化表
    pub working_simple: PathBuf,
    /// 性能排行表
    pub performance: PathBuf,
    /// 汇总JSON
    pub summary: PathBuf,
}

impl ReportFiles {
    /// 按写入顺序列出所有文件
    pub fn paths(&self) -> [&Path; 5] {
        [
            self.all_results.as_path(),
            self.working.as_path(),
            self.working_simple.as_path(),
            self.performance.as_path(),
            self.summary.as_path(),
        ]
    }
}

/// 报告写入器，把整套报告写到输出目录
#[derive(Debug, Clone)]
pub struct ReportWriter {
    /// 输出配置
    output: OutputConfig,
}

impl ReportWriter {
    /// 创建新的报告写入器
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// 输出配置
    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// 写出全部表格与汇总
    ///
    /// 视图为空时仍写出只有表头的文件，保证每次运行产生完整的文件集。
    ///
    /// # 参数
    /// * `results` - 完整的结果集
    /// * `run` - 本次运行的元数据
    ///
    /// # 返回
    /// * `Result<ReportFiles>` - 写出的文件路径
    pub fn write(&self, results: &[ValidationResult], run: &RunMetadata) -> Result<ReportFiles> {
        let directory = &self.output.directory;
        std::fs::create_dir_all(directory).map_err(|e| ReportError::OutputDirectory {
            path: directory.display().to_string(),
            reason: e.to_string(),
        })?;

        let files = ReportFiles {
            all_results: self.output.all_results_path(),
            working: self.output.working_path(),
            working_simple: self.output.working_simple_path(),
            performance: self.output.performance_path(),
            summary: self.output.summary_path(),
        };

        let working = working_set(results);
        let ranking = performance_ranking(results);
        if working.is_empty() {
            warn!("没有可用的URL，可用URL表只包含表头");
        }
        if ranking.is_empty() {
            warn!("没有可用于排行的URL，性能排行表只包含表头");
        }

        write_file(&files.all_results, |w| write_all_results(w, results))?;
        write_file(&files.working, |w| write_working(w, &working))?;
        write_file(&files.working_simple, |w| write_working_simple(w, &working))?;
        write_file(&files.performance, |w| write_performance(w, &ranking))?;

        let report = RunReport {
            run: run.clone(),
            summary: Summary::from_results(results),
        };
        let json = report.to_json()?;
        write_file(&files.summary, |w| {
            w.write_all(json.as_bytes())?;
            w.write_all(b"\n")?;
            Ok(())
        })?;

        for path in files.paths() {
            info!("报告已写入: {}", path.display());
        }

        Ok(files)
    }
}

/// 创建文件并调用写入函数，失败时附带文件路径
fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path).map_err(|e| ReportError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|e| ReportError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::{ProbeOutcome, StatusCategory, UrlTask};
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample() -> Vec<ValidationResult> {
        vec![
            ValidationResult::from_parts(
                UrlTask::new("https://parks.example.org/events", "Parks")
                    .with_location("Springfield", "IL")
                    .with_extra("Notes", "main feed"),
                ProbeOutcome::new("https://parks.example.org/events", StatusCategory::Success)
                    .with_http_code(200)
                    .with_elapsed(Duration::from_millis(820))
                    .with_content_length(5120)
                    .with_content_type("text/html"),
            ),
            ValidationResult::from_parts(
                UrlTask::new("https://library.example.org/calendar", "Libraries")
                    .generated(true),
                ProbeOutcome::new("https://library.example.org/calendar", StatusCategory::Redirect)
                    .with_http_code(301)
                    .with_elapsed(Duration::from_millis(310))
                    .with_redirect("https://library.example.org/events"),
            ),
            ValidationResult::from_parts(
                UrlTask::new("https://museum.example.org/, \"new\"", "Museums")
                    .with_extra("Owner", "city"),
                ProbeOutcome::new("https://museum.example.org/, \"new\"", StatusCategory::Timeout)
                    .with_error("Request timeout after 15s"),
            ),
        ]
    }

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_all_results_table() {
        let results = sample();
        let text = render(|w| write_all_results(w, &results));
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Category,SourceURL,status,status_code,response_time,City,State,Generated,\
             redirect_url,content_length,content_type,error,Notes,Owner"
        );
        assert_eq!(
            lines[1],
            "Parks,https://parks.example.org/events,success,200,0.82,Springfield,IL,false,,5120,text/html,,main feed,"
        );
        assert!(lines[2].starts_with("Libraries,https://library.example.org/calendar,redirect,301,0.31,,,true,"));
        // 含逗号和引号的字段被正确转义
        assert!(lines[3].starts_with("Museums,\"https://museum.example.org/, \"\"new\"\"\",timeout,,,"));
        assert!(lines[3].ends_with("Request timeout after 15s,,city"));
    }

    #[test]
    fn test_extra_columns_never_repeat_fixed_header() {
        let task = UrlTask::new("https://a.example/", "Gov")
            .with_extra("status", "success")
            .with_extra("error", "")
            .with_extra("Notes", "keep");
        let results = vec![ValidationResult::from_parts(
            task,
            ProbeOutcome::new("https://a.example/", StatusCategory::NotFound).with_http_code(404),
        )];

        let text = render(|w| write_all_results(w, &results));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Category,SourceURL,status,status_code,response_time,City,State,Generated,\
             redirect_url,content_length,content_type,error,Notes"
        );
        assert_eq!(lines[1], "Gov,https://a.example/,not_found,404,,,,false,,,,,keep");
    }

    #[test]
    fn test_views_tables() {
        let results = sample();
        let working = working_set(&results);
        let ranking = performance_ranking(&results);

        let detailed = render(|w| write_working(w, &working));
        assert_eq!(
            detailed,
            "Category,SourceURL,City,State,status_code,response_time,redirect_url\n\
             Libraries,https://library.example.org/calendar,,,301,0.31,https://library.example.org/events\n\
             Parks,https://parks.example.org/events,Springfield,IL,200,0.82,\n"
        );

        let simple = render(|w| write_working_simple(w, &working));
        assert_eq!(
            simple,
            "Category,SourceURL\n\
             Libraries,https://library.example.org/calendar\n\
             Parks,https://parks.example.org/events\n"
        );

        let performance = render(|w| write_performance(w, &ranking));
        let lines: Vec<_> = performance.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("0.31"));
        assert!(lines[2].contains("0.82"));
    }

    #[test]
    fn test_empty_views_are_header_only() {
        let text = render(|w| write_working(w, &[]));
        assert_eq!(
            text,
            "Category,SourceURL,City,State,status_code,response_time,redirect_url\n"
        );
        let text = render(|w| write_all_results(w, &[]));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_report_writer_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(OutputConfig {
            directory: dir.path().join("reports"),
            ..OutputConfig::default()
        });
        let results = sample();
        let run = RunMetadata::start(None).finish();

        let files = writer.write(&results, &run).unwrap();
        let first: Vec<Vec<u8>> = files
            .paths()
            .iter()
            .map(|p| std::fs::read(p).unwrap())
            .collect();

        let files_again = writer.write(&results, &run).unwrap();
        assert_eq!(files, files_again);
        let second: Vec<Vec<u8>> = files_again
            .paths()
            .iter()
            .map(|p| std::fs::read(p).unwrap())
            .collect();

        assert_eq!(first, second);
        assert!(files
            .working_simple
            .ends_with("working_event_sources_simple.csv"));

        let summary: RunReport =
            serde_json::from_slice(&std::fs::read(&files.summary).unwrap()).unwrap();
        assert_eq!(summary.summary.total, 3);
        assert_eq!(summary.summary.successful, 2);
    }
}
