//! CSV输入读取
//!
//! 读取待验证的URL列表，以及之前写出的全部结果表（用于不重新探测而重新生成报告）。

use crate::error::{InputError, Result};
use crate::health::result::{StatusCategory, UrlTask, ValidationResult};
use crate::report::writer::ALL_RESULTS_COLUMNS;
use csv::StringRecord;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

const TASK_COLUMNS: [&str; 5] = ["Category", "SourceURL", "City", "State", "Generated"];

/// 探测结果中的URL键，输入中同名的列由结果覆盖
const PROBE_URL_COLUMN: &str = "url";

/// 表头索引
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            names: headers
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
        }
    }

    fn find(&self, column: &str) -> Option<usize> {
        self.names.iter().position(|name| name == column)
    }

    fn require(&self, column: &str) -> Result<usize> {
        self.find(column).ok_or_else(|| {
            InputError::MissingColumn {
                column: column.to_string(),
            }
            .into()
        })
    }

    /// 不在已知列中的其他列
    fn extras(&self, known: &[&str]) -> Vec<(usize, String)> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| !known.contains(&name.as_str()))
            .map(|(index, name)| (index, name.clone()))
            .collect()
    }
}

fn field<'a>(record: &'a StringRecord, index: Option<usize>) -> &'a str {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .unwrap_or("")
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn invalid(record: &StringRecord, column: &str, value: &str) -> InputError {
    InputError::InvalidValue {
        line: line_of(record),
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// 解析布尔标记，空值视为 false
///
/// 支持 true/false、1/0、yes/no，不区分大小写
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Some(false),
        "true" | "1" | "yes" => Some(true),
        _ => None,
    }
}

fn parse_optional<T: FromStr>(
    record: &StringRecord,
    index: Option<usize>,
    column: &str,
) -> Result<Option<T>> {
    let value = field(record, index);
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| invalid(record, column, value).into())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(InputError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// 读取待验证的URL列表
///
/// 必需列为 `Category` 与 `SourceURL`；`City`、`State`、`Generated` 可选；
/// 其他列原样保留到结果中。`SourceURL` 为空的行会被跳过。
///
/// # 参数
/// * `path` - CSV文件路径
///
/// # 返回
/// * `Result<Vec<UrlTask>>` - 按文件顺序的任务列表
pub fn load_tasks(path: &Path) -> Result<Vec<UrlTask>> {
    let mut reader = open_reader(path)?;
    let columns = Columns::new(reader.headers()?);

    let category = columns.require("Category")?;
    let url = columns.require("SourceURL")?;
    let city = columns.find("City");
    let state = columns.find("State");
    let generated = columns.find("Generated");
    // 与输出列同名的输入列会被探测结果覆盖，不作为额外列保留
    let mut known: Vec<&str> = TASK_COLUMNS.to_vec();
    known.extend(ALL_RESULTS_COLUMNS);
    known.push(PROBE_URL_COLUMN);
    let extras = columns.extras(&known);

    let mut tasks = Vec::new();
    for record in reader.records() {
        let record = record?;
        let source_url = field(&record, Some(url));
        if source_url.is_empty() {
            warn!("第 {} 行的 SourceURL 为空，已跳过", line_of(&record));
            continue;
        }

        let generated_value = field(&record, generated);
        let is_generated = parse_flag(generated_value)
            .ok_or_else(|| invalid(&record, "Generated", generated_value))?;

        let mut task = UrlTask::new(source_url, field(&record, Some(category)))
            .with_location(field(&record, city), field(&record, state))
            .generated(is_generated);
        for (index, name) in &extras {
            task = task.with_extra(name.clone(), field(&record, Some(*index)));
        }
        tasks.push(task);
    }

    debug!("从 {} 读取了 {} 个URL", path.display(), tasks.len());
    Ok(tasks)
}

/// 读取之前写出的全部结果表
///
/// # 参数
/// * `path` - 全部结果表路径
///
/// # 返回
/// * `Result<Vec<ValidationResult>>` - 按文件顺序的结果列表
pub fn load_results(path: &Path) -> Result<Vec<ValidationResult>> {
    let mut reader = open_reader(path)?;
    let columns = Columns::new(reader.headers()?);

    let category = columns.require("Category")?;
    let url = columns.require("SourceURL")?;
    let status = columns.require("status")?;
    let status_code = columns.find("status_code");
    let response_time = columns.find("response_time");
    let city = columns.find("City");
    let state = columns.find("State");
    let generated = columns.find("Generated");
    let redirect_url = columns.find("redirect_url");
    let content_length = columns.find("content_length");
    let content_type = columns.find("content_type");
    let error = columns.find("error");
    let extras = columns.extras(&ALL_RESULTS_COLUMNS);

    let mut results = Vec::new();
    for record in reader.records() {
        let record = record?;

        let status_value = field(&record, Some(status));
        let status = StatusCategory::from_str(status_value)
            .map_err(|_| invalid(&record, "status", status_value))?;
        let generated_value = field(&record, generated);
        let is_generated = parse_flag(generated_value)
            .ok_or_else(|| invalid(&record, "Generated", generated_value))?;

        results.push(ValidationResult {
            category: field(&record, Some(category)).to_string(),
            source_url: field(&record, Some(url)).to_string(),
            city: field(&record, city).to_string(),
            state: field(&record, state).to_string(),
            is_generated,
            status,
            http_code: parse_optional(&record, status_code, "status_code")?,
            elapsed_seconds: parse_optional(&record, response_time, "response_time")?,
            error: non_empty(field(&record, error)),
            redirected_to: non_empty(field(&record, redirect_url)),
            content_length: parse_optional(&record, content_length, "content_length")?,
            content_type: non_empty(field(&record, content_type)),
            extra: extras
                .iter()
                .map(|(index, name)| (name.clone(), field(&record, Some(*index)).to_string()))
                .collect(),
        });
    }

    debug!("从 {} 读取了 {} 条结果", path.display(), results.len());
    Ok(results)
}
