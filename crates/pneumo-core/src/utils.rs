//! 通用工具函数

use chrono::{DateTime, NaiveDateTime, Utc};

/// 日期缺失或无法解析时的占位文本
pub const DATE_UNAVAILABLE: &str = "date unavailable";

/// 上游未提供影像路径时的占位URL
pub const PLACEHOLDER_IMAGE_URL: &str = "/placeholder-radiography.jpg";

/// 阳性结果标签
pub const POSITIVE_FINDING_LABEL: &str = "Pneumonia detected";

/// 标签缺失时的默认值
pub const UNCLASSIFIED_LABEL: &str = "Unclassified";

/// 对外展示的日期格式 DD/MM/YYYY HH:MM
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// 归一化上游日期
///
/// 支持 RFC 3339、不带时区的ISO时间（按UTC处理）以及Unix秒时间戳字符串。
pub fn normalize_date(value: Option<&str>) -> String {
    value
        .and_then(parse_upstream_date)
        .unwrap_or_else(|| DATE_UNAVAILABLE.to_string())
}

fn parse_upstream_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.format(DISPLAY_DATE_FORMAT).to_string());
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.format(DISPLAY_DATE_FORMAT).to_string());
        }
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        let seconds: i64 = raw.parse().ok()?;
        let parsed: DateTime<Utc> = DateTime::from_timestamp(seconds, 0)?;
        return Some(parsed.format(DISPLAY_DATE_FORMAT).to_string());
    }

    None
}

/// 归一化模型标签，未识别的值原样返回
pub fn normalize_label(label: &str) -> String {
    match label {
        "pneumonia" => POSITIVE_FINDING_LABEL.to_string(),
        "normal" => "Normal".to_string(),
        "uncertain" => "Uncertain".to_string(),
        other => other.to_string(),
    }
}

/// 根据上游文件路径构造影像URL
///
/// 只取路径最后一段（同时支持 `\` 和 `/` 分隔符），拼接到影像服务地址之后。
pub fn build_image_url(image_base_url: &str, path: Option<&str>) -> String {
    let file_name = path
        .and_then(|p| p.rsplit(|c: char| c == '\\' || c == '/').next())
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match file_name {
        Some(name) => format!("{}/{}", image_base_url.trim_end_matches('/'), name),
        None => PLACEHOLDER_IMAGE_URL.to_string(),
    }
}
