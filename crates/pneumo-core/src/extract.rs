//! 上游JSON字段提取
//!
//! 上游服务返回的是松散结构的JSON对象。这里提供两套互相独立的提取规则：
//! - 宽松提取（列表视图）：缺失或类型错误的字段返回 `None`，由调用方填充默认值
//! - 严格提取（详情/预诊断）：每个失败字段都被记录下来，最终汇总为 [`MappingError`]

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// 上游返回的原始JSON对象
pub type RawRecord = serde_json::Map<String, Value>;

/// 单个字段的失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    Null,
    Empty,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    InvalidValue {
        reason: String,
    },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => write!(f, "missing"),
            FieldProblem::Null => write!(f, "null"),
            FieldProblem::Empty => write!(f, "empty"),
            FieldProblem::WrongType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            FieldProblem::InvalidValue { reason } => write!(f, "invalid value: {}", reason),
        }
    }
}

/// 字段级错误，`field` 对嵌套字段使用点号路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub problem: FieldProblem,
}

impl FieldError {
    pub fn new(field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// 严格映射失败，列出所有失败的字段
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{context}: {}", join_fields(.fields))]
pub struct MappingError {
    pub context: String,
    pub fields: Vec<FieldError>,
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MappingError {
    pub fn new(context: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self {
            context: context.into(),
            fields,
        }
    }

    /// 是否包含指定字段的错误
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

/// JSON值的类型名
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ========== 宽松提取 ==========

/// 字段存在且为字符串时返回
pub fn lenient_string(record: &RawRecord, field: &str) -> Option<String> {
    record.get(field).and_then(Value::as_str).map(str::to_string)
}

/// 字段存在且为非空字符串时返回
pub fn lenient_non_empty(record: &RawRecord, field: &str) -> Option<String> {
    lenient_string(record, field).filter(|s| !s.trim().is_empty())
}

/// 字段存在且为数字时返回
pub fn lenient_f64(record: &RawRecord, field: &str) -> Option<f64> {
    record.get(field).and_then(Value::as_f64)
}

/// 字段存在且为对象时返回
pub fn lenient_object<'a>(record: &'a RawRecord, field: &str) -> Option<&'a RawRecord> {
    record.get(field).and_then(Value::as_object)
}

/// 按顺序尝试多个字段，取第一个可用作标识符的值（非空字符串或整数）
pub fn lenient_id(record: &RawRecord, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(*field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    })
}

// ========== 严格提取 ==========

/// 严格字段读取器
///
/// 每次读取失败都会记录一条 [`FieldError`]，读取结束后调用 [`StrictReader::finish`]
/// 或 [`StrictReader::into_error`] 得到汇总的映射错误。
#[derive(Debug)]
pub struct StrictReader<'a> {
    record: &'a RawRecord,
    errors: Vec<FieldError>,
}

impl<'a> StrictReader<'a> {
    pub fn new(record: &'a RawRecord) -> Self {
        Self {
            record,
            errors: Vec::new(),
        }
    }

    /// 必填的非空字符串
    pub fn string(&mut self, field: &str) -> Option<String> {
        let record = self.record;
        self.read_string(record, field.to_string(), field)
    }

    /// 必填的数字
    pub fn number(&mut self, field: &str) -> Option<f64> {
        let record = self.record;
        self.read_number(record, field.to_string(), field)
    }

    /// 必填的嵌套对象
    pub fn object(&mut self, field: &str) -> Option<&'a RawRecord> {
        let record = self.record;
        self.read(record, field.to_string(), field, "object", Value::as_object)
    }

    /// 嵌套对象中的必填非空字符串
    pub fn nested_string(
        &mut self,
        parent: &'a RawRecord,
        parent_name: &str,
        field: &str,
    ) -> Option<String> {
        self.read_string(parent, format!("{}.{}", parent_name, field), field)
    }

    /// 嵌套对象中的必填数字
    pub fn nested_number(
        &mut self,
        parent: &'a RawRecord,
        parent_name: &str,
        field: &str,
    ) -> Option<f64> {
        self.read_number(parent, format!("{}.{}", parent_name, field), field)
    }

    /// 记录一个由调用方判定的字段错误
    pub fn reject(&mut self, field: impl Into<String>, problem: FieldProblem) {
        self.errors.push(FieldError::new(field, problem));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_error(self, context: impl Into<String>) -> MappingError {
        MappingError::new(context, self.errors)
    }

    pub fn finish(self, context: impl Into<String>) -> std::result::Result<(), MappingError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into_error(context))
        }
    }

    fn read_string(&mut self, source: &'a RawRecord, path: String, field: &str) -> Option<String> {
        let value = self.read(source, path.clone(), field, "string", Value::as_str)?;
        if value.trim().is_empty() {
            self.errors.push(FieldError::new(path, FieldProblem::Empty));
            return None;
        }
        Some(value.to_string())
    }

    fn read_number(&mut self, source: &'a RawRecord, path: String, field: &str) -> Option<f64> {
        self.read(source, path, field, "number", Value::as_f64)
    }

    fn read<T>(
        &mut self,
        source: &'a RawRecord,
        path: String,
        field: &str,
        expected: &'static str,
        convert: impl Fn(&'a Value) -> Option<T>,
    ) -> Option<T> {
        let problem = match source.get(field) {
            None => FieldProblem::Missing,
            Some(Value::Null) => FieldProblem::Null,
            Some(value) => match convert(value) {
                Some(converted) => return Some(converted),
                None => FieldProblem::WrongType {
                    expected,
                    found: json_type_name(value),
                },
            },
        };
        self.errors.push(FieldError::new(path, problem));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_lenient_helpers() {
        let r = record(json!({
            "name": "Ana",
            "blank": "  ",
            "prob": 0.82,
            "count": 3,
            "flag": true
        }));

        assert_eq!(lenient_string(&r, "name").as_deref(), Some("Ana"));
        assert_eq!(lenient_string(&r, "prob"), None);
        assert_eq!(lenient_non_empty(&r, "blank"), None);
        assert_eq!(lenient_f64(&r, "prob"), Some(0.82));
        assert_eq!(lenient_f64(&r, "name"), None);
        assert_eq!(lenient_id(&r, &["missing", "count"]).as_deref(), Some("3"));
        assert_eq!(lenient_id(&r, &["blank", "flag"]), None);
    }

    #[test]
    fn test_strict_reader_collects_every_failure() {
        let r = record(json!({
            "user_id": "u-1",
            "estado": 5,
            "fecha_subida": null,
            "radiografia_ruta": "",
            "resultado_modelo": { "etiqueta": "normal" }
        }));

        let mut reader = StrictReader::new(&r);
        assert_eq!(reader.string("user_id").as_deref(), Some("u-1"));
        assert!(reader.string("estado").is_none());
        assert!(reader.string("fecha_subida").is_none());
        assert!(reader.string("radiografia_ruta").is_none());
        assert!(reader.string("fecha_procesamiento").is_none());
        let nested = reader.object("resultado_modelo").expect("object present");
        assert!(reader
            .nested_number(nested, "resultado_modelo", "probabilidad_neumonia")
            .is_none());
        assert_eq!(
            reader
                .nested_string(nested, "resultado_modelo", "etiqueta")
                .as_deref(),
            Some("normal")
        );

        let err = reader.finish("case 9").unwrap_err();
        assert_eq!(err.fields.len(), 5);
        assert_eq!(
            err.fields[0],
            FieldError::new(
                "estado",
                FieldProblem::WrongType {
                    expected: "string",
                    found: "number"
                }
            )
        );
        assert_eq!(err.fields[1].problem, FieldProblem::Null);
        assert_eq!(err.fields[2].problem, FieldProblem::Empty);
        assert_eq!(err.fields[3].problem, FieldProblem::Missing);
        assert!(err.has_field("resultado_modelo.probabilidad_neumonia"));
        assert!(err.to_string().starts_with("case 9: estado: expected string, found number"));
    }

    #[test]
    fn test_strict_reader_finishes_clean() {
        let r = record(json!({ "id": "a" }));
        let mut reader = StrictReader::new(&r);
        assert!(reader.string("id").is_some());
        assert!(!reader.has_errors());
        assert!(reader.finish("ok").is_ok());
    }
}
