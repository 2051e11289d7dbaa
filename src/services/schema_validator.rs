//! 输出结构校验 - 业务能力层
//!
//! 模型的原始文本 → JSON → schema 校验，要么得到合法数据，要么得到错误明细。
//! 三种提示词共用同一套"解析或失败"逻辑。

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::GenerationError;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("valid regex"));

/// 用 JSON Schema 校验数据，返回全部错误信息
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::validator_for(schema).map_err(|e| vec![e.to_string()])?;
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// 从模型文本中取出 JSON
///
/// 依次尝试：整段文本、Markdown 代码块内的内容、第一个 `{`/`[` 到最后一个 `}`/`]` 之间的内容。
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("返回内容为空".to_string());
    }

    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    if let Some(captures) = CODE_FENCE.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
            debug!("从代码块中提取到 JSON");
            return Ok(value);
        }
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                debug!("从附加文字中提取到 JSON");
                return Ok(value);
            }
        }
    }

    Err(first_error)
}

/// 解析并校验模型输出
///
/// 期望数组但拿到只有一个数组字段的对象时（如 `{"results": [...]}`），自动展开。
pub fn parse_or_fail(prompt: &str, schema: &Value, raw: &str) -> Result<Value, GenerationError> {
    let value = extract_json(raw).map_err(|message| GenerationError::InvalidJson {
        prompt: prompt.to_string(),
        message,
    })?;
    let value = unwrap_single_array_field(schema, value);

    validate(schema, &value).map_err(|details| {
        warn!("{} 的返回内容未通过校验: {:?}", prompt, details);
        GenerationError::SchemaViolation {
            prompt: prompt.to_string(),
            details,
        }
    })?;
    Ok(value)
}

fn unwrap_single_array_field(schema: &Value, value: Value) -> Value {
    if schema.get("type").and_then(Value::as_str) != Some("array") {
        return value;
    }
    match value {
        Value::Object(mut map) if map.len() == 1 && map.values().all(Value::is_array) => {
            let key = map.keys().next().cloned().unwrap_or_default();
            warn!("模型把结果包在字段 \"{}\" 中，已展开", key);
            map.remove(&key).unwrap_or(Value::Array(Vec::new()))
        }
        other => other,
    }
}
