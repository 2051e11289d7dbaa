use serde::Serialize;
use tracing::error;

use crate::error::{AppError, AppResult, FailureKind};

/// 工作流入口的统一返回值
///
/// 错误在这里被收敛为带标签的结果，展示层只需要渲染 `error` 和 `hint`。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl<T> ActionOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            hint: None,
        }
    }

    pub fn failed(err: &AppError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
            hint: Some(err.user_hint()),
        }
    }

    /// 把内部结果转换为对外结果，失败时记录日志
    pub fn from_result(action: &str, result: AppResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => {
                error!("[{}] ❌ {}", action, err);
                Self::failed(&err)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
