//! 结构化生成客户端 - 业务能力层
//!
//! 一次调用 = 校验输入 → 渲染提示词 → 调用模型（带超时）→ 解析并校验输出。
//! 任何一步失败都直接返回错误，不会把不合规的数据交给上层。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, GenerationError};
use crate::infrastructure::LlmBackend;
use crate::services::prompts::PromptSpec;
use crate::services::schema_validator;

/// 结构化生成能力
///
/// 编排层只依赖这个 trait；测试中可以直接返回固定的 JSON。
#[async_trait]
pub trait StructuredGeneration: Send + Sync {
    /// 按提示词定义调用模型，返回通过输出 schema 校验的 JSON
    async fn invoke(&self, prompt: &PromptSpec, input: &Value) -> AppResult<Value>;
}

/// 基于 [`LlmBackend`] 的结构化生成客户端
pub struct StructuredGenerationClient {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl StructuredGenerationClient {
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &Config) -> Self {
        Self::new(backend, Duration::from_secs(config.llm_timeout_secs))
    }
}

#[async_trait]
impl StructuredGeneration for StructuredGenerationClient {
    async fn invoke(&self, prompt: &PromptSpec, input: &Value) -> AppResult<Value> {
        schema_validator::validate(&prompt.input_schema, input).map_err(|details| {
            GenerationError::InvalidInput {
                prompt: prompt.name.to_string(),
                details,
            }
        })?;

        let user_message = prompt.render(input)?;
        let system_message = prompt.system_message();
        debug!(
            "[{}] 提示词长度: {} 字符, 模型: {}",
            prompt.name,
            user_message.len(),
            self.backend.model_name()
        );

        let started = Instant::now();
        let raw = tokio::time::timeout(
            self.timeout,
            self.backend.complete(&system_message, &user_message),
        )
        .await
        .map_err(|_| {
            warn!("[{}] 调用超时 ({} 秒)", prompt.name, self.timeout.as_secs());
            GenerationError::Timeout {
                prompt: prompt.name.to_string(),
                seconds: self.timeout.as_secs(),
            }
        })??;

        let value = schema_validator::parse_or_fail(prompt.name, &prompt.output_schema, &raw)?;
        info!("[{}] 生成完成，耗时 {:.2?}", prompt.name, started.elapsed());
        Ok(value)
    }
}

/// 类型化调用：序列化输入、反序列化输出
pub async fn invoke_typed<I, O>(
    generator: &dyn StructuredGeneration,
    prompt: &PromptSpec,
    input: &I,
) -> AppResult<O>
where
    I: Serialize + ?Sized + Sync,
    O: DeserializeOwned,
{
    let input = serde_json::to_value(input).map_err(|e| GenerationError::InvalidInput {
        prompt: prompt.name.to_string(),
        details: vec![e.to_string()],
    })?;
    let output = generator.invoke(prompt, &input).await?;
    serde_json::from_value(output)
        .map_err(|e| AppError::schema_violation(prompt.name, vec![e.to_string()]))
}
