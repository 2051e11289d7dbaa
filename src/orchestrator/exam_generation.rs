//! 出题编排 - 编排层
//!
//! 校验请求 → （实践作业）提取源文档 → 一次结构化生成 → 检查结果完整性。
//! 生成内容原样返回，不做任何后处理。

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, ExtractionError, GenerationError};
use crate::infrastructure::TextExtractor;
use crate::models::{ExamGenerationRequest, ExamType, GeneratedExam, UploadedDocument};
use crate::services::{invoke_typed, PromptCatalog, StructuredGeneration};

/// 出题编排器
pub struct ExamGenerator {
    generator: Arc<dyn StructuredGeneration>,
    extractor: Arc<dyn TextExtractor>,
    prompts: Arc<PromptCatalog>,
}

impl ExamGenerator {
    pub fn new(
        generator: Arc<dyn StructuredGeneration>,
        extractor: Arc<dyn TextExtractor>,
        prompts: Arc<PromptCatalog>,
    ) -> Self {
        Self {
            generator,
            extractor,
            prompts,
        }
    }

    /// 生成试卷和评分标准
    ///
    /// `source` 只对实践作业生效，其他题型会忽略它。
    pub async fn generate(
        &self,
        request: ExamGenerationRequest,
        source: Option<UploadedDocument>,
    ) -> AppResult<GeneratedExam> {
        let mut request = request.normalized();
        let source = match source {
            Some(document) if request.exam_type != ExamType::PracticalWorkFromDocument => {
                warn!(
                    "题型 {} 不使用源文档，已忽略 {}",
                    request.exam_type, document.file_name
                );
                None
            }
            other => other,
        };

        request.validate(source.is_some())?;

        if let Some(document) = source {
            let text = self.extract_source(document).await?;
            request.source_text = Some(text);
        }

        info!(
            "📝 生成试卷: 题型 {}, 主题 {}",
            request.exam_type,
            request.topic.as_deref().unwrap_or("-")
        );
        let exam: GeneratedExam =
            invoke_typed(self.generator.as_ref(), &self.prompts.exam_generation, &request).await?;

        let missing = exam.missing_fields();
        if !missing.is_empty() {
            warn!("生成结果缺少字段: {:?}", missing);
            return Err(GenerationError::Incomplete { missing }.into());
        }

        info!(
            "✓ 试卷生成完成: 内容 {} 字符, 评分标准 {} 字符",
            exam.exam_content.chars().count(),
            exam.evaluation_criteria.chars().count()
        );
        Ok(exam)
    }

    async fn extract_source(&self, document: UploadedDocument) -> AppResult<String> {
        let extractor = Arc::clone(&self.extractor);
        let bytes = Arc::clone(&document.bytes);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| {
                AppError::extraction(
                    &document.file_name,
                    ExtractionError::TaskFailed(e.to_string()),
                )
            })?;
        extracted.map_err(|e| AppError::extraction(&document.file_name, e))
    }
}
