//! 批量评分编排 - 编排层
//!
//! ## 职责
//!
//! 1. **并发提取**：每份文档一个阻塞任务，由 Semaphore 限制并发，按提交顺序汇合
//! 2. **单次评分**：整批试卷一次性发给模型（不是每份一次调用）
//! 3. **结果校验**：数量必须一致，并通过关联标记（S1、S2 …）还原到提交顺序
//! 4. **汇总统计**：学生人数与平均分
//!
//! 任何一步失败都使整批失败，不产生部分结果。

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ExtractionError, GradingError, ValidationError};
use crate::infrastructure::TextExtractor;
use crate::models::{
    EvaluationCriteria, ExamSubmission, GradingOutcome, GradingRequest, GradingResult,
    UploadedDocument,
};
use crate::services::prompts::{CriteriaInput, ExamInput, GradedExam, GradingInput};
use crate::services::{invoke_typed, PromptCatalog, StructuredGeneration};
use crate::utils::logging::{log_batch_complete, log_batch_start, truncate_text};

/// 关联标记前缀
const TOKEN_PREFIX: char = 'S';

/// 批量评分编排器
///
/// 无状态：每次调用互不影响，可以在多个请求之间共享。
pub struct GradingOrchestrator {
    generator: Arc<dyn StructuredGeneration>,
    extractor: Arc<dyn TextExtractor>,
    prompts: Arc<PromptCatalog>,
    max_concurrent: usize,
    unknown_student_label: String,
}

impl GradingOrchestrator {
    pub fn new(
        generator: Arc<dyn StructuredGeneration>,
        extractor: Arc<dyn TextExtractor>,
        prompts: Arc<PromptCatalog>,
        config: &Config,
    ) -> Self {
        Self {
            generator,
            extractor,
            prompts,
            max_concurrent: config.max_concurrent_extractions.max(1),
            unknown_student_label: config.unknown_student_label.clone(),
        }
    }

    /// 提取文档并评分
    pub async fn grade_documents(
        &self,
        documents: &[UploadedDocument],
        criteria: &EvaluationCriteria,
    ) -> AppResult<(Vec<ExamSubmission>, GradingOutcome)> {
        if documents.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        log_batch_start(documents.len(), self.max_concurrent);

        let submissions = self.extract_submissions(documents).await?;
        let outcome = self.grade_batch(&submissions, criteria).await?;

        log_batch_complete(&outcome.summary);
        Ok((submissions, outcome))
    }

    /// 并发提取所有文档的文本
    ///
    /// 结果与输入顺序一致。任意一份失败则整批失败，报告顺序最靠前的失败文档。
    pub async fn extract_submissions(
        &self,
        documents: &[UploadedDocument],
    ) -> AppResult<Vec<ExamSubmission>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(documents.len());

        for document in documents {
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                AppError::extraction(&document.file_name, ExtractionError::TaskFailed(e.to_string()))
            })?;

            let extractor = Arc::clone(&self.extractor);
            let bytes = Arc::clone(&document.bytes);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                extractor.extract(&bytes)
            });
            handles.push((document.file_name.clone(), handle));
        }

        // 等待全部任务完成（按提交顺序）
        let mut submissions = Vec::with_capacity(handles.len());
        for (file_name, handle) in handles {
            match handle.await {
                Ok(Ok(text)) => {
                    debug!(
                        "[{}] 提取到 {} 个字符: {}",
                        file_name,
                        text.chars().count(),
                        truncate_text(&text, 40)
                    );
                    submissions.push(ExamSubmission::new(file_name, text));
                }
                Ok(Err(e)) => {
                    error!("[{}] ❌ 文本提取失败: {}", file_name, e);
                    return Err(AppError::extraction(file_name, e));
                }
                Err(e) => {
                    error!("[{}] 提取任务执行失败: {}", file_name, e);
                    return Err(AppError::extraction(
                        file_name,
                        ExtractionError::TaskFailed(e.to_string()),
                    ));
                }
            }
        }

        info!("✓ 已提取 {} 份试卷的文本", submissions.len());
        Ok(submissions)
    }

    /// 对已提取的试卷进行一次批量评分
    pub async fn grade_batch(
        &self,
        submissions: &[ExamSubmission],
        criteria: &EvaluationCriteria,
    ) -> AppResult<GradingOutcome> {
        let request = GradingRequest::new(submissions, criteria)?;

        let input = GradingInput {
            exams: request
                .submissions()
                .iter()
                .enumerate()
                .map(|(index, submission)| ExamInput {
                    submission_id: submission_token(index),
                    exam_submission: submission.text.clone(),
                })
                .collect(),
            evaluation_criteria: CriteriaInput {
                criteria: request.criteria().as_str().to_string(),
            },
        };

        info!("🤖 发送 {} 份试卷进行评分", request.len());
        let graded: Vec<GradedExam> =
            invoke_typed(self.generator.as_ref(), &self.prompts.grading, &input).await?;

        if graded.len() != request.len() {
            warn!(
                "评分结果数量不一致: 期望 {}, 实际 {}",
                request.len(),
                graded.len()
            );
            return Err(GradingError::CountMismatch {
                expected: request.len(),
                actual: graded.len(),
            }
            .into());
        }

        let results = self.realign(graded)?;
        Ok(GradingOutcome::new(results))
    }

    /// 按关联标记把模型返回的结果还原到提交顺序
    fn realign(&self, graded: Vec<GradedExam>) -> Result<Vec<GradingResult>, GradingError> {
        let expected = graded.len();
        let mut slots: Vec<Option<GradingResult>> = vec![None; expected];

        for item in graded {
            let index = parse_submission_token(&item.submission_id)
                .filter(|index| *index < expected)
                .ok_or_else(|| {
                    GradingError::Correlation(format!("未知的提交标记 \"{}\"", item.submission_id))
                })?;
            if slots[index].is_some() {
                return Err(GradingError::Correlation(format!(
                    "提交标记 \"{}\" 出现了多次",
                    item.submission_id
                )));
            }

            slots[index] = Some(GradingResult {
                student_id: self.student_name(item.student_id),
                grade: item.grade,
                feedback: item.feedback,
            });
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    GradingError::Correlation(format!("缺少 {} 的评分结果", submission_token(index)))
                })
            })
            .collect()
    }

    /// 空白或缺失的姓名替换为占位名称
    fn student_name(&self, extracted: Option<String>) -> String {
        match extracted.map(|name| name.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => self.unknown_student_label.clone(),
        }
    }
}

/// 第 `index` 份提交（从 0 开始）的关联标记
pub fn submission_token(index: usize) -> String {
    format!("{}{}", TOKEN_PREFIX, index + 1)
}

/// 解析关联标记，返回从 0 开始的序号
pub fn parse_submission_token(token: &str) -> Option<usize> {
    token
        .trim()
        .strip_prefix(TOKEN_PREFIX)?
        .parse::<usize>()
        .ok()?
        .checked_sub(1)
}
