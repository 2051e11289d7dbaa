//! 工作流入口 - 流程层
//!
//! 展示层调用的全部操作。每个操作：
//! 1. 先确认用户身份（没有身份直接失败）
//! 2. 校验输入
//! 3. 调用编排层
//! 4. 成功后才写入文档存储和数据库
//!
//! 所有错误都收敛为 [`ActionOutcome`]，不会把原始错误抛给展示层。

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ExtractionError, StorageError, ValidationError};
use crate::infrastructure::{DocumentStore, IdentityProvider, TextExtractor};
use crate::models::{
    EvaluationCriteria, EvaluationDetail, EvaluationRecord, EvaluationStats, ExamGenerationRequest,
    ExamSubmission, ExamType, GeneratedExam, GradingOutcome, NewEvaluation, NewResult, SavedCriteria,
    UploadedDocument, UserId,
};
use crate::orchestrator::{ExamGenerator, FeedbackGenerator, GradingOrchestrator};
use crate::services::{PromptCatalog, StructuredGeneration};
use crate::storage::PersistenceGateway;
use crate::workflow::outcome::ActionOutcome;
use crate::workflow::upload_validation::UploadLimits;

/// 工作流层记录的评估类型（手动上传评分）
pub const MANUAL_EXAM_TYPE: &str = "manual";

/// 工作流入口集合
pub struct ExamActions {
    identity: Arc<dyn IdentityProvider>,
    grading: GradingOrchestrator,
    exams: ExamGenerator,
    feedback: FeedbackGenerator,
    extractor: Arc<dyn TextExtractor>,
    documents: Arc<dyn DocumentStore>,
    store: Arc<dyn PersistenceGateway>,
    limits: UploadLimits,
    history_limit: usize,
}

impl ExamActions {
    pub fn new(
        config: &Config,
        generator: Arc<dyn StructuredGeneration>,
        extractor: Arc<dyn TextExtractor>,
        documents: Arc<dyn DocumentStore>,
        store: Arc<dyn PersistenceGateway>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let prompts = Arc::new(PromptCatalog::from_config(config));
        Self {
            identity,
            grading: GradingOrchestrator::new(
                generator.clone(),
                extractor.clone(),
                prompts.clone(),
                config,
            ),
            exams: ExamGenerator::new(generator.clone(), extractor.clone(), prompts.clone()),
            feedback: FeedbackGenerator::new(generator, prompts),
            extractor,
            documents,
            store,
            limits: UploadLimits::from_config(config),
            history_limit: config.history_limit,
        }
    }

    fn current_user(&self) -> AppResult<UserId> {
        self.identity.current_user().ok_or(AppError::Unauthenticated)
    }

    /// 在阻塞线程池中执行数据库操作
    async fn with_store<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PersistenceGateway) -> Result<T, StorageError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || operation(store.as_ref()))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?;
        Ok(result?)
    }

    // ========== 评分 ==========

    /// 批改一批学生试卷并保存结果
    pub async fn grade_student_exams(
        &self,
        documents: Vec<UploadedDocument>,
        criteria: &str,
    ) -> ActionOutcome<GradingOutcome> {
        let result = self
            .grade_student_exams_inner(documents, criteria, MANUAL_EXAM_TYPE, None)
            .await;
        ActionOutcome::from_result("批改试卷", result)
    }

    /// 用生成的试卷批改学生答卷，评估记录中保存题型和试卷内容
    pub async fn grade_generated_exam(
        &self,
        documents: Vec<UploadedDocument>,
        exam_type: ExamType,
        exam: &GeneratedExam,
    ) -> ActionOutcome<GradingOutcome> {
        let result = self
            .grade_student_exams_inner(
                documents,
                &exam.evaluation_criteria,
                exam_type.as_str(),
                Some(exam.exam_content.clone()),
            )
            .await;
        ActionOutcome::from_result("批改生成的试卷", result)
    }

    async fn grade_student_exams_inner(
        &self,
        documents: Vec<UploadedDocument>,
        criteria: &str,
        exam_type: &str,
        exam_content: Option<String>,
    ) -> AppResult<GradingOutcome> {
        let user_id = self.current_user()?;
        self.limits.check_documents(&documents)?;
        let criteria = self.limits.check_criteria(criteria)?;

        let (submissions, mut outcome) = self.grading.grade_documents(&documents, &criteria).await?;

        // 评分成功后才保存原件
        let submissions = self.store_originals(&documents, submissions).await?;

        let evaluation = NewEvaluation {
            user_id,
            exam_type: exam_type.to_string(),
            exam_content,
            evaluation_criteria: criteria.as_str().to_string(),
            total_students: outcome.summary.total_students,
            average_grade: outcome.summary.average_grade,
        };
        let results: Vec<NewResult> = outcome
            .results
            .iter()
            .zip(&submissions)
            .map(|(result, submission)| NewResult {
                student_name: result.student_id.clone(),
                grade: result.grade,
                feedback: result.feedback.clone(),
                submission_path: submission.storage_ref.clone(),
            })
            .collect();

        let student_count = results.len();
        let recorded = self
            .with_store(move |store| store.record_evaluation(&evaluation, &results))
            .await;
        match recorded {
            Ok(evaluation_id) => {
                info!("💾 已保存评估 #{} ({} 名学生)", evaluation_id, student_count);
                outcome.evaluation_id = Some(evaluation_id);
                Ok(outcome)
            }
            Err(e) => {
                self.discard_originals(submissions.iter().filter_map(|s| s.storage_ref.as_deref()))
                    .await;
                Err(e)
            }
        }
    }

    /// 保存原始文件；任意一份失败则删除已保存的文件
    async fn store_originals(
        &self,
        documents: &[UploadedDocument],
        submissions: Vec<ExamSubmission>,
    ) -> AppResult<Vec<ExamSubmission>> {
        let mut stored = Vec::with_capacity(submissions.len());
        for (document, submission) in documents.iter().zip(submissions) {
            match self.documents.save(&document.bytes, &document.file_name).await {
                Ok(storage_ref) => stored.push(submission.with_storage_ref(storage_ref)),
                Err(e) => {
                    self.discard_originals(stored.iter().filter_map(|s| s.storage_ref.as_deref()))
                        .await;
                    return Err(e.into());
                }
            }
        }
        Ok(stored)
    }

    /// 并发删除原始文档，失败只记录日志
    async fn discard_originals<'a>(&self, refs: impl Iterator<Item = &'a str>) {
        let deletions = refs.map(|storage_ref| async move {
            if let Err(e) = self.documents.delete(storage_ref).await {
                warn!("清理原始文档 {} 失败: {}", storage_ref, e);
            }
        });
        join_all(deletions).await;
    }

    // ========== 出题 ==========

    /// 生成试卷和评分标准
    pub async fn generate_exam(
        &self,
        request: ExamGenerationRequest,
        source: Option<UploadedDocument>,
    ) -> ActionOutcome<GeneratedExam> {
        let result = self.generate_exam_inner(request, source).await;
        ActionOutcome::from_result("生成试卷", result)
    }

    async fn generate_exam_inner(
        &self,
        request: ExamGenerationRequest,
        source: Option<UploadedDocument>,
    ) -> AppResult<GeneratedExam> {
        self.current_user()?;
        // 其他题型会忽略源文档，不做检查
        if let Some(document) = &source {
            if request.exam_type == ExamType::PracticalWorkFromDocument {
                self.limits.check_document(document)?;
            }
        }
        self.exams.generate(request, source).await
    }

    // ========== 个性化反馈 ==========

    /// 为一条已保存的学生结果重新生成反馈（不修改已保存的结果）
    pub async fn regenerate_feedback(&self, result_id: i64) -> ActionOutcome<String> {
        let result = self.regenerate_feedback_inner(result_id).await;
        ActionOutcome::from_result("重新生成反馈", result)
    }

    async fn regenerate_feedback_inner(&self, result_id: i64) -> AppResult<String> {
        let user_id = self.current_user()?;
        let result = self
            .with_store(move |store| store.get_result(user_id, result_id))
            .await?
            .ok_or(ValidationError::ResultNotFound(result_id))?;
        let storage_ref = result
            .submission_path
            .as_deref()
            .ok_or(ValidationError::SubmissionMissing(result_id))?;
        let evaluation_id = result.evaluation_id;
        let evaluation = self
            .with_store(move |store| store.get_evaluation(user_id, evaluation_id))
            .await?
            .ok_or(ValidationError::EvaluationNotFound(evaluation_id))?;

        let bytes = self.documents.load(storage_ref).await?;
        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| {
                AppError::extraction(storage_ref, ExtractionError::TaskFailed(e.to_string()))
            })?
            .map_err(|e| AppError::extraction(storage_ref, e))?;

        let criteria = EvaluationCriteria::new(evaluation.evaluation_criteria);
        self.feedback.regenerate(&text, &criteria, result.grade).await
    }

    // ========== 评分标准 ==========

    /// 保存一份评分标准
    pub async fn save_criteria(&self, name: &str, criteria: &str) -> ActionOutcome<SavedCriteria> {
        let result = self.save_criteria_inner(name, criteria).await;
        ActionOutcome::from_result("保存评分标准", result)
    }

    async fn save_criteria_inner(&self, name: &str, criteria: &str) -> AppResult<SavedCriteria> {
        let user_id = self.current_user()?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyCriteriaName.into());
        }
        let criteria = self.limits.check_criteria(criteria)?;
        self.with_store(move |store| store.save_criteria(user_id, &name, criteria.as_str()))
            .await
    }

    /// 当前用户保存的全部评分标准（最新的在前）
    pub async fn saved_criteria(&self) -> ActionOutcome<Vec<SavedCriteria>> {
        let result = match self.current_user() {
            Ok(user_id) => self.with_store(move |store| store.list_criteria(user_id)).await,
            Err(e) => Err(e),
        };
        ActionOutcome::from_result("读取评分标准", result)
    }

    /// 按 ID 读取一份评分标准
    pub async fn load_criteria(&self, criteria_id: i64) -> ActionOutcome<SavedCriteria> {
        let result = self.load_criteria_inner(criteria_id).await;
        ActionOutcome::from_result("读取评分标准", result)
    }

    async fn load_criteria_inner(&self, criteria_id: i64) -> AppResult<SavedCriteria> {
        let user_id = self.current_user()?;
        self.with_store(move |store| store.get_criteria(user_id, criteria_id))
            .await?
            .ok_or_else(|| ValidationError::CriteriaNotFound(criteria_id).into())
    }

    // ========== 历史记录 ==========

    /// 最近的评估记录
    pub async fn evaluation_history(&self) -> ActionOutcome<Vec<EvaluationRecord>> {
        let limit = self.history_limit;
        let result = match self.current_user() {
            Ok(user_id) => {
                self.with_store(move |store| store.evaluation_history(user_id, limit))
                    .await
            }
            Err(e) => Err(e),
        };
        ActionOutcome::from_result("读取评估历史", result)
    }

    /// 仪表盘统计
    pub async fn evaluation_stats(&self) -> ActionOutcome<EvaluationStats> {
        let result = match self.current_user() {
            Ok(user_id) => {
                self.with_store(move |store| store.evaluation_stats(user_id, Utc::now()))
                    .await
            }
            Err(e) => Err(e),
        };
        ActionOutcome::from_result("读取统计", result)
    }

    /// 一次评估的全部学生结果（按分数降序）
    pub async fn evaluation_results(&self, evaluation_id: i64) -> ActionOutcome<EvaluationDetail> {
        let result = self.evaluation_results_inner(evaluation_id).await;
        ActionOutcome::from_result("读取评估结果", result)
    }

    async fn evaluation_results_inner(&self, evaluation_id: i64) -> AppResult<EvaluationDetail> {
        let user_id = self.current_user()?;
        self.with_store(move |store| store.evaluation_results(user_id, evaluation_id))
            .await?
            .ok_or_else(|| ValidationError::EvaluationNotFound(evaluation_id).into())
    }

    /// 删除评估记录及其学生结果和原始文件
    pub async fn delete_evaluation(&self, evaluation_id: i64) -> ActionOutcome<i64> {
        let result = self.delete_evaluation_inner(evaluation_id).await;
        ActionOutcome::from_result("删除评估", result)
    }

    async fn delete_evaluation_inner(&self, evaluation_id: i64) -> AppResult<i64> {
        let detail = self.evaluation_results_inner(evaluation_id).await?;
        let user_id = detail.evaluation.user_id;

        let deleted = self
            .with_store(move |store| store.delete_evaluation(user_id, evaluation_id))
            .await?;
        if !deleted {
            return Err(ValidationError::EvaluationNotFound(evaluation_id).into());
        }
        self.discard_originals(
            detail
                .results
                .iter()
                .filter_map(|r| r.submission_path.as_deref()),
        )
        .await;

        info!("🗑️ 已删除评估 #{}", evaluation_id);
        Ok(evaluation_id)
    }
}
