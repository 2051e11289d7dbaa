//! 应用装配
//!
//! 启动时根据 `Config` 构造一次全部组件，再把命令行子命令分发给工作流入口。

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{Command, CriteriaAction, CriteriaSource};
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{LlmBackend, LlmClient, LocalDocumentStore, PdfTextExtractor, StaticIdentity};
use crate::models::{ExamGenerationRequest, GeneratedExam, SavedCriteria, UploadedDocument};
use crate::services::StructuredGenerationClient;
use crate::storage::SqlitePersistence;
use crate::utils::logging::log_startup;
use crate::workflow::{ActionOutcome, ExamActions};

/// 应用主结构
pub struct App {
    config: Config,
    actions: ExamActions,
}

/// `generate --save-criteria` 的输出
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReport {
    exam: ActionOutcome<GeneratedExam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_criteria: Option<ActionOutcome<SavedCriteria>>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config, user: Option<i64>) -> Result<Self> {
        log_startup(&config);

        let backend: Arc<dyn LlmBackend> = Arc::new(LlmClient::new(&config));
        let generator = Arc::new(StructuredGenerationClient::from_config(backend, &config));
        let store = SqlitePersistence::open(&config.database_path)
            .with_context(|| format!("无法打开数据库 {}", config.database_path))?;

        let actions = ExamActions::new(
            &config,
            generator,
            Arc::new(PdfTextExtractor::new()),
            Arc::new(LocalDocumentStore::new(&config.upload_dir)),
            Arc::new(store),
            Arc::new(StaticIdentity::from(user)),
        );

        Ok(Self { config, actions })
    }

    /// 执行一个子命令，返回是否成功
    pub async fn run(&self, command: Command) -> Result<bool> {
        match command {
            Command::Grade { files, criteria } => {
                if let Some(failure) = self.missing_credentials() {
                    return print_outcome(&failure);
                }
                let criteria = match self.resolve_criteria(&criteria).await? {
                    Ok(text) => text,
                    Err(failure) => return print_outcome(&failure),
                };
                let mut documents = Vec::with_capacity(files.len());
                for path in &files {
                    documents.push(read_document(path).await?);
                }
                print_outcome(&self.actions.grade_student_exams(documents, &criteria).await)
            }

            Command::GradeExam {
                exam,
                exam_type,
                files,
            } => {
                if let Some(failure) = self.missing_credentials() {
                    return print_outcome(&failure);
                }
                let content = tokio::fs::read_to_string(&exam)
                    .await
                    .with_context(|| format!("无法读取试卷文件 {}", exam.display()))?;
                let generated: GeneratedExam = serde_json::from_str(&content)
                    .with_context(|| format!("试卷文件格式无效 {}", exam.display()))?;
                let mut documents = Vec::with_capacity(files.len());
                for path in &files {
                    documents.push(read_document(path).await?);
                }
                print_outcome(
                    &self
                        .actions
                        .grade_generated_exam(documents, exam_type, &generated)
                        .await,
                )
            }

            Command::Generate {
                exam_type,
                topic,
                instructions,
                source,
                save_criteria,
            } => {
                if let Some(failure) = self.missing_credentials() {
                    return print_outcome(&failure);
                }
                let request = ExamGenerationRequest {
                    topic,
                    exam_type,
                    source_text: None,
                    instructions,
                };
                let source = match source {
                    Some(path) => Some(read_document(&path).await?),
                    None => None,
                };

                let exam = self.actions.generate_exam(request, source).await;
                let saved_criteria = match (&exam.data, save_criteria) {
                    (Some(generated), Some(name)) => Some(
                        self.actions
                            .save_criteria(&name, &generated.evaluation_criteria)
                            .await,
                    ),
                    _ => None,
                };

                let success = exam.is_success()
                    && saved_criteria.as_ref().map_or(true, ActionOutcome::is_success);
                print_json(&GenerateReport {
                    exam,
                    saved_criteria,
                })?;
                Ok(success)
            }

            Command::Feedback { result_id } => {
                if let Some(failure) = self.missing_credentials() {
                    return print_outcome(&failure);
                }
                print_outcome(&self.actions.regenerate_feedback(result_id).await)
            }

            Command::Criteria { action } => match action {
                CriteriaAction::Save { name, criteria } => {
                    let criteria = match self.resolve_criteria(&criteria).await? {
                        Ok(text) => text,
                        Err(failure) => return print_outcome(&failure),
                    };
                    print_outcome(&self.actions.save_criteria(&name, &criteria).await)
                }
                CriteriaAction::List => print_outcome(&self.actions.saved_criteria().await),
            },

            Command::History => print_outcome(&self.actions.evaluation_history().await),
            Command::Stats => print_outcome(&self.actions.evaluation_stats().await),
            Command::Show { evaluation_id } => {
                print_outcome(&self.actions.evaluation_results(evaluation_id).await)
            }
            Command::Delete { evaluation_id } => {
                print_outcome(&self.actions.delete_evaluation(evaluation_id).await)
            }
        }
    }

    /// 需要调用模型的命令先检查凭据
    fn missing_credentials(&self) -> Option<ActionOutcome<()>> {
        self.config
            .require_llm_credentials()
            .err()
            .map(|e| ActionOutcome::from_result("检查配置", Err(AppError::from(e))))
    }

    /// 读取评分标准文本；已保存的标准不存在时返回失败结果
    async fn resolve_criteria(
        &self,
        source: &CriteriaSource,
    ) -> Result<std::result::Result<String, ActionOutcome<SavedCriteria>>> {
        if let Some(text) = &source.criteria {
            return Ok(Ok(text.clone()));
        }
        if let Some(path) = &source.criteria_file {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("无法读取评分标准文件 {}", path.display()))?;
            return Ok(Ok(text));
        }
        if let Some(id) = source.saved_criteria {
            let outcome = self.actions.load_criteria(id).await;
            return Ok(match outcome.data {
                Some(saved) => Ok(saved.criteria_text),
                None => Err(outcome),
            });
        }
        Ok(Ok(String::new()))
    }
}

async fn read_document(path: &Path) -> Result<UploadedDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("无法读取文件 {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedDocument::new(file_name, bytes))
}

fn print_outcome<T: Serialize>(outcome: &ActionOutcome<T>) -> Result<bool> {
    print_json(outcome)?;
    Ok(outcome.is_success())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
