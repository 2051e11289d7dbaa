//! # Exam Grader
//!
//! AI 辅助的试卷批改与出题：上传学生试卷（PDF）和评分标准，由模型批量评分并给出反馈；
//! 或根据主题/源文档生成试卷和配套的评分标准。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `PdfTextExtractor` - PDF → 纯文本
//! - `LlmClient` - OpenAI 兼容接口的模型调用
//! - `LocalDocumentStore` - 原始文档存储
//! - `IdentityProvider` - 当前用户
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 结构化生成：提示词 + 输入/输出 schema + 解析或失败
//! - `PromptCatalog` - 评分、出题、个性化反馈三组提示词
//! - `StructuredGenerationClient` - 校验输入、调用模型（带超时）、校验输出
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/grading` - 并发提取 → 单次批量评分 → 数量和关联校验 → 汇总
//! - `orchestrator/exam_generation` - 校验请求 → 提取源文档 → 生成 → 完整性校验
//! - `orchestrator/feedback` - 单个学生的反馈重新生成
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 身份校验、上传校验、持久化，错误收敛为 `ActionOutcome`
//!
//! ### ⑤ 存储层（Storage）
//! - `storage/` - `PersistenceGateway` 及其 SQLite 实现
//!
//! ## 模块结构

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult, FailureKind};
pub use models::{
    EvaluationCriteria, EvaluationSummary, ExamGenerationRequest, ExamSubmission, ExamType,
    GeneratedExam, GradingOutcome, GradingResult, UploadedDocument, UserId,
};
pub use orchestrator::{ExamGenerator, FeedbackGenerator, GradingOrchestrator};
pub use services::{PromptCatalog, StructuredGeneration, StructuredGenerationClient};
pub use workflow::{ActionOutcome, ExamActions};
