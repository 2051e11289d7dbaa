//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 按顺序调用提取和生成能力，并保证产出数据的结构约束。
//! 每次调用都是无状态的，不持有跨请求的可变状态。
//!
//! ## 模块划分
//!
//! ### `grading` - 批量评分
//! - 并发提取文本（Semaphore + spawn_blocking，按顺序汇合）
//! - 整批一次评分，校验数量并按关联标记还原顺序
//! - 计算汇总统计
//!
//! ### `exam_generation` - 出题
//! - 校验请求，实践作业提取源文档
//! - 检查生成结果的完整性
//!
//! ### `feedback` - 个性化反馈
//! - 为单个已评分学生重新生成反馈
//!
//! ## 层次关系
//!
//! ```text
//! workflow::ExamActions (身份校验、持久化)
//!     ↓
//! orchestrator (grading / exam_generation / feedback)
//!     ↓
//! services (结构化生成：prompts / schema_validator)
//!     ↓
//! infrastructure (PDF 提取、LLM 客户端)
//! ```

pub mod exam_generation;
pub mod feedback;
pub mod grading;

// 重新导出主要类型
pub use exam_generation::ExamGenerator;
pub use feedback::FeedbackGenerator;
pub use grading::GradingOrchestrator;
