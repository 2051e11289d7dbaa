//! 流程层（Workflow）
//!
//! 展示层直接调用的入口：身份校验 → 上传校验 → 编排 → 持久化 → `ActionOutcome`

pub mod actions;
pub mod outcome;
pub mod upload_validation;

pub use actions::{ExamActions, MANUAL_EXAM_TYPE};
pub use outcome::ActionOutcome;
pub use upload_validation::UploadLimits;
