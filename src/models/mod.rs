pub mod exam;
pub mod grading;
pub mod records;
pub mod submission;

pub use exam::{ExamGenerationRequest, ExamType, GeneratedExam};
pub use grading::{
    round_to, EvaluationCriteria, EvaluationSummary, GradingOutcome, GradingRequest, GradingResult,
};
pub use records::{
    EvaluationDetail, EvaluationRecord, EvaluationStats, NewEvaluation, NewResult, ResultRecord,
    SavedCriteria, UserId,
};
pub use submission::{ExamSubmission, UploadedDocument};
