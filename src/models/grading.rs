use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::submission::ExamSubmission;

/// 评分标准（自由文本的评分细则）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationCriteria(String);

impl EvaluationCriteria {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// 一次评分请求：按顺序排列的试卷 + 一份评分标准
///
/// 构造时保证至少有一份试卷、评分标准非空。
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    submissions: &'a [ExamSubmission],
    criteria: &'a EvaluationCriteria,
}

impl<'a> GradingRequest<'a> {
    pub fn new(
        submissions: &'a [ExamSubmission],
        criteria: &'a EvaluationCriteria,
    ) -> Result<Self, ValidationError> {
        if submissions.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if criteria.is_blank() {
            return Err(ValidationError::CriteriaTooShort { min: 1 });
        }
        Ok(Self {
            submissions,
            criteria,
        })
    }

    pub fn submissions(&self) -> &'a [ExamSubmission] {
        self.submissions
    }

    pub fn criteria(&self) -> &'a EvaluationCriteria {
        self.criteria
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

/// 单个学生的评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    /// 学生姓名；识别不到时为配置的占位名称
    pub student_id: String,
    pub grade: f64,
    /// Markdown 格式的反馈
    pub feedback: String,
}

/// 一次评分的汇总统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub total_students: usize,
    /// 平均分，保留两位小数
    pub average_grade: f64,
}

impl EvaluationSummary {
    pub fn from_results(results: &[GradingResult]) -> Self {
        if results.is_empty() {
            return Self {
                total_students: 0,
                average_grade: 0.0,
            };
        }
        let total: f64 = results.iter().map(|r| r.grade).sum();
        Self {
            total_students: results.len(),
            average_grade: round_to(total / results.len() as f64, 2),
        }
    }
}

/// 评分编排的完整产出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutcome {
    pub results: Vec<GradingResult>,
    pub summary: EvaluationSummary,
    /// 持久化后的评估记录 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_id: Option<i64>,
}

impl GradingOutcome {
    pub fn new(results: Vec<GradingResult>) -> Self {
        let summary = EvaluationSummary::from_results(&results);
        Self {
            results,
            summary,
            evaluation_id: None,
        }
    }
}

/// 四舍五入到指定的小数位数（远离零方向）
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(grade: f64) -> GradingResult {
        GradingResult {
            student_id: "Ana".to_string(),
            grade,
            feedback: "ok".to_string(),
        }
    }

    #[test]
    fn test_summary_average_is_rounded_to_two_decimals() {
        let summary = EvaluationSummary::from_results(&[result(70.0), result(80.0), result(85.0)]);
        assert_eq!(summary.total_students, 3);
        assert_eq!(summary.average_grade, 78.33);
    }

    #[test]
    fn test_summary_of_no_results_is_zero() {
        let summary = EvaluationSummary::from_results(&[]);
        assert_eq!(summary.total_students, 0);
        assert_eq!(summary.average_grade, 0.0);
    }

    #[test]
    fn test_round_to_half_goes_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(66.666, 2), 66.67);
        assert_eq!(round_to(7.25, 1), 7.3);
    }

    #[test]
    fn test_request_rejects_empty_batch() {
        let criteria = EvaluationCriteria::new("Q1: 10 points");
        let err = GradingRequest::new(&[], &criteria).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyBatch));
    }

    #[test]
    fn test_request_rejects_blank_criteria() {
        let submissions = vec![ExamSubmission::new("a.pdf", "answers")];
        let criteria = EvaluationCriteria::new("   ");
        assert!(GradingRequest::new(&submissions, &criteria).is_err());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let json = serde_json::to_value(result(90.0)).unwrap();
        assert_eq!(json["studentId"], "Ana");
        assert_eq!(json["grade"], 90.0);
    }
}
