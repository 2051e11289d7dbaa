//! 持久化记录
//!
//! 与数据库表一一对应，只在存储层与工作流层之间传递

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::grading::round_to;

/// 当前用户 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 用户保存的评分标准
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCriteria {
    pub id: i64,
    pub name: String,
    pub criteria_text: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的评估记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvaluation {
    pub user_id: UserId,
    pub exam_type: String,
    pub exam_content: Option<String>,
    pub evaluation_criteria: String,
    pub total_students: usize,
    pub average_grade: f64,
}

/// 待写入的学生结果
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub student_name: String,
    pub grade: f64,
    pub feedback: String,
    pub submission_path: Option<String>,
}

/// 评估记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub id: i64,
    pub user_id: UserId,
    pub exam_type: String,
    pub exam_content: Option<String>,
    pub evaluation_criteria: String,
    pub total_students: usize,
    pub average_grade: f64,
    pub created_at: DateTime<Utc>,
}

/// 学生结果记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: i64,
    pub evaluation_id: i64,
    pub user_id: UserId,
    pub student_name: String,
    pub grade: f64,
    pub feedback: String,
    pub submission_path: Option<String>,
    pub graded_at: DateTime<Utc>,
}

/// 评估记录及其全部学生结果（按分数降序）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetail {
    pub evaluation: EvaluationRecord,
    pub results: Vec<ResultRecord>,
}

/// 仪表盘统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    pub total_evaluations: usize,
    /// 本月（UTC）创建的评估数量
    pub this_month: usize,
    /// 各次评估平均分的平均值，保留一位小数
    pub average_grade: f64,
    pub total_students: usize,
}

impl EvaluationStats {
    pub fn from_evaluations(evaluations: &[EvaluationRecord], now: DateTime<Utc>) -> Self {
        if evaluations.is_empty() {
            return Self {
                total_evaluations: 0,
                this_month: 0,
                average_grade: 0.0,
                total_students: 0,
            };
        }

        let this_month = evaluations
            .iter()
            .filter(|e| e.created_at.year() == now.year() && e.created_at.month() == now.month())
            .count();
        let total_students = evaluations.iter().map(|e| e.total_students).sum();
        let mean = evaluations.iter().map(|e| e.average_grade).sum::<f64>() / evaluations.len() as f64;

        Self {
            total_evaluations: evaluations.len(),
            this_month,
            average_grade: round_to(mean, 1),
            total_students,
        }
    }
}
