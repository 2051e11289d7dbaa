use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{
    EvaluationDetail, EvaluationRecord, EvaluationStats, NewEvaluation, NewResult, ResultRecord,
    SavedCriteria, UserId,
};

/// 持久化网关
///
/// 评分核心本身不写数据库；工作流层在评分成功后通过它保存结果。
/// 所有查询都按用户隔离。
pub trait PersistenceGateway: Send + Sync {
    /// 在同一个事务中写入评估记录和全部学生结果，返回评估 ID
    fn record_evaluation(
        &self,
        evaluation: &NewEvaluation,
        results: &[NewResult],
    ) -> Result<i64, StorageError>;

    fn save_criteria(
        &self,
        user_id: UserId,
        name: &str,
        criteria_text: &str,
    ) -> Result<SavedCriteria, StorageError>;

    /// 最新的在前
    fn list_criteria(&self, user_id: UserId) -> Result<Vec<SavedCriteria>, StorageError>;

    fn get_criteria(&self, user_id: UserId, id: i64) -> Result<Option<SavedCriteria>, StorageError>;

    /// 最新的在前，最多 `limit` 条
    fn evaluation_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<EvaluationRecord>, StorageError>;

    fn get_evaluation(
        &self,
        user_id: UserId,
        evaluation_id: i64,
    ) -> Result<Option<EvaluationRecord>, StorageError>;

    /// `now` 决定"本月"的范围
    fn evaluation_stats(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<EvaluationStats, StorageError>;

    /// 评估记录及结果，结果按分数降序
    fn evaluation_results(
        &self,
        user_id: UserId,
        evaluation_id: i64,
    ) -> Result<Option<EvaluationDetail>, StorageError>;

    fn get_result(&self, user_id: UserId, result_id: i64) -> Result<Option<ResultRecord>, StorageError>;

    /// 删除评估记录（学生结果级联删除），返回是否存在该记录
    fn delete_evaluation(&self, user_id: UserId, evaluation_id: i64) -> Result<bool, StorageError>;
}
